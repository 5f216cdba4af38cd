use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source with a movable epoch.
///
/// Readings are nanoseconds since the most recent [`Clock::reset_epoch`]
/// call, so exported timestamps start near zero at configuration time
/// instead of being raw OS clock values. Re-configuring the profiler
/// resets the epoch again; that restart of the logical time origin is
/// caller-visible, not silently ignored.
pub struct Clock {
    start: Instant,
    epoch_ns: AtomicU64,
}

impl Clock {
    pub fn new() -> Clock {
        Clock {
            start: Instant::now(),
            epoch_ns: AtomicU64::new(0),
        }
    }

    #[inline]
    fn raw_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    /// Nanoseconds since the current epoch. Saturates at zero for
    /// readings taken on other threads racing a concurrent epoch reset.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.raw_ns()
            .saturating_sub(self.epoch_ns.load(Ordering::Relaxed))
    }

    /// Restarts the logical time origin at "now".
    pub fn reset_epoch(&self) {
        self.epoch_ns.store(self.raw_ns(), Ordering::Relaxed);
    }
}
