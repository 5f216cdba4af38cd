//! Per-thread ring-buffer event recording.
//!
//! Each application thread owns exactly one [`RingRecorder`] and is the
//! only party that appends to it, which keeps the hot recording path
//! free of locks. The aggregator drains recorders from whatever thread
//! calls flush, under the following protocol:
//!
//! * `head` is the monotonic write cursor. Slot `i` holds the event for
//!   write index `i % capacity`. Only the owning thread stores `head`,
//!   and it does so with release ordering *after* the slot is fully
//!   written; a reader that loads `head` with acquire ordering therefore
//!   observes fully written slots below it.
//! * `tail` is the oldest-valid cursor. It is advanced by the owning
//!   thread when the buffer overflows and by a drain when events are
//!   consumed. Both sides move it only forward via `fetch_max`, so
//!   concurrent advances converge to the larger cursor instead of one
//!   side losing its update.
//! * A drain that overlaps a wrapping writer revalidates after copying.
//!   The writer advances `tail` *before* it overwrites a slot, so the
//!   drain re-reads `tail` and discards any copied entry whose write
//!   index fell below it. Those entries are exactly the ones the
//!   overwrite-oldest policy defines as dropped, so a drain never
//!   returns a slot that was being overwritten underneath it.
//!
//! Invariants: `head - tail <= capacity` after every write; `head` only
//! ever increases; `capacity` is fixed at construction.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::event::Event;

pub struct RingRecorder {
    slots: Box<[Slot]>,
    head: AtomicU64,
    tail: AtomicU64,
    overflowed: AtomicBool,
}

struct Slot(UnsafeCell<Event>);

// Slots are written only by the owning thread and read only by drains
// that bound themselves to an acquire-loaded `head` and revalidate
// against overwrites (see module docs).
unsafe impl Send for RingRecorder {}
unsafe impl Sync for RingRecorder {}

impl RingRecorder {
    /// Creates a recorder with room for `capacity` events.
    ///
    /// The capacity is validated at configure time; this constructor
    /// requires it to be non-zero.
    pub fn new(capacity: usize) -> RingRecorder {
        assert!(capacity > 0, "ring recorder capacity must be non-zero");
        let slots = (0..capacity)
            .map(|_| Slot(UnsafeCell::new(Event::default())))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        RingRecorder {
            slots,
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
            overflowed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether this recorder has ever dropped an event to overflow.
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Number of events currently unread.
    pub fn unread(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        head.saturating_sub(tail) as usize
    }

    /// Appends one event. Non-blocking; never fails.
    ///
    /// Must only be called by the owning thread. When the buffer is
    /// full the oldest unread event is dropped (overwrite-oldest: the
    /// newest event always wins) and the overflow flag is raised.
    #[inline]
    pub fn write(&self, event: Event) {
        let capacity = self.slots.len() as u64;
        // Single writer: a relaxed load of our own last store is exact.
        let head = self.head.load(Ordering::Relaxed);
        let next = head + 1;

        if next - self.tail.load(Ordering::Relaxed) > capacity {
            let reclaimed = next - capacity;
            // Only flag overflow if we actually advanced `tail`; a
            // concurrent drain may already have consumed past it.
            let prev = self.tail.fetch_max(reclaimed, Ordering::AcqRel);
            if prev < reclaimed {
                self.overflowed.store(true, Ordering::Relaxed);
            }
        }

        let slot = &self.slots[(head % capacity) as usize];
        unsafe {
            slot.0.get().write(event);
        }
        // Publish after the slot is fully written.
        self.head.store(next, Ordering::Release);
    }

    /// Copies out every unread event in write order and advances `tail`
    /// to the observed `head`.
    ///
    /// Callable from any thread. Concurrent drains of the same recorder
    /// must be serialized by the caller; the profiler does so under its
    /// lifecycle lock.
    pub fn drain(&self) -> Vec<Event> {
        let capacity = self.slots.len() as u64;
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Relaxed);
        let unread = head.saturating_sub(tail);

        let mut events = Vec::with_capacity(unread as usize);
        for index in tail..tail + unread {
            let slot = &self.slots[(index % capacity) as usize];
            // Volatile: the owning thread may be overwriting this slot
            // if it wrapped past it while we copy; such entries are
            // discarded below.
            events.push(unsafe { std::ptr::read_volatile(slot.0.get()) });
        }

        // Entries the writer reclaimed while we copied sit below the
        // re-read `tail`; discard them.
        let tail_after = self.tail.load(Ordering::Acquire);
        if tail_after > tail {
            let torn = ((tail_after - tail) as usize).min(events.len());
            events.drain(..torn);
        }

        self.tail.fetch_max(head, Ordering::AcqRel);
        events
    }
}
