use log::{debug, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::error::Error;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::chrome_trace;
use crate::clock::Clock;
use crate::event::{Event, EventKind};
use crate::interner::{NameId, NameTable};
use crate::recorder::RingRecorder;

/// Recognized profiler options.
#[derive(Clone, Debug)]
pub struct Config {
    /// Gates all recording from the moment of configuration.
    pub enabled: bool,
    /// Capacity of every ring recorder created *after* this
    /// configuration; recorders that already exist are not resized.
    pub per_thread_capacity: usize,
    /// Destination of the serialized trace. Truncated on every export.
    pub trace_output_path: PathBuf,
    /// Forward events to a platform tracing facility. Recognized but
    /// inert: no platform backend is compiled into this crate.
    pub enable_native_signpost_integration: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            enabled: false,
            per_thread_capacity: 1 << 15,
            trace_output_path: PathBuf::from("traceme_trace.json"),
            enable_native_signpost_integration: false,
        }
    }
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Lifecycle {
    Unconfigured,
    Configured,
    ShutDown,
}

// Config, lifecycle state and the recorder registry are all
// low-frequency; one coarse lock covers them.
struct Shared {
    lifecycle: Lifecycle,
    // Set by the first successful configure and never cleared. A
    // profiler that was never configured has no output path to write,
    // even after shutdown.
    ever_configured: bool,
    config: Config,
    recorders: Vec<Arc<RingRecorder>>,
}

struct ThreadState {
    recorder: Arc<RingRecorder>,
    thread_id: u32,
    name_cache: RefCell<FxHashMap<String, NameId>>,
}

thread_local! {
    // Keyed by profiler instance id so independent instances can coexist
    // (and so tests can run several in one process). An entry for a
    // dropped profiler lives until its thread exits.
    static THREAD_STATES: RefCell<FxHashMap<u64, Rc<ThreadState>>> =
        RefCell::new(FxHashMap::default());
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(0);

/// The tracing engine: configuration, enable switch, name interning,
/// per-thread recording and trace export, tied to one explicitly
/// constructed instance rather than ambient process globals.
///
/// Lifecycle: `Unconfigured -> Configured -> ShutDown`, driven by
/// [`Profiler::configure`] and [`Profiler::shutdown`]. Instrumentation
/// calls are total and non-blocking in every state; while recording is
/// disabled they cost one atomic load.
///
/// The instance is `Sync`; share it behind an `Arc` and call the
/// instrumentation methods from any thread. Each calling thread lazily
/// gets its own ring recorder, registered with the instance exactly
/// once.
pub struct Profiler {
    instance_id: u64,
    enabled: AtomicBool,
    clock: Clock,
    names: NameTable,
    next_thread_id: AtomicU32,
    shared: Mutex<Shared>,
}

impl Profiler {
    pub fn new() -> Profiler {
        Profiler {
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            enabled: AtomicBool::new(false),
            clock: Clock::new(),
            names: NameTable::new(),
            next_thread_id: AtomicU32::new(1),
            shared: Mutex::new(Shared {
                lifecycle: Lifecycle::Unconfigured,
                ever_configured: false,
                config: Config::default(),
                recorders: Vec::new(),
            }),
        }
    }

    /// Applies `config` and (re)starts the logical time origin.
    ///
    /// This is the only transition into the configured state. Calling it
    /// again re-applies the epoch and enabled flag (a caller-visible
    /// reset of exported timestamps) but never resizes recorders that
    /// already exist.
    ///
    /// A zero `per_thread_capacity` is rejected; recording stays
    /// disabled and the error is returned rather than being fatal.
    pub fn configure(&self, config: Config) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut shared = self.shared.lock();
        if shared.lifecycle == Lifecycle::ShutDown {
            return Err("profiler has been shut down".into());
        }
        if config.per_thread_capacity == 0 {
            self.enabled.store(false, Ordering::Relaxed);
            return Err("per_thread_capacity must be non-zero".into());
        }
        if config.enable_native_signpost_integration {
            debug!("native signpost integration requested but no platform backend is compiled in");
        }

        self.clock.reset_epoch();
        self.enabled.store(config.enabled, Ordering::Relaxed);
        shared.config = config;
        shared.lifecycle = Lifecycle::Configured;
        shared.ever_configured = true;
        Ok(())
    }

    /// Flips the live recording switch without touching configuration or
    /// epoch. Ignored unless the profiler is configured.
    pub fn enable(&self, on: bool) {
        let shared = self.shared.lock();
        match shared.lifecycle {
            Lifecycle::Configured => self.enabled.store(on, Ordering::Relaxed),
            Lifecycle::Unconfigured => warn!("enable({}) ignored: profiler is not configured", on),
            Lifecycle::ShutDown => warn!("enable({}) ignored: profiler has been shut down", on),
        }
    }

    /// Whether instrumentation calls currently record anything. This
    /// load is the entire cost of an instrumentation call while
    /// recording is disabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Nanoseconds since the most recent [`Profiler::configure`] call.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Returns the stable id for `name`, interning it on first use.
    ///
    /// The calling thread's cache makes repeat calls lock-free; only the
    /// first resolution of a name on a given thread takes the table
    /// lock.
    pub fn intern(&self, name: &str) -> NameId {
        let state = self.thread_state();
        if let Some(&id) = state.name_cache.borrow().get(name) {
            return id;
        }
        let id = self.names.intern(name);
        state
            .name_cache
            .borrow_mut()
            .insert(name.to_owned(), id);
        id
    }

    #[inline]
    pub fn begin(&self, name: NameId) {
        if !self.is_enabled() {
            return;
        }
        self.record(name, EventKind::Begin, 0);
    }

    #[inline]
    pub fn end(&self, name: NameId) {
        if !self.is_enabled() {
            return;
        }
        self.record(name, EventKind::End, 0);
    }

    #[inline]
    pub fn counter(&self, name: NameId, value: i64) {
        if !self.is_enabled() {
            return;
        }
        self.record(name, EventKind::Counter, value);
    }

    #[inline]
    pub fn mark(&self, name: NameId) {
        if !self.is_enabled() {
            return;
        }
        self.record(name, EventKind::Mark, 0);
    }

    /// Records a `Begin` event now and returns a guard that records the
    /// matching `End` when it goes out of scope, on every exit path.
    ///
    /// Regions may nest arbitrarily on one thread. Pairing discipline
    /// across names is the caller's responsibility; the recorder appends
    /// whatever sequence it is given.
    #[inline]
    pub fn start_region(&self, name: NameId) -> RegionGuard<'_> {
        self.begin(name);
        RegionGuard {
            profiler: self,
            name,
        }
    }

    /// Drains every registered recorder and writes the merged trace to
    /// the configured output path, truncating any existing file.
    ///
    /// The merged stream is time-ordered per thread, not globally
    /// sorted. Draining again with no new events produces a valid
    /// document with an empty event array.
    pub fn flush_all(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let (events, overflowed, path) = {
            let shared = self.shared.lock();
            if !shared.ever_configured {
                return Err("profiler has not been configured".into());
            }

            let mut events = Vec::new();
            let mut overflowed = 0usize;
            for recorder in &shared.recorders {
                if recorder.overflowed() {
                    overflowed += 1;
                }
                events.extend(recorder.drain());
            }
            (events, overflowed, shared.config.trace_output_path.clone())
        };

        if overflowed > 0 {
            warn!(
                "{} recorder(s) overflowed; oldest events were dropped",
                overflowed
            );
        }

        let names = self.names.snapshot();
        chrome_trace::export_to_path(&path, &events, &names)
    }

    /// Disables recording, flushes once, and marks the profiler shut
    /// down. Further instrumentation calls are cheap no-ops.
    ///
    /// Idempotent in the sense that a repeated call is safe; it runs the
    /// flush again and rewrites the trace file.
    pub fn shutdown(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.enabled.store(false, Ordering::Relaxed);
        let flush = {
            let mut shared = self.shared.lock();
            shared.lifecycle = Lifecycle::ShutDown;
            shared.ever_configured
        };
        if !flush {
            return Ok(());
        }
        self.flush_all()
    }

    #[inline]
    fn record(&self, name: NameId, kind: EventKind, value: i64) {
        let timestamp_ns = self.clock.now_ns();
        let state = self.thread_state();
        state.recorder.write(Event {
            timestamp_ns,
            value,
            thread_id: state.thread_id,
            name,
            kind,
        });
    }

    fn thread_state(&self) -> Rc<ThreadState> {
        THREAD_STATES.with(|states| {
            let mut states = states.borrow_mut();
            if let Some(state) = states.get(&self.instance_id) {
                return Rc::clone(state);
            }
            let state = Rc::new(self.new_thread_state());
            states.insert(self.instance_id, Rc::clone(&state));
            state
        })
    }

    fn new_thread_state(&self) -> ThreadState {
        let mut shared = self.shared.lock();
        let recorder = Arc::new(RingRecorder::new(shared.config.per_thread_capacity));
        shared.recorders.push(Arc::clone(&recorder));
        drop(shared);

        ThreadState {
            recorder,
            thread_id: self.next_thread_id.fetch_add(1, Ordering::Relaxed),
            name_cache: RefCell::new(FxHashMap::default()),
        }
    }
}

impl Default for Profiler {
    fn default() -> Profiler {
        Profiler::new()
    }
}

/// Records the `End` event matching the `Begin` recorded when the guard
/// was created by [`Profiler::start_region`].
#[must_use]
pub struct RegionGuard<'a> {
    profiler: &'a Profiler,
    name: NameId,
}

impl<'a> Drop for RegionGuard<'a> {
    #[inline]
    fn drop(&mut self) {
        self.profiler.end(self.name);
    }
}

// Make sure that `Profiler` can be used in a multithreaded context
fn _assert_bounds() {
    fn assert_bounds_inner<S: Sized + Send + Sync + 'static>(_: &S) {}
    assert_bounds_inner(&Profiler::new());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unconfigured_and_disabled() {
        let profiler = Profiler::new();
        assert!(!profiler.is_enabled());
        assert!(profiler.flush_all().is_err());
    }

    #[test]
    fn configure_applies_the_enabled_flag() {
        let profiler = Profiler::new();
        profiler
            .configure(Config {
                enabled: true,
                ..Config::default()
            })
            .unwrap();
        assert!(profiler.is_enabled());

        profiler.enable(false);
        assert!(!profiler.is_enabled());
        profiler.enable(true);
        assert!(profiler.is_enabled());
    }

    #[test]
    fn zero_capacity_is_rejected_and_leaves_recording_disabled() {
        let profiler = Profiler::new();
        let result = profiler.configure(Config {
            enabled: true,
            per_thread_capacity: 0,
            ..Config::default()
        });
        assert!(result.is_err());
        assert!(!profiler.is_enabled());
    }

    #[test]
    fn enable_before_configure_is_ignored() {
        let profiler = Profiler::new();
        profiler.enable(true);
        assert!(!profiler.is_enabled());
    }

    #[test]
    fn instrumentation_is_a_noop_while_disabled() {
        let profiler = Profiler::new();
        let id = profiler.intern("never-recorded");
        profiler.begin(id);
        profiler.counter(id, 7);
        profiler.end(id);
        {
            let _region = profiler.start_region(id);
        }
        // The name was interned, but nothing was recorded.
        assert_eq!(profiler.names().len(), 1);
        let shared = profiler.shared.lock();
        assert!(shared.recorders.iter().all(|r| r.unread() == 0));
    }

    #[test]
    fn configure_after_shutdown_is_rejected() {
        let profiler = Profiler::new();
        profiler.shutdown().unwrap();
        assert!(profiler.configure(Config::default()).is_err());
        profiler.enable(true);
        assert!(!profiler.is_enabled());
    }

    #[test]
    fn shutdown_before_configure_is_safe() {
        let profiler = Profiler::new();
        profiler.shutdown().unwrap();
        profiler.shutdown().unwrap();
    }

    #[test]
    fn thread_ids_are_distinct_per_thread() {
        let profiler = Arc::new(Profiler::new());
        profiler
            .configure(Config {
                enabled: true,
                per_thread_capacity: 16,
                trace_output_path: PathBuf::from("test-tmp/unused.json"),
                enable_native_signpost_integration: false,
            })
            .unwrap();

        let id = profiler.intern("work");
        profiler.mark(id);
        let other = {
            let profiler = Arc::clone(&profiler);
            std::thread::spawn(move || {
                let id = profiler.intern("work");
                profiler.mark(id);
            })
        };
        other.join().unwrap();

        let shared = profiler.shared.lock();
        assert_eq!(shared.recorders.len(), 2);
        let mut tids: Vec<u32> = shared
            .recorders
            .iter()
            .flat_map(|r| r.drain())
            .map(|e| e.thread_id)
            .collect();
        tids.sort_unstable();
        tids.dedup();
        assert_eq!(tids.len(), 2);
    }
}
