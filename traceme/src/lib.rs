mod chrome_trace;
mod clock;
mod event;
mod interner;
mod profiler;
mod recorder;

pub use crate::clock::Clock;
pub use crate::event::{Event, EventKind};
pub use crate::interner::{NameId, NameTable};
pub use crate::profiler::{Config, Profiler, RegionGuard};
pub use crate::recorder::RingRecorder;
