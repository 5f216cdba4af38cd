//! Rendering drained events as a Chrome trace viewer document.
//!
//! The output is `{"traceEvents": [...]}` with the field names and
//! one-character phase codes the viewer expects; they are part of the
//! external interface and must not drift.

use log::debug;
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::event::{Event, EventKind};

/// Name rendered for an event whose `NameId` is missing from the table.
/// Interning never produces such an id, but the export must not fail on
/// one.
const UNKNOWN_NAME: &str = "unknown";

#[derive(Clone, Copy, Eq, PartialEq, Serialize)]
enum Phase {
    #[serde(rename = "B")]
    Begin,
    #[serde(rename = "E")]
    End,
    #[serde(rename = "C")]
    Counter,
    #[serde(rename = "I")]
    Instant,
}

impl From<EventKind> for Phase {
    fn from(kind: EventKind) -> Phase {
        match kind {
            EventKind::Begin => Phase::Begin,
            EventKind::End => Phase::End,
            EventKind::Counter => Phase::Counter,
            EventKind::Mark => Phase::Instant,
        }
    }
}

#[derive(Serialize)]
struct CounterArgs {
    value: i64,
}

#[derive(Serialize)]
struct TraceEvent<'a> {
    name: &'a str,
    #[serde(rename = "ph")]
    phase: Phase,
    #[serde(rename = "pid")]
    process_id: u32,
    #[serde(rename = "tid")]
    thread_id: u32,
    #[serde(rename = "ts")]
    timestamp_us: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<CounterArgs>,
}

#[derive(Serialize)]
struct TraceDocument<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<TraceEvent<'a>>,
}

/// Serializes `events` into `writer`, resolving names through `names`
/// (indexed by `NameId`).
pub(crate) fn write_trace<W: Write>(
    writer: W,
    events: &[Event],
    names: &[Arc<str>],
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let process_id = std::process::id();

    let trace_events = events
        .iter()
        .map(|event| TraceEvent {
            name: match names.get(event.name.as_usize()) {
                Some(name) => &**name,
                None => {
                    debug!(
                        "event references unknown name id {}; exporting placeholder",
                        event.name.as_u32()
                    );
                    UNKNOWN_NAME
                }
            },
            phase: Phase::from(event.kind),
            process_id,
            thread_id: event.thread_id,
            // Truncated, not rounded: whole microseconds is what the
            // viewer tooling expects.
            timestamp_us: (event.timestamp_ns / 1_000) as f64,
            args: match event.kind {
                EventKind::Counter => Some(CounterArgs { value: event.value }),
                _ => None,
            },
        })
        .collect();

    serde_json::to_writer(writer, &TraceDocument { trace_events })?;
    Ok(())
}

/// Writes the trace document to `path`, truncating any existing file.
pub(crate) fn export_to_path(
    path: &Path,
    events: &[Event],
    names: &[Arc<str>],
) -> Result<(), Box<dyn Error + Send + Sync>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_trace(&mut writer, events, names)?;
    writer.flush()?;
    Ok(())
}
