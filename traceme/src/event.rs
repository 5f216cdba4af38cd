use crate::interner::NameId;

/// What kind of occurrence an [`Event`] records.
///
/// This is a closed set; the serializer maps each variant to its
/// one-character Chrome trace phase code.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum EventKind {
    Begin = 0,
    End = 1,
    Counter = 2,
    Mark = 3,
}

/// One recorded occurrence.
///
/// Events are created by the instrumentation calls and never mutated
/// afterwards; a ring buffer slot owns its event until the slot is
/// overwritten. `value` carries the payload of `Counter` events and is
/// zero for every other kind.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[repr(C)]
pub struct Event {
    pub timestamp_ns: u64,
    pub value: i64,
    pub thread_id: u32,
    pub name: NameId,
    pub kind: EventKind,
}

impl Event {
    #[inline]
    pub fn begin(timestamp_ns: u64, thread_id: u32, name: NameId) -> Event {
        Event {
            timestamp_ns,
            value: 0,
            thread_id,
            name,
            kind: EventKind::Begin,
        }
    }

    #[inline]
    pub fn end(timestamp_ns: u64, thread_id: u32, name: NameId) -> Event {
        Event {
            timestamp_ns,
            value: 0,
            thread_id,
            name,
            kind: EventKind::End,
        }
    }

    #[inline]
    pub fn counter(timestamp_ns: u64, thread_id: u32, name: NameId, value: i64) -> Event {
        Event {
            timestamp_ns,
            value,
            thread_id,
            name,
            kind: EventKind::Counter,
        }
    }

    #[inline]
    pub fn mark(timestamp_ns: u64, thread_id: u32, name: NameId) -> Event {
        Event {
            timestamp_ns,
            value: 0,
            thread_id,
            name,
            kind: EventKind::Mark,
        }
    }
}

impl Default for Event {
    fn default() -> Event {
        Event {
            timestamp_ns: 0,
            value: 0,
            thread_id: 0,
            name: NameId::from_u32(0),
            kind: EventKind::Mark,
        }
    }
}
