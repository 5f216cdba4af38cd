//! Event-name interning.
//!
//! Every event records a [`NameId`] instead of a string. The shared
//! [`NameTable`] assigns ids densely in first-seen order and never
//! removes or reuses one; the backing strings are an append-only log, so
//! an id handed out once stays valid for the life of the table. The
//! table lock is the slow path: each thread keeps an unsynchronized
//! cache of resolved names (see `profiler`), so per-event interning is
//! lock-free after the first use of a name on a thread.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Dense integer id of one interned name string.
///
/// The same name text always maps to the same `NameId` within one
/// [`NameTable`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
#[repr(transparent)]
pub struct NameId(u32);

impl NameId {
    #[inline]
    pub fn from_u32(id: u32) -> NameId {
        NameId(id)
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Append-only table mapping name text to [`NameId`] and back.
pub struct NameTable {
    inner: Mutex<Inner>,
}

struct Inner {
    // `names` is indexed by `NameId`; `index` maps content back to it.
    // Both hold the same `Arc<str>`, so each name is stored once.
    names: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, NameId>,
}

impl NameTable {
    pub fn new() -> NameTable {
        NameTable {
            inner: Mutex::new(Inner {
                names: Vec::new(),
                index: FxHashMap::default(),
            }),
        }
    }

    /// Returns the stable id for `name`, interning it on first use.
    /// Idempotent and total.
    pub fn intern(&self, name: &str) -> NameId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.index.get(name) {
            return id;
        }
        let id = NameId(inner.names.len() as u32);
        let text: Arc<str> = Arc::from(name);
        inner.names.push(Arc::clone(&text));
        inner.index.insert(text, id);
        id
    }

    /// All interned names so far, indexed by `NameId`.
    pub fn snapshot(&self) -> Vec<Arc<str>> {
        self.inner.lock().names.clone()
    }

    /// Number of distinct names interned so far.
    pub fn len(&self) -> usize {
        self.inner.lock().names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
