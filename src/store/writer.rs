use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Process-local single-writer gate shared by every handle opened through
/// [`super::CategoryStore::reopen`].
///
/// The gate is taken before SQLite's `BEGIN IMMEDIATE`, so writers in one
/// process queue here instead of spinning on `SQLITE_BUSY`.
#[derive(Clone, Default)]
pub struct WriterGate {
    inner: Arc<Mutex<()>>,
}

/// Guard representing the held writer slot.
pub struct WriterGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl WriterGate {
    /// Creates an unshared gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the writer slot is free.
    pub fn acquire(&self) -> WriterGuard<'_> {
        WriterGuard {
            _guard: self.inner.lock(),
        }
    }

    /// Takes the writer slot if nobody holds it.
    pub fn try_acquire(&self) -> Option<WriterGuard<'_>> {
        self.inner
            .try_lock()
            .map(|guard| WriterGuard { _guard: guard })
    }

    /// Whether a writer currently holds the gate.
    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }

    /// Number of handles sharing this gate.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for WriterGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterGate")
            .field("held", &self.is_held())
            .field("handles", &self.handles())
            .finish()
    }
}
