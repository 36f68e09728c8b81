//! Reusable diagnostic buffers for file traversals.

use std::sync::{Mutex, PoisonError};

use crate::rule::Diagnostic;

/// Buffers larger than this are dropped instead of pooled.
const MAX_RETAINED_CAPACITY: usize = 4096;

/// A pool of scratch buffers shared by concurrent walks.
///
/// Buffers are cleared on acquire, so a buffer returned with stale contents
/// can never leak diagnostics into another file's results.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<Diagnostic>>>,
    max_idle: usize,
}

impl BufferPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
        }
    }

    /// Take an empty buffer from the pool, or allocate one.
    pub fn acquire(&self) -> Vec<Diagnostic> {
        let mut buffer = self
            .buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        buffer.clear();
        buffer
    }

    /// Return a buffer for reuse.
    pub fn release(&self, buffer: Vec<Diagnostic>) {
        if buffer.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < self.max_idle {
            buffers.push(buffer);
        }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(num_cpus::get().max(1) * 2)
    }
}
