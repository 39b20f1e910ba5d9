//! Reusable scratch buffers for building schema URLs.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Buffers retained when idle; extra buffers are dropped on release.
const MAX_IDLE: usize = 64;

/// A pool of `String` buffers.
///
/// A buffer is borrowed for one rewrite and comes back empty when the
/// [`PooledBuffer`] guard drops.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<String>>,
    capacity: usize,
}

impl BufferPool {
    /// Create an empty pool whose fresh buffers start with `capacity` bytes.
    pub const fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Take a buffer from the pool, allocating one when none is idle.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| String::with_capacity(self.capacity));
        PooledBuffer { buf, pool: self }
    }

    /// Number of buffers waiting to be reused.
    pub fn idle(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, mut buf: String) {
        buf.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE {
            idle.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: String,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
