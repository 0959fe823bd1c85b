//! Circular sample buffers shared between the write and read side of a stream.
//!
//! Samples are held in a `VecDeque` behind a `Mutex`+`Condvar`, rather than
//! double-mapping a tempfile with `mmap()` to get a contiguous wraparound
//! view: the frame sizes here are small and fixed, so the extra complexity
//! of a mapped ring buffer buys nothing. The
//! public shape (`Buffer`, `BufferReader`, `BufferWriter`, `produce`,
//! `consume`, `read_buf`, `write_buf`, `wait_for_read`, `wait_for_write`,
//! `total_size`, `free`, `id`) matches what `stream.rs` expects, so blocks
//! written against that API don't need to know which implementation backs it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::stream::Tag;
use crate::{Error, Result};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Largest chunk of fresh space handed out by a single `write_buf()` call.
///
/// Keeping this bounded means a block that never drains its output doesn't
/// make `write_buf()` allocate unboundedly large scratch vectors.
const MAX_WRITE_CHUNK: usize = 65_536;

struct Inner<T> {
    data: VecDeque<T>,
    tags: Vec<Tag>,
}

/// Type-aware circular buffer, shared by a [`crate::stream::WriteStream`] and
/// its matching [`crate::stream::ReadStream`].
pub struct Buffer<T> {
    id: usize,
    capacity: usize,
    state: Mutex<Inner<T>>,
    cv: Condvar,
}

impl<T: Copy + Default> Buffer<T> {
    /// Create a new buffer with room for `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            state: Mutex::new(Inner {
                data: VecDeque::with_capacity(capacity.min(MAX_WRITE_CHUNK)),
                tags: Vec::new(),
            }),
            cv: Condvar::new(),
        })
    }

    /// Stream id, shared between the read and write side.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Total configured capacity, in samples.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.capacity
    }

    /// Free space, in samples.
    #[must_use]
    pub fn free(&self) -> usize {
        let inner = self.state.lock().expect("circular buffer lock poisoned");
        self.capacity.saturating_sub(inner.data.len())
    }

    /// True if there is currently nothing to read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state
            .lock()
            .expect("circular buffer lock poisoned")
            .data
            .is_empty()
    }

    /// Block (up to 100ms) until `need` samples are available to read, or it
    /// becomes clear that will never happen. Returns the number available.
    #[must_use]
    pub fn wait_for_read(&self, need: usize) -> usize {
        let inner = self.state.lock().expect("circular buffer lock poisoned");
        let inner = self
            .cv
            .wait_timeout_while(inner, std::time::Duration::from_millis(100), |s| {
                s.data.len() < need
            })
            .expect("circular buffer lock poisoned");
        inner.0.data.len()
    }

    /// Block (up to 100ms) until `need` samples of free space are available.
    #[must_use]
    pub fn wait_for_write(&self, need: usize) -> usize {
        let inner = self.state.lock().expect("circular buffer lock poisoned");
        let inner = self
            .cv
            .wait_timeout_while(inner, std::time::Duration::from_millis(100), |s| {
                self.capacity.saturating_sub(s.data.len()) < need
            })
            .expect("circular buffer lock poisoned");
        self.capacity.saturating_sub(inner.0.data.len())
    }

    /// Borrow a read window and any tags accumulated since the last read.
    pub fn read_buf(self: Arc<Self>) -> Result<(BufferReader<T>, Vec<Tag>)> {
        let tags = {
            let mut inner = self
                .state
                .lock()
                .map_err(|e| Error::msg(format!("circular buffer lock poisoned: {e}")))?;
            std::mem::take(&mut inner.tags)
        };
        let data = {
            let inner = self
                .state
                .lock()
                .map_err(|e| Error::msg(format!("circular buffer lock poisoned: {e}")))?;
            inner.data.iter().copied().collect::<Vec<T>>()
        };
        Ok((BufferReader { buf: self, data }, tags))
    }

    /// Borrow a scratch write window sized to available free space.
    pub fn write_buf(self: Arc<Self>) -> Result<BufferWriter<T>> {
        let free = self.free().min(MAX_WRITE_CHUNK.max(1));
        Ok(BufferWriter {
            buf: self,
            data: vec![T::default(); free],
        })
    }
}

/// A borrowed, read-only window into a [`Buffer`].
pub struct BufferReader<T> {
    buf: Arc<Buffer<T>>,
    data: Vec<T>,
}

impl<T: Copy> BufferReader<T> {
    /// Number of samples available in this window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the available samples.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Borrow the available samples as a slice.
    #[must_use]
    pub fn slice(&self) -> &[T] {
        &self.data
    }

    /// Mark `n` samples as consumed, freeing their space for new writes.
    pub fn consume(&self, n: usize) {
        assert!(n <= self.data.len(), "consumed more than was read");
        let mut inner = self.buf.state.lock().expect("circular buffer lock poisoned");
        for _ in 0..n {
            inner.data.pop_front();
        }
        drop(inner);
        self.buf.cv.notify_all();
    }
}

/// A borrowed, writable scratch window for a [`Buffer`].
pub struct BufferWriter<T> {
    buf: Arc<Buffer<T>>,
    data: Vec<T>,
}

impl<T: Copy> BufferWriter<T> {
    /// Number of samples this window can hold.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the window has no capacity.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the scratch window as a mutable slice.
    pub fn slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Fill the window from a slice (test helper).
    #[cfg(test)]
    pub fn fill_from_slice(&mut self, src: &[T]) {
        self.data[..src.len()].copy_from_slice(src);
    }

    /// Commit the first `n` written samples to the buffer, with tags.
    pub fn produce(&self, n: usize, tags: &[Tag]) {
        assert!(n <= self.data.len(), "produced more than was allocated");
        let mut inner = self.buf.state.lock().expect("circular buffer lock poisoned");
        inner.data.extend(self.data[..n].iter().copied());
        inner.tags.extend(tags.iter().cloned());
        drop(inner);
        self.buf.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produce_consume_roundtrip() {
        let buf: Arc<Buffer<u8>> = Arc::new(Buffer::new(1024).unwrap());
        assert!(buf.is_empty());
        {
            let mut w = buf.clone().write_buf().unwrap();
            w.slice()[0] = 42;
            w.produce(1, &[]);
        }
        assert!(!buf.is_empty());
        {
            let (r, _tags) = buf.clone().read_buf().unwrap();
            assert_eq!(r.len(), 1);
            assert_eq!(r.slice()[0], 42);
            r.consume(1);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn free_tracks_capacity() {
        let buf: Arc<Buffer<u8>> = Arc::new(Buffer::new(10).unwrap());
        assert_eq!(buf.free(), 10);
        {
            let mut w = buf.clone().write_buf().unwrap();
            w.slice()[0] = 1;
            w.produce(1, &[]);
        }
        assert_eq!(buf.free(), 9);
    }
}
