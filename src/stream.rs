/*! Streams connecting blocks.

Blocks are connected with streams. A block can have zero or more input
streams, and write to zero or more output streams.
*/
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::circular_buffer;
use crate::{Error, Float, Len, Result};

/// Tag position in the current stream.
pub type TagPos = usize;

/// Enum of tag values.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub enum TagValue {
    /// String value.
    String(String),

    /// Float value.
    Float(Float),

    /// Bool value.
    Bool(bool),

    /// U64 value.
    U64(u64),

    /// I64 value.
    I64(i64),
}

impl std::fmt::Display for TagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            TagValue::String(s) => write!(f, "String:{s}"),
            TagValue::Float(s) => write!(f, "Float:{s}"),
            TagValue::Bool(s) => write!(f, "Bool:{s}"),
            TagValue::U64(s) => write!(f, "U64:{s}"),
            TagValue::I64(s) => write!(f, "I64:{s}"),
        }
    }
}

/// Tags associated with a stream.
#[derive(Debug, PartialEq, Clone, PartialOrd)]
pub struct Tag {
    pos: TagPos,
    key: String,
    val: TagValue,
}

impl Tag {
    /// Create new tag.
    #[must_use]
    pub fn new<T: Into<String>>(pos: TagPos, key: T, val: TagValue) -> Self {
        Self {
            pos,
            key: key.into(),
            val,
        }
    }

    /// Get pos.
    ///
    /// Relative to the current window.
    #[must_use]
    pub fn pos(&self) -> TagPos {
        self.pos
    }

    /// Set pos.
    ///
    /// Relative to the current window.
    pub fn set_pos(&mut self, pos: TagPos) {
        self.pos = pos;
    }

    /// Get tag key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get tag value.
    #[must_use]
    pub fn val(&self) -> &TagValue {
        &self.val
    }
}

/// Default stream size for sample (`Copy`) streams.
///
/// Chosen far smaller than a general-purpose SDR framework would use: M17
/// frames and their baseband representation are both bounded and small (46
/// bytes / 1920 samples per frame), so there is no benefit to the large
/// multi-megabyte buffers a wideband IQ pipeline needs.
pub(crate) const DEFAULT_STREAM_SIZE: usize = 65_536;

const DEFAULT_NOCOPY_CAPACITY: usize = 256;

/// Sanity ceiling for how many outstanding `Arc` handles a single stream
/// buffer should ever have (source block, sink block, any retained `.out()`
/// clones, and transient BufferReader/BufferWriter borrows). Past this, a
/// graph is leaking stream handles rather than just fanning one out.
const MAX_SANE_REFCOUNT: usize = 8;

/// Wait on a stream.
///
/// For ReadStream, wait until there's enough to read.
/// For WriteStream, wait until there's enough to write something.
pub trait StreamWait {
    /// ID shared between read and write side.
    #[must_use]
    fn id(&self) -> usize;

    /// Wait for "a while" or until `need` samples are available/space available.
    ///
    /// Return true if `need` will *never* be satisfied, and blocks waiting for
    /// it should just go ahead and EOF.
    #[must_use]
    fn wait(&self, need: usize) -> bool;

    /// Return true if the other end of this stream is disconnected.
    #[must_use]
    fn closed(&self) -> bool;
}

impl<T: Copy + Default> StreamWait for ReadStream<T> {
    fn id(&self) -> usize {
        self.circ.id()
    }
    fn wait(&self, need: usize) -> bool {
        self.wait_for_read(need)
    }
    fn closed(&self) -> bool {
        self.refcount() == 1
    }
}

impl<T: Copy + Default> StreamWait for WriteStream<T> {
    fn id(&self) -> usize {
        self.circ.id()
    }
    fn wait(&self, need: usize) -> bool {
        self.wait_for_write(need)
    }
    fn closed(&self) -> bool {
        self.refcount() == 1
    }
}

/// ReadStream is the reading side of a stream.
///
/// From the ReadStream you can get windows into the current stream by calling
/// `read_buf()`.
#[derive(Debug)]
pub struct ReadStream<T> {
    circ: Arc<circular_buffer::Buffer<T>>,
}

impl<T: Copy + Default> ReadStream<T> {
    /// Create a new stream with initial data in it.
    #[cfg(test)]
    #[must_use]
    pub fn from_slice(data: &[T]) -> Self {
        let circ = Arc::new(circular_buffer::Buffer::new(DEFAULT_STREAM_SIZE.max(data.len())).unwrap());
        let mut wb = circ.clone().write_buf().unwrap();
        wb.fill_from_slice(data);
        wb.produce(data.len(), &[]);
        Self { circ }
    }

    /// Return total length of underlying circular buffer.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.circ.total_size()
    }

    /// Return a BufferReader allowing you to read from the stream, and
    /// "consume" from it.
    ///
    /// See [`WriteStream::write_buf`] for details about the refcount checks.
    pub fn read_buf(&self) -> Result<(circular_buffer::BufferReader<T>, Vec<Tag>)> {
        let refcount = Arc::strong_count(&self.circ);
        debug_assert!(
            refcount < MAX_SANE_REFCOUNT,
            "read_buf() called with refcount {refcount}"
        );
        if refcount >= MAX_SANE_REFCOUNT {
            return Err(Error::Graph(format!(
                "read_buf() called with refcount {refcount}"
            )));
        }
        Arc::clone(&self.circ).read_buf()
    }

    /// Return true if the needed number of samples will *never* arrive.
    #[must_use]
    pub fn wait_for_read(&self, need: usize) -> bool {
        self.circ.wait_for_read(need) < need && Arc::strong_count(&self.circ) == 1
    }
}

impl<T> ReadStream<T> {
    /// Return true if there is nothing more ever to read from the stream.
    #[must_use]
    pub fn eof(&self) -> bool
    where
        T: Copy + Default,
    {
        // Fast path.
        let refcount = Arc::strong_count(&self.circ);
        if refcount != 1 {
            return false;
        }
        // Refcount 1 means that the WriteStream has closed. No more data is
        // coming, so as long as the buffer is empty, that's it.
        self.circ.is_empty()
    }

    #[must_use]
    pub(crate) fn refcount(&self) -> usize {
        Arc::strong_count(&self.circ)
    }
}

impl<T> Clone for ReadStream<T> {
    fn clone(&self) -> Self {
        Self {
            circ: self.circ.clone(),
        }
    }
}

/// The write part of a stream.
#[derive(Debug)]
pub struct WriteStream<T> {
    circ: Arc<circular_buffer::Buffer<T>>,
}

impl<T: Copy + Default> WriteStream<T> {
    /// Create new stream pair.
    #[must_use]
    pub fn new() -> (WriteStream<T>, ReadStream<T>) {
        new_stream()
    }

    /// Return free space in the stream, in samples.
    #[must_use]
    pub fn free(&self) -> usize {
        self.circ.free()
    }

    /// Return a BufferWriter for writing to the stream.
    ///
    /// BufferWriters hold an Arc to the circ buffer, alongside whatever
    /// clones the source/destination blocks keep around to hand `.out()` to
    /// more than one place. A refcount growing without bound is still a
    /// coding bug in how blocks were wired together, so this is sanity
    /// checked against a generous ceiling rather than the bare minimum.
    pub fn write_buf(&self) -> Result<circular_buffer::BufferWriter<T>> {
        let refcount = Arc::strong_count(&self.circ);
        debug_assert!(
            refcount < MAX_SANE_REFCOUNT,
            "write_buf() called with refcount {refcount}"
        );
        if refcount >= MAX_SANE_REFCOUNT {
            return Err(Error::Graph(format!(
                "write_buf() called with refcount {refcount}"
            )));
        }
        Arc::clone(&self.circ).write_buf()
    }

    #[must_use]
    pub fn wait_for_write(&self, need: usize) -> bool {
        self.circ.wait_for_write(need) < need && Arc::strong_count(&self.circ) == 1
    }

    #[must_use]
    pub(crate) fn refcount(&self) -> usize {
        Arc::strong_count(&self.circ)
    }
}

impl<T> Clone for WriteStream<T> {
    fn clone(&self) -> Self {
        Self {
            circ: self.circ.clone(),
        }
    }
}

impl<T> StreamReadSide for WriteStream<T> {
    type ReadSide = ReadStream<T>;
}

/// Create a new stream for data elements that implement Copy.
///
/// That's not to say that a bunch of Copy happens, but that it makes sense to
/// create sync blocks that take samples by value: baseband samples (`i16`)
/// and raw bits/symbols (`u8`).
#[must_use]
pub fn new_stream<T: Copy + Default>() -> (WriteStream<T>, ReadStream<T>) {
    let circ = Arc::new(circular_buffer::Buffer::new(DEFAULT_STREAM_SIZE).unwrap());
    (WriteStream { circ: circ.clone() }, ReadStream { circ })
}

struct NCEntry<T> {
    val: T,
    tags: Vec<Tag>,
}

struct NCInner<T> {
    lock: Mutex<VecDeque<NCEntry<T>>>,
    cv: Condvar,
    capacity: usize,
}

/// A stream of noncopyable objects, e.g. assembled `Vec<u8>` frames.
pub struct NCReadStream<T> {
    id: usize,
    inner: Arc<NCInner<T>>,
}

impl<T> Clone for NCReadStream<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync> StreamWait for NCReadStream<T> {
    fn id(&self) -> usize {
        self.id
    }
    fn wait(&self, need: usize) -> bool {
        let l = self
            .inner
            .cv
            .wait_timeout_while(
                self.inner.lock.lock().unwrap(),
                std::time::Duration::from_millis(100),
                |s| s.len() < need,
            )
            .unwrap();
        l.0.len() < need && Arc::strong_count(&self.inner) == 1
    }
    fn closed(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

impl<T: Send + Sync> StreamWait for NCWriteStream<T> {
    fn id(&self) -> usize {
        self.id
    }
    fn wait(&self, _need: usize) -> bool {
        self.closed()
    }
    fn closed(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }
}

/// A stream of noncopyable objects, e.g. assembled `Vec<u8>` frames.
pub struct NCWriteStream<T> {
    id: usize,
    inner: Arc<NCInner<T>>,
}

impl<T> Clone for NCWriteStream<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

/// Create a new stream for data elements that do not implement Copy.
///
/// This is where whole M17 frames (`Vec<u8>`) travel between the framing
/// blocks and the modulator/demodulator.
#[must_use]
pub fn new_nocopy_stream<T>() -> (NCWriteStream<T>, NCReadStream<T>) {
    let inner = Arc::new(NCInner {
        lock: Mutex::new(VecDeque::new()),
        cv: Condvar::new(),
        capacity: DEFAULT_NOCOPY_CAPACITY,
    });
    let id = crate::NEXT_STREAM_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    (
        NCWriteStream {
            id,
            inner: inner.clone(),
        },
        NCReadStream { id, inner },
    )
}

impl<T> NCReadStream<T> {
    /// Pop one sample.
    #[must_use]
    pub fn pop(&self) -> Option<(T, Vec<Tag>)> {
        let ret = self
            .inner
            .lock
            .lock()
            .unwrap()
            .pop_front()
            .map(|v| (v.val, v.tags));
        self.inner.cv.notify_all();
        ret
    }

    /// Return true if there is nothing more ever to read from the stream.
    #[must_use]
    pub fn eof(&self) -> bool {
        if !self.inner.lock.lock().unwrap().is_empty() {
            false
        } else {
            Arc::strong_count(&self.inner) == 1
        }
    }

    /// Return true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock.lock().unwrap().is_empty()
    }
}

/// Trait that helps finding the read side type of a write stream.
pub trait StreamReadSide {
    /// The matching read-side stream type.
    type ReadSide;
}

impl<T> StreamReadSide for NCWriteStream<T> {
    type ReadSide = NCReadStream<T>;
}

impl<T> Default for NCWriteStream<T> {
    fn default() -> Self {
        new_nocopy_stream().0
    }
}

impl<T> NCWriteStream<T> {
    /// Create a new stream pair.
    #[must_use]
    pub fn new() -> (NCWriteStream<T>, NCReadStream<T>) {
        new_nocopy_stream()
    }

    /// Push one sample, handing off ownership.
    ///
    /// This function doesn't enforce capacity. If there's a risk of
    /// overflowing, check `remaining()` before pushing.
    pub fn push<Tags: Into<Vec<Tag>>>(&self, val: T, tags: Tags) {
        self.inner.lock.lock().unwrap().push_back(NCEntry {
            val,
            tags: tags.into(),
        });
        self.inner.cv.notify_all();
    }

    /// Remaining capacity.
    #[must_use]
    pub fn remaining(&self) -> usize {
        let has = self.inner.lock.lock().unwrap().len();
        self.inner.capacity.saturating_sub(has)
    }
}

impl<T: Len> NCReadStream<T> {
    /// Get the size of the front packet.
    #[must_use]
    pub fn peek_size(&self) -> Option<usize> {
        self.inner.lock.lock().unwrap().front().map(|e| e.val.len())
    }
}
