//! Bounded byte queue shared between one producer and one consumer.
//!
//! Writes are all-or-nothing: a span is either enqueued whole or not at all,
//! so one logical write is never split across two device transmits. Reads
//! hand out a contiguous run of already-buffered bytes as a [`RingChunk`];
//! the bytes stay in the queue (and keep counting against its capacity) until
//! the chunk is committed. Dropping a chunk without committing leaves the
//! bytes in place for the next pop. At most one chunk is out at a time, so
//! commits always remove bytes from the front of the queue.
//!
//! ```text
//!   head                     head+reserved           head+len
//!    │◄──── popped, uncommitted ───►│◄──── ready to pop ────►│◄── free ──►
//! ```

use crate::error::{Result, TransportError};
use bytes::Bytes;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

struct RingState {
    data: Box<[u8]>,
    /// Index of the oldest stored byte.
    head: usize,
    /// Stored bytes, including ones handed out but not committed.
    len: usize,
    /// Bytes at `head` currently handed out to the consumer.
    reserved: usize,
}

impl RingState {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn free(&self) -> usize {
        self.capacity() - self.len
    }

    fn ready(&self) -> usize {
        self.len - self.reserved
    }

    /// Copy `bytes` in after the stored data. Caller checks space.
    fn write(&mut self, bytes: &[u8]) {
        let cap = self.capacity();
        let tail = (self.head + self.len) % cap;
        let first = bytes.len().min(cap - tail);
        self.data[tail..tail + first].copy_from_slice(&bytes[..first]);
        self.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
        self.len += bytes.len();
    }
}

/// Fixed-capacity circular byte queue.
///
/// Safe for exactly one producer and one consumer operating concurrently.
///
/// # Examples
///
/// ```
/// use hostserial_transport::ByteRingBuffer;
///
/// let buffer = ByteRingBuffer::new(8).unwrap();
/// assert!(buffer.try_push(b"hello"));
/// assert!(!buffer.try_push(b"world")); // only 3 bytes free, nothing written
///
/// let chunk = buffer.try_pop_up_to(3).unwrap();
/// assert_eq!(&chunk[..], b"hel");
/// chunk.commit();
/// assert_eq!(buffer.len(), 2);
/// ```
pub struct ByteRingBuffer {
    state: Mutex<RingState>,
    /// Signalled when bytes are added.
    readable: Notify,
    /// Signalled when bytes are committed out.
    writable: Notify,
}

impl ByteRingBuffer {
    /// Allocate a queue holding up to `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Config` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TransportError::config("ring buffer capacity must be non-zero"));
        }

        Ok(Self {
            state: Mutex::new(RingState {
                data: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                len: 0,
                reserved: 0,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    /// Bytes ready to be popped.
    pub fn len(&self) -> usize {
        self.lock().ready()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Space left for new bytes. Popped-but-uncommitted bytes still occupy space.
    pub fn free(&self) -> usize {
        self.lock().free()
    }

    /// Enqueue all of `bytes` if they fit right now.
    pub fn try_push(&self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }

        {
            let mut state = self.lock();
            if state.free() < bytes.len() {
                return false;
            }
            state.write(bytes);
        }
        self.readable.notify_one();
        true
    }

    /// Enqueue all of `bytes`, waiting up to `timeout` for space.
    ///
    /// Returns `bytes.len()` on success and 0 otherwise; never a partial count.
    pub async fn push(&self, bytes: &[u8], timeout: Duration) -> usize {
        if bytes.is_empty() || bytes.len() > self.capacity() {
            return 0;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let writable = self.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            if self.try_push(bytes) {
                return bytes.len();
            }
            if tokio::time::timeout_at(deadline, writable).await.is_err() {
                return 0;
            }
        }
    }

    /// Enqueue as many leading bytes of `bytes` as fit without waiting.
    ///
    /// Returns how many were taken; the rest are the caller's to drop.
    pub fn push_available(&self, bytes: &[u8]) -> usize {
        let taken = {
            let mut state = self.lock();
            let taken = bytes.len().min(state.free());
            state.write(&bytes[..taken]);
            taken
        };
        if taken > 0 {
            self.readable.notify_one();
        }
        taken
    }

    /// Hand out up to `max_len` ready bytes without waiting.
    ///
    /// Returns `None` while an earlier chunk is still outstanding.
    pub fn try_pop_up_to(&self, max_len: usize) -> Option<RingChunk<'_>> {
        if max_len == 0 {
            return None;
        }

        let mut state = self.lock();
        let ready = state.ready();
        if ready == 0 || state.reserved > 0 {
            return None;
        }

        let cap = state.capacity();
        let start = state.head;
        let run = max_len.min(ready).min(cap - start);
        let data = Bytes::copy_from_slice(&state.data[start..start + run]);
        state.reserved += run;

        Some(RingChunk {
            buffer: self,
            data,
            committed: false,
        })
    }

    /// Wait up to `timeout` for at least one byte, then hand out a
    /// contiguous run of at most `max_len` bytes.
    ///
    /// Returns `None` immediately while an earlier chunk is still
    /// outstanding; only its holder can release it.
    pub async fn pop_up_to(&self, max_len: usize, timeout: Duration) -> Option<RingChunk<'_>> {
        if max_len == 0 || self.lock().reserved > 0 {
            return None;
        }

        let deadline = Instant::now() + timeout;
        loop {
            let readable = self.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            if let Some(chunk) = self.try_pop_up_to(max_len) {
                return Some(chunk);
            }
            if tokio::time::timeout_at(deadline, readable).await.is_err() {
                return None;
            }
        }
    }

    /// Drop every byte that has not been handed out. Consumer side only.
    ///
    /// Returns the number of bytes discarded.
    pub fn clear(&self) -> usize {
        let dropped = {
            let mut state = self.lock();
            let dropped = state.ready();
            state.len -= dropped;
            dropped
        };
        if dropped > 0 {
            self.writable.notify_one();
        }
        dropped
    }

    fn release(&self, len: usize, consumed: bool) {
        {
            let mut state = self.lock();
            state.reserved -= len;
            if consumed {
                state.head = (state.head + len) % state.capacity();
                state.len -= len;
            }
        }
        if consumed {
            self.writable.notify_one();
        } else {
            self.readable.notify_one();
        }
    }
}

impl std::fmt::Debug for ByteRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ByteRingBuffer")
            .field("capacity", &state.capacity())
            .field("len", &state.len)
            .field("reserved", &state.reserved)
            .finish()
    }
}

/// A run of bytes popped from a [`ByteRingBuffer`].
///
/// The bytes are removed from the queue only by [`commit`](Self::commit).
/// Dropping the chunk returns them, so the next pop sees them again. While a
/// chunk is alive its buffer hands out no other chunk.
#[must_use = "dropping a chunk without commit() leaves its bytes queued"]
pub struct RingChunk<'a> {
    buffer: &'a ByteRingBuffer,
    data: Bytes,
    committed: bool,
}

impl RingChunk<'_> {
    /// Acknowledge consumption and remove the bytes from the queue.
    pub fn commit(mut self) -> Bytes {
        self.committed = true;
        self.buffer.release(self.data.len(), true);
        std::mem::take(&mut self.data)
    }
}

impl std::ops::Deref for RingChunk<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for RingChunk<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.buffer.release(self.data.len(), false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(ByteRingBuffer::new(0).is_err());
    }

    #[test]
    fn test_push_is_all_or_nothing() {
        let buffer = ByteRingBuffer::new(4).unwrap();
        assert!(buffer.try_push(b"abc"));
        assert!(!buffer.try_push(b"de"));
        assert_eq!(buffer.len(), 3);
        assert!(buffer.try_push(b"d"));
        assert_eq!(buffer.free(), 0);
    }

    #[test]
    fn test_pop_returns_contiguous_run_at_wrap() {
        let buffer = ByteRingBuffer::new(4).unwrap();
        assert!(buffer.try_push(b"abc"));
        buffer.try_pop_up_to(2).unwrap().commit();
        assert!(buffer.try_push(b"def"));

        // Stored: c d | e f, with the wrap after d.
        let first = buffer.try_pop_up_to(10).unwrap();
        assert_eq!(&first[..], b"cd");
        first.commit();

        let second = buffer.try_pop_up_to(10).unwrap();
        assert_eq!(&second[..], b"ef");
        second.commit();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_uncommitted_chunk_keeps_bytes() {
        let buffer = ByteRingBuffer::new(8).unwrap();
        assert!(buffer.try_push(b"abcdef"));

        {
            let chunk = buffer.try_pop_up_to(4).unwrap();
            assert_eq!(&chunk[..], b"abcd");
            assert_eq!(buffer.len(), 2);
            // Handed-out bytes still occupy space.
            assert_eq!(buffer.free(), 2);
        }

        assert_eq!(buffer.len(), 6);
        let again = buffer.try_pop_up_to(8).unwrap();
        assert_eq!(&again[..], b"abcdef");
    }

    #[test]
    fn test_second_chunk_refused_while_first_is_out() {
        let buffer = ByteRingBuffer::new(8).unwrap();
        assert!(buffer.try_push(b"abcd"));

        let first = buffer.try_pop_up_to(2).unwrap();
        assert_eq!(&first[..], b"ab");
        assert!(buffer.try_pop_up_to(2).is_none());
        assert_eq!(buffer.len(), 2);

        // Returning the first chunk keeps the queue in order.
        drop(first);
        let all = buffer.try_pop_up_to(8).unwrap();
        assert_eq!(&all.commit()[..], b"abcd");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_pop_does_not_wait_on_own_chunk() {
        let buffer = ByteRingBuffer::new(8).unwrap();
        assert!(buffer.try_push(b"abcd"));

        let first = buffer.try_pop_up_to(2).unwrap();
        let started = tokio::time::Instant::now();
        assert!(buffer.pop_up_to(2, Duration::from_secs(5)).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));

        assert_eq!(&first.commit()[..], b"ab");
        let rest = buffer.pop_up_to(8, Duration::from_millis(5)).await.unwrap();
        assert_eq!(&rest.commit()[..], b"cd");
    }

    #[test]
    fn test_push_available_drops_tail() {
        let buffer = ByteRingBuffer::new(4).unwrap();
        assert_eq!(buffer.push_available(b"abcdef"), 4);
        assert_eq!(buffer.push_available(b"g"), 0);
        assert_eq!(&buffer.try_pop_up_to(4).unwrap().commit()[..], b"abcd");
    }

    #[test]
    fn test_clear_keeps_handed_out_bytes() {
        let buffer = ByteRingBuffer::new(8).unwrap();
        assert!(buffer.try_push(b"abcdef"));
        let chunk = buffer.try_pop_up_to(2).unwrap();
        assert_eq!(buffer.clear(), 4);
        assert_eq!(&chunk.commit()[..], b"ab");
        assert!(buffer.is_empty());
        assert_eq!(buffer.free(), 8);
    }

    #[tokio::test]
    async fn test_push_times_out_when_full() {
        let buffer = ByteRingBuffer::new(2).unwrap();
        assert_eq!(buffer.push(b"ab", Duration::from_millis(1)).await, 2);
        assert_eq!(buffer.push(b"c", Duration::from_millis(5)).await, 0);
        assert_eq!(buffer.push(b"abc", Duration::from_millis(5)).await, 0);
    }

    #[tokio::test]
    async fn test_push_waits_for_commit() {
        let buffer = std::sync::Arc::new(ByteRingBuffer::new(2).unwrap());
        assert!(buffer.try_push(b"ab"));

        let consumer = std::sync::Arc::clone(&buffer);
        let drain = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            consumer.try_pop_up_to(2).unwrap().commit();
        });

        assert_eq!(buffer.push(b"cd", Duration::from_secs(2)).await, 2);
        drain.await.unwrap();
    }

    #[tokio::test]
    async fn test_pop_waits_for_data() {
        let buffer = std::sync::Arc::new(ByteRingBuffer::new(16).unwrap());
        assert!(buffer.pop_up_to(4, Duration::from_millis(5)).await.is_none());

        let producer = std::sync::Arc::clone(&buffer);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            producer.try_push(b"xyz");
        });

        let chunk = buffer.pop_up_to(16, Duration::from_secs(2)).await.unwrap();
        assert_eq!(&chunk[..], b"xyz");
        chunk.commit();
    }
}
