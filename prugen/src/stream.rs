//! The byte-stream write path that fills the buffer ring in order.
//!
//! A [`StreamCursor`] tracks one writer's position: which ring buffer it is
//! in, the byte offset within it, and how many bytes that buffer still
//! takes. Each write copies at most up to the current buffer boundary, so
//! callers loop until their span is consumed. The cursor belongs to a
//! single writing thread for the life of the session; it holds indices, not
//! references, so it stays valid across control-plane calls.

use crate::pool::BufferPool;
use crate::session::{SessionState, SessionStatus};

/// Result of one stream write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamWrite {
    /// `n` bytes were consumed; possibly fewer than offered when the write
    /// landed on a buffer boundary.
    Written(usize),
    /// The cursor has wrapped back to the start of the ring and the
    /// session has already completed; no bytes were consumed and none will
    /// be. Distinct from `Written(0)`, which only ever reports an empty
    /// input span.
    EndOfSession,
}

/// Write position of one stream handle within the ring.
#[derive(Debug, Clone)]
pub struct StreamCursor {
    buffer: Option<usize>,
    pos: usize,
    remaining: usize,
}

impl StreamCursor {
    /// A cursor that binds to the first buffer on first use.
    pub fn new() -> Self {
        Self {
            buffer: None,
            pos: 0,
            remaining: 0,
        }
    }

    /// A cursor already bound to the start of the ring, as handed out by
    /// [`Session::start`](crate::Session::start).
    pub(crate) fn at_ring_start(pool: &BufferPool) -> Self {
        Self {
            buffer: Some(0),
            pos: 0,
            remaining: pool.buffer(0).len(),
        }
    }

    /// Ring buffer the cursor currently points at, if bound yet.
    pub fn buffer_index(&self) -> Option<usize> {
        self.buffer
    }

    /// Byte offset within the current buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Whether this cursor's position describes `pool`. A cursor left over
    /// from a ring that has since been reallocated does not, and must not
    /// be written through.
    pub(crate) fn describes(&self, pool: &BufferPool) -> bool {
        match self.buffer {
            None => true,
            Some(index) => {
                index < pool.len() && self.pos + self.remaining == pool.buffer(index).len()
            }
        }
    }
}

impl Default for StreamCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy as much of `bytes` as fits in the cursor's current buffer.
///
/// The caller has already established that the session is not faulted and
/// that a pool exists.
pub(crate) fn write(
    cursor: &mut StreamCursor,
    pool: &mut BufferPool,
    status: &SessionStatus,
    bytes: &[u8],
) -> StreamWrite {
    if bytes.is_empty() {
        return StreamWrite::Written(0);
    }

    // A cursor mid-buffer keeps copying; the end-of-stream check only
    // applies on buffer boundaries.
    let index = if cursor.pos > 0 {
        // Bound, by construction.
        cursor.buffer.unwrap_or(0)
    } else {
        match cursor.buffer {
            None => {
                cursor.buffer = Some(0);
                cursor.remaining = pool.buffer(0).len();
                0
            }
            // Back at the ring start with the session already wound down:
            // the cycle is over, don't restart it.
            Some(0) if status.state() == SessionState::Initialized => {
                return StreamWrite::EndOfSession;
            }
            Some(i) => i,
        }
    };

    let count = cursor.remaining.min(bytes.len());
    pool.buffer_mut(index).write_at(cursor.pos, &bytes[..count]);
    cursor.pos += count;
    cursor.remaining -= count;

    if cursor.remaining == 0 {
        let next = pool.next_index(index);
        cursor.buffer = Some(next);
        cursor.pos = 0;
        cursor.remaining = pool.buffer(next).len();
        status.note_buffer_entered(next as u32);
    }

    StreamWrite::Written(count)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::dma::fake;
    use crate::pool::BufferPool;
    use crate::session::SessionState;

    fn running_status() -> SessionStatus {
        let status = SessionStatus::new();
        status.set_state(SessionState::Running);
        status
    }

    #[test]
    fn fills_buffers_in_ring_order() {
        let mut dma = fake::Allocator::new();
        let mut pool = BufferPool::allocate(&mut dma, 128 + 64, 128, 16).unwrap();
        let status = running_status();
        let mut cursor = StreamCursor::new();

        let data = [0xABu8; 200];
        // First call stops at the end of buffer 0.
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data),
            StreamWrite::Written(128)
        );
        assert_eq!(cursor.buffer_index(), Some(1));
        // The next call caps at buffer 1's boundary even though 72 bytes
        // are on offer, and the cursor wraps to the ring start.
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data[128..]),
            StreamWrite::Written(64)
        );
        assert_eq!(cursor.buffer_index(), Some(0));
        assert_eq!(cursor.offset(), 0);
        // The last 8 bytes land at the start of buffer 0.
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data[192..]),
            StreamWrite::Written(8)
        );
        assert_eq!(cursor.offset(), 8);

        assert!(pool.buffer(0).as_slice().iter().all(|&b| b == 0xAB));
        assert!(pool.buffer(1).as_slice().iter().all(|&b| b == 0xAB));
        pool.free(&mut dma);
    }

    #[test]
    fn empty_span_writes_zero_bytes() {
        let mut dma = fake::Allocator::new();
        let mut pool = BufferPool::allocate(&mut dma, 64, 64, 16).unwrap();
        let status = running_status();
        let mut cursor = StreamCursor::new();
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &[]),
            StreamWrite::Written(0)
        );
        // The empty write did not bind the cursor.
        assert_eq!(cursor.buffer_index(), None);
        pool.free(&mut dma);
    }

    #[test]
    fn wrap_after_completion_reports_end_of_session() {
        let mut dma = fake::Allocator::new();
        let mut pool = BufferPool::allocate(&mut dma, 2 * 64, 64, 16).unwrap();
        let status = running_status();
        let mut cursor = StreamCursor::new();

        let data = [7u8; 64];
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data),
            StreamWrite::Written(64)
        );
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data),
            StreamWrite::Written(64)
        );
        // Cursor has wrapped to buffer 0. While still running, writes keep
        // cycling.
        assert_eq!(cursor.buffer_index(), Some(0));
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data[..8]),
            StreamWrite::Written(8)
        );

        // Wind back to the ring start and complete the session: further
        // writes report end-of-session instead of restarting the cycle.
        let mut cursor = StreamCursor::at_ring_start(&pool);
        status.set_state(SessionState::Initialized);
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &data),
            StreamWrite::EndOfSession
        );
        pool.free(&mut dma);
    }

    #[test]
    fn mid_buffer_write_continues_after_completion() {
        // A writer caught mid-buffer finishes that buffer even if the
        // completion signal has already landed, as in the original driver.
        let mut dma = fake::Allocator::new();
        let mut pool = BufferPool::allocate(&mut dma, 2 * 64, 64, 16).unwrap();
        let status = running_status();
        let mut cursor = StreamCursor::new();

        assert_eq!(
            write(&mut cursor, &mut pool, &status, &[1u8; 10]),
            StreamWrite::Written(10)
        );
        status.set_state(SessionState::Initialized);
        assert_eq!(
            write(&mut cursor, &mut pool, &status, &[1u8; 10]),
            StreamWrite::Written(10)
        );
        pool.free(&mut dma);
    }

    #[test]
    fn advancing_updates_the_shared_buffer_index() {
        let mut dma = fake::Allocator::new();
        let mut pool = BufferPool::allocate(&mut dma, 3 * 64, 64, 16).unwrap();
        let status = running_status();
        let mut cursor = StreamCursor::at_ring_start(&pool);

        write(&mut cursor, &mut pool, &status, &[0u8; 64]);
        assert_eq!(status.debug_code(), 1);
        write(&mut cursor, &mut pool, &status, &[0u8; 64]);
        assert_eq!(status.debug_code(), 2);
        pool.free(&mut dma);
    }
}
