//! Transform buffer
//!
//! Fixed-capacity store holding one generation of upper-cased bytes:
//! - A write replaces the whole generation and wakes waiting readers
//! - A read consumes from the current generation and, in blocking mode,
//!   waits for a writer when nothing is left
//!
//! Cursor invariant: `0 <= read_cursor <= write_cursor <= capacity`.

use core::ffi::c_int;
use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;

use crate::error::{AllocationError, ReadError, WriteError};
use crate::idgen::Handle;
use crate::transform::upcase_in_place;
use crate::wait_queue::{WaitQueueArc, Wakeup};

/// `O_NONBLOCK` as found in Linux `fcntl.h`
pub const O_NONBLOCK: c_int = 0o4000;

/// Whether a read with nothing unread suspends or fails with `WouldBlock`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockingMode {
    #[default]
    Blocking,
    NonBlocking,
}

impl BlockingMode {
    /// Derive the mode from POSIX open flags
    #[must_use]
    pub fn from_flags(flags: c_int) -> Self {
        if flags & O_NONBLOCK != 0 {
            Self::NonBlocking
        } else {
            Self::Blocking
        }
    }

    #[must_use]
    pub fn is_blocking(self) -> bool {
        self == Self::Blocking
    }
}

/// Cursor state, guarded by one mutex so readers never see half a write
struct BufferState {
    storage: Vec<u8>,
    write_cursor: usize,
    read_cursor: usize,
    interrupt_pending: bool,
}

impl BufferState {
    fn unread(&self) -> usize {
        self.write_cursor - self.read_cursor
    }

    fn next_chunk(&self, max_len: usize) -> Range<usize> {
        let n = self.unread().min(max_len);
        self.read_cursor..self.read_cursor + n
    }

    /// Caller guarantees `data.len() <= storage.len()`
    fn replace_generation(&mut self, data: &[u8]) {
        #[allow(clippy::indexing_slicing)]
        let generation = &mut self.storage[..data.len()];
        generation.copy_from_slice(data);
        upcase_in_place(generation);
        self.write_cursor = data.len();
        self.read_cursor = 0;
    }
}

/// Action to take when a reader found nothing unread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitAction {
    /// Still nothing, suspend
    Wait,
    /// A writer got in between the checks
    DontWait,
    /// A pending interrupt was consumed
    Interrupted,
}

/// Single-slot transform buffer
///
/// # Thread Safety
///
/// One writer and one reader may use the same buffer from different
/// threads or tasks through `&TransformBuffer`. Cursor updates and the
/// wake-up are observed by readers as one transition. Concurrent writers
/// are not ordered against each other; the last one to take the lock wins.
///
/// No lock is held while a reader is suspended.
pub struct TransformBuffer {
    state: Mutex<BufferState>,
    capacity: usize,
    handle: Handle,
    queue: WaitQueueArc,
}

impl TransformBuffer {
    /// Allocate a buffer with its own private wait queue
    ///
    /// # Errors
    /// `ZeroCapacity` if `capacity == 0`, `OutOfMemory` if the storage
    /// cannot be reserved.
    pub fn allocate(capacity: usize) -> Result<Self, AllocationError> {
        Self::allocate_in(capacity, Handle::new(1), WaitQueueArc::new())
    }

    /// Allocate a buffer that sleeps on a shared wait queue under `handle`
    ///
    /// # Errors
    /// See [`TransformBuffer::allocate`].
    pub fn allocate_in(
        capacity: usize,
        handle: Handle,
        queue: WaitQueueArc,
    ) -> Result<Self, AllocationError> {
        if capacity == 0 {
            return Err(AllocationError::ZeroCapacity);
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|source| AllocationError::OutOfMemory { capacity, source })?;
        storage.resize(capacity, 0);

        queue.register(handle, &format!("upcase.buffer {handle}"));
        log::debug!("upcase.buffer {handle}: allocated {capacity} bytes");

        Ok(Self {
            state: Mutex::new(BufferState {
                storage,
                write_cursor: 0,
                read_cursor: 0,
                interrupt_pending: false,
            }),
            capacity,
            handle,
            queue,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Bytes of the current generation not yet consumed
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.lock().unread()
    }

    #[must_use]
    pub fn is_interrupt_pending(&self) -> bool {
        self.state.lock().interrupt_pending
    }

    /// Replace the current generation with the upper-cased `data`
    ///
    /// Always wakes waiting readers, even for an empty write. Returns
    /// `data.len()`.
    ///
    /// # Errors
    /// `TooLarge` if `data` does not fit; nothing is changed.
    pub fn write(&self, data: &[u8]) -> Result<usize, WriteError> {
        if data.len() > self.capacity {
            log::debug!(
                "upcase.buffer {}: rejected write of {} bytes (capacity {})",
                self.handle,
                data.len(),
                self.capacity
            );
            return Err(WriteError::TooLarge {
                len: data.len(),
                capacity: self.capacity,
            });
        }

        self.state.lock().replace_generation(data);

        // Notify outside the buffer lock
        self.queue.notify(self.handle, Wakeup::DataAvailable);
        Ok(data.len())
    }

    /// Copy `len` bytes from a caller-side source, then write them
    ///
    /// The size check happens before the source is touched.
    ///
    /// # Errors
    /// `TooLarge` as for `write`; `CopyFault` if the source fails or ends
    /// early. Either way the current generation is left intact.
    pub fn write_from<R>(&self, src: &mut R, len: usize) -> Result<usize, WriteError>
    where
        R: embedded_io::Read,
    {
        if len > self.capacity {
            return Err(WriteError::TooLarge {
                len,
                capacity: self.capacity,
            });
        }

        let mut staging = vec![0u8; len];
        src.read_exact(&mut staging).map_err(|e| {
            log::debug!("upcase.buffer {}: copy from source failed: {e:?}", self.handle);
            WriteError::CopyFault
        })?;

        self.write(&staging)
    }

    /// Read up to `max_len` transformed bytes
    ///
    /// A zero `max_len` returns an empty vector at once.
    ///
    /// # Errors
    /// `WouldBlock` in non-blocking mode with nothing unread,
    /// `Interrupted` if a blocking wait was interrupted.
    pub async fn read(&self, max_len: usize, mode: BlockingMode) -> Result<Vec<u8>, ReadError> {
        let mut out = Vec::new();
        self.read_with(max_len, mode, |chunk| {
            out.extend_from_slice(chunk);
            Ok(())
        })
        .await?;
        Ok(out)
    }

    /// Read into `buf`, POSIX-style: returns the number of bytes copied
    ///
    /// # Errors
    /// As for [`TransformBuffer::read`].
    pub async fn read_slice(&self, buf: &mut [u8], mode: BlockingMode) -> Result<usize, ReadError> {
        let max_len = buf.len();
        self.read_with(max_len, mode, |chunk| {
            #[allow(clippy::indexing_slicing)]
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(())
        })
        .await
    }

    /// Read up to `max_len` bytes into a caller-side sink
    ///
    /// # Errors
    /// As for [`TransformBuffer::read`], plus `CopyFault` if the sink
    /// fails. The read cursor only moves after the sink accepted
    /// everything.
    pub async fn read_into<W>(
        &self,
        dst: &mut W,
        max_len: usize,
        mode: BlockingMode,
    ) -> Result<usize, ReadError>
    where
        W: embedded_io::Write,
    {
        let handle = self.handle;
        self.read_with(max_len, mode, |chunk| {
            dst.write_all(chunk).map_err(|e| {
                log::debug!("upcase.buffer {handle}: copy to destination failed: {e:?}");
                ReadError::CopyFault
            })
        })
        .await
    }

    /// Deliver an external interrupt
    ///
    /// A blocked reader wakes up with `Interrupted`, unless a write got in
    /// first: then it returns the data and the interrupt is used up. With
    /// no reader blocked, the interrupt stays pending until the next read
    /// that would have to wait.
    pub fn interrupt(&self) {
        self.state.lock().interrupt_pending = true;

        let woken = self.queue.notify(self.handle, Wakeup::Interrupt);
        log::debug!("upcase.buffer {}: interrupt delivered, {woken} waiter(s) woken", self.handle);
    }

    /// Free the storage; the handle is unregistered from the wait queue
    pub fn release(self) {
        log::debug!("upcase.buffer {}: released", self.handle);
        drop(self);
    }

    async fn read_with<F>(
        &self,
        max_len: usize,
        mode: BlockingMode,
        mut deliver: F,
    ) -> Result<usize, ReadError>
    where
        F: FnMut(&[u8]) -> Result<(), ReadError>,
    {
        if max_len == 0 {
            return Ok(0);
        }

        let mut waited = false;
        loop {
            if let Some(n) = self.try_consume(max_len, waited, &mut deliver)? {
                return Ok(n);
            }
            if !mode.is_blocking() {
                return Err(ReadError::WouldBlock);
            }
            // Spurious or empty-write wake-ups land back here and recheck
            self.wait_for_writer().await?;
            waited = true;
        }
    }

    /// Hand the next chunk to `deliver` and advance the read cursor
    ///
    /// Returns `None` if nothing is unread. A reader that has been
    /// suspended also clears the pending interrupt.
    fn try_consume<F>(
        &self,
        max_len: usize,
        waited: bool,
        deliver: &mut F,
    ) -> Result<Option<usize>, ReadError>
    where
        F: FnMut(&[u8]) -> Result<(), ReadError>,
    {
        let mut state = self.state.lock();
        let chunk = state.next_chunk(max_len);
        if chunk.is_empty() {
            return Ok(None);
        }

        // next_chunk stays within read_cursor..write_cursor <= storage.len()
        #[allow(clippy::indexing_slicing)]
        deliver(&state.storage[chunk.clone()])?;
        state.read_cursor = chunk.end;
        if waited {
            state.interrupt_pending = false;
        }
        Ok(Some(chunk.len()))
    }

    fn check_wait(&self) -> WaitAction {
        let mut state = self.state.lock();
        if state.unread() > 0 {
            WaitAction::DontWait
        } else if state.interrupt_pending {
            state.interrupt_pending = false;
            WaitAction::Interrupted
        } else {
            WaitAction::Wait
        }
    }

    /// Wait for a writer (or an interrupt)
    ///
    /// See the `crate::wait_queue` documentation for the workflow
    /// (check (in `read_with`) - lock (here) - check again (here)).
    async fn wait_for_writer(&self) -> Result<(), ReadError> {
        let wakeup = {
            let queue_lock = self.queue.get_lock();
            match self.check_wait() {
                WaitAction::Wait => self.queue.wait(self.handle, "reader", queue_lock),
                WaitAction::DontWait => return Ok(()),
                WaitAction::Interrupted => return Err(ReadError::Interrupted),
            }
        };

        match wakeup.await {
            Wakeup::DataAvailable | Wakeup::Interrupt => Ok(()),
            Wakeup::Unregistered => Err(ReadError::Closed),
        }
    }
}

impl fmt::Debug for TransformBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "TransformBuffer(handle={}, capacity={}, read_cursor={}, write_cursor={}, interrupt_pending={})",
            self.handle,
            self.capacity,
            state.read_cursor,
            state.write_cursor,
            state.interrupt_pending
        )
    }
}

impl Drop for TransformBuffer {
    fn drop(&mut self) {
        self.queue.unregister(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_rejected() {
        assert!(matches!(
            TransformBuffer::allocate(0),
            Err(AllocationError::ZeroCapacity)
        ));
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(BlockingMode::from_flags(0o2), BlockingMode::Blocking);
        assert_eq!(
            BlockingMode::from_flags(0o2 | O_NONBLOCK),
            BlockingMode::NonBlocking
        );
    }

    #[tokio::test]
    async fn test_write_read() {
        let buffer = TransformBuffer::allocate(8192).unwrap();

        assert_eq!(buffer.write(b"Hello, World!").unwrap(), 13);
        let out = buffer.read(13, BlockingMode::Blocking).await.unwrap();
        assert_eq!(out, b"HELLO, WORLD!");
        assert_eq!(buffer.available(), 0);
    }

    #[tokio::test]
    async fn test_too_large_keeps_cursors() {
        let buffer = TransformBuffer::allocate(4).unwrap();
        buffer.write(b"ab").unwrap();

        let err = buffer.write(b"abcde").unwrap_err();
        assert_eq!(err, WriteError::TooLarge { len: 5, capacity: 4 });
        assert_eq!(buffer.available(), 2);

        let out = buffer.read(4, BlockingMode::NonBlocking).await.unwrap();
        assert_eq!(out, b"AB");
    }

    #[tokio::test]
    async fn test_zero_length_read_never_blocks() {
        let buffer = TransformBuffer::allocate(16).unwrap();
        let out = buffer.read(0, BlockingMode::Blocking).await.unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_debug_shows_cursors() {
        let buffer = TransformBuffer::allocate_in(8, Handle::new(3), WaitQueueArc::new()).unwrap();
        buffer.write(b"abc").unwrap();
        assert_eq!(
            format!("{buffer:?}"),
            "TransformBuffer(handle=#3, capacity=8, read_cursor=0, write_cursor=3, interrupt_pending=false)"
        );
    }
}
