//! Session: one client's open-to-close lifetime over the channel
//!
//! A session owns exactly one `TransformBuffer` and remembers whether the
//! client asked for blocking or non-blocking reads. States are `Open` and
//! `Closed`; `close` is idempotent and also runs on drop.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use embedded_io_async::{ErrorType, Read, Write};

use crate::buffer::{BlockingMode, TransformBuffer};
use crate::error::{AllocationError, IoError, ReadError, WriteError};
use crate::idgen::Handle;
use crate::wait_queue::WaitQueueArc;

pub struct Session {
    buffer: Option<TransformBuffer>,
    mode: BlockingMode,
    capacity: usize,
    /// Live-session counter of the owning device, if any
    open_count: Option<Arc<AtomicUsize>>,
}

impl Session {
    /// Open a standalone session with its own wait queue
    ///
    /// # Errors
    /// Fails if the buffer cannot be allocated; no session is created.
    pub fn open(capacity: usize, mode: BlockingMode) -> Result<Self, AllocationError> {
        let buffer = TransformBuffer::allocate(capacity)?;
        Ok(Self::with_buffer(buffer, mode, None))
    }

    pub(crate) fn open_in(
        capacity: usize,
        mode: BlockingMode,
        handle: Handle,
        queue: WaitQueueArc,
        open_count: Arc<AtomicUsize>,
    ) -> Result<Self, AllocationError> {
        let buffer = TransformBuffer::allocate_in(capacity, handle, queue)?;
        open_count.fetch_add(1, Ordering::AcqRel);
        Ok(Self::with_buffer(buffer, mode, Some(open_count)))
    }

    fn with_buffer(
        buffer: TransformBuffer,
        mode: BlockingMode,
        open_count: Option<Arc<AtomicUsize>>,
    ) -> Self {
        tracing::debug!(
            handle = %buffer.handle(),
            capacity = buffer.capacity(),
            ?mode,
            "session opened"
        );
        Self {
            capacity: buffer.capacity(),
            buffer: Some(buffer),
            mode,
            open_count,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.buffer.is_some()
    }

    #[must_use]
    pub fn mode(&self) -> BlockingMode {
        self.mode
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Unread bytes of the current generation (0 once closed)
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.as_ref().map_or(0, TransformBuffer::available)
    }

    /// Handle of the owned buffer, `None` once closed
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.buffer.as_ref().map(TransformBuffer::handle)
    }

    /// # Errors
    /// `TooLarge` if `data` exceeds the capacity, `Closed` after `close`.
    pub fn write(&self, data: &[u8]) -> Result<usize, WriteError> {
        self.buffer()
            .ok_or(WriteError::Closed)?
            .write(data)
    }

    /// # Errors
    /// `TooLarge`, `CopyFault` if the source fails, `Closed` after `close`.
    pub fn write_from<R>(&self, src: &mut R, len: usize) -> Result<usize, WriteError>
    where
        R: embedded_io::Read,
    {
        self.buffer()
            .ok_or(WriteError::Closed)?
            .write_from(src, len)
    }

    /// Read with the session's blocking mode
    ///
    /// # Errors
    /// `WouldBlock`, `Interrupted`, or `Closed` after `close`.
    pub async fn read(&self, max_len: usize) -> Result<Vec<u8>, ReadError> {
        self.buffer()
            .ok_or(ReadError::Closed)?
            .read(max_len, self.mode)
            .await
    }

    /// # Errors
    /// As for [`Session::read`].
    pub async fn read_slice(&self, buf: &mut [u8]) -> Result<usize, ReadError> {
        self.buffer()
            .ok_or(ReadError::Closed)?
            .read_slice(buf, self.mode)
            .await
    }

    /// # Errors
    /// As for [`Session::read`], plus `CopyFault` if the sink fails.
    pub async fn read_into<W>(&self, dst: &mut W, max_len: usize) -> Result<usize, ReadError>
    where
        W: embedded_io::Write,
    {
        self.buffer()
            .ok_or(ReadError::Closed)?
            .read_into(dst, max_len, self.mode)
            .await
    }

    /// Deliver an external interrupt to a blocked (or the next blocking) read
    pub fn interrupt(&self) {
        if let Some(buffer) = self.buffer() {
            buffer.interrupt();
        }
    }

    /// Release the buffer; calling it again is a no-op
    pub fn close(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            return;
        };
        tracing::debug!(handle = %buffer.handle(), "session closed");
        buffer.release();
        if let Some(open_count) = self.open_count.take() {
            open_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn buffer(&self) -> Option<&TransformBuffer> {
        self.buffer.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.buffer {
            Some(buffer) => write!(f, "Session(open, mode={:?}, {buffer:?})", self.mode),
            None => write!(f, "Session(closed, mode={:?})", self.mode),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

// Implement embedded_io_async stream traits
impl ErrorType for Session {
    type Error = IoError;
}

impl Read for Session {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Session::read_slice(self, buf).await.map_err(IoError::from)
    }
}

impl Write for Session {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Session::write(self, buf).map_err(IoError::from)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
