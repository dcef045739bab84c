//! Error types for the upcase channel
//!
//! Every failure is returned to the immediate caller as a typed result.
//! Nothing is retried internally; the surrounding driver decides whether
//! to retry (for example on `Interrupted`).
//!
//! The `errno()` helpers give the POSIX-style code a file-based driver
//! would hand back to user space.

use core::ffi::c_int;
use std::collections::TryReserveError;

pub const EINTR: c_int = 4;
pub const EBADF: c_int = 9;
pub const EAGAIN: c_int = 11;
pub const ENOMEM: c_int = 12;
pub const EFAULT: c_int = 14;
pub const EINVAL: c_int = 22;
pub const ENOSPC: c_int = 28;

/// Storage for a buffer could not be reserved
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("buffer capacity must be greater than zero")]
    ZeroCapacity,

    #[error("cannot reserve {capacity} bytes of buffer storage")]
    OutOfMemory {
        capacity: usize,
        #[source]
        source: TryReserveError,
    },
}

impl AllocationError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::ZeroCapacity => EINVAL,
            Self::OutOfMemory { .. } => ENOMEM,
        }
    }
}

/// A write was rejected; buffer state is unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("write of {len} bytes exceeds buffer capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },

    #[error("source bytes could not be copied into the buffer")]
    CopyFault,

    #[error("session is closed")]
    Closed,
}

impl WriteError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::TooLarge { .. } => ENOSPC,
            Self::CopyFault => EFAULT,
            Self::Closed => EBADF,
        }
    }
}

/// A read produced no bytes; cursors are unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("no data available")]
    WouldBlock,

    #[error("blocked read was interrupted")]
    Interrupted,

    #[error("transformed bytes could not be copied to the destination")]
    CopyFault,

    #[error("session is closed")]
    Closed,
}

impl ReadError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::WouldBlock => EAGAIN,
            Self::Interrupted => EINTR,
            Self::CopyFault => EFAULT,
            Self::Closed => EBADF,
        }
    }
}

/// Configuration could not be loaded or is unusable
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("buffer_size must be greater than zero")]
    ZeroBufferSize,

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The device refused to initialize
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("upcase device not registered: {0}")]
    Config(#[from] ConfigError),
}

impl InitError {
    #[must_use]
    pub fn errno(&self) -> c_int {
        EINVAL
    }
}

/// Umbrella error for callers that do not care which step failed
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    #[must_use]
    pub fn errno(&self) -> c_int {
        match self {
            Self::Allocation(e) => e.errno(),
            Self::Write(e) => e.errno(),
            Self::Read(e) => e.errno(),
            Self::Init(e) => e.errno(),
            Self::Config(_) => EINVAL,
        }
    }
}

/// Error type compatible with `embedded_io`
///
/// Used when a session is driven through the `embedded_io_async` stream
/// traits instead of its typed methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IoError {
    #[error("write exceeds buffer capacity")]
    TooLarge,
    #[error("no data available")]
    WouldBlock,
    #[error("interrupted")]
    Interrupted,
    #[error("bad address")]
    Fault,
    #[error("session is closed")]
    Closed,
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            IoError::TooLarge => embedded_io::ErrorKind::InvalidInput,
            IoError::Interrupted => embedded_io::ErrorKind::Interrupted,
            IoError::Closed => embedded_io::ErrorKind::NotConnected,
            IoError::WouldBlock | IoError::Fault => embedded_io::ErrorKind::Other,
        }
    }
}

impl From<WriteError> for IoError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::TooLarge { .. } => IoError::TooLarge,
            WriteError::CopyFault => IoError::Fault,
            WriteError::Closed => IoError::Closed,
        }
    }
}

impl From<ReadError> for IoError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::WouldBlock => IoError::WouldBlock,
            ReadError::Interrupted => IoError::Interrupted,
            ReadError::CopyFault => IoError::Fault,
            ReadError::Closed => IoError::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(ReadError::WouldBlock.errno(), EAGAIN);
        assert_eq!(ReadError::Interrupted.errno(), EINTR);
        assert_eq!(ReadError::CopyFault.errno(), EFAULT);
        assert_eq!(WriteError::TooLarge { len: 5, capacity: 4 }.errno(), ENOSPC);
        assert_eq!(WriteError::CopyFault.errno(), EFAULT);
        assert_eq!(AllocationError::ZeroCapacity.errno(), EINVAL);
    }

    #[test]
    fn test_io_error_kind() {
        assert_eq!(
            IoError::from(ReadError::Interrupted).kind(),
            embedded_io::ErrorKind::Interrupted
        );
        assert_eq!(
            IoError::from(WriteError::TooLarge { len: 2, capacity: 1 }).kind(),
            embedded_io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_too_large_message() {
        let e = WriteError::TooLarge { len: 5, capacity: 4 };
        assert_eq!(
            e.to_string(),
            "write of 5 bytes exceeds buffer capacity of 4 bytes"
        );
    }
}
