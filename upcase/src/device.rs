//! Device: the registration layer around the transform channel
//!
//! Initializing a device validates the configuration once; every `open`
//! then gets a private buffer of the configured size. Sessions share the
//! device's wait queue (each under its own handle) and nothing else.

use core::ffi::c_int;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::buffer::BlockingMode;
use crate::config::DeviceConfig;
use crate::error::{AllocationError, InitError};
use crate::idgen::IdGen;
use crate::session::Session;
use crate::wait_queue::WaitQueueArc;

#[derive(Debug)]
pub struct Device {
    config: DeviceConfig,
    id_gen: IdGen,
    queue: WaitQueueArc,
    open_sessions: Arc<AtomicUsize>,
}

impl Device {
    /// Register the device
    ///
    /// # Errors
    /// Refuses to start with a zero buffer size.
    pub fn init(config: DeviceConfig) -> Result<Self, InitError> {
        config.validate()?;

        info!(
            "upcase device registered with buffer size {} bytes",
            config.buffer_size
        );

        Ok(Self {
            config,
            id_gen: IdGen::new(),
            queue: WaitQueueArc::new(),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Open a new session with its own buffer
    ///
    /// # Errors
    /// Fails if the buffer cannot be allocated.
    pub fn open(&self, mode: BlockingMode) -> Result<Session, AllocationError> {
        let handle = self.id_gen.get_next();
        debug!(%handle, ?mode, "upcase device open");
        Session::open_in(
            self.config.buffer_size,
            mode,
            handle,
            self.queue.clone(),
            Arc::clone(&self.open_sessions),
        )
    }

    /// Open with the blocking mode taken from POSIX open flags
    ///
    /// # Errors
    /// As for [`Device::open`].
    pub fn open_flags(&self, flags: c_int) -> Result<Session, AllocationError> {
        self.open(BlockingMode::from_flags(flags))
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Sessions opened on this device and not yet closed
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Acquire)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        info!("upcase device unregistered");
    }
}
