pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod idgen;
pub mod session;
pub mod transform;
pub mod wait_queue;


// Re-export the core types for convenience
pub use buffer::{BlockingMode, TransformBuffer, O_NONBLOCK};
pub use session::Session;

// Re-export driver glue
pub use config::{DeviceConfig, DEFAULT_BUFFER_SIZE};
pub use device::Device;

pub use error::{AllocationError, ConfigError, Error, InitError, IoError, ReadError, WriteError};
pub use idgen::{Handle, IdGen};
pub use transform::{upcase_byte, upcase_in_place};
pub use wait_queue::{WaitQueueArc, Wakeup};
