//! Device configuration
//!
//! A single tunable, the per-session buffer capacity. It is read once,
//! before the device initializes.

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable consulted by [`DeviceConfig::from_env`]
pub const BUFFER_SIZE_ENV: &str = "UPCASE_BUFFER_SIZE";

pub const DEFAULT_BUFFER_SIZE: usize = 8192;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Internal buffer size in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl DeviceConfig {
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Read `UPCASE_BUFFER_SIZE`; unset means the default
    ///
    /// # Errors
    /// `Invalid` if the variable is set but not a non-negative integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_value(std::env::var(BUFFER_SIZE_ENV).ok().as_deref())
    }

    /// Build a config from the raw value of the environment variable
    ///
    /// # Errors
    /// `Invalid` if `value` is present but not a non-negative integer.
    pub fn from_env_value(value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => raw.parse::<usize>().map(Self::with_buffer_size).map_err(|e| {
                ConfigError::Invalid(format!("{BUFFER_SIZE_ENV}={raw:?}: {e}"))
            }),
        }
    }

    /// Read a JSON object such as `{"buffer_size": 4096}`
    ///
    /// # Errors
    /// `Invalid` on I/O errors, malformed JSON or unknown keys.
    pub fn from_reader(mut reader: impl embedded_io::Read) -> Result<Self, ConfigError> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match embedded_io::Read::read(&mut reader, &mut chunk) {
                Ok(0) => break,
                #[allow(clippy::indexing_slicing)]
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(ConfigError::Invalid(format!("failed to read config: {e:?}"))),
            }
        }

        serde_json::from_slice(&buffer)
            .map_err(|e| ConfigError::Invalid(format!("failed to parse config JSON: {e}")))
    }

    /// # Errors
    /// `ZeroBufferSize` if the capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(())
    }
}
