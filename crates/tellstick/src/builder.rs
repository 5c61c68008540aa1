//! TellstickBuilder -- fluent builder for opening [`Session`]s.
//!
//! Separates configuration from construction so that callers can set
//! timeouts, the latency timer, and device selection before any USB
//! traffic happens.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tellstick::{LinePolicy, TellstickBuilder};
//!
//! # async fn example() -> tellstick::Result<()> {
//! let stick = TellstickBuilder::new()
//!     .serial("A501ABCD")
//!     .read_timeout(Duration::from_millis(500))
//!     .line_policy(LinePolicy::StripCarriageReturn)
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tellstick_core::error::{Error, Result};
use tellstick_core::transport::UsbContext;

use crate::lines::LinePolicy;
use crate::protocol::STATUS_LEN;
use crate::session::{Session, SessionConfig};

/// Fluent builder for [`Session`].
///
/// Every setting defaults to the value the Tellstick hardware expects, so the
/// simplest usage is:
///
/// ```ignore
/// let stick = TellstickBuilder::new().build().await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TellstickBuilder {
    config: SessionConfig,
}

impl TellstickBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        TellstickBuilder { config }
    }

    /// Timeout for each bulk read (default: 5000ms).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Timeout for bulk writes and control transfers (default: 5000ms).
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// FTDI latency timer in milliseconds (default: 32).
    pub fn latency_timer(mut self, ms: u8) -> Self {
        self.config.latency_timer = ms;
        self
    }

    /// Only open the Tellstick with this serial number.
    pub fn serial(mut self, serial: &str) -> Self {
        self.config.serial = Some(serial.to_string());
        self
    }

    pub fn line_policy(mut self, policy: LinePolicy) -> Self {
        self.config.line_policy = policy;
        self
    }

    /// Size of the host read buffer (default: 1024 bytes).
    pub fn read_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.read_buffer_capacity = capacity;
        self
    }

    /// Bulk IN packet size used when stripping status bytes (default: 64).
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// The configuration assembled so far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.max_packet_size <= STATUS_LEN * 2 {
            return Err(Error::InvalidParameter(format!(
                "max_packet_size must exceed {} bytes, got {}",
                STATUS_LEN * 2,
                c.max_packet_size
            )));
        }
        if c.read_buffer_capacity <= STATUS_LEN {
            return Err(Error::InvalidParameter(format!(
                "read_buffer_capacity must exceed {STATUS_LEN} bytes, got {}",
                c.read_buffer_capacity
            )));
        }
        if c.write_chunk_size == 0 {
            return Err(Error::InvalidParameter(
                "write_chunk_size must be non-zero".into(),
            ));
        }
        if c.latency_timer == 0 {
            return Err(Error::InvalidParameter(
                "latency_timer must be between 1 and 255 ms".into(),
            ));
        }
        Ok(())
    }

    /// Open a [`Session`] through a caller-provided USB context.
    ///
    /// This is the entry point for testing (pass `MockUsb::context()` from
    /// `tellstick-test-harness`) and for callers that supply their own
    /// backend.
    pub async fn build_with_context(self, context: Box<dyn UsbContext>) -> Result<Session> {
        self.validate()?;
        Session::open(context, self.config).await
    }

    /// Open a [`Session`] on real hardware through the `nusb` backend.
    pub async fn build(self) -> Result<Session> {
        self.validate()?;
        let context = tellstick_transport::NusbContext::new();
        Session::open(Box::new(context), self.config).await
    }
}
