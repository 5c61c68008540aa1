//! Session -- an open, configured Tellstick.
//!
//! A [`Session`] owns the USB context, the device handle, and the read
//! buffer. Opening walks through the lifecycle
//! `Uninitialized -> Opening -> Configuring -> Ready`; every step is fatal,
//! and a failure releases whatever was acquired before returning the error.
//! [`Session::close`] moves to the terminal `Closed` state.
//!
//! Reading is poll based: [`Session::poll`] performs one bulk read, strips
//! the FTDI status bytes, and returns every complete line received so far.
//! A poll that returns no lines is normal; callers poll on a timer.
//!
//! A session has a single owner. Every operation takes `&mut self`, so calls
//! are serialized by the borrow checker rather than by an internal lock.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tellstick::{Message, TellstickBuilder};
//!
//! # async fn example() -> tellstick::Result<()> {
//! let mut stick = TellstickBuilder::new().build().await?;
//! println!("found {} with serial {}", stick.product(), stick.serial());
//!
//! stick.send(&Message::new("V+")).await?;
//! let mut ticker = tokio::time::interval(Duration::from_millis(100));
//! loop {
//!     ticker.tick().await;
//!     let lines = stick.poll().await?;
//!     if let Some(version) = lines.first() {
//!         println!("firmware: {version}");
//!         break;
//!     }
//! }
//! stick.close().await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

use tellstick_core::error::{Error, Result};
use tellstick_core::transport::{UsbContext, UsbHandle};
use tellstick_core::{ByteWindow, ControlSetup, DeviceCandidate, SessionState};

use crate::discovery;
use crate::lines::{self, LinePolicy};
use crate::message::Message;
use crate::models::Model;
use crate::protocol::*;

/// Per-session configuration.
///
/// Defaults match the Tellstick hardware; only timeouts, latency, line
/// policy, and device selection are normally worth changing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Timeout for bulk reads.
    pub read_timeout: Duration,
    /// Timeout for bulk writes and control transfers.
    pub write_timeout: Duration,
    /// USB interface to claim.
    pub interface: u8,
    /// FTDI port index carried in every control request (1 = port A).
    pub index: u16,
    /// Bulk IN endpoint.
    pub read_endpoint: u8,
    /// Bulk OUT endpoint.
    pub write_endpoint: u8,
    pub max_packet_size: usize,
    pub read_buffer_capacity: usize,
    /// Upper bound on bytes forwarded by one [`Session::send_raw`].
    pub write_chunk_size: usize,
    /// FTDI latency timer in milliseconds.
    pub latency_timer: u8,
    pub line_policy: LinePolicy,
    /// Open only the device reporting this serial number.
    pub serial: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            read_timeout: Duration::from_millis(5000),
            write_timeout: Duration::from_millis(5000),
            interface: 0,
            index: 1,
            read_endpoint: 0x81,
            write_endpoint: 0x02,
            max_packet_size: MAX_PACKET_SIZE,
            read_buffer_capacity: READ_BUFFER_SIZE,
            write_chunk_size: WRITE_CHUNK_SIZE,
            latency_timer: 32,
            line_policy: LinePolicy::default(),
            serial: None,
        }
    }
}

/// An open Tellstick.
///
/// Constructed via [`TellstickBuilder`](crate::builder::TellstickBuilder) or
/// [`Session::open`]. Call [`close`](Self::close) before dropping; the
/// session cannot run async teardown from `Drop`.
pub struct Session {
    context: Option<Box<dyn UsbContext>>,
    handle: Option<Box<dyn UsbHandle>>,
    config: SessionConfig,
    model: Model,
    product: String,
    serial: String,
    read_buf: ByteWindow,
    state: SessionState,
}

impl Session {
    /// Find, open, and configure a Tellstick through `context`.
    ///
    /// On any failure the context is torn down and the error returned;
    /// there is no partially opened session.
    pub async fn open(mut context: Box<dyn UsbContext>, config: SessionConfig) -> Result<Session> {
        debug!(state = %SessionState::Opening, "opening Tellstick session");
        let (candidate, model) =
            match discovery::select_device(context.as_mut(), config.serial.as_deref()).await {
                Ok(found) => found,
                Err(e) => {
                    context.exit().await;
                    return Err(e);
                }
            };

        let mut session = Session {
            context: Some(context),
            handle: None,
            read_buf: ByteWindow::new(config.read_buffer_capacity),
            config,
            model,
            product: candidate
                .product
                .clone()
                .unwrap_or_else(|| model.spec().name.to_string()),
            serial: candidate.serial.clone().unwrap_or_default(),
            state: SessionState::Opening,
        };

        if let Err(e) = session.initialize(&candidate).await {
            debug!(error = %e, state = %session.state, "initialization failed");
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn initialize(&mut self, candidate: &DeviceCandidate) -> Result<()> {
        let context = self.context.as_mut().ok_or(Error::DeviceUnavailable)?;
        let handle = self.handle.insert(context.open(candidate).await?);
        handle.claim_interface(self.config.interface).await?;

        self.set_state(SessionState::Configuring);
        self.ftdi_reset().await?;
        self.ftdi_set_latency_timer(self.config.latency_timer).await?;
        self.ftdi_purge_buffers().await?;
        self.ftdi_set_baud_rate(self.model.spec().baud_encoding)
            .await?;

        self.set_state(SessionState::Ready);
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        debug!(from = %self.state, to = %state, "session state");
        self.state = state;
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state == SessionState::Ready && self.handle.is_some() {
            Ok(())
        } else {
            Err(Error::DeviceUnavailable)
        }
    }

    /// Model detected from the USB product ID.
    pub fn model(&self) -> Model {
        self.model
    }

    /// Product string reported by the device, or the model name.
    pub fn product(&self) -> &str {
        &self.product
    }

    /// Serial number reported by the device (empty if none).
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is `Ready` for I/O.
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// The configuration this session was opened with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Bytes received but not yet terminated by a newline.
    pub fn pending(&self) -> &[u8] {
        self.read_buf.as_slice()
    }

    /// Read whatever the device has and return the complete lines.
    ///
    /// An empty vector is success. Transport errors, including
    /// [`Error::Timeout`], are returned as-is. A saturated read buffer (too
    /// little free space left for any payload) is recovered by purging host
    /// and device buffers, dropping the unterminated data.
    ///
    /// Saturation already triggers with two or fewer free bytes, so
    /// unterminated data may be purged slightly before the buffer is full.
    /// A device packet larger than the free tail fails the read with an
    /// overflow [`Error::Transport`]; pending data is left untouched.
    pub async fn poll(&mut self) -> Result<Vec<String>> {
        self.ensure_ready()?;

        // A tail no longer than one status header can never receive payload.
        let saturated = self
            .read_buf
            .free_space()
            .is_none_or(|free| free.len() <= STATUS_LEN);
        if saturated {
            warn!(
                buffered = self.read_buf.len(),
                "read buffer saturated, purging"
            );
            self.ftdi_purge_buffers().await?;
            return Ok(Vec::new());
        }

        let handle = self.handle.as_mut().ok_or(Error::DeviceUnavailable)?;
        let Some(free) = self.read_buf.free_space() else {
            return Ok(Vec::new());
        };
        let got = handle
            .bulk_read(self.config.read_endpoint, free, self.config.read_timeout)
            .await?
            .min(free.len());
        trace!(got, "bulk read");
        if got <= STATUS_LEN {
            return Ok(Vec::new());
        }

        let usable = strip_status_bytes(&mut free[..got], self.config.max_packet_size);
        if usable > 0 {
            self.read_buf.grow(usable);
        }

        let messages = lines::extract_lines(&mut self.read_buf, self.config.line_policy);
        if !messages.is_empty() {
            debug!(count = messages.len(), pending = self.read_buf.len(), "received lines");
        }
        Ok(messages)
    }

    /// Forward one chunk of `source` to the device as a single bulk write.
    ///
    /// At most `write_chunk_size` bytes are read from `source`; anything
    /// beyond that is left unread. Reading zero bytes sends nothing.
    /// Malformed commands may leave the Tellstick firmware in an unstable
    /// state.
    pub async fn send_raw<R>(&mut self, source: &mut R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.ensure_ready()?;

        let mut chunk = vec![0u8; self.config.write_chunk_size];
        let count = source.read(&mut chunk).await?;
        if count == 0 {
            debug!("outbound source empty, nothing sent");
            return Ok(());
        }

        let handle = self.handle.as_mut().ok_or(Error::DeviceUnavailable)?;
        let sent = handle
            .bulk_write(
                self.config.write_endpoint,
                &chunk[..count],
                self.config.write_timeout,
            )
            .await?;
        trace!(count, sent, "bulk write");
        Ok(())
    }

    /// Send a [`Message`] (first `write_chunk_size` bytes).
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        let mut bytes = message.as_bytes();
        self.send_raw(&mut bytes).await
    }

    /// Discard buffered data on the host and in both chip FIFOs.
    pub async fn purge(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.ftdi_purge_buffers().await
    }

    /// Release the interface, close the handle, then tear down the context.
    ///
    /// Safe to call repeatedly; only the first call touches the device.
    pub async fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.release_interface(self.config.interface).await {
                debug!(error = %e, "releasing interface during close failed");
            }
            handle.close().await;
        }
        if let Some(mut context) = self.context.take() {
            context.exit().await;
        }
        self.read_buf.clear();
        if self.state != SessionState::Closed {
            self.set_state(SessionState::Closed);
        }
    }

    // -- FTDI control requests ---------------------------------------------

    async fn ftdi_control(&mut self, request: u8, value: u16) -> Result<()> {
        let handle = self.handle.as_mut().ok_or(Error::DeviceUnavailable)?;
        let setup = ControlSetup {
            request_type: FTDI_DEVICE_OUT_REQTYPE,
            request,
            value,
            index: self.config.index,
        };
        handle
            .control_transfer(setup, &mut [], self.config.write_timeout)
            .await?;
        Ok(())
    }

    /// Reset the chip; also invalidates the host read buffer.
    async fn ftdi_reset(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::DeviceUnavailable);
        }
        self.read_buf.clear();
        self.ftdi_control(SIO_RESET_REQUEST, SIO_RESET_SIO).await
    }

    async fn ftdi_set_latency_timer(&mut self, latency_ms: u8) -> Result<()> {
        self.ftdi_control(SIO_SET_LATENCY_TIMER_REQUEST, u16::from(latency_ms))
            .await
    }

    async fn ftdi_purge_buffers(&mut self) -> Result<()> {
        self.ftdi_purge_rx().await?;
        self.ftdi_purge_tx().await
    }

    /// Purge the chip's RX FIFO; also invalidates the host read buffer.
    async fn ftdi_purge_rx(&mut self) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::DeviceUnavailable);
        }
        self.read_buf.clear();
        self.ftdi_control(SIO_RESET_REQUEST, SIO_RESET_PURGE_RX)
            .await
    }

    async fn ftdi_purge_tx(&mut self) -> Result<()> {
        self.ftdi_control(SIO_RESET_REQUEST, SIO_RESET_PURGE_TX)
            .await
    }

    /// Program the baud rate; `encoded` must already be chip specific.
    async fn ftdi_set_baud_rate(&mut self, encoded: u16) -> Result<()> {
        self.ftdi_control(SIO_SET_BAUDRATE_REQUEST, encoded).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model", &self.model)
            .field("product", &self.product)
            .field("serial", &self.serial)
            .field("state", &self.state)
            .field("pending", &self.read_buf.len())
            .finish_non_exhaustive()
    }
}
