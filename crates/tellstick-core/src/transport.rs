//! USB transport traits for the Tellstick driver.
//!
//! The driver never touches a USB stack directly. Enumeration, opening, and
//! the primitive control/bulk transfers are reached through two traits:
//!
//! - [`UsbContext`] -- a USB library session: lists devices and opens them.
//! - [`UsbHandle`] -- an opened device: claims interfaces and moves bytes.
//!
//! Both are used as boxed trait objects, so the session only ever holds an
//! opaque handle. The `nusb` backend lives in `tellstick-transport`; a
//! scriptable mock lives in `tellstick-test-harness`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::types::{ControlSetup, DeviceCandidate};

/// Lazily evaluated sequence of enumerated devices.
pub type DeviceList = Box<dyn Iterator<Item = DeviceCandidate> + Send>;

/// A USB library context.
#[async_trait]
pub trait UsbContext: Send {
    /// Enumerate the devices currently attached to the host.
    async fn devices(&mut self) -> Result<DeviceList>;

    /// Open the device described by `candidate`.
    async fn open(&mut self, candidate: &DeviceCandidate) -> Result<Box<dyn UsbHandle>>;

    /// Tear down the context. Handles opened from it must already be closed.
    async fn exit(&mut self);
}

/// An opened USB device.
///
/// All transfers block the calling task until completion or until
/// `timeout` elapses. Implementations return
/// [`Error::Timeout`](crate::error::Error::Timeout) when a transfer moved no
/// data before the deadline, and the byte count when it moved some.
#[async_trait]
pub trait UsbHandle: Send {
    /// Claim `interface` for exclusive use.
    async fn claim_interface(&mut self, interface: u8) -> Result<()>;

    /// Release a previously claimed interface.
    async fn release_interface(&mut self, interface: u8) -> Result<()>;

    /// Perform a control transfer.
    ///
    /// For OUT transfers `data` is the payload; for IN transfers it receives
    /// the response. Returns the number of bytes transferred.
    async fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize>;

    /// Bulk read from IN `endpoint` into `buf`, returning the bytes received.
    ///
    /// A device packet that does not fit in `buf` is an overflow error, never
    /// a silent truncation.
    async fn bulk_read(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration)
        -> Result<usize>;

    /// Bulk write `data` to OUT `endpoint`, returning the bytes sent.
    async fn bulk_write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    /// Close the device. Further transfers must fail.
    async fn close(&mut self);
}
