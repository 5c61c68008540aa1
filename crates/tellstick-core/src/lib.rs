//! tellstick-core: Core traits, types, and error definitions for the
//! Tellstick USB driver.
//!
//! This crate defines the backend-agnostic pieces that the driver, the USB
//! backend, and the test harness share, so that none of them depends on
//! another's implementation.
//!
//! # Key types
//!
//! - [`UsbContext`] / [`UsbHandle`] -- the transport capability
//! - [`ByteWindow`] -- fixed-capacity read buffer with zero-copy receive
//! - [`DeviceCandidate`] -- one enumerated USB device
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;
pub mod window;

pub use error::{Error, Result};
pub use transport::{DeviceList, UsbContext, UsbHandle};
pub use types::*;
pub use window::ByteWindow;
