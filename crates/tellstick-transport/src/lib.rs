//! USB transport implementations for the Tellstick driver.
//!
//! This crate provides concrete implementations of the
//! [`UsbContext`](tellstick_core::UsbContext) and
//! [`UsbHandle`](tellstick_core::UsbHandle) traits from `tellstick-core`:
//!
//! - [`NusbContext`] / [`NusbHandle`]: pure-Rust USB access through `nusb`,
//!   with no libusb dependency

pub mod usb;

pub use usb::{NusbContext, NusbHandle};
