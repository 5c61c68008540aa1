//! tellstick-test-harness: Test utilities for the Tellstick driver.
//!
//! This crate provides [`MockUsb`], a scriptable stand-in for a USB library
//! and an FTDI-based Tellstick, so session logic can be tested
//! deterministically without hardware.

pub mod mock_usb;

pub use mock_usb::{MockCall, MockUsb, mock_candidate};
