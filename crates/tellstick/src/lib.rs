//! # tellstick -- Host-side driver for Telldus Tellstick dongles
//!
//! `tellstick` is an asynchronous Rust driver for the TellStick and
//! TellStick Duo 433 MHz radio dongles. Both sit behind an FTDI
//! serial-to-USB bridge; the driver configures the bridge over USB control
//! transfers, strips the bridge's per-packet status bytes from incoming
//! bulk data, and hands the caller newline-delimited messages from the
//! radio firmware.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tellstick::{Message, TellstickBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut stick = TellstickBuilder::new().build().await?;
//!     stick.send(&Message::new("V+")).await?;
//!     for line in stick.poll().await? {
//!         println!("{line}");
//!     }
//!     stick.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                    | Purpose                                          |
//! |--------------------------|--------------------------------------------------|
//! | `tellstick-core`         | Transport traits, [`ByteWindow`], types, errors  |
//! | `tellstick-transport`    | `nusb` implementation of the transport traits    |
//! | `tellstick-test-harness` | Scriptable mock USB backend for tests            |
//! | **`tellstick`**          | FTDI framing, line extraction, [`Session`]       |
//!
//! The driver never talks to USB directly. [`Session`] drives a boxed
//! [`UsbContext`], so tests substitute the mock backend and applications can
//! plug in their own.
//!
//! ## Supported Devices
//!
//! - **TellStick** (`1781:0c30`), 4800 baud
//! - **TellStick Duo** (`1781:0c31`), 9600 baud

pub mod builder;
pub mod discovery;
pub mod lines;
pub mod message;
pub mod models;
pub mod protocol;
pub mod session;

pub use tellstick_core::*;

pub use builder::TellstickBuilder;
pub use discovery::{find_device, list_devices};
pub use lines::LinePolicy;
pub use message::Message;
pub use models::{Model, ModelSpec, TELLDUS_VENDOR_ID};
pub use session::{Session, SessionConfig};
