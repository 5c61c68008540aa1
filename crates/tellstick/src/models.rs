//! Tellstick model definitions.
//!
//! Both supported models share Telldus' USB vendor ID and differ only in the
//! product ID and in the FTDI chip behind the bridge. The chip determines how
//! the serial baud rate is encoded into the `SIO_SET_BAUDRATE` request: the
//! values below are pre-computed clock-divider settings for each chip and
//! are not derivable from the baud rate alone.
//!
//! | Model          | Product ID | Baud | Encoded  |
//! |----------------|------------|------|----------|
//! | TellStick      | `0x0c30`   | 4800 | `0x0271` |
//! | TellStick Duo  | `0x0c31`   | 9600 | `0x4138` |

use std::fmt;

use tellstick_core::DeviceCandidate;

/// Telldus Technologies USB vendor ID.
pub const TELLDUS_VENDOR_ID: u16 = 0x1781;

/// A supported Tellstick model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// The original TellStick (433 MHz transmitter only).
    Classic,
    /// TellStick Duo (433 MHz transmitter and receiver).
    Duo,
}

/// Static per-model parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub model: Model,
    /// Human-readable model name.
    pub name: &'static str,
    pub product_id: u16,
    /// Serial baud rate between the FTDI chip and the radio MCU.
    pub baud_rate: u32,
    /// `baud_rate` encoded for this model's FTDI chip.
    pub baud_encoding: u16,
}

static MODEL_TABLE: [ModelSpec; 2] = [
    ModelSpec {
        model: Model::Classic,
        name: "TellStick",
        product_id: 0x0c30,
        baud_rate: 4800,
        baud_encoding: 0x0271,
    },
    ModelSpec {
        model: Model::Duo,
        name: "TellStick Duo",
        product_id: 0x0c31,
        baud_rate: 9600,
        baud_encoding: 0x4138,
    },
];

impl Model {
    /// Every supported model, in table order.
    pub const ALL: [Model; 2] = [Model::Classic, Model::Duo];

    /// The static parameters for this model.
    pub fn spec(self) -> &'static ModelSpec {
        match self {
            Model::Classic => &MODEL_TABLE[0],
            Model::Duo => &MODEL_TABLE[1],
        }
    }

    /// Look up a model by USB product ID.
    pub fn from_product_id(product_id: u16) -> Option<Model> {
        MODEL_TABLE
            .iter()
            .find(|spec| spec.product_id == product_id)
            .map(|spec| spec.model)
    }

    /// The model of an enumerated device, if it is a Tellstick at all.
    pub fn from_candidate(candidate: &DeviceCandidate) -> Option<Model> {
        if candidate.vendor_id != TELLDUS_VENDOR_ID {
            return None;
        }
        Model::from_product_id(candidate.product_id)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().name)
    }
}

/// Whether `candidate` is a supported Tellstick.
pub fn is_supported(candidate: &DeviceCandidate) -> bool {
    Model::from_candidate(candidate).is_some()
}
