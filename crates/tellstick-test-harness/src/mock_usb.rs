//! Scriptable mock USB backend for deterministic testing of the driver.
//!
//! [`MockUsb`] owns shared state behind an `Arc<Mutex<_>>`. The session under
//! test receives a boxed [`UsbContext`] from [`MockUsb::context`], while the
//! test keeps the `MockUsb` to script bulk reads, inject failures, and
//! inspect what the driver did afterwards.
//!
//! # Example
//!
//! ```
//! use tellstick_test_harness::{MockUsb, mock_candidate};
//!
//! let mock = MockUsb::new();
//! mock.add_device(mock_candidate(0x1781, 0x0c31, "A6XYZ123"));
//! // Two status bytes followed by "+V2\r\n".
//! mock.push_read(&[0x01, 0x60, b'+', b'V', b'2', b'\r', b'\n']);
//! let _ctx = mock.context();
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tellstick_core::error::{Error, Result};
use tellstick_core::transport::{DeviceList, UsbContext, UsbHandle};
use tellstick_core::types::{ControlSetup, DeviceCandidate, DeviceId};

/// One recorded interaction with the mock backend, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Devices,
    Open(DeviceId),
    ClaimInterface(u8),
    ReleaseInterface(u8),
    Control(ControlSetup),
    BulkRead { endpoint: u8, requested: usize },
    BulkWrite { endpoint: u8, data: Vec<u8> },
    Close,
    Exit,
}

/// Scripted outcome of the next bulk read.
#[derive(Debug, Clone)]
enum ReadScript {
    Data(Vec<u8>),
    Timeout,
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    devices: Vec<DeviceCandidate>,
    reads: VecDeque<ReadScript>,
    calls: Vec<MockCall>,
    control_count: usize,
    enumeration_error: Option<String>,
    open_error: Option<String>,
    claim_error: Option<String>,
    control_error: Option<(usize, String)>,
    write_error: Option<String>,
    handle_closed: bool,
}

/// Build a [`DeviceCandidate`] with a synthetic bus location.
pub fn mock_candidate(vendor_id: u16, product_id: u16, serial: &str) -> DeviceCandidate {
    DeviceCandidate {
        id: DeviceId {
            bus: "1".into(),
            address: 4,
        },
        vendor_id,
        product_id,
        product: Some("TellStick Duo".into()),
        serial: Some(serial.to_string()),
    }
}

/// Test-side controller for the mock USB backend.
#[derive(Debug, Clone, Default)]
pub struct MockUsb {
    state: Arc<Mutex<MockState>>,
}

impl MockUsb {
    /// Create a mock with no attached devices and no scripted reads.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Attach a device that enumeration will report.
    pub fn add_device(&self, candidate: DeviceCandidate) {
        self.state().devices.push(candidate);
    }

    /// A boxed context sharing this mock's state.
    pub fn context(&self) -> Box<dyn UsbContext> {
        Box::new(MockUsbContext {
            state: Arc::clone(&self.state),
        })
    }

    /// Queue raw bytes (status bytes included) for the next bulk read.
    pub fn push_read(&self, raw: &[u8]) {
        self.state().reads.push_back(ReadScript::Data(raw.to_vec()));
    }

    /// Queue a bulk read that times out without data.
    pub fn push_read_timeout(&self) {
        self.state().reads.push_back(ReadScript::Timeout);
    }

    /// Queue a bulk read that fails with a transport error.
    pub fn push_read_error(&self, message: &str) {
        self.state()
            .reads
            .push_back(ReadScript::Fail(message.to_string()));
    }

    /// Make device enumeration fail.
    pub fn fail_enumeration(&self, message: &str) {
        self.state().enumeration_error = Some(message.to_string());
    }

    /// Make opening a device fail.
    pub fn fail_open(&self, message: &str) {
        self.state().open_error = Some(message.to_string());
    }

    /// Make claiming an interface fail.
    pub fn fail_claim(&self, message: &str) {
        self.state().claim_error = Some(message.to_string());
    }

    /// Make the `n`th control transfer (0-based) fail.
    pub fn fail_control_at(&self, n: usize, message: &str) {
        self.state().control_error = Some((n, message.to_string()));
    }

    /// Make every bulk write fail.
    pub fn fail_writes(&self, message: &str) {
        self.state().write_error = Some(message.to_string());
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &MockCall) -> usize {
        self.state().calls.iter().filter(|c| *c == call).count()
    }

    /// Setup packets of every control transfer, oldest first.
    pub fn control_transfers(&self) -> Vec<ControlSetup> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Control(setup) => Some(*setup),
                _ => None,
            })
            .collect()
    }

    /// Endpoint and payload of every bulk write, oldest first.
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::BulkWrite { endpoint, data } => Some((*endpoint, data.clone())),
                _ => None,
            })
            .collect()
    }

    /// Endpoint and requested length of every bulk read, oldest first.
    pub fn read_requests(&self) -> Vec<(u8, usize)> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::BulkRead {
                    endpoint,
                    requested,
                } => Some((*endpoint, *requested)),
                _ => None,
            })
            .collect()
    }

    /// Number of scripted reads not yet consumed.
    pub fn remaining_reads(&self) -> usize {
        self.state().reads.len()
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    // A panicking test thread must not cascade into unrelated assertions.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MockUsbContext {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl UsbContext for MockUsbContext {
    async fn devices(&mut self) -> Result<DeviceList> {
        let mut state = lock(&self.state);
        state.calls.push(MockCall::Devices);
        if let Some(message) = &state.enumeration_error {
            return Err(Error::Transport(message.clone()));
        }
        Ok(Box::new(state.devices.clone().into_iter()))
    }

    async fn open(&mut self, candidate: &DeviceCandidate) -> Result<Box<dyn UsbHandle>> {
        let mut state = lock(&self.state);
        state.calls.push(MockCall::Open(candidate.id.clone()));
        if let Some(message) = &state.open_error {
            return Err(Error::Transport(message.clone()));
        }
        state.handle_closed = false;
        Ok(Box::new(MockUsbHandle {
            state: Arc::clone(&self.state),
        }))
    }

    async fn exit(&mut self) {
        lock(&self.state).calls.push(MockCall::Exit);
    }
}

struct MockUsbHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockUsbHandle {
    fn check_open(state: &MockState) -> Result<()> {
        if state.handle_closed {
            Err(Error::Transport("LIBUSB_ERROR_NO_DEVICE".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UsbHandle for MockUsbHandle {
    async fn claim_interface(&mut self, interface: u8) -> Result<()> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.calls.push(MockCall::ClaimInterface(interface));
        match &state.claim_error {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(()),
        }
    }

    async fn release_interface(&mut self, interface: u8) -> Result<()> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.calls.push(MockCall::ReleaseInterface(interface));
        Ok(())
    }

    async fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.calls.push(MockCall::Control(setup));
        let n = state.control_count;
        state.control_count += 1;
        match &state.control_error {
            Some((at, message)) if *at == n => Err(Error::Transport(message.clone())),
            _ => Ok(data.len()),
        }
    }

    async fn bulk_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.calls.push(MockCall::BulkRead {
            endpoint,
            requested: buf.len(),
        });
        match state.reads.pop_front() {
            Some(ReadScript::Data(raw)) if raw.len() > buf.len() => Err(Error::Transport(format!(
                "LIBUSB_ERROR_OVERFLOW: device sent {} bytes into a {}-byte buffer",
                raw.len(),
                buf.len()
            ))),
            Some(ReadScript::Data(raw)) => {
                buf[..raw.len()].copy_from_slice(&raw);
                Ok(raw.len())
            }
            Some(ReadScript::Fail(message)) => Err(Error::Transport(message)),
            Some(ReadScript::Timeout) | None => Err(Error::Timeout),
        }
    }

    async fn bulk_write(&mut self, endpoint: u8, data: &[u8], _timeout: Duration) -> Result<usize> {
        let mut state = lock(&self.state);
        Self::check_open(&state)?;
        state.calls.push(MockCall::BulkWrite {
            endpoint,
            data: data.to_vec(),
        });
        match &state.write_error {
            Some(message) => Err(Error::Transport(message.clone())),
            None => Ok(data.len()),
        }
    }

    async fn close(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(MockCall::Close);
        state.handle_closed = true;
    }
}
