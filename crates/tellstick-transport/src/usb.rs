//! USB transport backed by the `nusb` crate.
//!
//! [`NusbContext`] implements [`UsbContext`] by enumerating devices with
//! `nusb::list_devices()`, and [`NusbHandle`] implements [`UsbHandle`] on top
//! of an opened `nusb::Device` and its claimed `nusb::Interface`. Bulk
//! transfers are submitted on a freshly opened endpoint and awaited with
//! `tokio::time::timeout`; a timed-out transfer is cancelled and any bytes it
//! already moved are still returned.
//!
//! # Example
//!
//! ```no_run
//! use tellstick_core::transport::UsbContext;
//! use tellstick_transport::NusbContext;
//!
//! # async fn example() -> tellstick_core::Result<()> {
//! let mut ctx = NusbContext::new();
//! for device in ctx.devices().await? {
//!     println!("{device}");
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;

use nusb::transfer::{Buffer, Bulk, ControlIn, ControlOut, ControlType, In, Out, Recipient};
use nusb::transfer::TransferError;
use tracing::{debug, trace, warn};

use tellstick_core::error::{Error, Result};
use tellstick_core::transport::{DeviceList, UsbContext, UsbHandle};
use tellstick_core::types::{ControlSetup, DeviceCandidate, DeviceId};

/// `nusb`-backed USB context.
///
/// `nusb` keeps no global library state, so the context only tracks whether
/// it has been torn down.
#[derive(Debug, Default)]
pub struct NusbContext {
    exited: bool,
}

impl NusbContext {
    pub fn new() -> Self {
        Self::default()
    }

    async fn list(&self) -> Result<Vec<nusb::DeviceInfo>> {
        if self.exited {
            return Err(Error::DeviceUnavailable);
        }
        let devices = nusb::list_devices()
            .await
            .map_err(|e| Error::Transport(format!("failed to list USB devices: {e}")))?;
        Ok(devices.collect())
    }
}

fn candidate_from(info: &nusb::DeviceInfo) -> DeviceCandidate {
    DeviceCandidate {
        id: DeviceId {
            bus: info.bus_id().to_string(),
            address: info.device_address(),
        },
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        product: info.product_string().map(str::to_string),
        serial: info.serial_number().map(str::to_string),
    }
}

#[async_trait]
impl UsbContext for NusbContext {
    async fn devices(&mut self) -> Result<DeviceList> {
        let candidates: Vec<DeviceCandidate> =
            self.list().await?.iter().map(candidate_from).collect();
        debug!(count = candidates.len(), "enumerated USB devices");
        Ok(Box::new(candidates.into_iter()))
    }

    async fn open(&mut self, candidate: &DeviceCandidate) -> Result<Box<dyn UsbHandle>> {
        let info = self
            .list()
            .await?
            .into_iter()
            .find(|dev| {
                dev.bus_id() == candidate.id.bus && dev.device_address() == candidate.id.address
            })
            .ok_or(Error::NoDevice)?;

        let device = info
            .open()
            .await
            .map_err(|e| Error::Transport(format!("failed to open device {}: {e}", candidate.id)))?;

        debug!(device = %candidate.id, "opened USB device");
        Ok(Box::new(NusbHandle {
            device: Some(device),
            interface: None,
        }))
    }

    async fn exit(&mut self) {
        self.exited = true;
    }
}

/// An opened `nusb` device with at most one claimed interface.
pub struct NusbHandle {
    device: Option<nusb::Device>,
    interface: Option<nusb::Interface>,
}

impl NusbHandle {
    fn interface(&self) -> Result<&nusb::Interface> {
        self.interface.as_ref().ok_or(Error::DeviceUnavailable)
    }
}

/// Split a `bmRequestType` byte into `nusb`'s type and recipient enums.
fn control_kind(request_type: u8) -> Result<(ControlType, Recipient)> {
    let control_type = match (request_type >> 5) & 0x03 {
        0 => ControlType::Standard,
        1 => ControlType::Class,
        2 => ControlType::Vendor,
        _ => {
            return Err(Error::InvalidParameter(format!(
                "reserved control type in request type {request_type:#04x}"
            )));
        }
    };
    let recipient = match request_type & 0x1F {
        0 => Recipient::Device,
        1 => Recipient::Interface,
        2 => Recipient::Endpoint,
        3 => Recipient::Other,
        r => {
            return Err(Error::InvalidParameter(format!(
                "reserved recipient {r} in request type {request_type:#04x}"
            )));
        }
    };
    Ok((control_type, recipient))
}

fn transfer_error(e: TransferError) -> Error {
    match e {
        TransferError::Cancelled => Error::Timeout,
        other => Error::Transport(format!("{other:?}")),
    }
}

/// Round a bulk IN request down to whole packets, never below one packet.
fn in_request_len(wanted: usize, max_packet_size: usize) -> usize {
    if max_packet_size == 0 {
        return wanted;
    }
    ((wanted / max_packet_size) * max_packet_size).max(max_packet_size)
}

/// Interpret a bulk completion: data moved before a cancel still counts.
fn completion_len(
    status: &std::result::Result<(), TransferError>,
    actual_len: usize,
) -> Result<usize> {
    match status {
        Ok(()) => Ok(actual_len),
        Err(TransferError::Cancelled) if actual_len > 0 => Ok(actual_len),
        Err(e) => Err(transfer_error(e.clone())),
    }
}

/// A device packet larger than the receive buffer is an overflow, as libusb
/// reports it; the excess bytes are already gone.
fn fit_read(got: usize, capacity: usize) -> Result<usize> {
    if got > capacity {
        return Err(Error::Transport(format!(
            "LIBUSB_ERROR_OVERFLOW: device sent {got} bytes into a {capacity}-byte buffer"
        )));
    }
    Ok(got)
}

#[async_trait]
impl UsbHandle for NusbHandle {
    async fn claim_interface(&mut self, interface: u8) -> Result<()> {
        let device = self.device.as_ref().ok_or(Error::DeviceUnavailable)?;
        let claimed = device
            .claim_interface(interface)
            .await
            .map_err(|e| Error::Transport(format!("failed to claim interface {interface}: {e}")))?;
        self.interface = Some(claimed);
        Ok(())
    }

    async fn release_interface(&mut self, interface: u8) -> Result<()> {
        // Dropping the nusb interface releases it.
        match self.interface.take() {
            Some(_) => {
                debug!(interface, "released USB interface");
                Ok(())
            }
            None => Err(Error::DeviceUnavailable),
        }
    }

    async fn control_transfer(
        &mut self,
        setup: ControlSetup,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let interface = self.interface()?;
        let (control_type, recipient) = control_kind(setup.request_type)?;

        if setup.is_in() {
            let length = u16::try_from(data.len()).map_err(|_| {
                Error::InvalidParameter(format!("control IN length {} exceeds u16", data.len()))
            })?;
            let response = interface
                .control_in(
                    ControlIn {
                        control_type,
                        recipient,
                        request: setup.request,
                        value: setup.value,
                        index: setup.index,
                        length,
                    },
                    timeout,
                )
                .await
                .map_err(transfer_error)?;
            let n = response.len().min(data.len());
            data[..n].copy_from_slice(&response[..n]);
            Ok(n)
        } else {
            interface
                .control_out(
                    ControlOut {
                        control_type,
                        recipient,
                        request: setup.request,
                        value: setup.value,
                        index: setup.index,
                        data: &*data,
                    },
                    timeout,
                )
                .await
                .map_err(transfer_error)?;
            Ok(data.len())
        }
    }

    async fn bulk_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        let interface = self.interface()?;
        let mut ep = interface
            .endpoint::<Bulk, In>(endpoint)
            .map_err(|e| Error::Transport(format!("failed to open bulk IN {endpoint:#04x}: {e}")))?;

        let request = in_request_len(buf.len(), ep.max_packet_size());
        ep.submit(ep.allocate(request));

        let completion = match tokio::time::timeout(timeout, ep.next_complete()).await {
            Ok(completion) => completion,
            Err(_) => {
                ep.cancel_all();
                ep.next_complete().await
            }
        };

        let got = completion_len(&completion.status, completion.actual_len)?;
        let n = fit_read(got, buf.len()).inspect_err(|_| {
            warn!(got, capacity = buf.len(), "bulk read overflowed receive buffer");
        })?;
        buf[..n].copy_from_slice(&completion.buffer[..n]);
        trace!(endpoint, n, "bulk read");
        Ok(n)
    }

    async fn bulk_write(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        let interface = self.interface()?;
        let mut ep = interface
            .endpoint::<Bulk, Out>(endpoint)
            .map_err(|e| Error::Transport(format!("failed to open bulk OUT {endpoint:#04x}: {e}")))?;

        let mut buffer = Buffer::new(data.len());
        buffer.extend_from_slice(data);
        ep.submit(buffer);

        let completion = match tokio::time::timeout(timeout, ep.next_complete()).await {
            Ok(completion) => completion,
            Err(_) => {
                ep.cancel_all();
                ep.next_complete().await
            }
        };

        let n = completion_len(&completion.status, completion.actual_len)?;
        trace!(endpoint, n, "bulk write");
        Ok(n)
    }

    async fn close(&mut self) {
        self.interface = None;
        if self.device.take().is_some() {
            debug!("closed USB device");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_kind_vendor_device() {
        let (t, r) = control_kind(0x40).unwrap();
        assert!(matches!(t, ControlType::Vendor));
        assert!(matches!(r, Recipient::Device));

        let (t, r) = control_kind(0xC0).unwrap();
        assert!(matches!(t, ControlType::Vendor));
        assert!(matches!(r, Recipient::Device));
    }

    #[test]
    fn control_kind_class_interface() {
        let (t, r) = control_kind(0x21).unwrap();
        assert!(matches!(t, ControlType::Class));
        assert!(matches!(r, Recipient::Interface));
    }

    #[test]
    fn control_kind_rejects_reserved_bits() {
        assert!(matches!(
            control_kind(0x60),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            control_kind(0x44),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn in_request_rounds_down_to_packets() {
        assert_eq!(in_request_len(1024, 64), 1024);
        assert_eq!(in_request_len(1000, 64), 960);
        assert_eq!(in_request_len(70, 64), 64);
    }

    #[test]
    fn in_request_never_below_one_packet() {
        assert_eq!(in_request_len(10, 64), 64);
        assert_eq!(in_request_len(0, 64), 64);
    }

    #[test]
    fn in_request_unknown_packet_size() {
        assert_eq!(in_request_len(100, 0), 100);
    }

    #[test]
    fn cancelled_maps_to_timeout() {
        assert!(matches!(
            transfer_error(TransferError::Cancelled),
            Error::Timeout
        ));
        assert!(matches!(
            transfer_error(TransferError::Stall),
            Error::Transport(_)
        ));
    }

    #[test]
    fn completion_cancelled_after_partial_data_keeps_bytes() {
        assert_eq!(
            completion_len(&Err(TransferError::Cancelled), 17).unwrap(),
            17
        );
    }

    #[test]
    fn completion_cancelled_without_data_is_timeout() {
        assert!(matches!(
            completion_len(&Err(TransferError::Cancelled), 0),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn completion_stall_is_transport_error() {
        assert!(matches!(
            completion_len(&Err(TransferError::Stall), 0),
            Err(Error::Transport(_))
        ));
        assert!(matches!(
            completion_len(&Err(TransferError::Stall), 12),
            Err(Error::Transport(_))
        ));
    }

    #[test]
    fn completion_ok_returns_actual_len() {
        assert_eq!(completion_len(&Ok(()), 64).unwrap(), 64);
        assert_eq!(completion_len(&Ok(()), 0).unwrap(), 0);
    }

    #[test]
    fn oversized_packet_is_overflow() {
        assert_eq!(fit_read(20, 20).unwrap(), 20);
        assert_eq!(fit_read(0, 20).unwrap(), 0);
        assert!(matches!(
            fit_read(64, 20),
            Err(Error::Transport(m)) if m.starts_with("LIBUSB_ERROR_OVERFLOW")
        ));
    }

    #[tokio::test]
    async fn exited_context_refuses_enumeration() {
        let mut ctx = NusbContext::new();
        ctx.exit().await;
        assert!(matches!(ctx.devices().await, Err(Error::DeviceUnavailable)));
    }

    #[tokio::test]
    async fn closed_handle_is_unavailable() {
        let mut handle = NusbHandle {
            device: None,
            interface: None,
        };
        let mut buf = [0u8; 8];
        assert!(matches!(
            handle
                .bulk_read(0x81, &mut buf, Duration::from_millis(10))
                .await,
            Err(Error::DeviceUnavailable)
        ));
        assert!(matches!(
            handle.claim_interface(0).await,
            Err(Error::DeviceUnavailable)
        ));
        handle.close().await;
    }
}
