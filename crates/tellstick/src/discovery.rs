//! Locating Tellstick devices among enumerated USB devices.
//!
//! Enumeration yields a lazy [`DeviceList`]; selection is an ordinary
//! iterator search, so the caller's predicate decides where iteration stops.

use tracing::debug;

use tellstick_core::error::{Error, Result};
use tellstick_core::transport::{DeviceList, UsbContext};
use tellstick_core::DeviceCandidate;

use crate::models::Model;

/// Return the first device accepted by `predicate`.
///
/// Iteration stops at the first match; later devices are never inspected.
pub fn find_device<P>(mut devices: DeviceList, mut predicate: P) -> Option<DeviceCandidate>
where
    P: FnMut(&DeviceCandidate) -> bool,
{
    devices.find(|candidate| predicate(candidate))
}

/// All attached Tellsticks with their models.
pub async fn list_devices(context: &mut dyn UsbContext) -> Result<Vec<(DeviceCandidate, Model)>> {
    let devices = context.devices().await?;
    Ok(devices
        .filter_map(|candidate| Model::from_candidate(&candidate).map(|model| (candidate, model)))
        .collect())
}

/// Pick the device a session should open.
///
/// Without a serial filter the first supported device wins, even if another
/// process already uses it. With a filter, only a supported device reporting
/// exactly that serial number matches.
pub(crate) async fn select_device(
    context: &mut dyn UsbContext,
    serial: Option<&str>,
) -> Result<(DeviceCandidate, Model)> {
    let devices = context.devices().await?;
    let candidate = find_device(devices, |candidate| {
        Model::from_candidate(candidate).is_some()
            && serial.is_none_or(|wanted| candidate.serial.as_deref() == Some(wanted))
    })
    .ok_or(Error::NoDevice)?;

    let model = Model::from_candidate(&candidate).ok_or(Error::NoDevice)?;
    debug!(device = %candidate, %model, "selected Tellstick");
    Ok((candidate, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TELLDUS_VENDOR_ID;
    use tellstick_test_harness::{MockUsb, mock_candidate};

    fn list(candidates: Vec<DeviceCandidate>) -> DeviceList {
        Box::new(candidates.into_iter())
    }

    #[test]
    fn find_device_stops_at_first_match() {
        let mut inspected = 0;
        let found = find_device(
            list(vec![
                mock_candidate(0x0403, 0x6001, "ftdi"),
                mock_candidate(TELLDUS_VENDOR_ID, 0x0c30, "first"),
                mock_candidate(TELLDUS_VENDOR_ID, 0x0c31, "second"),
            ]),
            |c| {
                inspected += 1;
                c.vendor_id == TELLDUS_VENDOR_ID
            },
        );
        assert_eq!(found.unwrap().serial.as_deref(), Some("first"));
        assert_eq!(inspected, 2);
    }

    #[test]
    fn find_device_none() {
        assert!(find_device(list(Vec::new()), |_| true).is_none());
    }

    #[tokio::test]
    async fn list_devices_filters_unsupported() {
        let mock = MockUsb::new();
        mock.add_device(mock_candidate(0x0403, 0x6001, "ftdi"));
        mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c31, "duo"));
        mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c30, "classic"));

        let mut ctx = mock.context();
        let found = list_devices(ctx.as_mut()).await.unwrap();
        let models: Vec<Model> = found.iter().map(|(_, m)| *m).collect();
        assert_eq!(models, vec![Model::Duo, Model::Classic]);
    }

    #[tokio::test]
    async fn select_first_supported() {
        let mock = MockUsb::new();
        mock.add_device(mock_candidate(0x0403, 0x6001, "ftdi"));
        mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c30, "classic"));
        mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c31, "duo"));

        let mut ctx = mock.context();
        let (candidate, model) = select_device(ctx.as_mut(), None).await.unwrap();
        assert_eq!(model, Model::Classic);
        assert_eq!(candidate.serial.as_deref(), Some("classic"));
    }

    #[tokio::test]
    async fn select_by_serial() {
        let mock = MockUsb::new();
        mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c30, "classic"));
        mock.add_device(mock_candidate(TELLDUS_VENDOR_ID, 0x0c31, "duo"));

        let mut ctx = mock.context();
        let (_, model) = select_device(ctx.as_mut(), Some("duo")).await.unwrap();
        assert_eq!(model, Model::Duo);
    }

    #[tokio::test]
    async fn select_no_device() {
        let mock = MockUsb::new();
        mock.add_device(mock_candidate(0x0403, 0x6001, "ftdi"));

        let mut ctx = mock.context();
        assert!(matches!(
            select_device(ctx.as_mut(), None).await,
            Err(Error::NoDevice)
        ));
        assert!(matches!(
            select_device(ctx.as_mut(), Some("missing")).await,
            Err(Error::NoDevice)
        ));
    }

    #[tokio::test]
    async fn select_propagates_enumeration_error() {
        let mock = MockUsb::new();
        mock.fail_enumeration("LIBUSB_ERROR_NO_MEM");

        let mut ctx = mock.context();
        assert!(matches!(
            select_device(ctx.as_mut(), None).await,
            Err(Error::Transport(_))
        ));
    }
}
