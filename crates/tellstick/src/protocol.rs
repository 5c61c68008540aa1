//! FTDI bridge-chip protocol: control request codes and bulk framing.
//!
//! The Tellstick talks to the host through an FTDI serial-to-USB bridge.
//! Configuration happens over vendor control transfers (`SIO_*` requests);
//! serial data flows over bulk endpoints. On the IN side the chip prefixes
//! every physical USB packet with two modem/line status bytes, which
//! [`strip_status_bytes`] removes in place before the stream is parsed.
//!
//! # Example
//!
//! ```
//! use tellstick::protocol::{strip_status_bytes, MAX_PACKET_SIZE};
//!
//! // One status header followed by "OK".
//! let mut raw = [0x01, 0x60, b'O', b'K'];
//! let usable = strip_status_bytes(&mut raw, MAX_PACKET_SIZE);
//! assert_eq!(&raw[..usable], b"OK");
//! ```

/// Request type for vendor requests to the device, host-to-device.
pub const FTDI_DEVICE_OUT_REQTYPE: u8 = 0x40;

/// Request type for vendor requests to the device, device-to-host.
pub const FTDI_DEVICE_IN_REQTYPE: u8 = 0xC0;

// SIO request codes.

/// Reset the chip, or purge one of its FIFOs (see the `SIO_RESET_*` values).
pub const SIO_RESET_REQUEST: u8 = 0;
/// Set the DTR/RTS modem control lines.
pub const SIO_SET_MODEM_CTRL_REQUEST: u8 = 1;
/// Set hardware or software flow control.
pub const SIO_SET_FLOW_CTRL_REQUEST: u8 = 2;
/// Program the baud rate divisor.
pub const SIO_SET_BAUDRATE_REQUEST: u8 = 3;
/// Set data bits, parity, and stop bits.
pub const SIO_SET_DATA_REQUEST: u8 = 4;
/// Set the latency timer in milliseconds.
pub const SIO_SET_LATENCY_TIMER_REQUEST: u8 = 9;
/// Read back the latency timer.
pub const SIO_GET_LATENCY_TIMER_REQUEST: u8 = 10;
/// Select the bit-bang mode.
pub const SIO_SET_BITMODE_REQUEST: u8 = 11;

/// `SIO_RESET_REQUEST` value: reset the chip.
pub const SIO_RESET_SIO: u16 = 0;
/// `SIO_RESET_REQUEST` value: purge the RX FIFO.
pub const SIO_RESET_PURGE_RX: u16 = 1;
/// `SIO_RESET_REQUEST` value: purge the TX FIFO.
pub const SIO_RESET_PURGE_TX: u16 = 2;

/// Physical bulk packet size of the full-speed FTDI chips in Tellsticks.
pub const MAX_PACKET_SIZE: usize = 64;

/// Modem status bytes at the start of every IN packet.
pub const STATUS_LEN: usize = 2;

/// Capacity of the session read buffer.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Largest chunk forwarded by a single raw send.
pub const WRITE_CHUNK_SIZE: usize = 512;

/// Number of usable payload bytes credited for a raw transfer of `got` bytes.
///
/// Two status bytes are debited for every full packet and two more for the
/// trailing chunk, whether or not that chunk carried payload. Transfers of
/// `STATUS_LEN` bytes or fewer carry nothing.
pub fn usable_len(got: usize, max_packet_size: usize) -> usize {
    if got <= STATUS_LEN || max_packet_size <= STATUS_LEN {
        return 0;
    }
    let packets = got / max_packet_size;
    got.saturating_sub((packets + 1) * STATUS_LEN)
}

/// Remove the status header of every packet in `raw`, compacting the payload
/// to the front in place.
///
/// `raw` is exactly the bytes one bulk read returned. Full packet `i` moves
/// its payload to offset `i * (max_packet_size - 2)`; a trailing chunk longer
/// than the header follows it. Returns [`usable_len`] for `raw.len()`.
pub fn strip_status_bytes(raw: &mut [u8], max_packet_size: usize) -> usize {
    let got = raw.len();
    if got <= STATUS_LEN || max_packet_size <= STATUS_LEN {
        return 0;
    }

    let payload = max_packet_size - STATUS_LEN;
    let packets = got / max_packet_size;
    let trailing = got % max_packet_size;

    for packet in 0..packets {
        let start = packet * max_packet_size + STATUS_LEN;
        let end = (packet + 1) * max_packet_size;
        raw.copy_within(start..end, packet * payload);
    }
    if trailing > STATUS_LEN {
        let start = packets * max_packet_size + STATUS_LEN;
        raw.copy_within(start..packets * max_packet_size + trailing, packets * payload);
    }

    usable_len(got, max_packet_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a raw transfer from payload chunks, each given a fresh header.
    fn framed(chunks: &[&[u8]]) -> Vec<u8> {
        let mut raw = Vec::new();
        for chunk in chunks {
            raw.extend_from_slice(&[0x31, 0x60]);
            raw.extend_from_slice(chunk);
        }
        raw
    }

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
    }

    #[test]
    fn request_types_are_vendor_device() {
        assert_eq!(FTDI_DEVICE_OUT_REQTYPE, 0x40);
        assert_eq!(FTDI_DEVICE_IN_REQTYPE, 0xC0);
    }

    #[test]
    fn sio_codes() {
        assert_eq!(SIO_RESET_REQUEST, 0);
        assert_eq!(SIO_SET_MODEM_CTRL_REQUEST, 1);
        assert_eq!(SIO_SET_FLOW_CTRL_REQUEST, 2);
        assert_eq!(SIO_SET_BAUDRATE_REQUEST, 3);
        assert_eq!(SIO_SET_DATA_REQUEST, 4);
        assert_eq!(SIO_SET_LATENCY_TIMER_REQUEST, 9);
        assert_eq!(SIO_GET_LATENCY_TIMER_REQUEST, 10);
        assert_eq!(SIO_SET_BITMODE_REQUEST, 11);
        assert_eq!(
            (SIO_RESET_SIO, SIO_RESET_PURGE_RX, SIO_RESET_PURGE_TX),
            (0, 1, 2)
        );
    }

    #[test]
    fn status_only_transfers_are_empty() {
        for got in 0..=STATUS_LEN {
            let mut raw = vec![0x01; got];
            assert_eq!(strip_status_bytes(&mut raw, MAX_PACKET_SIZE), 0);
        }
    }

    #[test]
    fn single_short_packet() {
        let mut raw = framed(&[b"+V2\r\n"]);
        let n = strip_status_bytes(&mut raw, MAX_PACKET_SIZE);
        assert_eq!(n, 5);
        assert_eq!(&raw[..n], b"+V2\r\n");
    }

    #[test]
    fn full_packet_plus_status_only_trailer() {
        let first = payload(62, b'a');
        let mut raw = framed(&[&first, &[]]);
        assert_eq!(raw.len(), 66);

        let n = strip_status_bytes(&mut raw, MAX_PACKET_SIZE);
        assert_eq!(n, 62);
        assert_eq!(&raw[..n], &first[..]);
    }

    #[test]
    fn two_full_packets_and_trailer_payload() {
        let a = payload(62, 0);
        let b = payload(62, 100);
        let c = payload(10, 200);
        let mut raw = framed(&[&a, &b, &c]);
        assert_eq!(raw.len(), 64 + 64 + 12);

        let n = strip_status_bytes(&mut raw, MAX_PACKET_SIZE);
        assert_eq!(n, 140 - 3 * 2);
        let expected: Vec<u8> = [a, b, c].concat();
        assert_eq!(&raw[..n], &expected[..]);
    }

    #[test]
    fn exact_packet_boundary_debits_trailer() {
        // 64 bytes: one full packet and an empty trailing chunk. The trailing
        // debit still applies, so only 60 of the 62 payload bytes count.
        let a = payload(62, 7);
        let mut raw = framed(&[&a]);
        let n = strip_status_bytes(&mut raw, MAX_PACKET_SIZE);
        assert_eq!(n, 60);
        assert_eq!(&raw[..n], &a[..60]);
    }

    #[test]
    fn usable_len_formula() {
        for got in 3..=(MAX_PACKET_SIZE * 4 + 5) {
            let expected = got - (got / MAX_PACKET_SIZE + 1) * 2;
            assert_eq!(usable_len(got, MAX_PACKET_SIZE), expected, "got {got}");
        }
    }

    #[test]
    fn compacted_prefix_matches_payloads() {
        // For every length, the credited bytes are a prefix of the
        // concatenated per-packet payloads.
        for got in 3..=(MAX_PACKET_SIZE * 3) {
            let mut raw: Vec<u8> = (0..got).map(|i| i as u8).collect();
            let expected: Vec<u8> = raw
                .chunks(MAX_PACKET_SIZE)
                .filter(|chunk| chunk.len() > STATUS_LEN)
                .flat_map(|chunk| chunk[STATUS_LEN..].to_vec())
                .collect();

            let n = strip_status_bytes(&mut raw, MAX_PACKET_SIZE);
            assert!(n <= expected.len(), "got {got}");
            assert_eq!(&raw[..n], &expected[..n], "got {got}");
        }
    }

    #[test]
    fn degenerate_packet_size() {
        let mut raw = vec![0u8; 10];
        assert_eq!(strip_status_bytes(&mut raw, 2), 0);
        assert_eq!(usable_len(10, 0), 0);
    }
}
