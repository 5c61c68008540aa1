//! Newline-delimited message extraction from the session read buffer.
//!
//! The Tellstick firmware terminates every message with `\r\n`. After each
//! poll commits new bytes, [`extract_lines`] pulls out every complete line and
//! leaves a trailing partial line in the buffer for the next poll.

use tellstick_core::ByteWindow;

/// Byte that terminates a message.
pub const NEWLINE: u8 = b'\n';

const CARRIAGE_RETURN: u8 = b'\r';

/// What to do with a carriage return immediately before the newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinePolicy {
    /// Emit everything before the newline, including any `\r`.
    #[default]
    KeepCarriageReturn,
    /// Also drop a single `\r` right before the newline, if present.
    StripCarriageReturn,
}

/// Find the first complete line in `buf`.
///
/// Returns the message bytes and the number of bytes to consume (message
/// plus terminator), or `None` when `buf` holds no newline yet.
pub fn next_line(buf: &[u8], policy: LinePolicy) -> Option<(&[u8], usize)> {
    let idx = buf.iter().position(|&b| b == NEWLINE)?;
    let mut line = &buf[..idx];
    if policy == LinePolicy::StripCarriageReturn {
        if let Some(stripped) = line.strip_suffix(&[CARRIAGE_RETURN]) {
            line = stripped;
        }
    }
    Some((line, idx + 1))
}

/// Drain every complete line from the front of `window`.
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected.
pub fn extract_lines(window: &mut ByteWindow, policy: LinePolicy) -> Vec<String> {
    let mut messages = Vec::new();
    while let Some((line, consumed)) = next_line(window.as_slice(), policy) {
        messages.push(String::from_utf8_lossy(line).into_owned());
        window.shift_left(consumed);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(data: &[u8]) -> ByteWindow {
        let mut w = ByteWindow::new(64);
        append(&mut w, data);
        w
    }

    fn append(w: &mut ByteWindow, data: &[u8]) {
        let free = w.free_space().unwrap();
        free[..data.len()].copy_from_slice(data);
        w.grow(data.len());
    }

    #[test]
    fn next_line_none_without_newline() {
        assert_eq!(next_line(b"+V2", LinePolicy::default()), None);
        assert_eq!(next_line(b"", LinePolicy::default()), None);
    }

    #[test]
    fn next_line_keeps_carriage_return_by_default() {
        assert_eq!(
            next_line(b"+V2\r\nrest", LinePolicy::KeepCarriageReturn),
            Some((&b"+V2\r"[..], 5))
        );
    }

    #[test]
    fn next_line_strip_policy() {
        assert_eq!(
            next_line(b"+V2\r\n", LinePolicy::StripCarriageReturn),
            Some((&b"+V2"[..], 5))
        );
        // Nothing to strip.
        assert_eq!(
            next_line(b"+V2\n", LinePolicy::StripCarriageReturn),
            Some((&b"+V2"[..], 4))
        );
        // Leading newline yields an empty message under either policy.
        assert_eq!(
            next_line(b"\n", LinePolicy::StripCarriageReturn),
            Some((&b""[..], 1))
        );
    }

    #[test]
    fn extract_across_polls() {
        let mut w = window_with(b"A\nBB\nCCC");
        assert_eq!(extract_lines(&mut w, LinePolicy::default()), vec!["A", "BB"]);
        assert_eq!(w.as_slice(), b"CCC");

        append(&mut w, b"\n");
        assert_eq!(extract_lines(&mut w, LinePolicy::default()), vec!["CCC"]);
        assert!(w.is_empty());
    }

    #[test]
    fn extract_nothing_without_newline() {
        let mut w = window_with(b"+W");
        assert!(extract_lines(&mut w, LinePolicy::default()).is_empty());
        assert_eq!(w.as_slice(), b"+W");
    }

    #[test]
    fn extract_empty_lines() {
        let mut w = window_with(b"\n\nX\n");
        assert_eq!(
            extract_lines(&mut w, LinePolicy::default()),
            vec!["", "", "X"]
        );
        assert!(w.is_empty());
    }

    #[test]
    fn extract_crlf_with_each_policy() {
        let mut w = window_with(b"+Wclass:command;protocol:arctech\r\n");
        assert_eq!(
            extract_lines(&mut w, LinePolicy::KeepCarriageReturn),
            vec!["+Wclass:command;protocol:arctech\r"]
        );

        let mut w = window_with(b"+Wclass:command;protocol:arctech\r\n");
        assert_eq!(
            extract_lines(&mut w, LinePolicy::StripCarriageReturn),
            vec!["+Wclass:command;protocol:arctech"]
        );
    }

    #[test]
    fn extract_lossy_utf8() {
        let mut w = window_with(&[b'o', 0xFF, b'k', b'\n']);
        assert_eq!(
            extract_lines(&mut w, LinePolicy::default()),
            vec!["o\u{FFFD}k"]
        );
    }
}
