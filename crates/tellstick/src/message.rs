//! Outbound raw messages.
//!
//! A [`Message`] is an opaque, immutable payload handed to
//! [`Session::send`](crate::session::Session::send). The driver attaches no
//! meaning to its bytes; encoding Tellstick commands such as `V+` (firmware
//! version) or `S...+` (send) is the caller's concern.

use bytes::Bytes;

/// An immutable outbound payload.
///
/// Cloning is cheap; the bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Message {
    data: Bytes,
}

impl Message {
    /// Copy `s` into a new message.
    pub fn new(s: &str) -> Self {
        Message {
            data: Bytes::copy_from_slice(s.as_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::new(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message {
            data: Bytes::from(s),
        }
    }
}

impl From<Vec<u8>> for Message {
    fn from(data: Vec<u8>) -> Self {
        Message {
            data: Bytes::from(data),
        }
    }
}

impl From<Bytes> for Message {
    fn from(data: Bytes) -> Self {
        Message { data }
    }
}

impl AsRef<[u8]> for Message {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_copies_string() {
        let m = Message::new("V+");
        assert_eq!(m.as_bytes(), b"V+");
        assert_eq!(m.len(), 2);
        assert!(!m.is_empty());
    }

    #[test]
    fn conversions_agree() {
        let a = Message::from("S$k$k$k$k$k$k$k$k$k$k$k$k+");
        let b = Message::from(String::from("S$k$k$k$k$k$k$k$k$k$k$k$k+"));
        let c = Message::from(b"S$k$k$k$k$k$k$k$k$k$k$k$k+".to_vec());
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn default_is_empty() {
        assert!(Message::default().is_empty());
    }

    #[test]
    fn clone_shares_bytes() {
        let m = Message::from(Bytes::from_static(b"T\x7f\x01+"));
        let n = m.clone();
        assert_eq!(m.as_ref().as_ptr(), n.as_ref().as_ptr());
    }
}
