//! Error types for the Tellstick driver.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Transport failures, session lifecycle
//! errors, and configuration errors are all captured here.

/// The error type for all Tellstick operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A USB transport error reported by the backend (libusb/nusb status,
    /// stalled endpoint, disconnected device).
    ///
    /// The message is forwarded verbatim from the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// A USB transfer did not complete before its timeout elapsed.
    #[error("timeout waiting for USB transfer")]
    Timeout,

    /// The session has no live USB handle.
    ///
    /// Returned by every operation attempted after the session was closed or
    /// on a session whose initialization never completed.
    #[error("USB device unavailable")]
    DeviceUnavailable,

    /// Enumeration found no device matching the known vendor/product IDs.
    #[error("no supported device found")]
    NoDevice,

    /// An invalid parameter was passed to the builder or a session call.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An underlying I/O error (e.g. reading an outbound message source).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a benign empty read rather than a real failure.
    ///
    /// Polling callers typically log and re-poll on a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_transport() {
        let e = Error::Transport("LIBUSB_ERROR_PIPE".into());
        assert_eq!(e.to_string(), "transport error: LIBUSB_ERROR_PIPE");
    }

    #[test]
    fn error_display_timeout() {
        assert_eq!(Error::Timeout.to_string(), "timeout waiting for USB transfer");
    }

    #[test]
    fn error_display_device_unavailable() {
        assert_eq!(Error::DeviceUnavailable.to_string(), "USB device unavailable");
    }

    #[test]
    fn error_display_no_device() {
        assert_eq!(Error::NoDevice.to_string(), "no supported device found");
    }

    #[test]
    fn error_display_invalid_parameter() {
        let e = Error::InvalidParameter("max packet size must exceed 2".into());
        assert_eq!(
            e.to_string(),
            "invalid parameter: max packet size must exceed 2"
        );
    }

    #[test]
    fn error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "source drained");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("source drained"));
    }

    #[test]
    fn error_is_timeout() {
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::DeviceUnavailable.is_timeout());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn error_implements_std_error() {
        fn assert_std_error<T: std::error::Error>() {}
        assert_std_error::<Error>();
    }
}
