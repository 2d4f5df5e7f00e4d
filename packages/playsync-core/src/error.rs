//! Centralized error types.

use thiserror::Error;

/// Errors raised while decoding an inbound WebSocket text frame.
///
/// Every variant is handled the same way by the caller: unicast an `error`
/// frame back to the originator and keep the connection open. The frame is
/// never disconnected for a decode failure (see the dispatcher's error
/// handling design).
#[derive(Debug, Error)]
pub enum CodecError {
    /// The frame was not valid JSON, not a JSON object, or lacked a `type` field.
    #[error("Malformed message: {0}")]
    Malformed(&'static str),
}

/// Errors that can occur while starting the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_message_includes_reason() {
        let err = CodecError::Malformed("invalid JSON");
        assert_eq!(err.to_string(), "Malformed message: invalid JSON");
    }

    #[test]
    fn server_error_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: ServerError = io_err.into();
        assert!(err.to_string().starts_with("Failed to bind to port"));
    }
}
