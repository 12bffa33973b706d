use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the murmur membership service
#[derive(Debug)]
pub enum MurmurError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Membership store errors
    Membership(String),

    /// Gossip protocol errors
    Gossip(GossipError),

    /// System I/O errors
    Io(std::io::Error),

    /// Transport layer errors
    Transport(String),

    /// Serialization/deserialization errors
    Serialization(SerializationError),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),

    /// API/HTTP related errors
    Api(String),
}

/// Gossip protocol specific errors
#[derive(Debug)]
pub enum GossipError {
    /// Malformed or unsupported packet
    Message(String),

    /// Packet addressed to a different cluster
    ClusterMismatch { expected: String, received: String },

    /// Scheduler errors
    Scheduler(String),

    /// Shutdown sequence aborted
    Shutdown(String),
}

/// Serialization related errors
#[derive(Debug)]
pub enum SerializationError {
    /// JSON serialization/deserialization errors
    Json(serde_json::Error),
}

impl fmt::Display for MurmurError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MurmurError::Config(msg) => write!(f, "Configuration error: {}", msg),
            MurmurError::Membership(msg) => write!(f, "Membership error: {}", msg),
            MurmurError::Gossip(err) => write!(f, "Gossip error: {}", err),
            MurmurError::Io(err) => write!(f, "I/O error: {}", err),
            MurmurError::Transport(msg) => write!(f, "Transport error: {}", msg),
            MurmurError::Serialization(err) => write!(f, "Serialization error: {}", err),
            MurmurError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
            MurmurError::Api(msg) => write!(f, "API error: {}", msg),
        }
    }
}

impl fmt::Display for GossipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GossipError::Message(msg) => write!(f, "Message: {}", msg),
            GossipError::ClusterMismatch { expected, received } => write!(
                f,
                "Cluster mismatch: expected '{}', received '{}'",
                expected, received
            ),
            GossipError::Scheduler(msg) => write!(f, "Scheduler: {}", msg),
            GossipError::Shutdown(msg) => write!(f, "Shutdown: {}", msg),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::Json(err) => write!(f, "JSON: {}", err),
        }
    }
}

impl std::error::Error for MurmurError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MurmurError::Io(err) => Some(err),
            MurmurError::Serialization(SerializationError::Json(err)) => Some(err),
            MurmurError::Gossip(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for GossipError {}
impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::Json(err) => Some(err),
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, MurmurError>;

// Axum IntoResponse implementation for HTTP error responses
impl IntoResponse for MurmurError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl MurmurError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MurmurError::Config(_) => StatusCode::BAD_REQUEST,
            MurmurError::Membership(_) => StatusCode::NOT_FOUND,
            MurmurError::Gossip(_) => StatusCode::SERVICE_UNAVAILABLE,
            MurmurError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MurmurError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
            MurmurError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MurmurError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MurmurError::Api(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            MurmurError::Config(_) => "configuration_error",
            MurmurError::Membership(_) => "membership_error",
            MurmurError::Gossip(_) => "gossip_error",
            MurmurError::Io(_) => "io_error",
            MurmurError::Transport(_) => "transport_error",
            MurmurError::Serialization(_) => "serialization_error",
            MurmurError::Concurrency(_) => "concurrency_error",
            MurmurError::Api(_) => "api_error",
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for MurmurError {
    fn from(err: std::io::Error) -> Self {
        MurmurError::Io(err)
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(err: serde_json::Error) -> Self {
        MurmurError::Serialization(SerializationError::Json(err))
    }
}

impl From<GossipError> for MurmurError {
    fn from(err: GossipError) -> Self {
        MurmurError::Gossip(err)
    }
}

impl From<SerializationError> for MurmurError {
    fn from(err: SerializationError) -> Self {
        MurmurError::Serialization(err)
    }
}

impl From<std::net::AddrParseError> for MurmurError {
    fn from(err: std::net::AddrParseError) -> Self {
        MurmurError::Config(format!("Invalid address: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::MurmurError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MurmurError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! membership_error {
    ($msg:expr) => {
        $crate::error::MurmurError::Membership($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MurmurError::Membership(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::MurmurError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MurmurError::Transport(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! concurrency_error {
    ($msg:expr) => {
        $crate::error::MurmurError::Concurrency($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::MurmurError::Concurrency(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = MurmurError::Config("Invalid port".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: Invalid port");

        let io_err = MurmurError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        assert!(io_err.to_string().contains("I/O error"));

        let mismatch: MurmurError = GossipError::ClusterMismatch {
            expected: "alpha".to_string(),
            received: "beta".to_string(),
        }
        .into();
        assert_eq!(
            mismatch.to_string(),
            "Gossip error: Cluster mismatch: expected 'alpha', received 'beta'"
        );
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let murmur_err: MurmurError = io_err.into();
        assert!(matches!(murmur_err, MurmurError::Io(_)));

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let murmur_err: MurmurError = json_err.into();
        assert_eq!(murmur_err.error_type(), "serialization_error");

        let addr_err = "not-an-addr".parse::<std::net::SocketAddr>().unwrap_err();
        let murmur_err: MurmurError = addr_err.into();
        assert_eq!(murmur_err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Port {} is invalid", 65536);
        assert_eq!(
            err.to_string(),
            "Configuration error: Port 65536 is invalid"
        );

        let err = transport_error!("socket closed");
        assert_eq!(err.to_string(), "Transport error: socket closed");
        assert_eq!(err.error_type(), "transport_error");
    }
}
