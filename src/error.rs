//! Error types for the OpenTherm Follower bridge
//!
//! The reply pipeline itself never fails: every request is answered. These
//! errors only surface at the edges (configuration, command ingestion and
//! strict frame parsing).

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types encountered at the edges of the bridge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Frame text could not be parsed as 8 hex digits
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Configuration value outside its allowed range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Command arrived on a topic the Follower does not handle
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// Command payload could not be interpreted
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Configuration document could not be deserialized
    #[cfg(feature = "serde")]
    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl BridgeError {
    /// Create a new InvalidFrame error
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        BridgeError::InvalidFrame(msg.into())
    }

    /// Create a new InvalidConfig error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        BridgeError::InvalidConfig(msg.into())
    }

    /// Create a new UnknownTopic error
    pub fn unknown_topic(msg: impl Into<String>) -> Self {
        BridgeError::UnknownTopic(msg.into())
    }

    /// Create a new InvalidPayload error
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        BridgeError::InvalidPayload(msg.into())
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::ConfigParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::invalid_config("reply delay 5ms");
        assert_eq!(err.to_string(), "Invalid configuration: reply delay 5ms");

        let err = BridgeError::unknown_topic("status/pump");
        assert!(err.to_string().contains("Unknown topic"));
    }
}
