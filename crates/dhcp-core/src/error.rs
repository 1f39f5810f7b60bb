//! Error types for the DHCP sync system
//!
//! This module defines all error types used throughout the crate.

use std::net::IpAddr;

use thiserror::Error;

use crate::model::TargetKind;

/// Result type alias for DHCP sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DHCP sync system
#[derive(Error, Debug)]
pub enum Error {
    /// The identity or target store cannot be reached or read
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A target with this IP is already registered for the variant
    #[error("Duplicate IP: {kind} {ip} is already registered")]
    DuplicateIp {
        /// Which target variant rejected the registration
        kind: TargetKind,
        /// The conflicting address
        ip: IpAddr,
    },

    /// The push transport failed to deliver entries to a target
    #[error("Push to {target} failed: {message}")]
    PushFailed {
        /// Target DHCP server
        target: IpAddr,
        /// Transport error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Broken internal contract (a defect, not a runtime condition)
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a duplicate-IP error
    pub fn duplicate_ip(kind: TargetKind, ip: IpAddr) -> Self {
        Self::DuplicateIp { kind, ip }
    }

    /// Create a push failure for a target
    pub fn push_failed(target: IpAddr, message: impl Into<String>) -> Self {
        Self::PushFailed {
            target,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal (contract violation) error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error means the backing store could not be used
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(raw)?)
    }

    #[test]
    fn test_source_errors_keep_their_variant() {
        assert!(matches!(parse("{ not json"), Err(Error::Json(_))));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_store_unavailable());
    }
}
