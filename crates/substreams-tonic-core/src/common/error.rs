//! Error types for the substreams client.
//!
//! This module defines the central `Error` enum covering every way a run can
//! fail, from configuration through mid-stream transport failures. None of the
//! variants are retried: each one terminates the run.
//!
//! ## Error Cases
//! - `InvalidConfig`: Missing or invalid inputs, detected before any I/O.
//! - `PackageRead` / `PackageDecode`: The package file could not be read or
//!   is not a valid encoded package.
//! - `InvalidEndpoint` / `Connect`: The channel could not be established.
//! - `Unauthenticated`: The service rejected the API token.
//! - `Call`: The `Blocks` call was refused for another reason.
//! - `Stream`: The stream failed after it had started delivering responses.
//! - `Sink`: A response could not be rendered.

use std::path::PathBuf;
use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for a streaming run.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The supplied configuration is unusable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The package file is missing or unreadable.
    #[error("Failed to read package {}: {source}", .path.display())]
    PackageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The package file is not a valid encoded package.
    #[error("Failed to decode package {}: {source}", .path.display())]
    PackageDecode {
        path: PathBuf,
        #[source]
        source: prost::DecodeError,
    },

    /// The endpoint could not be turned into a URI.
    #[error("Invalid endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// DNS, TCP or TLS failure while establishing the channel.
    #[error("Connection error: {0}")]
    Connect(#[source] tonic::transport::Error),

    /// The service rejected the credentials.
    #[error("Authentication failed: {}", .0.message())]
    Unauthenticated(Status),

    /// The service refused to open the stream.
    #[error("Stream request failed: {} ({:?})", .0.message(), .0.code())]
    Call(Status),

    /// The stream broke after it was established.
    #[error("Stream interrupted: {} ({:?})", .0.message(), .0.code())]
    Stream(Status),

    /// Writing a response to the sink failed.
    #[error("Sink error: {0}")]
    Sink(#[source] std::io::Error),
}

impl Error {
    /// Classifies a status returned while opening the `Blocks` call.
    ///
    /// `UNAUTHENTICATED` and `PERMISSION_DENIED` are reported as
    /// [`Error::Unauthenticated`]; anything else as [`Error::Call`].
    pub fn from_call_status(status: Status) -> Self {
        match status.code() {
            Code::Unauthenticated | Code::PermissionDenied => Self::Unauthenticated(status),
            _ => Self::Call(status),
        }
    }

    /// Classifies a status received after the stream was established.
    ///
    /// Authentication failures keep their own variant; everything else is a
    /// mid-stream [`Error::Stream`].
    pub fn from_stream_status(status: Status) -> Self {
        match status.code() {
            Code::Unauthenticated | Code::PermissionDenied => Self::Unauthenticated(status),
            _ => Self::Stream(status),
        }
    }

    /// Shorthand for [`Error::InvalidConfig`].
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
