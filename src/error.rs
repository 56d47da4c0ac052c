// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `shelly_lib` library.
//!
//! Failures are grouped by layer: constrained value construction, property
//! validation inside the component model, transport and authentication,
//! payload parsing, and device lifecycle. Transport errors are always
//! returned as values; nothing in the model layer panics on a bad device.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A constrained value could not be built.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A property write was rejected by the component model.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Transport or authentication failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A device payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Device lifecycle or command failure.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Persisted discovery data could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors related to constrained value types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The value that was provided.
        actual: i64,
    },

    /// A device generation outside 1..=3.
    #[error("unsupported device generation {0}")]
    UnsupportedGeneration(u64),
}

/// Rejection reasons for a component property write.
///
/// A rejected write never touches the stored value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The value has the wrong JSON type for this property.
    #[error("property {key} expects {expected}, got {actual}")]
    WrongType {
        /// Property key.
        key: String,
        /// Expected type description.
        expected: &'static str,
        /// Observed JSON type.
        actual: &'static str,
    },

    /// A numeric value is outside the declared range.
    #[error("property {key} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Property key.
        key: String,
        /// Minimum accepted value.
        min: f64,
        /// Maximum accepted value.
        max: f64,
        /// Offending value.
        value: f64,
    },

    /// An array property has the wrong number of elements.
    #[error("property {key} expects {expected} elements, got {actual}")]
    WrongLength {
        /// Property key.
        key: String,
        /// Expected element count.
        expected: usize,
        /// Observed element count.
        actual: usize,
    },
}

/// Errors raised by the HTTP transport, the live channel and the auth codec.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Connection refused, DNS failure, timeout or similar.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status outside the handled 401 flow.
    #[error("HTTP status {status}")]
    HttpStatus {
        /// The status code returned by the device.
        status: u16,
    },

    /// The device kept answering 401, or no password is configured.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The live channel received an auth challenge but has no password.
    #[error("credentials required by device")]
    CredentialsRequired,

    /// A `www-authenticate` challenge could not be parsed.
    #[error("malformed auth header: {0}")]
    MalformedHeader(String),

    /// Body was not JSON or had an unexpected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// An RPC envelope carried neither `result` nor `error`.
    #[error("RPC response has no result field")]
    MissingResult,

    /// The device answered with an RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Vendor error code.
        code: i64,
        /// Vendor error message.
        message: String,
    },

    /// WebSocket connect or I/O failure.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Invalid URL or host.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Internal channel was closed or the live channel is not ready.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to decoding device payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the payload.
    #[error("missing field in payload: {0}")]
    MissingField(String),

    /// Payload has an unexpected shape.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Errors related to device lifecycle and command dispatch.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The identity fetch failed entirely.
    #[error("device at {host} is unreachable: {reason}")]
    Unreachable {
        /// Host that was probed.
        host: String,
        /// Underlying transport failure.
        reason: String,
    },

    /// No component with that id exists on the device.
    #[error("component {0} not found")]
    ComponentNotFound(String),

    /// The component kind does not support the command.
    #[error("component {component} does not support {command}")]
    UnsupportedCommand {
        /// Component id.
        component: String,
        /// Command verb.
        command: &'static str,
    },

    /// The device was destroyed and no longer accepts calls.
    #[error("device has been destroyed")]
    Destroyed,

    /// Device data or configuration is inconsistent.
    #[error("invalid device configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors from the discovery store and payload cache.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data is not valid JSON for the expected shape.
    #[error("invalid stored data: {0}")]
    Json(#[from] serde_json::Error),

    /// The device id cannot be used as a file name.
    #[error("device id {0:?} is not a valid storage key")]
    InvalidKey(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
