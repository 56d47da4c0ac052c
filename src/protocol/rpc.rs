// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON-RPC envelope and inbound frame codecs.
//!
//! Gen2/Gen3 devices accept `{jsonrpc, id, src, method, params, auth}` both
//! over `POST /rpc` and over the WebSocket. Inbound WebSocket frames are one
//! of three shapes, told apart by which fields are present:
//!
//! | shape        | fields                        |
//! |--------------|-------------------------------|
//! | response     | `id`, `src`, `dst`, `result`  |
//! | error        | `id`, `src`, `dst`, `error`   |
//! | notification | `src`, `dst`, `method`, `params` |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::DigestAuth;
use crate::error::ProtocolError;

/// Call parameters, keyed by name.
pub type Params = Map<String, Value>;

/// JSON-RPC protocol version sent on every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Vendor error code signalling a digest challenge.
pub const UNAUTHORIZED_CODE: i64 = 401;

/// Outgoing request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    jsonrpc: &'static str,
    /// Request id, echoed back by the device.
    pub id: u32,
    /// Source tag, echoed back as `dst`.
    pub src: &'a str,
    /// Method name, e.g. `Switch.Set`.
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<&'a Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a DigestAuth>,
}

impl<'a> RpcRequest<'a> {
    /// Builds an envelope. Empty parameter maps are omitted from the wire.
    #[must_use]
    pub fn new(id: u32, src: &'a str, method: &'a str, params: &'a Params) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            src,
            method,
            params: (!params.is_empty()).then_some(params),
            auth: None,
        }
    }

    /// Attaches digest credentials.
    #[must_use]
    pub fn with_auth(mut self, auth: &'a DigestAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Serializes the envelope to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidResponse` if serialization fails,
    /// which only happens for non-string map keys.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::InvalidResponse(e.to_string()))
    }
}

/// Error object carried by an RPC response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorBody {
    /// Vendor error code (401 for auth challenges).
    pub code: i64,
    /// Message. For 401 it holds a JSON-encoded [`WsChallenge`].
    #[serde(default)]
    pub message: String,
}

/// Pulls the `result` out of an HTTP RPC response body.
///
/// # Errors
///
/// Returns [`ProtocolError::Rpc`] for an `error` object and
/// [`ProtocolError::MissingResult`] when neither field is present.
pub fn extract_result(mut body: Value) -> Result<Value, ProtocolError> {
    if let Some(result) = body.get_mut("result") {
        return Ok(result.take());
    }
    if let Some(error) = body.get("error") {
        let error: RpcErrorBody = serde_json::from_value(error.clone())
            .map_err(|e| ProtocolError::InvalidResponse(e.to_string()))?;
        return Err(ProtocolError::Rpc {
            code: error.code,
            message: error.message,
        });
    }
    Err(ProtocolError::MissingResult)
}

/// Digest challenge embedded in a 401 error message on the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WsChallenge {
    /// Usually `digest`.
    #[serde(default)]
    pub auth_type: String,
    /// Server nonce.
    pub nonce: u64,
    /// Nonce counter.
    #[serde(default = "default_nc")]
    pub nc: u32,
    /// Realm (device id).
    pub realm: String,
    /// Hash algorithm, `SHA-256`.
    #[serde(default)]
    pub algorithm: String,
}

fn default_nc() -> u32 {
    1
}

impl WsChallenge {
    /// Parses the JSON text stored in an error message.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedHeader` if the message is not a
    /// challenge object.
    pub fn parse(message: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(message)
            .map_err(|e| ProtocolError::MalformedHeader(format!("websocket challenge: {e}")))
    }
}

/// Server push methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyMethod {
    /// Partial status change.
    Status,
    /// Complete status snapshot.
    FullStatus,
    /// Discrete events (button pushes, ...).
    Event,
    /// Anything else the firmware sends.
    Other(String),
}

impl From<&str> for NotifyMethod {
    fn from(value: &str) -> Self {
        match value {
            "NotifyStatus" => Self::Status,
            "NotifyFullStatus" => Self::FullStatus,
            "NotifyEvent" => Self::Event,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A decoded inbound WebSocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Answer to a request.
    Response {
        /// Echoed request id.
        id: Option<u64>,
        /// Device id.
        src: Option<String>,
        /// Our source tag.
        dst: Option<String>,
        /// Result payload.
        result: Value,
    },
    /// Error answer to a request.
    Error {
        /// Echoed request id.
        id: Option<u64>,
        /// Device id.
        src: Option<String>,
        /// Our source tag.
        dst: Option<String>,
        /// Error body.
        error: RpcErrorBody,
    },
    /// Unsolicited push.
    Notification {
        /// Device id.
        src: Option<String>,
        /// Source tag the push is addressed to.
        dst: Option<String>,
        /// Push kind.
        method: NotifyMethod,
        /// Push payload.
        params: Value,
    },
    /// Valid JSON that matches none of the shapes.
    Unknown(Value),
}

#[derive(Deserialize)]
struct RawFrame {
    id: Option<u64>,
    src: Option<String>,
    dst: Option<String>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

impl InboundFrame {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidResponse` if the text is not a JSON
    /// object.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidResponse(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtocolError::InvalidResponse(format!(
                "expected JSON object, got {value}"
            )));
        }
        let raw: RawFrame = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(_) => return Ok(Self::Unknown(value)),
        };

        if let Some(error) = raw.error {
            return Ok(Self::Error {
                id: raw.id,
                src: raw.src,
                dst: raw.dst,
                error,
            });
        }
        if let Some(result) = raw.result {
            return Ok(Self::Response {
                id: raw.id,
                src: raw.src,
                dst: raw.dst,
                result,
            });
        }
        if let Some(method) = raw.method {
            return Ok(Self::Notification {
                src: raw.src,
                dst: raw.dst,
                method: NotifyMethod::from(method.as_str()),
                params: raw.params,
            });
        }
        Ok(Self::Unknown(value))
    }
}
