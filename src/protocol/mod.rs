// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transports for talking to Shelly devices.
//!
//! # Transports
//!
//! - [`HttpClient`]: request/response calls with the two-phase auth flow.
//!   Gen1 uses `POST /<method>` with URL-encoded parameters, Gen2/Gen3 use
//!   `POST /rpc` with a JSON-RPC envelope.
//! - [`LiveChannel`]: persistent WebSocket to `ws://<host>/rpc` on Gen2/Gen3
//!   devices, delivering `NotifyStatus`/`NotifyEvent` pushes.
//!
//! The [`rpc`] module holds the envelope and frame codecs shared by both.

mod http;
pub mod rpc;
mod websocket;

use std::future::Future;

pub use http::{Credentials, HttpClient, HttpConfig};
pub use rpc::Params;
pub use websocket::{ChannelState, LiveChannel, LiveChannelConfig, LiveEvent, LiveUpdate};

use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::Generation;

/// Default source tag sent in the `src` field of RPC frames.
pub const DEFAULT_SOURCE: &str = "shelly_lib";

/// Request/response transport used by devices.
///
/// [`HttpClient`] is the production implementation. The trait exists so a
/// device can be driven by any transport that speaks the same calls.
pub trait Transport: Send + Sync + 'static {
    /// Fetches the `/shelly` identity payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device cannot be reached or answers
    /// with something other than JSON.
    fn fetch_identity(&self) -> impl Future<Output = Result<Value, ProtocolError>> + Send;

    /// Calls `method` with `params` using the wire format of `generation`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` on network, status, auth or decode failures.
    fn call(
        &self,
        method: &str,
        params: &Params,
        generation: Generation,
    ) -> impl Future<Output = Result<Value, ProtocolError>> + Send;
}
