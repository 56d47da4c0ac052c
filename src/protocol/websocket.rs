// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live update channel for Gen2/Gen3 devices.
//!
//! A persistent WebSocket to `ws://<host>/rpc`. On open the channel asks for
//! `Shelly.GetStatus`; a protected device answers with a 401 error whose
//! message embeds a digest challenge, and the request is sent again with an
//! `auth` object. Once the matching response arrives the channel is
//! [`ChannelState::Ready`].
//!
//! ```text
//! Disconnected -> Connecting -> Open -> (Authenticating) -> Ready -> Disconnected
//! ```
//!
//! Pushes are forwarded as [`LiveUpdate`] values on an unbounded channel:
//! `NotifyStatus`/`NotifyFullStatus` become [`LiveUpdate::Status`],
//! `NotifyEvent` becomes [`LiveUpdate::Events`].
//!
//! The channel never reconnects by itself. When the socket drops the state
//! goes back to `Disconnected` and the owner decides what to do.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::auth;
use crate::error::ProtocolError;
use crate::protocol::DEFAULT_SOURCE;
use crate::protocol::rpc::{
    InboundFrame, NotifyMethod, Params, RpcRequest, UNAUTHORIZED_CODE, WsChallenge,
};

/// Upper bound (exclusive) of handshake request ids.
const REQUEST_ID_BOUND: u32 = 10_000;

/// Method sent right after the socket opens.
const INITIAL_METHOD: &str = "Shelly.GetStatus";

// ── Public types ─────────────────────────────────────────────────────

/// Connection state of a [`LiveChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// No socket.
    Disconnected,
    /// TCP/WebSocket handshake in progress.
    Connecting,
    /// Socket open, initial request sent.
    Open,
    /// Digest answer sent, waiting for the response.
    Authenticating,
    /// Initial response received; pushes flow and requests may be sent.
    Ready,
}

/// A discrete device event, such as a button press.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LiveEvent {
    /// Component key, e.g. `input:0`.
    pub component: String,
    /// Event name, e.g. `single_push`.
    pub event: String,
    /// Device timestamp, if present.
    #[serde(default)]
    pub ts: Option<f64>,
}

/// Something the channel hands over to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    /// Status fragment keyed by `kind:index`.
    Status(Params),
    /// One-shot events, not merged into state.
    Events(Vec<LiveEvent>),
}

/// Configuration of a live channel.
#[derive(Debug, Clone)]
pub struct LiveChannelConfig {
    host: String,
    password: Option<String>,
    source: String,
    connect_timeout: Duration,
}

impl LiveChannelConfig {
    /// Default connect timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for `host` (optionally `host:port`).
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            password: None,
            source: DEFAULT_SOURCE.to_string(),
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the password used to answer digest challenges.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// Sets the source tag.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// WebSocket URL of the device.
    #[must_use]
    pub fn url(&self) -> String {
        let host = self
            .host
            .trim_start_matches("http://")
            .trim_start_matches("ws://")
            .trim_end_matches('/');
        format!("ws://{host}/rpc")
    }
}

// ── Handshake state machine ──────────────────────────────────────────

/// What the socket task must do after feeding a frame to the handshake.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    Send(String),
    Deliver(LiveUpdate),
    Ready,
    Abandon(String),
}

/// Socket-free part of the channel: request matching, the digest
/// handshake and push dispatch.
#[derive(Debug)]
pub(crate) struct Handshake {
    source: String,
    password: Option<String>,
    request_id: u32,
    state: ChannelState,
    auth_sent: bool,
}

impl Handshake {
    pub(crate) fn new(source: String, password: Option<String>, request_id: u32) -> Self {
        Self {
            source,
            password,
            request_id,
            state: ChannelState::Connecting,
            auth_sent: false,
        }
    }

    pub(crate) fn state(&self) -> ChannelState {
        self.state
    }

    /// Moves to `Open` and returns the initial request frame.
    pub(crate) fn on_open(&mut self) -> Result<String, ProtocolError> {
        self.state = ChannelState::Open;
        let params = Params::new();
        RpcRequest::new(self.request_id, &self.source, INITIAL_METHOD, &params).to_json()
    }

    fn is_ours(&self, id: Option<u64>, dst: Option<&str>) -> bool {
        id == Some(u64::from(self.request_id)) && dst == Some(self.source.as_str())
    }

    /// Feeds one text frame. Malformed frames yield no action.
    pub(crate) fn on_text(&mut self, text: &str) -> Vec<Action> {
        let frame = match InboundFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed websocket frame");
                return Vec::new();
            }
        };

        match frame {
            InboundFrame::Error { id, dst, error, .. }
                if self.is_ours(id, dst.as_deref()) && error.code == UNAUTHORIZED_CODE =>
            {
                self.on_challenge(&error.message)
            }
            InboundFrame::Error { id, error, .. } => {
                tracing::warn!(?id, code = error.code, message = %error.message, "Device returned an RPC error");
                Vec::new()
            }
            InboundFrame::Response { id, dst, result, .. } if self.is_ours(id, dst.as_deref()) => {
                self.state = ChannelState::Ready;
                let mut actions = vec![Action::Ready];
                if let Value::Object(status) = result {
                    actions.push(Action::Deliver(LiveUpdate::Status(status)));
                }
                actions
            }
            InboundFrame::Response { id, .. } => {
                tracing::debug!(?id, "Ignoring response to another request");
                Vec::new()
            }
            InboundFrame::Notification { dst, method, params, .. }
                if dst.as_deref() == Some(self.source.as_str()) =>
            {
                Self::on_notification(&method, params)
            }
            InboundFrame::Notification { src, dst, method, .. } => {
                tracing::debug!(?src, ?dst, ?method, "Ignoring push addressed to another client");
                Vec::new()
            }
            InboundFrame::Unknown(value) => {
                tracing::warn!(frame = %value, "Unknown websocket message");
                Vec::new()
            }
        }
    }

    fn on_challenge(&mut self, message: &str) -> Vec<Action> {
        if self.auth_sent {
            self.state = ChannelState::Disconnected;
            return vec![Action::Abandon(
                ProtocolError::AuthenticationFailed.to_string(),
            )];
        }
        let Some(password) = self.password.as_deref() else {
            self.state = ChannelState::Disconnected;
            return vec![Action::Abandon(
                ProtocolError::CredentialsRequired.to_string(),
            )];
        };
        let challenge = match WsChallenge::parse(message) {
            Ok(challenge) => challenge,
            Err(e) => {
                self.state = ChannelState::Disconnected;
                return vec![Action::Abandon(e.to_string())];
            }
        };

        let digest = auth::compute_digest_response(
            auth::DIGEST_USERNAME,
            password,
            challenge.nonce,
            auth::random_cnonce(),
            &challenge.realm,
            challenge.nc,
        );
        let params = Params::new();
        match RpcRequest::new(self.request_id, &self.source, INITIAL_METHOD, &params)
            .with_auth(&digest)
            .to_json()
        {
            Ok(frame) => {
                self.state = ChannelState::Authenticating;
                self.auth_sent = true;
                vec![Action::Send(frame)]
            }
            Err(e) => {
                self.state = ChannelState::Disconnected;
                vec![Action::Abandon(e.to_string())]
            }
        }
    }

    fn on_notification(method: &NotifyMethod, params: Value) -> Vec<Action> {
        match (method, params) {
            (NotifyMethod::Status | NotifyMethod::FullStatus, Value::Object(status)) => {
                vec![Action::Deliver(LiveUpdate::Status(status))]
            }
            (NotifyMethod::Event, params) => {
                let events = params
                    .get("events")
                    .cloned()
                    .map(serde_json::from_value::<Vec<LiveEvent>>);
                match events {
                    Some(Ok(events)) if !events.is_empty() => {
                        vec![Action::Deliver(LiveUpdate::Events(events))]
                    }
                    Some(Ok(_)) => Vec::new(),
                    _ => {
                        tracing::debug!("Dropping NotifyEvent without a valid events list");
                        Vec::new()
                    }
                }
            }
            (method, _) => {
                tracing::warn!(?method, "Unknown websocket notification");
                Vec::new()
            }
        }
    }
}

// ── LiveChannel ──────────────────────────────────────────────────────

/// Handle to a running live channel.
///
/// Dropping the handle does not close the socket; call [`stop`](Self::stop).
#[derive(Debug)]
pub struct LiveChannel {
    source: String,
    state: watch::Receiver<ChannelState>,
    state_tx: watch::Sender<ChannelState>,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    next_id: std::sync::atomic::AtomicU32,
}

impl LiveChannel {
    /// Spawns the socket task and returns immediately.
    ///
    /// Status pushes and events are sent to `updates`. The sender is dropped
    /// when the socket task ends, which closes the receiver.
    #[must_use]
    pub fn start(config: LiveChannelConfig, updates: mpsc::UnboundedSender<LiveUpdate>) -> Self {
        let (state_tx, state) = watch::channel(ChannelState::Connecting);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let request_id = rand::thread_rng().gen_range(0..REQUEST_ID_BOUND);

        let task = SocketTask {
            url: config.url(),
            connect_timeout: config.connect_timeout,
            handshake: Handshake::new(config.source.clone(), config.password, request_id),
            state_tx: state_tx.clone(),
            updates,
            outbound: outbound_rx,
            cancel: cancel.clone(),
        };
        tokio::spawn(task.run());

        Self {
            source: config.source,
            state,
            state_tx,
            outbound,
            cancel,
            next_id: std::sync::atomic::AtomicU32::new(request_id + 1),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Sends a fire-and-forget RPC request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChannelClosed`] unless the channel is ready.
    pub fn send_request(&self, method: &str, params: &Params) -> Result<(), ProtocolError> {
        if self.state() != ChannelState::Ready {
            return Err(ProtocolError::ChannelClosed(format!(
                "live channel is {:?}",
                self.state()
            )));
        }
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let frame = RpcRequest::new(id, &self.source, method, params).to_json()?;
        self.outbound
            .send(frame)
            .map_err(|_| ProtocolError::ChannelClosed("socket task ended".into()))
    }

    /// Closes the socket. Safe to call in any state, any number of times.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(source = %self.source, "Stopping live channel");
        }
        self.cancel.cancel();
        self.state_tx.send_replace(ChannelState::Disconnected);
    }

    /// Returns `true` once [`stop`](Self::stop) was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct SocketTask {
    url: String,
    connect_timeout: Duration,
    handshake: Handshake,
    state_tx: watch::Sender<ChannelState>,
    updates: mpsc::UnboundedSender<LiveUpdate>,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
}

impl SocketTask {
    fn set_state(&self, state: ChannelState) {
        // A stopped channel stays Disconnected
        if self.cancel.is_cancelled() {
            return;
        }
        self.state_tx.send_replace(state);
    }

    async fn run(mut self) {
        tracing::info!(url = %self.url, "Connecting live channel");
        self.set_state(ChannelState::Connecting);

        let connect = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(self.url.as_str()),
        );
        let stream = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            result = connect => match result {
                Ok(Ok((stream, _response))) => Some(stream),
                Ok(Err(e)) => {
                    tracing::warn!(url = %self.url, error = %e, "Live channel connect failed");
                    None
                }
                Err(_) => {
                    tracing::warn!(url = %self.url, "Live channel connect timed out");
                    None
                }
            },
        };
        let Some(stream) = stream else {
            self.state_tx.send_replace(ChannelState::Disconnected);
            return;
        };

        let (mut write, mut read) = stream.split();

        match self.handshake.on_open() {
            Ok(frame) => {
                self.set_state(ChannelState::Open);
                if let Err(e) = write.send(Message::text(frame)).await {
                    tracing::warn!(url = %self.url, error = %e, "Live channel initial send failed");
                    self.state_tx.send_replace(ChannelState::Disconnected);
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot encode initial request");
                self.state_tx.send_replace(ChannelState::Disconnected);
                return;
            }
        }

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
                Some(frame) = self.outbound.recv() => {
                    tracing::debug!(url = %self.url, frame = %frame, "Sending live channel request");
                    if let Err(e) = write.send(Message::text(frame)).await {
                        tracing::warn!(url = %self.url, error = %e, "Live channel send failed");
                        break;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !self.apply(&mut write, text.as_str()).await {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite answers pings itself
                        tracing::trace!("Live channel ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(url = %self.url, ?frame, "Live channel closed by device");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(url = %self.url, error = %e, "Live channel read failed");
                        break;
                    }
                    None => {
                        tracing::info!(url = %self.url, "Live channel stream ended");
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }

        self.state_tx.send_replace(ChannelState::Disconnected);
        tracing::debug!(url = %self.url, "Live channel task exiting");
    }

    /// Runs the handshake on one frame. Returns `false` when the connection
    /// must be closed.
    async fn apply<S>(&mut self, write: &mut S, text: &str) -> bool
    where
        S: futures_util::Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        for action in self.handshake.on_text(text) {
            match action {
                Action::Send(frame) => {
                    self.set_state(self.handshake.state());
                    if let Err(e) = write.send(Message::text(frame)).await {
                        tracing::warn!(url = %self.url, error = %e, "Live channel auth send failed");
                        return false;
                    }
                }
                Action::Ready => {
                    tracing::info!(url = %self.url, "Live channel ready");
                    self.set_state(ChannelState::Ready);
                }
                Action::Deliver(update) => {
                    if self.updates.send(update).is_err() {
                        tracing::debug!(url = %self.url, "Live update receiver dropped");
                        return false;
                    }
                }
                Action::Abandon(reason) => {
                    tracing::error!(url = %self.url, reason = %reason, "Live channel handshake abandoned");
                    return false;
                }
            }
        }
        true
    }
}
