// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live channel tests against an in-process WebSocket server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use shelly_lib::protocol::{ChannelState, LiveChannel, LiveChannelConfig, LiveUpdate, Params};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

const DEVICE_ID: &str = "shellyplus1pm-441793d69718";

type ServerSocket = WebSocketStream<tokio::net::TcpStream>;

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let host = listener.local_addr().unwrap().to_string();
    (listener, host)
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

async fn next_request(socket: &mut ServerSocket) -> Value {
    loop {
        match socket.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(_) => panic!("client closed the socket"),
            _ => {}
        }
    }
}

async fn send(socket: &mut ServerSocket, frame: Value) {
    socket.send(Message::text(frame.to_string())).await.unwrap();
}

fn challenge(request: &Value) -> Value {
    let message = json!({
        "auth_type": "digest",
        "nonce": 1_716_556_501_u64,
        "nc": 1,
        "realm": DEVICE_ID,
        "algorithm": "SHA-256"
    });
    json!({
        "id": request["id"],
        "src": DEVICE_ID,
        "dst": request["src"],
        "error": {"code": 401, "message": message.to_string()}
    })
}

fn response(request: &Value, result: Value) -> Value {
    json!({"id": request["id"], "src": DEVICE_ID, "dst": request["src"], "result": result})
}

async fn wait_for(channel: &LiveChannel, state: ChannelState) {
    let mut watch = channel.watch_state();
    tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|s| *s == state))
        .await
        .expect("state not reached in time")
        .unwrap();
}

async fn recv(updates: &mut mpsc::UnboundedReceiver<LiveUpdate>) -> LiveUpdate {
    tokio::time::timeout(Duration::from_secs(5), updates.recv())
        .await
        .expect("no update in time")
        .expect("update channel closed")
}

#[tokio::test]
async fn open_channel_delivers_initial_status_and_pushes() {
    let (listener, host) = listen().await;
    let (tx, mut updates) = mpsc::unbounded_channel();
    let channel = LiveChannel::start(LiveChannelConfig::new(host).with_source("test-host"), tx);

    let mut socket = accept(&listener).await;
    let request = next_request(&mut socket).await;
    assert_eq!(request["method"], "Shelly.GetStatus");
    assert_eq!(request["src"], "test-host");
    assert!(request["id"].as_u64().unwrap() < 10_000);

    send(&mut socket, response(&request, json!({"switch:0": {"id": 0, "output": false}}))).await;
    wait_for(&channel, ChannelState::Ready).await;
    let LiveUpdate::Status(status) = recv(&mut updates).await else {
        panic!("expected the initial status");
    };
    assert_eq!(status["switch:0"]["output"], false);

    send(
        &mut socket,
        json!({"src": DEVICE_ID, "dst": "test-host", "method": "NotifyStatus",
               "params": {"ts": 1_716_556_600.5, "switch:0": {"id": 0, "output": true}}}),
    )
    .await;
    let LiveUpdate::Status(status) = recv(&mut updates).await else {
        panic!("expected a status push");
    };
    assert_eq!(status["switch:0"]["output"], true);

    send(
        &mut socket,
        json!({"src": DEVICE_ID, "dst": "test-host", "method": "NotifyEvent",
               "params": {"ts": 1_716_556_601.0, "events": [{"component": "input:0", "id": 0, "event": "single_push", "ts": 1_716_556_601.0}]}}),
    )
    .await;
    let LiveUpdate::Events(events) = recv(&mut updates).await else {
        panic!("expected an event push");
    };
    assert_eq!(events[0].component, "input:0");
    assert_eq!(events[0].event, "single_push");

    let mut params = Params::new();
    params.insert("id".into(), json!(0));
    params.insert("on".into(), json!(true));
    channel.send_request("Switch.Set", &params).unwrap();
    let command = next_request(&mut socket).await;
    assert_eq!(command["method"], "Switch.Set");
    assert_eq!(command["params"], json!({"id": 0, "on": true}));

    channel.stop();
    channel.stop();
    assert_eq!(channel.state(), ChannelState::Disconnected);
    assert!(channel.send_request("Switch.Set", &params).is_err());
}

#[tokio::test]
async fn digest_handshake_resends_with_auth() {
    let (listener, host) = listen().await;
    let (tx, mut updates) = mpsc::unbounded_channel();
    let channel = LiveChannel::start(
        LiveChannelConfig::new(host).with_password(Some("secret".into())),
        tx,
    );

    let mut socket = accept(&listener).await;
    let first = next_request(&mut socket).await;
    assert!(first.get("auth").is_none());
    send(&mut socket, challenge(&first)).await;

    let second = next_request(&mut socket).await;
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["method"], "Shelly.GetStatus");
    assert_eq!(second["auth"]["realm"], DEVICE_ID);
    assert_eq!(second["auth"]["username"], "admin");
    assert_eq!(second["auth"]["response"].as_str().unwrap().len(), 64);

    send(&mut socket, response(&second, json!({"sys": {"uptime": 12}}))).await;
    wait_for(&channel, ChannelState::Ready).await;
    assert!(matches!(recv(&mut updates).await, LiveUpdate::Status(_)));
    channel.stop();
}

#[tokio::test]
async fn second_challenge_is_terminal() {
    let (listener, host) = listen().await;
    let (tx, mut updates) = mpsc::unbounded_channel();
    let channel = LiveChannel::start(
        LiveChannelConfig::new(host).with_password(Some("wrong".into())),
        tx,
    );

    let mut socket = accept(&listener).await;
    let first = next_request(&mut socket).await;
    send(&mut socket, challenge(&first)).await;
    let second = next_request(&mut socket).await;
    send(&mut socket, challenge(&second)).await;

    wait_for(&channel, ChannelState::Disconnected).await;
    // the socket task ends and drops its sender
    let closed = tokio::time::timeout(Duration::from_secs(5), updates.recv()).await.unwrap();
    assert!(closed.is_none());
}

#[tokio::test]
async fn challenge_without_password_abandons_handshake() {
    let (listener, host) = listen().await;
    let (tx, _updates) = mpsc::unbounded_channel();
    let channel = LiveChannel::start(LiveChannelConfig::new(host), tx);

    let mut socket = accept(&listener).await;
    let first = next_request(&mut socket).await;
    send(&mut socket, challenge(&first)).await;

    wait_for(&channel, ChannelState::Disconnected).await;
    assert_ne!(channel.state(), ChannelState::Ready);
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let (listener, host) = listen().await;
    let (tx, mut updates) = mpsc::unbounded_channel();
    let channel = LiveChannel::start(LiveChannelConfig::new(host), tx);

    let mut socket = accept(&listener).await;
    let request = next_request(&mut socket).await;
    socket.send(Message::text("{not json")).await.unwrap();
    send(&mut socket, json!({"hello": "world"})).await;
    send(&mut socket, response(&request, json!({"switch:0": {"output": true}}))).await;

    wait_for(&channel, ChannelState::Ready).await;
    assert!(matches!(recv(&mut updates).await, LiveUpdate::Status(_)));
    channel.stop();
}
