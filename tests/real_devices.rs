// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests against real Shelly devices.
//!
//! These tests require real devices on the network and are ignored by default.
//! Run with: `cargo test --test real_devices -- --ignored --test-threads=1`
//!
//! # Environment Variables
//!
//! For each device (`GEN1_SWITCH`, `GEN2_SWITCH`), set:
//! - `{DEVICE}_IP` - Device IP address
//! - `{DEVICE}_PASSWORD` - Device password (optional)
//!
//! # Example
//!
//! ```bash
//! export GEN1_SWITCH_IP=192.168.1.50
//! export GEN2_SWITCH_IP=192.168.1.51
//! export GEN2_SWITCH_PASSWORD=secret
//! cargo test --test real_devices -- --ignored --test-threads=1
//! ```

use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shelly_lib::protocol::ChannelState;
use shelly_lib::{Device, DeviceOptions, Subscribable};
use tokio::time::sleep;

/// Device configuration loaded from environment variables.
struct DeviceConfig {
    ip: String,
    password: Option<String>,
}

impl DeviceConfig {
    fn from_env(prefix: &str) -> Self {
        Self {
            ip: env::var(format!("{prefix}_IP")).unwrap_or_else(|_| panic!("{prefix}_IP not set")),
            password: env::var(format!("{prefix}_PASSWORD")).ok(),
        }
    }

    fn options(&self) -> DeviceOptions {
        let options = DeviceOptions::default().with_live_channel_delay(Duration::from_millis(100));
        match &self.password {
            Some(password) => options.with_password(password.clone()),
            None => options,
        }
    }
}

fn first_switch(device: &Device) -> String {
    device
        .components()
        .into_iter()
        .find(|c| c.capabilities().switchable)
        .map(|c| c.id().to_string())
        .expect("device has no switchable component")
}

#[tokio::test]
#[ignore = "requires a real Gen1 device"]
async fn gen1_toggle_round_trip() {
    let config = DeviceConfig::from_env("GEN1_SWITCH");
    let device = Device::create(&config.ip, config.options()).await.unwrap();
    let switch = first_switch(&device);
    let before = device.component(&switch).unwrap().state();

    device.toggle(&switch).await.unwrap();
    sleep(Duration::from_millis(500)).await;
    device.fetch_update().await.unwrap();
    assert_ne!(device.component(&switch).unwrap().state(), before);

    device.toggle(&switch).await.unwrap();
    device.destroy();
}

#[tokio::test]
#[ignore = "requires a real Gen2/Gen3 device"]
async fn gen2_live_channel_reports_toggle() {
    let config = DeviceConfig::from_env("GEN2_SWITCH");
    let device = Device::create(&config.ip, config.options()).await.unwrap();
    let switch = first_switch(&device);

    for _ in 0..50 {
        if device.live_channel_state() == Some(ChannelState::Ready) {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(device.live_channel_state(), Some(ChannelState::Ready));

    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    device.on_update(move |update| {
        if update.property == "state" {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    device.toggle(&switch).await.unwrap();
    sleep(Duration::from_secs(2)).await;
    assert!(updates.load(Ordering::SeqCst) >= 1);

    device.toggle(&switch).await.unwrap();
    device.destroy();
}
