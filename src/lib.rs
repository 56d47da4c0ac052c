// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `shelly_lib` - A Rust library to discover, authenticate with and track
//! Shelly devices.
//!
//! The library speaks the two wire dialects of the vendor firmware: the
//! REST interface of Gen1 devices and the JSON-RPC interface of Gen2 and
//! Gen3 devices, over HTTP and over the device WebSocket.
//!
//! # Supported Features
//!
//! - **Authentication**: Basic (Gen1) and the vendor SHA-256 digest variant
//!   (Gen2/Gen3), with a single retry on a 401 challenge
//! - **Live updates**: `NotifyStatus`/`NotifyEvent` pushes over the
//!   WebSocket, with a polling fallback driven by a liveness check
//! - **Component model**: typed, validated property bags for switches,
//!   lights, covers, meters and sensors, with change notifications
//! - **Commands**: on/off/toggle, brightness, color and cover control,
//!   translated to the native request of each generation
//! - **Discovery fusion**: records from mDNS, storage and static config
//!   merged by normalized id, with address drift detection
//!
//! # Quick Start
//!
//! ## Single device
//!
//! ```no_run
//! use shelly_lib::{Device, DeviceOptions, Subscribable};
//!
//! #[tokio::main]
//! async fn main() -> shelly_lib::Result<()> {
//!     let device = Device::create("192.168.1.40", DeviceOptions::default()).await?;
//!
//!     device.on_update(|update| {
//!         println!("{}.{} = {}", update.component, update.property, update.value);
//!     });
//!
//!     for component in device.components() {
//!         if component.capabilities().switchable {
//!             device.toggle(component.id()).await?;
//!         }
//!     }
//!
//!     device.destroy();
//!     Ok(())
//! }
//! ```
//!
//! ## Fleet
//!
//! ```no_run
//! use std::sync::Arc;
//! use shelly_lib::discovery::{DiscoveredDevice, FileStore};
//! use shelly_lib::manager::{DeviceManager, ManagerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = DeviceManager::new(ManagerConfig::default(), Arc::new(FileStore::new("state")));
//!     manager.load_stored().await;
//!     manager
//!         .handle_discovered(DiscoveredDevice::new("shellyplus2pm-a1b2c3", "192.168.1.41", 80, None))
//!         .await;
//! }
//! ```
//!
//! # Logging
//!
//! The library logs through [`tracing`] and never installs a subscriber.

pub mod auth;
pub mod command;
pub mod component;
pub mod config;
pub mod debounce;
pub mod device;
pub mod discovery;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod subscription;
pub mod types;

pub use command::Command;
pub use component::{Capabilities, Component, ComponentEvent, ComponentKind, PropertyUpdate};
pub use config::DeviceOptions;
pub use device::{Device, DevicePayloads};
pub use error::{
    DeviceError, Error, ParseError, ProtocolError, Result, StorageError, ValidationError,
    ValueError,
};
pub use event::{DeviceId, EventBus, ShellyEvent};
pub use manager::{DeviceManager, ManagerConfig};
pub use protocol::{HttpClient, HttpConfig, LiveChannel, LiveChannelConfig, Transport};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use types::{ColorChannel, Generation, Percent, RgbColor};
