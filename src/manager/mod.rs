// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for a fleet of Shelly devices.
//!
//! The [`DeviceManager`] is the upward surface for host applications. It
//! takes discovery records from any source (mDNS, the identifier store,
//! static configuration), turns them into [`Device`](crate::Device)s and
//! republishes everything that happens on one broadcast stream.
//!
//! # Examples
//!
//! ## Static configuration
//!
//! ```no_run
//! use std::time::Duration;
//! use shelly_lib::manager::{DeviceManager, ManagerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ManagerConfig::default()
//!         .with_device_ip("shelly1-aabbcc", "192.168.1.31")
//!         .with_failsafe_count(1);
//!     let manager = DeviceManager::in_memory(config);
//!
//!     manager.load_configured().await;
//!     if !manager.wait_for_failsafe(Duration::from_secs(30)).await {
//!         eprintln!("not every device answered");
//!     }
//!     manager.shutdown().await;
//! }
//! ```
//!
//! ## Event subscription
//!
//! ```no_run
//! use shelly_lib::event::ShellyEvent;
//! use shelly_lib::manager::DeviceManager;
//!
//! # fn example() {
//! let manager = DeviceManager::default();
//! let mut events = manager.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             ShellyEvent::Updated { device_id, update } => {
//!                 println!("{device_id} {}.{} = {}", update.component, update.property, update.value);
//!             }
//!             ShellyEvent::Added { device_id } => println!("{device_id} added"),
//!             _ => {}
//!         }
//!     }
//! });
//! # }
//! ```

mod config;
mod device_manager;

pub use config::ManagerConfig;
pub use device_manager::DeviceManager;
