// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery fusion.
//!
//! Every discovery transport (mDNS, CoIoT, static configuration, the
//! persisted list) produces [`DiscoveredDevice`] records. The
//! [`DiscoveryRegistry`] merges them by normalized [`DeviceId`]:
//!
//! - an unseen id is registered, persisted and reported as [`Discovery::New`]
//! - the same id on the same host is a re-announcement ([`Discovery::Known`])
//! - the same id on another host is address drift ([`Discovery::Drift`]):
//!   the registry takes the new host and persists it, but running devices
//!   keep their old address until restart
//!
//! [`DeviceFilter`] applies the white and black lists before a record
//! reaches device creation.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use shelly_lib::discovery::{DiscoveredDevice, Discovery, DiscoveryRegistry, MemoryStore};
//! use shelly_lib::types::Generation;
//!
//! let mut registry = DiscoveryRegistry::new(Arc::new(MemoryStore::new()));
//! let device = DiscoveredDevice::new("ShellyPlus1-ABC", "192.168.1.20", 80, Some(Generation::Gen2));
//!
//! assert!(matches!(registry.discovered(device.clone()), Discovery::New(_)));
//! assert!(matches!(registry.discovered(device), Discovery::Known));
//! ```
//!
//! [`DeviceId`]: crate::event::DeviceId

mod discovered;
mod filter;
mod registry;
mod store;

pub use discovered::{DiscoveredDevice, is_valid_ipv4};
pub use filter::DeviceFilter;
pub use registry::{Discovery, DiscoveryRegistry};
pub use store::{DeviceStore, FileStore, MemoryStore, STORAGE_KEY};
