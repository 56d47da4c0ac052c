// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Upward event stream.
//!
//! The [`DeviceManager`](crate::manager::DeviceManager) publishes a
//! [`ShellyEvent`] for every discovery, device addition or removal,
//! property update and component event. The [`EventBus`] uses tokio's
//! broadcast channel so several consumers can follow the same stream.
//!
//! # Examples
//!
//! ```
//! use shelly_lib::event::{DeviceId, EventBus, ShellyEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ShellyEvent::added(DeviceId::new("ShellyPlus1-A8032AB12345")));
//! ```

mod device_id;
mod event_bus;
mod shelly_event;

pub use device_id::DeviceId;
pub use event_bus::EventBus;
pub use shelly_event::ShellyEvent;
