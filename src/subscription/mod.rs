// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback subscriptions on a device.
//!
//! - [`SubscriptionId`] identifies a registered callback
//! - [`CallbackRegistry`] stores callbacks and dispatches notifications
//! - [`Subscribable`] is implemented by [`Device`](crate::Device)
//!
//! ```no_run
//! use shelly_lib::{Device, DeviceOptions};
//! use shelly_lib::subscription::Subscribable;
//!
//! # async fn example() -> shelly_lib::Result<()> {
//! let device = Device::create("192.168.1.40", DeviceOptions::default()).await?;
//!
//! let sub = device.on_update(|update| {
//!     println!("{} {} = {}", update.component, update.property, update.value);
//! });
//!
//! device.unsubscribe(sub);
//! # Ok(())
//! # }
//! ```

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
