// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait.

use crate::component::{ComponentEvent, PropertyUpdate};
use crate::subscription::SubscriptionId;

/// Types that notify callbacks about component changes.
///
/// Callbacks run synchronously on the task that applied the change and must
/// not block.
pub trait Subscribable {
    /// Called for every effective property change.
    fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyUpdate) + Send + Sync + 'static;

    /// Called for discrete component events such as button pushes.
    fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ComponentEvent) + Send + Sync + 'static;

    /// Called with the new value whenever the online flag changes.
    fn on_liveness<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static;

    /// Removes a callback. Returns `false` if the id was unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
