// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notifications emitted by components.

use serde::Serialize;
use serde_json::Value;

/// An effective property change on one component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyUpdate {
    /// Component id, e.g. `switch:0`.
    pub component: String,
    /// Property key.
    pub property: String,
    /// New value.
    pub value: Value,
}

impl PropertyUpdate {
    /// Creates an update.
    #[must_use]
    pub fn new(component: impl Into<String>, property: impl Into<String>, value: Value) -> Self {
        Self {
            component: component.into(),
            property: property.into(),
            value,
        }
    }
}

/// A discrete event raised by a component, such as a button push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentEvent {
    /// Component id, e.g. `input:0`.
    pub component: String,
    /// Event name, e.g. `single_push`.
    pub event: String,
}
