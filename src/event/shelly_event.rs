// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event types published by the device manager.

use super::DeviceId;
use crate::component::{ComponentEvent, PropertyUpdate};
use crate::discovery::DiscoveredDevice;

/// Events emitted towards the consuming layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellyEvent {
    /// A previously unseen device was announced.
    Discovered(DiscoveredDevice),

    /// A device finished initialization and holds its component set.
    Added {
        /// The device.
        device_id: DeviceId,
    },

    /// A device was destroyed and unregistered.
    Removed {
        /// The device.
        device_id: DeviceId,
    },

    /// A component property changed.
    Updated {
        /// The device.
        device_id: DeviceId,
        /// What changed.
        update: PropertyUpdate,
    },

    /// A component raised a one-shot event.
    Event {
        /// The device.
        device_id: DeviceId,
        /// The event.
        event: ComponentEvent,
    },
}

impl ShellyEvent {
    /// Returns the device this event is about.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Discovered(device) => &device.id,
            Self::Added { device_id }
            | Self::Removed { device_id }
            | Self::Updated { device_id, .. }
            | Self::Event { device_id, .. } => device_id,
        }
    }

    /// Returns `true` for additions and removals.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Added { .. } | Self::Removed { .. })
    }

    /// Returns `true` for property updates.
    #[must_use]
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }

    /// Creates an `Added` event.
    #[must_use]
    pub fn added(device_id: DeviceId) -> Self {
        Self::Added { device_id }
    }

    /// Creates a `Removed` event.
    #[must_use]
    pub fn removed(device_id: DeviceId) -> Self {
        Self::Removed { device_id }
    }

    /// Creates an `Updated` event.
    #[must_use]
    pub fn updated(device_id: DeviceId, update: PropertyUpdate) -> Self {
        Self::Updated { device_id, update }
    }

    /// Creates an `Event` event.
    #[must_use]
    pub fn event(device_id: DeviceId, event: ComponentEvent) -> Self {
        Self::Event { device_id, event }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::Generation;

    #[test]
    fn device_id_extraction() {
        let id = DeviceId::new("shelly1-abc");
        assert_eq!(ShellyEvent::added(id.clone()).device_id(), &id);

        let discovered = ShellyEvent::Discovered(DiscoveredDevice::new(
            "Shelly1-ABC",
            "10.0.0.5",
            80,
            Some(Generation::Gen1),
        ));
        assert_eq!(discovered.device_id(), &id);
    }

    #[test]
    fn classification() {
        let id = DeviceId::new("x");
        assert!(ShellyEvent::removed(id.clone()).is_lifecycle());
        let update = ShellyEvent::updated(id, PropertyUpdate::new("switch:0", "state", json!(true)));
        assert!(update.is_update());
        assert!(!update.is_lifecycle());
    }
}
