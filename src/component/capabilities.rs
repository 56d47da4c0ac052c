// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Component capabilities.
//!
//! Capabilities decide which [`Command`](crate::command::Command)s a
//! component accepts. They follow from the kind, refined by the properties
//! the device actually reported: a Gen1 light only supports color if its
//! status carries the color channels.

use super::{Component, ComponentKind};

/// What a component can do.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelly_lib::component::{Component, Capabilities};
///
/// let relay = Component::from_id("relay:0");
/// assert_eq!(relay.capabilities(), Capabilities::switch());
///
/// let mut bulb = Component::from_id("light:0");
/// bulb.set_value("red", json!(255)).unwrap();
/// assert!(bulb.capabilities().color);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
// Independent feature flags.
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// On, off and toggle.
    pub switchable: bool,
    /// Brightness control.
    pub dimmable: bool,
    /// RGB color control.
    pub color: bool,
    /// Open, close, stop and go-to-position.
    pub positioning: bool,
    /// Reports power readings.
    pub metering: bool,
}

impl Capabilities {
    /// A plain relay.
    #[must_use]
    pub const fn switch() -> Self {
        Self {
            switchable: true,
            dimmable: false,
            color: false,
            positioning: false,
            metering: false,
        }
    }

    /// A dimmable white light.
    #[must_use]
    pub const fn dimmer() -> Self {
        Self {
            switchable: true,
            dimmable: true,
            color: false,
            positioning: false,
            metering: false,
        }
    }

    /// A color light.
    #[must_use]
    pub const fn rgb_light() -> Self {
        Self {
            switchable: true,
            dimmable: true,
            color: true,
            positioning: false,
            metering: false,
        }
    }

    /// A roller shutter.
    #[must_use]
    pub const fn cover() -> Self {
        Self {
            switchable: false,
            dimmable: false,
            color: false,
            positioning: true,
            metering: false,
        }
    }

    /// Derives capabilities from a component.
    #[must_use]
    pub fn of(component: &Component) -> Self {
        let metering = ["apower", "power"]
            .iter()
            .any(|key| component.has_property(key));

        let base = match component.kind() {
            ComponentKind::Switch => Self::switch(),
            ComponentKind::Light => {
                let has_color = ["red", "rgb"].iter().any(|key| component.has_property(key));
                if has_color {
                    Self::rgb_light()
                } else {
                    Self::dimmer()
                }
            }
            ComponentKind::Rgb => Self::rgb_light(),
            ComponentKind::Cover => Self::cover(),
            ComponentKind::PowerMeter => Self {
                metering: true,
                ..Self::default()
            },
            _ => Self::default(),
        };

        Self {
            metering: base.metering || metering,
            ..base
        }
    }

    /// Whether the component accepts no commands at all.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        !(self.switchable || self.dimmable || self.color || self.positioning)
    }
}
