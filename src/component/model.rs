// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The component property bag.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{Capabilities, ComponentKind, PropertyUpdate, validation};
use crate::error::ValidationError;
use crate::types::RgbColor;

/// A typed part of a device holding validated properties.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelly_lib::component::{Component, ComponentKind};
///
/// let mut relay = Component::new("relay:0", ComponentKind::Switch);
/// assert_eq!(relay.set_value("state", json!(true)), Ok(true));
/// // Writing the same value again is accepted but is not a change.
/// assert_eq!(relay.set_value("state", json!(true)), Ok(false));
/// assert!(relay.set_value("state", json!("on")).is_err());
/// assert_eq!(relay.state(), Some(true));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    id: String,
    kind: ComponentKind,
    name: String,
    properties: BTreeMap<String, Value>,
}

impl Component {
    /// Creates an empty component. The display name defaults to the kind.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            name: kind.name().to_string(),
            properties: BTreeMap::new(),
        }
    }

    /// Creates a component whose kind follows the prefix of `id`.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let kind = ComponentKind::from_prefix(id.split(':').next().unwrap_or_default());
        Self::new(id, kind)
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Component id, e.g. `switch:0`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Component kind.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Numeric suffix of the id, `0` for ids without one (`sys`).
    #[must_use]
    pub fn index(&self) -> u32 {
        self.id
            .rsplit_once(':')
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or(0)
    }

    /// Prefix of the id, e.g. `relay` for `relay:1`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.id.split(':').next().unwrap_or(&self.id)
    }

    /// Returns a stored property.
    #[must_use]
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Whether `key` has been stored.
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Iterates over all properties in key order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Capabilities derived from the kind and the stored properties.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::of(self)
    }

    /// Validates and stores a property.
    ///
    /// Returns `Ok(true)` if the stored value changed, `Ok(false)` if it was
    /// already equal. Rejected values leave the component untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the value violates the rule for this
    /// kind and key.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<bool, ValidationError> {
        validation::validate(self.kind, key, &value)?;
        if self.properties.get(key) == Some(&value) {
            return Ok(false);
        }
        self.properties.insert(key.to_string(), value);
        Ok(true)
    }

    /// Merges a vendor object into the component.
    ///
    /// Each field is validated on its own; invalid ones are logged and
    /// skipped. For switchable kinds the normalized `state` is derived from
    /// `ison` (Gen1) or `output` (Gen2/Gen3). Returns the effective changes.
    pub fn merge(&mut self, data: &Map<String, Value>) -> Vec<PropertyUpdate> {
        let mut changes = Vec::new();
        for (key, value) in data {
            self.record(key, value.clone(), &mut changes);
        }
        for source in self.kind.state_sources() {
            if let Some(state) = data.get(*source).filter(|v| v.is_boolean()) {
                self.record("state", state.clone(), &mut changes);
            }
        }
        changes
    }

    fn record(&mut self, key: &str, value: Value, changes: &mut Vec<PropertyUpdate>) {
        match self.set_value(key, value.clone()) {
            Ok(true) => changes.push(PropertyUpdate::new(self.id.clone(), key, value)),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(component = %self.id, error = %e, "Ignoring invalid property");
            }
        }
    }

    /// Normalized on/off state.
    #[must_use]
    pub fn state(&self) -> Option<bool> {
        self.get_value("state").and_then(Value::as_bool)
    }

    /// Brightness in percent.
    #[must_use]
    pub fn brightness(&self) -> Option<u8> {
        self.get_value("brightness")
            .and_then(Value::as_f64)
            .map(crate::types::scale::clamp_percent)
    }

    /// Current cover position in percent.
    #[must_use]
    pub fn position(&self) -> Option<u8> {
        self.get_value("current_pos")
            .and_then(Value::as_f64)
            .map(crate::types::scale::clamp_percent)
    }

    /// Current color, from `rgb` or from the separate channels.
    #[must_use]
    pub fn color(&self) -> Option<RgbColor> {
        if let Some(rgb) = self.get_value("rgb") {
            return RgbColor::from_json_array(rgb);
        }
        let channel = |key| {
            self.get_value(key)
                .and_then(Value::as_f64)
                .map(crate::types::scale::clamp_channel)
        };
        Some(RgbColor::new(channel("red")?, channel("green")?, channel("blue")?))
    }
}
