// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized device identifier.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Prefix some simulators put in front of real ids.
const MOCK_PREFIX: &str = "mock.";
/// mDNS domain suffix.
const LOCAL_SUFFIX: &str = ".local";

fn normalize(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let without_prefix = lower.strip_prefix(MOCK_PREFIX).unwrap_or(&lower);
    without_prefix
        .strip_suffix(LOCAL_SUFFIX)
        .unwrap_or(without_prefix)
        .to_string()
}

/// Identifier of one physical device, comparable across transports.
///
/// Construction always normalizes, so two ids compare equal exactly when
/// they name the same unit.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a normalized id.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// Normalizes a vendor id without wrapping it: trims, lowercases,
    /// strips a `mock.` prefix and a trailing `.local`.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelly_lib::event::DeviceId;
    ///
    /// assert_eq!(DeviceId::normalize(" ShellyPlus1-ABC.local "), "shellyplus1-abc");
    /// assert_eq!(DeviceId::normalize("mock.shelly1-0A1B2C"), "shelly1-0a1b2c");
    /// ```
    #[must_use]
    pub fn normalize(raw: &str) -> String {
        normalize(raw)
    }

    /// The normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|raw| Self::new(&raw))
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for DeviceId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
