// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery records.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::event::DeviceId;
use crate::types::Generation;

/// One announcement of a device on the network.
///
/// Serialized as `{id, host, port, gen}` where `gen` is `0` when the
/// source could not tell the generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Normalized device id.
    pub id: DeviceId,
    /// IP address or host name.
    pub host: String,
    /// Port, `0` when unknown.
    #[serde(default)]
    pub port: u16,
    /// Generation, if the source reported one.
    #[serde(rename = "gen", default, with = "generation_or_zero")]
    pub generation: Option<Generation>,
}

impl DiscoveredDevice {
    /// Creates a record, normalizing `id`.
    #[must_use]
    pub fn new(
        id: &str,
        host: impl Into<String>,
        port: u16,
        generation: Option<Generation>,
    ) -> Self {
        Self {
            id: DeviceId::new(id),
            host: host.into(),
            port,
            generation,
        }
    }

    /// Builds a record from an mDNS A-record name such as
    /// `ShellyPlus1-C4D8D5568E18.local`.
    ///
    /// Returns `None` for names that do not belong to a Shelly device.
    /// Gen1 firmware announces lowercase names and carries no `gen` TXT
    /// entry, so a lowercase `shelly` prefix implies Gen1 when `generation`
    /// is unknown.
    ///
    /// # Examples
    ///
    /// ```
    /// use shelly_lib::discovery::DiscoveredDevice;
    /// use shelly_lib::types::Generation;
    ///
    /// let gen1 = DiscoveredDevice::from_mdns_name("shelly1-0a1b2c.local", "10.0.0.5", 80, None).unwrap();
    /// assert_eq!(gen1.generation, Some(Generation::Gen1));
    /// assert_eq!(gen1.id.as_str(), "shelly1-0a1b2c");
    ///
    /// assert!(DiscoveredDevice::from_mdns_name("printer.local", "10.0.0.9", 80, None).is_none());
    /// ```
    #[must_use]
    pub fn from_mdns_name(
        name: &str,
        host: impl Into<String>,
        port: u16,
        generation: Option<Generation>,
    ) -> Option<Self> {
        let name = name.trim();
        if !name.to_lowercase().starts_with("shelly") {
            return None;
        }
        let generation = generation.or_else(|| name.starts_with("shelly").then_some(Generation::Gen1));
        Some(Self::new(name, host, port, generation))
    }

    /// Whether `host` is a dotted IPv4 address.
    #[must_use]
    pub fn has_ipv4_host(&self) -> bool {
        is_valid_ipv4(&self.host)
    }
}

/// Whether `host` parses as a dotted IPv4 address.
#[must_use]
pub fn is_valid_ipv4(host: &str) -> bool {
    host.parse::<Ipv4Addr>().is_ok()
}

mod generation_or_zero {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::Generation;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<Generation>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.map_or(0, u8::from))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Generation>, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Ok(Generation::try_from(raw).ok())
    }
}
