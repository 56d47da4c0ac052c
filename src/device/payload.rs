// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generation-specific payload decoding.
//!
//! Raw vendor payloads are decoded here into generation-agnostic records
//! before they reach the component model:
//!
//! - [`Identity`] from the `/shelly` payload, tagged by the presence of `gen`
//! - [`ComponentRecord`]s from settings (`/settings` or `Shelly.GetConfig`)
//!   and from status (`/status`, `Shelly.GetStatus` or a push)
//!
//! Gen1 status arrays are indexed positionally (`relays[1]` becomes
//! `relay:1`), Gen2/Gen3 maps are already keyed by `kind:index`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::types::Generation;

/// The three payloads a device is built from. Cached per device so it can
/// be rebuilt while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePayloads {
    /// `/shelly` identity.
    pub shelly: Value,
    /// Settings or config.
    pub settings: Value,
    /// Full status.
    pub status: Value,
}

/// Operating mode of dual-mode hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    /// Outputs act as independent relays.
    Relay,
    /// Outputs drive a roller shutter.
    Cover,
    /// Any other mode (`white`, `color`, `light`, `rgb`, ...).
    Other(String),
}

impl Profile {
    fn parse(raw: &str) -> Self {
        match raw {
            "relay" | "switch" => Self::Relay,
            "roller" | "cover" => Self::Cover,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether components with id prefix `prefix` exist in this mode.
    #[must_use]
    pub fn admits(&self, prefix: &str) -> bool {
        match self {
            Self::Cover => !matches!(prefix, "relay" | "switch"),
            Self::Relay => !matches!(prefix, "roller" | "cover"),
            Self::Other(_) => true,
        }
    }
}

/// Identity attributes decoded from `/shelly`.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// Vendor id. Gen1 only reports it in settings.
    pub id: Option<String>,
    /// Model code (`SHSW-1`, `SNSW-001P16EU`).
    pub model: String,
    /// MAC address.
    pub mac: String,
    /// Firmware version without build prefix.
    pub firmware: String,
    /// Hardware generation.
    pub generation: Generation,
    /// Whether authentication is enabled.
    pub auth: bool,
    /// Dual-mode profile, if reported.
    pub profile: Option<Profile>,
}

#[derive(Deserialize)]
struct Gen1Shelly {
    #[serde(rename = "type")]
    model: String,
    #[serde(default)]
    mac: String,
    #[serde(default)]
    auth: bool,
    #[serde(default)]
    fw: String,
    mode: Option<String>,
}

#[derive(Deserialize)]
struct RpcShelly {
    id: String,
    model: String,
    #[serde(default)]
    mac: String,
    #[serde(default)]
    auth_en: bool,
    #[serde(default)]
    fw_id: String,
    profile: Option<String>,
}

/// `20230913-112003/v1.14.0-gcb84623` → `v1.14.0-gcb84623`.
fn firmware_version(raw: &str) -> String {
    raw.split_once('/').map_or(raw, |(_, version)| version).to_string()
}

impl Identity {
    /// Decodes the identity payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if required fields are missing or `gen` is
    /// outside 1..=3.
    pub fn decode(shelly: &Value) -> Result<Self, ParseError> {
        match shelly.get("gen") {
            None | Some(Value::Null) => {
                let raw: Gen1Shelly = serde_json::from_value(shelly.clone())?;
                Ok(Self {
                    id: None,
                    model: raw.model,
                    mac: raw.mac,
                    firmware: firmware_version(&raw.fw),
                    generation: Generation::Gen1,
                    auth: raw.auth,
                    profile: raw.mode.as_deref().map(Profile::parse),
                })
            }
            Some(value) => {
                let generation = value
                    .as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .and_then(|n| Generation::try_from(n).ok())
                    .ok_or_else(|| ParseError::InvalidValue {
                        field: "gen".into(),
                        message: format!("unsupported generation {value}"),
                    })?;
                let raw: RpcShelly = serde_json::from_value(shelly.clone())?;
                Ok(Self {
                    id: Some(raw.id),
                    model: raw.model,
                    mac: raw.mac,
                    firmware: firmware_version(&raw.fw_id),
                    generation,
                    auth: raw.auth_en,
                    profile: raw.profile.as_deref().map(Profile::parse),
                })
            }
        }
    }
}

/// One component's data in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRecord {
    /// Component id.
    pub id: String,
    /// Vendor fields.
    pub data: Map<String, Value>,
}

impl ComponentRecord {
    fn new(id: impl Into<String>, value: &Value) -> Option<Self> {
        value.as_object().map(|data| Self {
            id: id.into(),
            data: data.clone(),
        })
    }
}

/// Gen1 array sections and the id prefix of their entries.
const GEN1_SETTINGS_ARRAYS: &[(&str, &str)] = &[
    ("relays", "relay"),
    ("lights", "light"),
    ("rollers", "roller"),
];

const GEN1_SETTINGS_OBJECTS: &[&str] = &["wifi_ap", "wifi_sta", "wifi_sta1", "mqtt", "coiot", "sntp", "cloud"];

const GEN1_STATUS_ARRAYS: &[(&str, &str)] = &[
    ("relays", "relay"),
    ("lights", "light"),
    ("rollers", "roller"),
    ("meters", "meter"),
    ("emeters", "emeter"),
    ("inputs", "input"),
];

const GEN1_STATUS_OBJECTS: &[&str] = &["tmp", "hum", "lux", "bat", "cloud", "mqtt"];

/// Gen1 sections that only appear in status but still form components.
const GEN1_STATUS_ONLY: &[&str] = &["meter", "emeter", "input", "tmp", "hum", "lux", "bat"];

const RPC_SINGLETONS: &[&str] = &["sys", "mqtt", "ws", "cloud", "ble"];

const RPC_PREFIXES: &[&str] = &[
    "switch",
    "cover",
    "light",
    "rgb",
    "pm1",
    "em1",
    "input",
    "temperature",
    "humidity",
    "illuminance",
    "devicepower",
];

fn gen1_arrays(payload: &Value, sections: &[(&str, &str)], out: &mut Vec<ComponentRecord>) {
    for (section, prefix) in sections {
        if let Some(items) = payload.get(*section).and_then(Value::as_array) {
            out.extend(
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| ComponentRecord::new(format!("{prefix}:{index}"), item)),
            );
        }
    }
}

fn gen1_objects(payload: &Value, keys: &[&str], out: &mut Vec<ComponentRecord>) {
    out.extend(
        keys.iter()
            .filter_map(|key| payload.get(*key).and_then(|v| ComponentRecord::new(*key, v))),
    );
}

fn rpc_prefixed(payload: &Value, out: &mut Vec<ComponentRecord>) {
    let Some(map) = payload.as_object() else {
        return;
    };
    for (key, value) in map {
        let prefix = key.split(':').next().unwrap_or_default();
        if key.contains(':') && RPC_PREFIXES.contains(&prefix) {
            out.extend(ComponentRecord::new(key.as_str(), value));
        }
    }
}

/// Components described by the settings payload.
#[must_use]
pub fn settings_records(generation: Generation, settings: &Value) -> Vec<ComponentRecord> {
    let mut records = Vec::new();
    if generation.is_rpc() {
        if let Some(wifi) = settings.get("wifi") {
            for (section, id) in [("ap", "wifi_ap"), ("sta", "wifi_sta"), ("sta1", "wifi_sta1")] {
                records.extend(wifi.get(section).and_then(|v| ComponentRecord::new(id, v)));
            }
        }
        gen1_objects(settings, RPC_SINGLETONS, &mut records);
        if let Some(sntp) = settings.pointer("/sys/sntp") {
            records.extend(ComponentRecord::new("sntp", sntp));
        }
        rpc_prefixed(settings, &mut records);
    } else {
        gen1_objects(settings, GEN1_SETTINGS_OBJECTS, &mut records);
        gen1_arrays(settings, GEN1_SETTINGS_ARRAYS, &mut records);
    }
    records
}

/// Components described by a status payload or push.
#[must_use]
pub fn status_records(generation: Generation, status: &Value) -> Vec<ComponentRecord> {
    let mut records = Vec::new();
    if generation.is_rpc() {
        gen1_objects(status, RPC_SINGLETONS, &mut records);
        rpc_prefixed(status, &mut records);
    } else {
        gen1_objects(status, GEN1_STATUS_OBJECTS, &mut records);
        gen1_arrays(status, GEN1_STATUS_ARRAYS, &mut records);
    }
    records
}

/// Whether a Gen1 status record may create a component that settings did
/// not describe (sensors, meters, inputs).
#[must_use]
pub fn is_status_only(id: &str) -> bool {
    let prefix = id.split(':').next().unwrap_or(id);
    GEN1_STATUS_ONLY.contains(&prefix)
}

/// Vendor id: `/shelly.id` on Gen2/Gen3, `settings.device.hostname` on Gen1.
#[must_use]
pub fn device_id(identity: &Identity, settings: &Value) -> Option<String> {
    identity.id.clone().or_else(|| {
        settings
            .pointer("/device/hostname")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

/// Display name from settings, if set.
#[must_use]
pub fn device_name(generation: Generation, settings: &Value) -> Option<String> {
    let name = if generation.is_rpc() {
        settings.pointer("/sys/device/name")
    } else {
        settings.get("name")
    };
    name.and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Firmware update availability, if the payload says anything about it.
#[must_use]
pub fn has_update(generation: Generation, status: &Value) -> Option<bool> {
    if generation.is_rpc() {
        status
            .pointer("/sys/available_updates")
            .and_then(Value::as_object)
            .map(|updates| !updates.is_empty())
    } else {
        status.get("has_update").and_then(Value::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn gen1_identity() {
        let identity = Identity::decode(&json!({
            "type": "SHSW-25", "mac": "98CDAC0D01BB", "auth": true,
            "fw": "20230913-112003/v1.14.0-gcb84623", "mode": "roller"
        }))
        .unwrap();
        assert_eq!(identity.generation, Generation::Gen1);
        assert_eq!(identity.model, "SHSW-25");
        assert_eq!(identity.firmware, "v1.14.0-gcb84623");
        assert!(identity.auth);
        assert_eq!(identity.profile, Some(Profile::Cover));
        assert_eq!(identity.id, None);
    }

    #[test]
    fn gen2_identity() {
        let identity = Identity::decode(&json!({
            "id": "shellyplus2pm-5443b23d81f8", "model": "SNSW-102P16EU", "gen": 2,
            "mac": "5443B23D81F8", "fw_id": "20231107-164738/1.0.8-g8c7bb8d",
            "auth_en": false, "profile": "switch"
        }))
        .unwrap();
        assert_eq!(identity.generation, Generation::Gen2);
        assert_eq!(identity.id.as_deref(), Some("shellyplus2pm-5443b23d81f8"));
        assert_eq!(identity.firmware, "1.0.8-g8c7bb8d");
        assert_eq!(identity.profile, Some(Profile::Relay));
    }

    #[test]
    fn invalid_generation() {
        assert!(matches!(
            Identity::decode(&json!({"id": "x", "model": "y", "gen": 7})),
            Err(ParseError::InvalidValue { .. })
        ));
        assert!(Identity::decode(&json!({"mac": "x"})).is_err());
    }

    #[test]
    fn gen1_settings_are_positional() {
        let settings = json!({
            "relays": [{"ison": true}, {"ison": false}],
            "coiot": {"enabled": true, "peer": ""},
            "device": {"hostname": "shelly1-abc"}
        });
        let ids: Vec<_> = settings_records(Generation::Gen1, &settings)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["coiot", "relay:0", "relay:1"]);
    }

    #[test]
    fn gen2_settings_flatten_wifi_and_sntp() {
        let settings = json!({
            "wifi": {"ap": {"enable": false}, "sta": {"ssid": "home"}},
            "sys": {"device": {"name": "Kitchen"}, "sntp": {"server": "time.google.com"}},
            "switch:0": {"name": null},
            "bthome": {},
            "script:1": {}
        });
        let ids: Vec<_> = settings_records(Generation::Gen2, &settings)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["wifi_ap", "wifi_sta", "sys", "sntp", "switch:0"]);
        assert_eq!(device_name(Generation::Gen2, &settings).as_deref(), Some("Kitchen"));
    }

    #[test]
    fn gen1_status_sensors() {
        let status = json!({"tmp": {"tC": 21.5}, "bat": {"value": 80}, "relays": [{"ison": true}]});
        let records = status_records(Generation::Gen1, &status);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["tmp", "bat", "relay:0"]);
        assert!(is_status_only("tmp"));
        assert!(is_status_only("meter:0"));
        assert!(!is_status_only("relay:0"));
    }

    #[test]
    fn profile_gating() {
        assert!(!Profile::Cover.admits("relay"));
        assert!(!Profile::Cover.admits("switch"));
        assert!(Profile::Cover.admits("cover"));
        assert!(!Profile::Relay.admits("roller"));
        assert!(Profile::Other("white".into()).admits("light"));
    }

    #[test]
    fn update_flags() {
        assert_eq!(has_update(Generation::Gen1, &json!({"has_update": true})), Some(true));
        assert_eq!(
            has_update(Generation::Gen2, &json!({"sys": {"available_updates": {"stable": {"version": "1.1"}}}})),
            Some(true)
        );
        assert_eq!(
            has_update(Generation::Gen3, &json!({"sys": {"available_updates": {}}})),
            Some(false)
        );
        assert_eq!(has_update(Generation::Gen2, &json!({"switch:0": {}})), None);
    }

    #[test]
    fn gen1_id_from_settings() {
        let identity = Identity::decode(&json!({"type": "SHSW-1", "fw": "x/v1"})).unwrap();
        let settings = json!({"device": {"hostname": "shelly1-0A1B2C"}});
        assert_eq!(device_id(&identity, &settings).as_deref(), Some("shelly1-0A1B2C"));
    }
}
