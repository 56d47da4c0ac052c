// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Component kinds.

use std::fmt;

/// Variant of a component, selecting its validation rules and commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Relay output (Gen1 `relays`, Gen2 `switch`).
    Switch,
    /// Dimmable light (Gen1 `lights`, Gen2 `light`).
    Light,
    /// Color light (Gen2 `rgb`).
    Rgb,
    /// Roller shutter (Gen1 `rollers`, Gen2 `cover`).
    Cover,
    /// Power metering (Gen1 `meters`/`emeters`, Gen2 `pm1`/`em1`).
    PowerMeter,
    /// Binary or button input.
    Input,
    /// Temperature sensor.
    Temperature,
    /// Humidity sensor.
    Humidity,
    /// Light sensor.
    Illuminance,
    /// Battery or device power.
    Battery,
    /// Wi-Fi station or access point.
    WiFi,
    /// MQTT client.
    Mqtt,
    /// Vendor cloud connection.
    Cloud,
    /// System block (name, uptime, updates).
    Sys,
    /// Time sync.
    Sntp,
    /// Gen1 push protocol.
    CoIoT,
    /// Gen2 outbound WebSocket.
    Ws,
    /// Bluetooth.
    Ble,
    /// Anything the model does not know.
    Unknown,
}

impl ComponentKind {
    /// Display name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Switch => "Switch",
            Self::Light => "Light",
            Self::Rgb => "Rgb",
            Self::Cover => "Cover",
            Self::PowerMeter => "PowerMeter",
            Self::Input => "Input",
            Self::Temperature => "Temperature",
            Self::Humidity => "Humidity",
            Self::Illuminance => "Illuminance",
            Self::Battery => "Battery",
            Self::WiFi => "WiFi",
            Self::Mqtt => "MQTT",
            Self::Cloud => "Cloud",
            Self::Sys => "Sys",
            Self::Sntp => "Sntp",
            Self::CoIoT => "CoIoT",
            Self::Ws => "WS",
            Self::Ble => "Ble",
            Self::Unknown => "Unknown",
        }
    }

    /// Maps the prefix of a component id (`switch` in `switch:0`) to a kind.
    ///
    /// Accepts both the Gen1 (`relay`, `roller`, `meter`) and Gen2/Gen3
    /// (`switch`, `cover`, `pm1`) vocabularies.
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "switch" | "relay" => Self::Switch,
            "light" => Self::Light,
            "rgb" => Self::Rgb,
            "cover" | "roller" => Self::Cover,
            "pm1" | "em1" | "meter" | "emeter" => Self::PowerMeter,
            "input" => Self::Input,
            "temperature" | "tmp" => Self::Temperature,
            "humidity" | "hum" => Self::Humidity,
            "illuminance" | "lux" => Self::Illuminance,
            "devicepower" | "bat" | "battery" => Self::Battery,
            "wifi" | "wifi_ap" | "wifi_sta" | "wifi_sta1" => Self::WiFi,
            "mqtt" => Self::Mqtt,
            "cloud" => Self::Cloud,
            "sys" => Self::Sys,
            "sntp" => Self::Sntp,
            "coiot" => Self::CoIoT,
            "ws" => Self::Ws,
            "ble" => Self::Ble,
            _ => Self::Unknown,
        }
    }

    /// Kinds that carry a normalized boolean `state`.
    #[must_use]
    pub const fn is_switchable(self) -> bool {
        matches!(self, Self::Switch | Self::Light | Self::Rgb)
    }

    /// Vendor fields the normalized `state` is derived from.
    #[must_use]
    pub const fn state_sources(self) -> &'static [&'static str] {
        if self.is_switchable() {
            &["ison", "output"]
        } else {
            &[]
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen1_and_gen2_prefixes_converge() {
        assert_eq!(ComponentKind::from_prefix("relay"), ComponentKind::Switch);
        assert_eq!(ComponentKind::from_prefix("switch"), ComponentKind::Switch);
        assert_eq!(ComponentKind::from_prefix("roller"), ComponentKind::Cover);
        assert_eq!(ComponentKind::from_prefix("pm1"), ComponentKind::PowerMeter);
        assert_eq!(ComponentKind::from_prefix("emeter"), ComponentKind::PowerMeter);
        assert_eq!(ComponentKind::from_prefix("bthome"), ComponentKind::Unknown);
    }

    #[test]
    fn only_outputs_derive_state() {
        assert_eq!(ComponentKind::Light.state_sources(), &["ison", "output"]);
        assert!(ComponentKind::Cover.state_sources().is_empty());
        assert!(ComponentKind::Input.state_sources().is_empty());
    }
}
