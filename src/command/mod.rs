// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Component commands and their native request shapes.
//!
//! A [`Command`] is generation independent. [`Command::to_request`] turns it
//! into the [`NativeRequest`] a specific component understands:
//!
//! | command        | Gen1 (`POST /<path>`)                 | Gen2/Gen3 (`POST /rpc`)            |
//! |----------------|---------------------------------------|------------------------------------|
//! | on / off       | `relay/0` `turn=on`                   | `Switch.Set {id, on}`              |
//! | toggle         | `light/0` `turn=toggle`               | `Light.Toggle {id}`                |
//! | brightness     | `light/0` `brightness=40`             | `Light.Set {id, brightness}`       |
//! | color          | `light/0` `red=..&green=..&blue=..`   | `RGB.Set {id, rgb: [r, g, b]}`     |
//! | open / close   | `roller/0` `go=open`                  | `Cover.Open {id}`                  |
//! | go to position | `roller/0` `go=to_pos&roller_pos=30`  | `Cover.GoToPosition {id, pos}`     |
//!
//! # Examples
//!
//! ```
//! use shelly_lib::command::Command;
//! use shelly_lib::component::Component;
//! use shelly_lib::types::Generation;
//!
//! let relay = Component::from_id("relay:1");
//! let request = Command::On.to_request(&relay, Generation::Gen1).unwrap();
//! assert_eq!(request.method, "relay/1");
//! assert_eq!(request.params["turn"], "on");
//!
//! let switch = Component::from_id("switch:0");
//! let request = Command::Toggle.to_request(&switch, Generation::Gen2).unwrap();
//! assert_eq!(request.method, "Switch.Toggle");
//! ```

mod rest;
mod rpc;

use std::fmt;

use serde_json::Value;

use crate::component::{Capabilities, Component};
use crate::error::DeviceError;
use crate::protocol::Params;
use crate::types::{Generation, Percent, RgbColor};

/// A generation independent component command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch on.
    On,
    /// Switch off.
    Off,
    /// Invert the output.
    Toggle,
    /// Set brightness.
    SetBrightness(Percent),
    /// Set the RGB color.
    SetColor(RgbColor),
    /// Open the cover.
    Open,
    /// Close the cover.
    Close,
    /// Stop the cover.
    Stop,
    /// Move the cover to a position.
    GoToPosition(Percent),
}

impl Command {
    /// Short name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Toggle => "toggle",
            Self::SetBrightness(_) => "brightness",
            Self::SetColor(_) => "color",
            Self::Open => "open",
            Self::Close => "close",
            Self::Stop => "stop",
            Self::GoToPosition(_) => "position",
        }
    }

    /// Whether a component with `caps` accepts this command.
    #[must_use]
    pub const fn is_supported_by(&self, caps: &Capabilities) -> bool {
        match self {
            Self::On | Self::Off | Self::Toggle => caps.switchable,
            Self::SetBrightness(_) => caps.dimmable,
            Self::SetColor(_) => caps.color,
            Self::Open | Self::Close | Self::Stop | Self::GoToPosition(_) => caps.positioning,
        }
    }

    /// Builds the native request for `component` on a `generation` device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnsupportedCommand`] if the component lacks the
    /// required capability.
    pub fn to_request(
        &self,
        component: &Component,
        generation: Generation,
    ) -> Result<NativeRequest, DeviceError> {
        if !self.is_supported_by(&component.capabilities()) {
            return Err(DeviceError::UnsupportedCommand {
                component: component.id().to_string(),
                command: self.name(),
            });
        }
        let request = if generation.is_rpc() {
            rpc::build(self, component)
        } else {
            rest::build(self, component)
        };
        request.ok_or_else(|| DeviceError::UnsupportedCommand {
            component: component.id().to_string(),
            command: self.name(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetBrightness(level) => write!(f, "brightness {level}"),
            Self::SetColor(color) => write!(f, "color {color}"),
            Self::GoToPosition(position) => write!(f, "position {position}"),
            other => f.write_str(other.name()),
        }
    }
}

/// A request in the device's own vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeRequest {
    /// Gen1 path (`relay/0`) or RPC method (`Switch.Set`).
    pub method: String,
    /// Form fields (Gen1) or RPC params (Gen2/Gen3).
    pub params: Params,
}

impl NativeRequest {
    pub(crate) fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Params::new(),
        }
    }

    pub(crate) fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_rejects_switch_commands() {
        let cover = Component::from_id("cover:0");
        let err = Command::On.to_request(&cover, Generation::Gen2).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::UnsupportedCommand { command: "on", .. }
        ));
    }

    #[test]
    fn relay_rejects_brightness() {
        let relay = Component::from_id("relay:0");
        let level = Percent::new(50).unwrap();
        assert!(
            Command::SetBrightness(level)
                .to_request(&relay, Generation::Gen1)
                .is_err()
        );
    }

    #[test]
    fn display() {
        assert_eq!(Command::SetBrightness(Percent::new(40).unwrap()).to_string(), "brightness 40%");
        assert_eq!(Command::Stop.to_string(), "stop");
    }
}
