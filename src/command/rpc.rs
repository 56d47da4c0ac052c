// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gen2/Gen3 RPC shapes.

use super::{Command, NativeRequest};
use crate::component::{Component, ComponentKind};

fn namespace(kind: ComponentKind) -> Option<&'static str> {
    match kind {
        ComponentKind::Switch => Some("Switch"),
        ComponentKind::Light => Some("Light"),
        ComponentKind::Rgb => Some("RGB"),
        ComponentKind::Cover => Some("Cover"),
        _ => None,
    }
}

pub(super) fn build(command: &Command, component: &Component) -> Option<NativeRequest> {
    let ns = namespace(component.kind())?;
    let id = component.index();
    let call = |verb: &str| NativeRequest::new(format!("{ns}.{verb}")).param("id", id);

    Some(match command {
        Command::On => call("Set").param("on", true),
        Command::Off => call("Set").param("on", false),
        Command::Toggle => call("Toggle"),
        Command::SetBrightness(level) => call("Set").param("brightness", level.value()),
        Command::SetColor(color) => call("Set").param("rgb", color.to_array().to_vec()),
        Command::Open => call("Open"),
        Command::Close => call("Close"),
        Command::Stop => call("Stop"),
        Command::GoToPosition(position) => call("GoToPosition").param("pos", position.value()),
    })
}
