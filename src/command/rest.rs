// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Gen1 REST shapes.

use super::{Command, NativeRequest};
use crate::component::{Component, ComponentKind};

pub(super) fn build(command: &Command, component: &Component) -> Option<NativeRequest> {
    let path = match component.kind() {
        ComponentKind::Switch => format!("relay/{}", component.index()),
        ComponentKind::Cover => format!("roller/{}", component.index()),
        // Gen1 color devices use the same `light` endpoint in both modes
        ComponentKind::Light | ComponentKind::Rgb => format!("light/{}", component.index()),
        _ => return None,
    };
    let request = NativeRequest::new(path);

    Some(match command {
        Command::On => request.param("turn", "on"),
        Command::Off => request.param("turn", "off"),
        Command::Toggle => request.param("turn", "toggle"),
        Command::SetBrightness(level) => {
            // color mode dims through `gain`
            let key = if component.has_property("gain") && !component.has_property("brightness") {
                "gain"
            } else {
                "brightness"
            };
            request.param(key, level.value())
        }
        Command::SetColor(color) => request
            .param("red", color.red())
            .param("green", color.green())
            .param("blue", color.blue()),
        Command::Open => request.param("go", "open"),
        Command::Close => request.param("go", "close"),
        Command::Stop => request.param("go", "stop"),
        Command::GoToPosition(position) => request
            .param("go", "to_pos")
            .param("roller_pos", position.value()),
    })
}
