// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalized component model.
//!
//! A device is a set of [`Component`]s keyed by `kind:index` ids
//! (`switch:0`, `relay:1`, `cover:0`, `sys`, ...). Each component holds a
//! property bag of JSON values. Writes are validated per kind before they
//! are stored, and only effective changes are reported as
//! [`PropertyUpdate`]s.
//!
//! Generation differences are resolved before data reaches this module:
//! Gen1 relays are `Switch` components with id `relay:N`, Gen1 rollers are
//! `Cover` components with id `roller:N`, and every switchable kind carries
//! a normalized boolean `state` property.

mod capabilities;
mod kind;
mod model;
mod update;
pub mod validation;

pub use capabilities::Capabilities;
pub use kind::ComponentKind;
pub use model::Component;
pub use update::{ComponentEvent, PropertyUpdate};
