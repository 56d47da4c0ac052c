// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the crate.
//!
//! # Types
//!
//! - [`Generation`] - Device firmware family (Gen1, Gen2, Gen3)
//! - [`Percent`] - Brightness or position percentage (0-100)
//! - [`RgbColor`] - 8-bit RGB color
//! - [`ColorChannel`] - One channel of an [`RgbColor`]
//!
//! The [`scale`] module holds the pure unit conversions between the vendor
//! percent scales and the fixed-point scales used by bridging layers.

mod generation;
mod percent;
mod rgb_color;
pub mod scale;

pub use generation::Generation;
pub use percent::Percent;
pub use rgb_color::{ColorChannel, RgbColor};
