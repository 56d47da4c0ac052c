// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit conversions between vendor and bridge scales.
//!
//! Every conversion rounds half-up and then clamps into the destination
//! range, so repeated round trips cannot drift.
//!
//! # Examples
//!
//! ```
//! use shelly_lib::types::scale;
//!
//! assert_eq!(scale::percent_to_level(50), 127);
//! assert_eq!(scale::level_to_percent(127), 50);
//! assert_eq!(scale::position_to_lift(30), 7_000);
//! assert_eq!(scale::lift_to_position(7_000), 30);
//! ```

/// Upper bound of the fixed-point level scale used by bridges.
pub const LEVEL_MAX: u8 = 254;

/// Upper bound of the inverted lift scale (hundredths of a percent).
pub const LIFT_MAX: u16 = 10_000;

/// Rounds to the nearest integer, ties towards positive infinity.
#[must_use]
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_to(value: f64, min: f64, max: f64) -> u16 {
    // NaN lands on min
    if value.is_nan() {
        return min as u16;
    }
    value.clamp(min, max) as u16
}

/// Maps a vendor brightness percent (0-100) onto the 0-254 level scale.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn percent_to_level(percent: u8) -> u8 {
    let scaled = round_half_up(f64::from(percent) / 100.0 * f64::from(LEVEL_MAX));
    clamp_to(scaled, 0.0, f64::from(LEVEL_MAX)) as u8
}

/// Maps a 0-254 level onto the vendor brightness percent.
///
/// The result never drops below 1: a level of 0 means "off", which is a
/// separate command on every generation.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn level_to_percent(level: u8) -> u8 {
    let scaled = round_half_up(f64::from(level) / f64::from(LEVEL_MAX) * 100.0);
    clamp_to(scaled, 1.0, 100.0) as u8
}

/// Maps a vendor cover position (0 closed, 100 open) onto the inverted
/// lift scale (0 open, 10000 closed).
#[must_use]
pub fn position_to_lift(position: u8) -> u16 {
    let scaled = clamp_to(
        round_half_up(f64::from(position) * 100.0),
        0.0,
        f64::from(LIFT_MAX),
    );
    LIFT_MAX - scaled
}

/// Maps an inverted lift value back onto the vendor cover position.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn lift_to_position(lift: u16) -> u8 {
    let scaled = clamp_to(round_half_up(f64::from(lift) / 100.0), 0.0, 100.0);
    100 - scaled as u8
}

/// Rounds and clamps an arbitrary number into a color channel.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn clamp_channel(value: f64) -> u8 {
    clamp_to(round_half_up(value), 0.0, 255.0) as u8
}

/// Rounds and clamps an arbitrary number into a percentage.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn clamp_percent(value: f64) -> u8 {
    clamp_to(round_half_up(value), 0.0, 100.0) as u8
}
