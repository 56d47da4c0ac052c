// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RGB color type used by light and RGB components.

use std::fmt;

use serde_json::Value;

use crate::error::ValueError;

/// One channel of an RGB color, as written by a bridging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorChannel {
    /// Red channel.
    Red,
    /// Green channel.
    Green,
    /// Blue channel.
    Blue,
}

impl ColorChannel {
    /// Property key of the channel on a gen1 light component.
    #[must_use]
    pub const fn property(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
        }
    }

    /// Position of the channel inside a gen2 `rgb` array.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
        }
    }
}

/// RGB color with 8-bit channels (0-255).
///
/// # Examples
///
/// ```
/// use shelly_lib::types::{ColorChannel, RgbColor};
///
/// let color = RgbColor::new(255, 128, 0).with_channel(ColorChannel::Blue, 10);
/// assert_eq!(color.to_array(), [255, 128, 10]);
/// assert_eq!(color.to_hex(), "FF800A");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RgbColor {
    red: u8,
    green: u8,
    blue: u8,
}

impl RgbColor {
    /// Creates a new RGB color.
    #[must_use]
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Builds a color from three integers, rejecting anything outside 0-255.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` for the first offending channel.
    pub fn checked(red: i64, green: i64, blue: i64) -> Result<Self, ValueError> {
        let channel = |value: i64| {
            u8::try_from(value).map_err(|_| ValueError::OutOfRange {
                min: 0,
                max: 255,
                actual: value,
            })
        };
        Ok(Self::new(channel(red)?, channel(green)?, channel(blue)?))
    }

    /// Reads a color from a JSON `[r, g, b]` array as reported by gen2 RGB
    /// components. Out of range numbers are clamped into 0-255.
    #[must_use]
    pub fn from_json_array(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        if items.len() != 3 {
            return None;
        }
        let mut rgb = [0u8; 3];
        for (slot, item) in rgb.iter_mut().zip(items) {
            *slot = super::scale::clamp_channel(item.as_f64()?);
        }
        Some(Self::from(rgb))
    }

    /// Returns the red component.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.red
    }

    /// Returns the green component.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.green
    }

    /// Returns the blue component.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.blue
    }

    /// Returns a single channel.
    #[must_use]
    pub const fn channel(&self, channel: ColorChannel) -> u8 {
        match channel {
            ColorChannel::Red => self.red,
            ColorChannel::Green => self.green,
            ColorChannel::Blue => self.blue,
        }
    }

    /// Returns a copy with one channel replaced.
    #[must_use]
    pub const fn with_channel(mut self, channel: ColorChannel, value: u8) -> Self {
        match channel {
            ColorChannel::Red => self.red = value,
            ColorChannel::Green => self.green = value,
            ColorChannel::Blue => self.blue = value,
        }
        self
    }

    /// Returns the channels as `[r, g, b]`.
    #[must_use]
    pub const fn to_array(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }

    /// Returns the color as an uppercase hex string without prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl From<[u8; 3]> for RgbColor {
    fn from([red, green, blue]: [u8; 3]) -> Self {
        Self::new(red, green, blue)
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}
