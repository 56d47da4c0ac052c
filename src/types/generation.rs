// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device generation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Hardware/firmware family of a Shelly device.
///
/// Gen1 speaks a REST dialect with URL-encoded parameters. Gen2 and Gen3
/// share the JSON-RPC dialect and the `/rpc` WebSocket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Generation {
    /// REST devices (Shelly 1, 2.5, Dimmer, RGBW2, H&T ...).
    Gen1,
    /// First RPC family (Plus and Pro lines).
    Gen2,
    /// Second RPC family.
    Gen3,
}

impl Generation {
    /// Returns the numeric generation.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Gen1 => 1,
            Self::Gen2 => 2,
            Self::Gen3 => 3,
        }
    }

    /// Returns `true` for the JSON-RPC generations.
    #[must_use]
    pub const fn is_rpc(self) -> bool {
        !matches!(self, Self::Gen1)
    }

    /// Guesses the generation from a method name.
    ///
    /// Gen1 endpoints are all lowercase (`status`, `relay/0`) while RPC
    /// methods are namespaced in `PascalCase` (`Switch.Set`). Only meant for
    /// calls issued before the identity payload is known.
    ///
    /// ```
    /// use shelly_lib::Generation;
    ///
    /// assert_eq!(Generation::infer_from_method("relay/0"), Generation::Gen1);
    /// assert_eq!(Generation::infer_from_method("Switch.Set"), Generation::Gen2);
    /// ```
    #[must_use]
    pub fn infer_from_method(method: &str) -> Self {
        if method.chars().any(|c| c.is_ascii_uppercase()) {
            Self::Gen2
        } else {
            Self::Gen1
        }
    }
}

impl TryFrom<u8> for Generation {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Gen1),
            2 => Ok(Self::Gen2),
            3 => Ok(Self::Gen3),
            other => Err(ValueError::UnsupportedGeneration(u64::from(other))),
        }
    }
}

impl From<Generation> for u8 {
    fn from(value: Generation) -> Self {
        value.number()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen{}", self.number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_rejects_unknown() {
        assert_eq!(Generation::try_from(2), Ok(Generation::Gen2));
        assert!(Generation::try_from(0).is_err());
        assert!(Generation::try_from(4).is_err());
    }

    #[test]
    fn infer_from_method_uses_case() {
        assert_eq!(Generation::infer_from_method("status"), Generation::Gen1);
        assert_eq!(Generation::infer_from_method("relay/0"), Generation::Gen1);
        assert_eq!(
            Generation::infer_from_method("Shelly.GetStatus"),
            Generation::Gen2
        );
    }

    #[test]
    fn serde_uses_number() {
        let json = serde_json::to_string(&Generation::Gen3).unwrap();
        assert_eq!(json, "3");
        let back: Generation = serde_json::from_str("1").unwrap();
        assert_eq!(back, Generation::Gen1);
        assert!(serde_json::from_str::<Generation>("7").is_err());
    }

    #[test]
    fn only_gen1_is_rest() {
        assert!(!Generation::Gen1.is_rpc());
        assert!(Generation::Gen2.is_rpc());
        assert!(Generation::Gen3.is_rpc());
    }
}
