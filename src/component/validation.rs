// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-kind property validation.
//!
//! | property                      | kinds                     | rule              |
//! |-------------------------------|---------------------------|-------------------|
//! | `state`                       | Switch, Light, Rgb, Input | boolean           |
//! | `brightness`                  | Light, Rgb, Switch        | number 0-100      |
//! | `red`, `green`, `blue`, `white` | Light, Rgb              | number 0-255      |
//! | `rgb`                         | Light, Rgb                | array of 3, 0-255 |
//! | `gain`                        | Light, Rgb                | number 0-100      |
//! | `current_pos`, `target_pos`   | Cover                     | 0-100 or null     |
//! | `percent`, `level`            | Battery                   | number 0-100      |
//! | `apower`, `power`, `voltage`, `current` | Switch, PowerMeter | number        |
//!
//! Keys not listed for a kind accept any value.

use serde_json::Value;

use super::ComponentKind;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Rule {
    Boolean,
    Number,
    Range { min: f64, max: f64 },
    NullableRange { min: f64, max: f64 },
    Triplet { min: f64, max: f64 },
}

const PERCENT: Rule = Rule::Range {
    min: 0.0,
    max: 100.0,
};
const CHANNEL: Rule = Rule::Range {
    min: 0.0,
    max: 255.0,
};

fn rule_for(kind: ComponentKind, key: &str) -> Option<Rule> {
    use ComponentKind as K;

    match (kind, key) {
        (K::Switch | K::Light | K::Rgb | K::Input, "state") => Some(Rule::Boolean),
        (K::Light | K::Rgb | K::Switch, "brightness") => Some(PERCENT),
        (K::Light | K::Rgb, "gain") => Some(PERCENT),
        (K::Light | K::Rgb, "red" | "green" | "blue" | "white") => Some(CHANNEL),
        (K::Light | K::Rgb, "rgb") => Some(Rule::Triplet {
            min: 0.0,
            max: 255.0,
        }),
        (K::Cover, "current_pos" | "target_pos") => Some(Rule::NullableRange {
            min: 0.0,
            max: 100.0,
        }),
        (K::Battery, "percent" | "level") => Some(PERCENT),
        (K::Switch | K::PowerMeter, "apower" | "power" | "voltage" | "current") => {
            Some(Rule::Number)
        }
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_number(key: &str, value: &Value, min: f64, max: f64) -> Result<(), ValidationError> {
    let Some(number) = value.as_f64() else {
        return Err(ValidationError::WrongType {
            key: key.to_string(),
            expected: "number",
            actual: type_name(value),
        });
    };
    if number < min || number > max {
        return Err(ValidationError::OutOfRange {
            key: key.to_string(),
            min,
            max,
            value: number,
        });
    }
    Ok(())
}

/// Checks `value` against the rule registered for `(kind, key)`.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first violated constraint.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use shelly_lib::component::{ComponentKind, validation};
///
/// assert!(validation::validate(ComponentKind::Light, "brightness", &json!(40)).is_ok());
/// assert!(validation::validate(ComponentKind::Light, "brightness", &json!(140)).is_err());
/// assert!(validation::validate(ComponentKind::Sys, "brightness", &json!(140)).is_ok());
/// ```
pub fn validate(kind: ComponentKind, key: &str, value: &Value) -> Result<(), ValidationError> {
    let Some(rule) = rule_for(kind, key) else {
        return Ok(());
    };

    match rule {
        Rule::Boolean => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(ValidationError::WrongType {
                    key: key.to_string(),
                    expected: "boolean",
                    actual: type_name(value),
                })
            }
        }
        Rule::Number => check_number(key, value, f64::MIN, f64::MAX),
        Rule::Range { min, max } => check_number(key, value, min, max),
        Rule::NullableRange { min, max } => {
            if value.is_null() {
                Ok(())
            } else {
                check_number(key, value, min, max)
            }
        }
        Rule::Triplet { min, max } => {
            let Some(items) = value.as_array() else {
                return Err(ValidationError::WrongType {
                    key: key.to_string(),
                    expected: "array",
                    actual: type_name(value),
                });
            };
            if items.len() != 3 {
                return Err(ValidationError::WrongLength {
                    key: key.to_string(),
                    expected: 3,
                    actual: items.len(),
                });
            }
            items
                .iter()
                .try_for_each(|item| check_number(key, item, min, max))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn state_must_be_boolean() {
        assert!(validate(ComponentKind::Switch, "state", &json!(true)).is_ok());
        let err = validate(ComponentKind::Switch, "state", &json!("on")).unwrap_err();
        assert_eq!(
            err,
            ValidationError::WrongType {
                key: "state".into(),
                expected: "boolean",
                actual: "string",
            }
        );
    }

    #[test]
    fn brightness_bounds_are_inclusive() {
        assert!(validate(ComponentKind::Light, "brightness", &json!(0)).is_ok());
        assert!(validate(ComponentKind::Light, "brightness", &json!(100)).is_ok());
        assert!(matches!(
            validate(ComponentKind::Light, "brightness", &json!(101)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate(ComponentKind::Light, "brightness", &json!(-1)).is_err());
    }

    #[test]
    fn switch_brightness_is_a_percentage() {
        assert!(validate(ComponentKind::Switch, "brightness", &json!(40)).is_ok());
        assert!(matches!(
            validate(ComponentKind::Switch, "brightness", &json!(150)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate(ComponentKind::Switch, "brightness", &json!("high")).is_err());
    }

    #[test]
    fn color_channels() {
        assert!(validate(ComponentKind::Rgb, "red", &json!(255)).is_ok());
        assert!(validate(ComponentKind::Rgb, "blue", &json!(256)).is_err());
        assert!(validate(ComponentKind::Rgb, "rgb", &json!([1, 2, 3])).is_ok());
        assert!(matches!(
            validate(ComponentKind::Rgb, "rgb", &json!([1, 2])),
            Err(ValidationError::WrongLength {
                expected: 3,
                actual: 2,
                ..
            })
        ));
        assert!(validate(ComponentKind::Rgb, "rgb", &json!([1, 2, 300])).is_err());
    }

    #[test]
    fn cover_position_accepts_null() {
        assert!(validate(ComponentKind::Cover, "current_pos", &Value::Null).is_ok());
        assert!(validate(ComponentKind::Cover, "current_pos", &json!(55)).is_ok());
        assert!(validate(ComponentKind::Cover, "target_pos", &json!(120)).is_err());
    }

    #[test]
    fn unknown_keys_pass() {
        assert!(validate(ComponentKind::Switch, "source", &json!("WS_in")).is_ok());
        assert!(validate(ComponentKind::Unknown, "state", &json!(42)).is_ok());
    }

    #[test]
    fn power_fields_are_numeric() {
        assert!(validate(ComponentKind::Switch, "apower", &json!(12.5)).is_ok());
        assert!(validate(ComponentKind::PowerMeter, "voltage", &json!("230")).is_err());
    }
}
