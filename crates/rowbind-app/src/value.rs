// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A scalar cell value as the record store hands it out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Truthiness used by boolean rendering: null, zero and empty text are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Integer(value) => *value != 0,
            Self::Real(value) => *value != 0.0,
            Self::Text(value) => !value.is_empty(),
        }
    }

    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Equality against a checkbox state. Integers compare as 0/1, which is
    /// how SQLite stores booleans.
    pub fn eq_bool(&self, expected: bool) -> bool {
        match self {
            Self::Integer(value) => *value == i64::from(expected),
            Self::Real(value) => *value == f64::from(u8::from(expected)),
            Self::Null | Self::Text(_) => false,
        }
    }

    /// Total order used for sorting: null, then numbers by magnitude, then
    /// text by code point, the way SQLite orders mixed columns.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        const fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Integer(_) | Value::Real(_) => 1,
                Value::Text(_) => 2,
            }
        }
        match (self, other) {
            (Self::Integer(left), Self::Integer(right)) => left.cmp(right),
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
            (left, right) if rank(left) == 1 && rank(right) == 1 => {
                let left = left.as_f64().unwrap_or_default();
                let right = right.as_f64().unwrap_or_default();
                left.total_cmp(&right)
            }
            (left, right) => rank(left).cmp(&rank(right)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(200, 40, 40);
    pub const GREEN: Self = Self::rgb(40, 160, 60);
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb`.
    pub fn parse_hex(raw: &str) -> Option<Self> {
        let hex = raw.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Icon resource identifier, e.g. `:record/tick`. Resolving the resource is
/// the rendering surface's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Icon(String);

impl Icon {
    pub fn new(resource: impl Into<String>) -> Self {
        Self(resource.into())
    }

    pub fn resource(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Icon {
    fn from(resource: &str) -> Self {
        Self::new(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::{Color, Value};
    use std::cmp::Ordering;

    #[test]
    fn truthiness_follows_stored_representation() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(2).is_truthy());
        assert!(!Value::Text(String::new()).is_truthy());
        assert!(Value::from("no").is_truthy());
        assert!(!Value::Real(0.0).is_truthy());
    }

    #[test]
    fn eq_bool_matches_sqlite_booleans_only() {
        assert!(Value::Integer(1).eq_bool(true));
        assert!(Value::Integer(0).eq_bool(false));
        assert!(!Value::Integer(2).eq_bool(true));
        assert!(!Value::Null.eq_bool(false));
        assert!(!Value::from("true").eq_bool(true));
    }

    #[test]
    fn display_renders_null_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(42_i64).to_string(), "42");
        assert_eq!(Value::from("abc").to_string(), "abc");
    }

    #[test]
    fn optional_values_convert_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_owned()));
    }

    #[test]
    fn sort_order_puts_null_first_then_numbers_then_text() {
        let mut values = vec![
            Value::from("b"),
            Value::Real(2.5),
            Value::Null,
            Value::Integer(3),
            Value::from("a"),
            Value::Integer(-1),
        ];
        values.sort_by(Value::sort_cmp);
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(-1),
                Value::Real(2.5),
                Value::Integer(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
        assert_eq!(Value::Integer(2).sort_cmp(&Value::Real(2.0)), Ordering::Equal);
    }

    #[test]
    fn color_parses_hex() {
        assert_eq!(Color::parse_hex("#ff0080"), Some(Color::rgb(255, 0, 128)));
        assert_eq!(Color::parse_hex("ff0080"), None);
        assert_eq!(Color::parse_hex("#ff00"), None);
        assert_eq!(Color::parse_hex("#gg0000"), None);
    }
}
