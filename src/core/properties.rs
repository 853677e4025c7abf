// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Integer(i64),
    Float(Float),
    Boolean(bool),
    Str(String),
    Rgb(RGBSpectrum),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Integer(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Boolean(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
            PropertyValue::Rgb(c) => write!(f, "{} {} {}", c.r(), c.g(), c.b()),
        }
    }
}

/// Named, typed configuration inputs as they come from the host property
/// panels. Every getter validates type and range and reports the property
/// name on failure.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self { values: HashMap::new() }
    }

    pub fn set<S: Into<String>>(&mut self, name: S, value: PropertyValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: &str, value: PropertyValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn merge(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    pub fn integer(&self, name: &str, default: i64, range: RangeInclusive<i64>) -> RenderResult<i64> {
        let value = match self.values.get(name) {
            None => default,
            Some(PropertyValue::Integer(v)) => *v,
            Some(other) => return Err(type_error(name, other, "integer")),
        };
        if !range.contains(&value) {
            return Err(RenderError::config(
                name,
                value,
                format!("out of range [{}, {}]", range.start(), range.end()),
            ));
        }
        Ok(value)
    }

    pub fn float(&self, name: &str, default: Float, range: RangeInclusive<Float>) -> RenderResult<Float> {
        let value = match self.values.get(name) {
            None => default,
            Some(PropertyValue::Float(v)) => *v,
            Some(PropertyValue::Integer(v)) => *v as Float,
            Some(other) => return Err(type_error(name, other, "float")),
        };
        if !value.is_finite() || !range.contains(&value) {
            return Err(RenderError::config(
                name,
                value,
                format!("out of range [{}, {}]", range.start(), range.end()),
            ));
        }
        Ok(value)
    }

    pub fn boolean(&self, name: &str, default: bool) -> RenderResult<bool> {
        match self.values.get(name) {
            None => Ok(default),
            Some(PropertyValue::Boolean(v)) => Ok(*v),
            Some(other) => Err(type_error(name, other, "boolean")),
        }
    }

    pub fn string(&self, name: &str, default: &str) -> RenderResult<String> {
        match self.values.get(name) {
            None => Ok(default.to_string()),
            Some(PropertyValue::Str(v)) => Ok(v.clone()),
            Some(other) => Err(type_error(name, other, "string")),
        }
    }

    pub fn rgb(&self, name: &str, default: RGBSpectrum, range: RangeInclusive<Float>) -> RenderResult<RGBSpectrum> {
        let value = match self.values.get(name) {
            None => default,
            Some(PropertyValue::Rgb(c)) => *c,
            Some(other) => return Err(type_error(name, other, "rgb")),
        };
        for idx in 0..3 {
            if !range.contains(&value[idx]) {
                return Err(RenderError::config(
                    name,
                    PropertyValue::Rgb(value),
                    format!("component out of range [{}, {}]", range.start(), range.end()),
                ));
            }
        }
        Ok(value)
    }

    /// Parses an enumerated string property through `FromStr`.
    pub fn choice<T: FromStr>(&self, name: &str, default: &str, allowed: &[&str]) -> RenderResult<T> {
        let raw = self.string(name, default)?;
        raw.parse::<T>().map_err(|_| {
            RenderError::config(name, &raw, format!("expected one of: {}", allowed.join(", ")))
        })
    }
}

fn type_error(name: &str, found: &PropertyValue, expected: &str) -> RenderError {
    RenderError::config(name, found, format!("expected a {} value", expected))
}

/// Parses the textual `value` attribute of a typed property element.
pub fn parse_property(kind: &str, raw: &str) -> Option<PropertyValue> {
    let raw = raw.trim();
    match kind {
        "integer" => raw.parse::<i64>().ok().map(PropertyValue::Integer),
        "float" => raw.parse::<Float>().ok().map(PropertyValue::Float),
        "boolean" => match raw {
            "true" | "True" | "1" => Some(PropertyValue::Boolean(true)),
            "false" | "False" | "0" => Some(PropertyValue::Boolean(false)),
            _ => None,
        },
        "string" => Some(PropertyValue::Str(raw.to_string())),
        "rgb" | "color" => {
            let parts: Vec<Float> = raw
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Float>())
                .collect::<Result<_, _>>()
                .ok()?;
            match parts.len() {
                1 => Some(PropertyValue::Rgb(RGBSpectrum::splat(parts[0]))),
                3 => Some(PropertyValue::Rgb(RGBSpectrum::new(parts[0], parts[1], parts[2]))),
                _ => None,
            }
        }
        _ => None,
    }
}
