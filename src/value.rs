use std::collections::BTreeMap;

use crate::{
    core::{Rgba, Vec2, Vec3},
    error::{AnimataError, AnimataResult},
};

/// The closed set of animatable value shapes.
///
/// Interpolation is defined per variant; mismatched variants fall back to a
/// binary switch at `t = 0.5` since no meaningful blend exists.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Number(f64),
    Vector2(Vec2),
    Vector3(Vec3),
    Color(Rgba),
    Bool(bool),
    Text(String),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self {
            Self::Vector2(v) => Some(*v),
            _ => None,
        }
    }
}

fn lerp_f64(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    let a = f64::from(a);
    let b = f64::from(b);
    (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
}

/// Interpolate `a` toward `b` at eased progress `t`.
///
/// Maps recurse field-by-field; fields present only in `a` pass through
/// unchanged (no symmetric union).
pub fn lerp_value(a: &Value, b: &Value, t: f64) -> Value {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Value::Number(lerp_f64(*x, *y, t)),
        (Value::Vector2(x), Value::Vector2(y)) => {
            Value::Vector2(Vec2::new(lerp_f64(x.x, y.x, t), lerp_f64(x.y, y.y, t)))
        }
        (Value::Vector3(x), Value::Vector3(y)) => Value::Vector3(Vec3::new(
            lerp_f64(x.x, y.x, t),
            lerp_f64(x.y, y.y, t),
            lerp_f64(x.z, y.z, t),
        )),
        (Value::Color(x), Value::Color(y)) => Value::Color(Rgba {
            r: lerp_u8(x.r, y.r, t),
            g: lerp_u8(x.g, y.g, t),
            b: lerp_u8(x.b, y.b, t),
            a: lerp_u8(x.a, y.a, t),
        }),
        (Value::Map(x), Value::Map(y)) => {
            let mut out = BTreeMap::new();
            for (k, av) in x {
                match y.get(k) {
                    Some(bv) => out.insert(k.clone(), lerp_value(av, bv, t)),
                    None => out.insert(k.clone(), av.clone()),
                };
            }
            Value::Map(out)
        }
        // Bool, Text and mismatched variants: hard switch at the midpoint.
        (a, b) => {
            if t < 0.5 {
                a.clone()
            } else {
                b.clone()
            }
        }
    }
}

/// A dot-addressed property path (`"scale.x"`, `"glow.intensity"`).
///
/// Paths are parsed and validated up front; resolution against a property
/// bag never fabricates intermediate nodes.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> AnimataResult<Self> {
        let path = path.trim();
        if path.is_empty() {
            return Err(AnimataError::validation("property path must be non-empty"));
        }
        let mut segments = Vec::new();
        for seg in path.split('.') {
            if seg.is_empty() {
                return Err(AnimataError::validation(format!(
                    "property path '{path}' has an empty segment"
                )));
            }
            if !seg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(AnimataError::validation(format!(
                    "property path segment '{seg}' contains invalid characters"
                )));
            }
            segments.push(seg.to_string());
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    pub fn tail(&self) -> &[String] {
        &self.segments[1..]
    }
}

impl std::fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl TryFrom<String> for PropertyPath {
    type Error = AnimataError;

    fn try_from(s: String) -> AnimataResult<Self> {
        Self::parse(&s)
    }
}

impl std::str::FromStr for PropertyPath {
    type Err = AnimataError;

    fn from_str(s: &str) -> AnimataResult<Self> {
        Self::parse(s)
    }
}

impl From<PropertyPath> for String {
    fn from(p: PropertyPath) -> String {
        p.to_string()
    }
}

/// Read a nested value out of a map without creating anything.
pub fn map_read<'a>(map: &'a BTreeMap<String, Value>, segments: &[String]) -> Option<&'a Value> {
    let (head, tail) = segments.split_first()?;
    let v = map.get(head)?;
    if tail.is_empty() {
        return Some(v);
    }
    match v {
        Value::Map(inner) => map_read(inner, tail),
        _ => None,
    }
}

/// Write a nested value into a map. Fails (returns false) when any
/// intermediate node is missing or not a map; missing nodes are never
/// fabricated.
pub fn map_write(map: &mut BTreeMap<String, Value>, segments: &[String], value: Value) -> bool {
    let Some((head, tail)) = segments.split_first() else {
        return false;
    };
    if tail.is_empty() {
        if map.contains_key(head) {
            map.insert(head.clone(), value);
            return true;
        }
        return false;
    }
    match map.get_mut(head) {
        Some(Value::Map(inner)) => map_write(inner, tail, value),
        _ => false,
    }
}
