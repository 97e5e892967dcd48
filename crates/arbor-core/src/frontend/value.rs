// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime values of the expression language and their JSON boundary.

use super::ast::ArrowFn;
use super::eval::Env;
use serde_json::{Map, Number, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) enum Val {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Vec<Val>),
    Object(Vec<(String, Val)>),
    Closure(Arc<Closure>),
    Builtin(Builtin),
}

#[derive(Debug)]
pub(crate) struct Closure {
    pub func: Arc<ArrowFn>,
    pub env: Env,
}

/// Host functions reachable from global names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    MathMax,
    MathMin,
    MathAbs,
    MathFloor,
    MathCeil,
    MathRound,
    ToString,
    ToNumber,
    ToBoolean,
    IsArray,
}

impl Val {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Num(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Functions and `undefined` have no JSON form and become `null`.
    pub fn into_json(self) -> Value {
        match self {
            Self::Undefined | Self::Null | Self::Closure(_) | Self::Builtin(_) => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Num(n) => number_to_json(n),
            Self::Str(s) => Value::String(s),
            Self::Array(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
            Self::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    map.insert(k, v.into_json());
                }
                Value::Object(map)
            }
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Num(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Closure(_) | Self::Builtin(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Num(_) => "number",
            Self::Str(_) => "string",
            Self::Closure(_) | Self::Builtin(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Object(_) | Self::Closure(_) | Self::Builtin(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Num(n) => *n,
            Self::Str(s) => {
                let t = s.trim();
                if t.is_empty() {
                    0.0
                } else {
                    t.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Array(items) => match items.as_slice() {
                [] => 0.0,
                [only] => only.to_number(),
                _ => f64::NAN,
            },
        }
    }

    /// String conversion as performed by `String(x)` and `+` concatenation.
    pub fn to_display(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => b.to_string(),
            Self::Num(n) => number_to_string(*n),
            Self::Str(s) => s.clone(),
            Self::Array(items) => items
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_display()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".into(),
            Self::Closure(_) | Self::Builtin(_) => "function".into(),
        }
    }

    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Num(a), Self::Num(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Closure(a), Self::Closure(b)) => Arc::ptr_eq(a, b),
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            // Containers are fresh copies, never the same object.
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Num(_) | Self::Str(_) | Self::Bool(_), Self::Num(_) | Self::Str(_) | Self::Bool(_))
                if std::mem::discriminant(self) != std::mem::discriminant(other) =>
            {
                self.to_number() == other.to_number()
            }
            _ => self.strict_eq(other),
        }
    }

    pub fn get_property(&self, key: &str) -> Self {
        match self {
            Self::Object(fields) => fields
                .iter()
                .rev()
                .find(|(k, _)| k == key)
                .map_or(Self::Undefined, |(_, v)| v.clone()),
            Self::Array(items) => match key {
                "length" => Self::Num(items.len() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Self::Undefined),
            },
            Self::Str(s) => match key {
                "length" => Self::Num(s.chars().count() as f64),
                _ => key
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map_or(Self::Undefined, |c| Self::Str(c.to_string())),
            },
            _ => Self::Undefined,
        }
    }
}

pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_owned()
    } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_cross_back_as_integers() {
        assert_eq!(Val::Num(6.0).into_json(), json!(6));
        assert_eq!(Val::Num(0.5).into_json(), json!(0.5));
        assert_eq!(Val::Num(f64::NAN).into_json(), Value::Null);
        assert_eq!(Val::Undefined.into_json(), Value::Null);
    }

    #[test]
    fn loose_equality_coerces_scalars() {
        assert!(Val::Str("1".into()).loose_eq(&Val::Num(1.0)));
        assert!(Val::Null.loose_eq(&Val::Undefined));
        assert!(!Val::Null.loose_eq(&Val::Num(0.0)));
        assert!(!Val::Str("1".into()).strict_eq(&Val::Num(1.0)));
    }

    #[test]
    fn array_display_joins_with_commas() {
        let v = Val::from_json(&json!([1, "a", null, [2, 3]]));
        assert_eq!(v.to_display(), "1,a,,2,3");
    }
}
