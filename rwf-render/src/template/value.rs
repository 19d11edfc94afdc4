//! Values passed into templates as locals and scope variables.
//!
//! All data a template sees, strings, numbers, lists, hashes,
//! is represented with [`Value`]. Operators and attribute access
//! are implemented here so any compiler can share them.
use serde::Deserialize;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::Error;

/// A template value, e.g. `5` or `"hello world"`.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Hash(BTreeMap<String, Value>),
    /// String that is never escaped when printed.
    #[serde(skip_deserializing)]
    Safe(String),
    Null,
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => i1.partial_cmp(i2),
            (Value::Integer(i1), Value::Float(f2)) => (*i1 as f64).partial_cmp(f2),
            (Value::Float(f1), Value::Integer(i2)) => f1.partial_cmp(&(*i2 as f64)),
            (Value::Float(f1), Value::Float(f2)) => f1.partial_cmp(f2),
            (Value::String(s1), Value::String(s2)) => s1.partial_cmp(s2),
            (Value::Boolean(b1), Value::Boolean(b2)) => b1.partial_cmp(b2),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) | Value::Safe(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    write!(f, "{}", v)?;
                    if i < l.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, "]")
            }
            Value::Hash(h) => {
                write!(f, "{{")?;
                for (i, (k, v)) in h.iter().enumerate() {
                    write!(f, "{}: {}", k, v)?;
                    if i < h.len() - 1 {
                        write!(f, ", ")?;
                    }
                }
                write!(f, "}}")
            }
            // nil prints as nothing.
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// Mark a string as safe, so it's printed as-is even when escaping is on.
    pub fn safe(string: impl ToString) -> Self {
        Value::Safe(string.to_string())
    }

    /// If the value, when evaluated in the context of an `if` statement,
    /// would result in the `if` statement being executed.
    ///
    /// Only `false` and `nil` are falsy.
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    pub fn add(&self, other: &Self) -> Result<Self, Error> {
        Ok(match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => {
                Value::Integer(i1.checked_add(*i2).ok_or_else(|| Self::overflow("+"))?)
            }
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 + f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 + *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 + f2),
            (Value::String(s1), Value::String(s2)) => Value::String(format!("{}{}", s1, s2)),
            (Value::List(l1), Value::List(l2)) => {
                let mut list = l1.clone();
                list.extend(l2.iter().cloned());
                Value::List(list)
            }
            (left, right) => return Err(Self::type_error("+", left, right)),
        })
    }

    pub fn sub(&self, other: &Self) -> Result<Self, Error> {
        Ok(match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => {
                Value::Integer(i1.checked_sub(*i2).ok_or_else(|| Self::overflow("-"))?)
            }
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 - f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 - *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 - f2),
            (Value::List(list), other) => {
                let mut list = list.clone();
                list.retain(|v| v != other);
                Value::List(list)
            }
            (left, right) => return Err(Self::type_error("-", left, right)),
        })
    }

    pub fn mul(&self, other: &Self) -> Result<Self, Error> {
        Ok(match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => {
                Value::Integer(i1.checked_mul(*i2).ok_or_else(|| Self::overflow("*"))?)
            }
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 * f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 * *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 * f2),
            (Value::String(s), Value::Integer(n)) if *n >= 0 => Value::String(s.repeat(*n as usize)),
            (left, right) => return Err(Self::type_error("*", left, right)),
        })
    }

    pub fn div(&self, other: &Self) -> Result<Self, Error> {
        Ok(match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => {
                return Err(Error::Runtime("divided by 0".into()))
            }
            (Value::Integer(i1), Value::Integer(i2)) => {
                Value::Integer(i1.checked_div_euclid(*i2).ok_or_else(|| Self::overflow("/"))?)
            }
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 / f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 / *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 / f2),
            (left, right) => return Err(Self::type_error("/", left, right)),
        })
    }

    /// Call a method without arguments on the value, e.g. `user.name` or `items.length`.
    pub fn attribute(&self, name: &str) -> Result<Self, Error> {
        match (self, name) {
            (Value::Hash(hash), name) => Ok(hash.get(name).cloned().unwrap_or(Value::Null)),
            (Value::List(list), "length" | "size") => Ok(Value::Integer(list.len() as i64)),
            (Value::List(list), "first") => Ok(list.first().cloned().unwrap_or(Value::Null)),
            (Value::List(list), "last") => Ok(list.last().cloned().unwrap_or(Value::Null)),
            (Value::List(list), "empty?") => Ok(Value::Boolean(list.is_empty())),
            (Value::String(s), "length" | "size") => Ok(Value::Integer(s.chars().count() as i64)),
            (Value::String(s), "upcase") => Ok(Value::String(s.to_uppercase())),
            (Value::String(s), "downcase") => Ok(Value::String(s.to_lowercase())),
            (Value::String(s), "strip") => Ok(Value::String(s.trim().to_string())),
            (Value::String(s), "empty?") => Ok(Value::Boolean(s.is_empty())),
            (Value::Null, "nil?") => Ok(Value::Boolean(true)),
            (_, "nil?") => Ok(Value::Boolean(false)),
            (_, "to_s") => Ok(Value::String(self.to_string())),
            (value, name) => Err(Error::UnknownMethod(name.to_string(), value.type_name().into())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) | Value::Safe(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Null => "nil",
        }
    }

    fn overflow(op: &str) -> Error {
        Error::Runtime(format!("integer overflow in \"{}\"", op))
    }

    fn type_error(op: &str, left: &Value, right: &Value) -> Error {
        Error::Runtime(format!(
            "operation \"{}\" is not supported between {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))
    }
}

/// Convert a Rust type into a template value.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }
}

macro_rules! impl_integer {
    ($ty:ty) => {
        impl ToValue for $ty {
            fn to_value(&self) -> Value {
                Value::Integer(*self as i64)
            }
        }
    };
}

impl_integer!(i64);
impl_integer!(i32);
impl_integer!(i16);
impl_integer!(i8);
impl_integer!(u32);
impl_integer!(u16);
impl_integer!(u8);
impl_integer!(usize);

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(|v| v.to_value()).collect())
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Hash(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        use serde_json::Value as Json;

        match self {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s.clone()),
            Json::Array(list) => Value::List(list.iter().map(|v| v.to_value()).collect()),
            Json::Object(hash) => Value::Hash(
                hash.iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }
}

/// Local variables available to a template.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Locals {
    values: HashMap<String, Value>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl ToValue) -> &mut Self {
        self.values.insert(key.to_string(), value.to_value());
        self
    }

    /// Builder-style [`Locals::set`].
    pub fn with(mut self, key: &str, value: impl ToValue) -> Self {
        self.set(key, value);
        self
    }

    /// Return a copy of these locals with `other` merged on top.
    /// Values in `other` win on key conflict.
    pub fn merge(&self, other: &Locals) -> Locals {
        let mut values = self.values.clone();
        values.extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Locals { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: ToString, V: ToValue, const N: usize> From<[(K, V); N]> for Locals {
    fn from(values: [(K, V); N]) -> Locals {
        Locals {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_value()))
                .collect(),
        }
    }
}

impl From<HashMap<String, Value>> for Locals {
    fn from(values: HashMap<String, Value>) -> Locals {
        Locals { values }
    }
}

impl TryFrom<serde_json::Value> for Locals {
    type Error = Error;

    fn try_from(json: serde_json::Value) -> Result<Locals, Self::Error> {
        match json.to_value() {
            Value::Hash(hash) => Ok(Locals {
                values: hash.into_iter().collect(),
            }),
            value => Err(Error::Runtime(format!(
                "locals must be a hash, got {} instead",
                value.type_name()
            ))),
        }
    }
}
