use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;

use float_cmp::approx_eq;
use serde::Serialize;

use crate::ProustError;
use crate::ProustResult;

/// Key and method lookup on a context value.
///
/// Maps answer by key, lists by numeric index and [`Value::Object`] records
/// however they like. `try_call` is the fallback for zero-argument methods
/// and is only consulted when `try_get` finds nothing.
pub trait Lookup: Debug {
	fn try_get(&self, key: &str) -> Option<Value>;

	fn try_call(&self, _method: &str) -> Option<Value> {
		None
	}
}

type LambdaFn = dyn Fn(&str) -> Value + Send + Sync;

/// A callable context value. Section lambdas receive the raw section body,
/// variable lambdas an empty string.
#[derive(Clone)]
pub struct Lambda(Arc<LambdaFn>);

impl Lambda {
	pub fn new(function: impl Fn(&str) -> Value + Send + Sync + 'static) -> Self {
		Self(Arc::new(function))
	}

	pub fn call(&self, text: &str) -> Value {
		(self.0)(text)
	}
}

impl Debug for Lambda {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Lambda(..)")
	}
}

impl PartialEq for Lambda {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

/// A value that templates can read from.
#[derive(Debug, Clone, Default)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	/// Whole numbers, kept exact across the full `i64` and `u64` ranges.
	Integer(i128),
	Number(f64),
	Text(String),
	List(Vec<Value>),
	Map(BTreeMap<String, Value>),
	Lambda(Lambda),
	/// A user record exposing fields and zero-argument methods.
	Object(Arc<dyn Lookup + Send + Sync>),
}

impl Value {
	/// Convert any serializable value, e.g. a `#[derive(Serialize)]` struct,
	/// by enumerating its fields.
	pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> ProustResult<Self> {
		serde_json::to_value(value)
			.map(Self::from)
			.map_err(|error| ProustError::InvalidContext(error.to_string()))
	}

	pub fn lambda(function: impl Fn(&str) -> Value + Send + Sync + 'static) -> Self {
		Self::Lambda(Lambda::new(function))
	}

	pub fn object(record: impl Lookup + Send + Sync + 'static) -> Self {
		Self::Object(Arc::new(record))
	}

	/// Null, `false` and the empty list are falsy. Everything else is truthy,
	/// including `""` and `0`.
	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Null | Self::Bool(false) => false,
			Self::List(items) => !items.is_empty(),
			_ => true,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Text(text) => Some(text),
			_ => None,
		}
	}
}

impl Lookup for Value {
	fn try_get(&self, key: &str) -> Option<Value> {
		match self {
			Self::Map(map) => map.try_get(key),
			Self::List(items) => items.try_get(key),
			Self::Object(record) => record.try_get(key),
			_ => None,
		}
	}

	fn try_call(&self, method: &str) -> Option<Value> {
		match self {
			Self::Object(record) => record.try_call(method),
			_ => None,
		}
	}
}

impl Lookup for BTreeMap<String, Value> {
	fn try_get(&self, key: &str) -> Option<Value> {
		self.get(key).cloned()
	}
}

impl Lookup for Vec<Value> {
	fn try_get(&self, key: &str) -> Option<Value> {
		key.parse::<usize>()
			.ok()
			.and_then(|index| self.get(index))
			.cloned()
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(value), Self::Bool(other_value)) => value == other_value,
			(Self::Integer(value), Self::Integer(other_value)) => value == other_value,
			(Self::Number(value), Self::Number(other_value)) => {
				approx_eq!(f64, *value, *other_value, ulps = 2)
			}
			(Self::Integer(integer), Self::Number(number))
			| (Self::Number(number), Self::Integer(integer)) => {
				#[allow(clippy::cast_precision_loss)]
				let integer = *integer as f64;
				approx_eq!(f64, integer, *number, ulps = 2)
			}
			(Self::Text(value), Self::Text(other_value)) => value == other_value,
			(Self::List(value), Self::List(other_value)) => value == other_value,
			(Self::Map(value), Self::Map(other_value)) => value == other_value,
			(Self::Lambda(value), Self::Lambda(other_value)) => value == other_value,
			(Self::Object(value), Self::Object(other_value)) => Arc::ptr_eq(value, other_value),
			_ => false,
		}
	}
}

/// The text a value interpolates as.
impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Bool(true) => f.write_str("true"),
			Self::Integer(integer) => write!(f, "{integer}"),
			Self::Number(number) => {
				if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 {
					write!(f, "{}", *number as i64)
				} else {
					write!(f, "{number}")
				}
			}
			Self::Text(text) => f.write_str(text),
			Self::Null
			| Self::Bool(false)
			| Self::List(_)
			| Self::Map(_)
			| Self::Lambda(_)
			| Self::Object(_) => Ok(()),
		}
	}
}

impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		match value {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(value) => Self::Bool(value),
			serde_json::Value::Number(number) => {
				if let Some(integer) = number.as_i64() {
					Self::Integer(i128::from(integer))
				} else if let Some(integer) = number.as_u64() {
					Self::Integer(i128::from(integer))
				} else {
					Self::Number(number.as_f64().unwrap_or_default())
				}
			}
			serde_json::Value::String(text) => Self::Text(text),
			serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
			serde_json::Value::Object(map) => {
				Self::Map(
					map.into_iter()
						.map(|(key, value)| (key, Self::from(value)))
						.collect(),
				)
			}
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::Text(value.to_string())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::Text(value)
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for Value {
	fn from(value: i64) -> Self {
		Self::Integer(i128::from(value))
	}
}

impl From<u64> for Value {
	fn from(value: u64) -> Self {
		Self::Integer(i128::from(value))
	}
}

impl From<i32> for Value {
	fn from(value: i32) -> Self {
		Self::Integer(i128::from(value))
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

impl From<Lambda> for Value {
	fn from(value: Lambda) -> Self {
		Self::Lambda(value)
	}
}

impl<T: Into<Value>> From<Vec<T>> for Value {
	fn from(values: Vec<T>) -> Self {
		Self::List(values.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl From<BTreeMap<String, Value>> for Value {
	fn from(map: BTreeMap<String, Value>) -> Self {
		Self::Map(map)
	}
}

#[allow(clippy::implicit_hasher)]
impl<V: Into<Value>> From<HashMap<String, V>> for Value {
	fn from(map: HashMap<String, V>) -> Self {
		Self::Map(map.into_iter().map(|(key, value)| (key, value.into())).collect())
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self::Map(
			iter.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		)
	}
}
