use std::{cmp::Ordering, fmt, sync::Arc};

use indexmap::IndexMap;

/// Pseudo-property answered by containers that do not store it themselves.
pub const SIZE_KEY: &str = "size";

/// A runtime value seen by templates and filters.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Raw bytes; normalised to text before a filter result is returned.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(MapValue),
}

impl Value {
    pub fn map<M: OrderedMap + 'static>(map: M) -> Self {
        Value::Map(MapValue::new(map))
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    pub const fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Only `nil` and `false` are falsy.
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a raw filter or host result into its canonical form: byte
    /// sequences become text.
    pub fn normalize(self) -> Self {
        match self {
            Value::Bytes(bytes) => match String::from_utf8(bytes) {
                Ok(text) => Value::String(text),
                Err(err) => Value::String(String::from_utf8_lossy(err.as_bytes()).into_owned()),
            },
            other => other,
        }
    }

    /// `value[key]`. Missing entries are nil, never an error.
    pub fn index_value(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::Map(map), _) => map.index_value(key),
            (Value::Array(items), Value::Int(index)) => {
                let len = items.len() as i64;
                let index = if *index < 0 { index.saturating_add(len) } else { *index };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or_default()
            }
            _ => Value::Nil,
        }
    }

    /// `value.key`.
    pub fn property_value(&self, key: &Value) -> Value {
        match self {
            Value::Map(map) => map.property_value(key),
            Value::Array(items) => match key.as_str() {
                Some(SIZE_KEY) => Value::Int(items.len() as i64),
                Some("first") => items.first().cloned().unwrap_or_default(),
                Some("last") => items.last().cloned().unwrap_or_default(),
                _ => Value::Nil,
            },
            Value::String(s) if key.as_str() == Some(SIZE_KEY) => Value::Int(s.chars().count() as i64),
            _ => Value::Nil,
        }
    }

    pub fn contains(&self, element: &Value) -> bool {
        match self {
            Value::Map(map) => map.contains(element),
            Value::Array(items) => items.contains(element),
            Value::String(s) => element.as_str().is_some_and(|needle| s.contains(needle)),
            _ => false,
        }
    }

    pub fn len(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::Array(items) => Some(items.len()),
            Value::Map(map) => Some(map.len()),
            Value::Nil | Value::Bool(_) | Value::Int(_) | Value::Float(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Nil, Value::Nil) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Array(items) => items.iter().try_for_each(|item| write!(f, "{item}")),
            Value::Map(map) => {
                let mut result = Ok(());
                map.range(&mut |key, value| {
                    result = write!(f, "{key}{value}");
                    result.is_ok()
                });
                result
            }
        }
    }
}

/// Any key-value store with a stable iteration order.
pub trait OrderedMap: fmt::Debug + Send + Sync {
    fn get(&self, key: &Value) -> Option<Value>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits entries in order until `visit` returns `false`.
    fn range(&self, visit: &mut dyn FnMut(&Value, &Value) -> bool);
}

impl OrderedMap for IndexMap<String, Value> {
    fn get(&self, key: &Value) -> Option<Value> {
        key.as_str().and_then(|k| IndexMap::get(self, k)).cloned()
    }

    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn range(&self, visit: &mut dyn FnMut(&Value, &Value) -> bool) {
        for (key, value) in self {
            if !visit(&Value::String(key.clone()), value) {
                break;
            }
        }
    }
}

/// Association list; keys may be any value.
impl OrderedMap for Vec<(Value, Value)> {
    fn get(&self, key: &Value) -> Option<Value> {
        self.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn range(&self, visit: &mut dyn FnMut(&Value, &Value) -> bool) {
        for (key, value) in self {
            if !visit(key, value) {
                break;
            }
        }
    }
}

/// Uniform index and property access over any [`OrderedMap`].
#[derive(Debug, Clone)]
pub struct MapValue(Arc<dyn OrderedMap>);

impl MapValue {
    pub fn new<M: OrderedMap + 'static>(map: M) -> Self {
        MapValue(Arc::new(map))
    }

    pub fn contains(&self, element: &Value) -> bool {
        self.0.get(element).is_some()
    }

    pub fn index_value(&self, key: &Value) -> Value {
        self.0.get(key).unwrap_or_default()
    }

    /// Like [`index_value`](Self::index_value), except that a missing `size`
    /// key answers with the number of entries.
    pub fn property_value(&self, key: &Value) -> Value {
        match self.0.get(key) {
            Some(value) => value,
            None if key.as_str() == Some(SIZE_KEY) => Value::Int(self.0.len() as i64),
            None => Value::Nil,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn range(&self, visit: &mut dyn FnMut(&Value, &Value) -> bool) {
        self.0.range(visit);
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        let mut entries = Vec::with_capacity(self.len());
        self.range(&mut |key, value| {
            entries.push((key.clone(), value.clone()));
            true
        });
        entries
    }
}

impl PartialEq for MapValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.entries() == other.entries()
    }
}

/// Conversion of host values into [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Bytes(self)
    }
}

impl IntoValue for MapValue {
    fn into_value(self) -> Value {
        Value::Map(self)
    }
}

impl IntoValue for IndexMap<String, Value> {
    fn into_value(self) -> Value {
        Value::map(self)
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Nil, IntoValue::into_value)
    }
}

macro_rules! int_into_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Int(self as i64)
                }
            }
        )*
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32, usize);

macro_rules! vec_into_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for Vec<$ty> {
                fn into_value(self) -> Value {
                    Value::Array(self.into_iter().map(IntoValue::into_value).collect())
                }
            }
        )*
    };
}

vec_into_value!(Value, String, bool, i64, f64);

#[cfg(feature = "serde")]
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            Value::Nil => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.entries() {
                    out.serialize_entry(&key.to_string(), &value)?;
                }
                out.end()
            }
        }
    }
}
