//! Encoder for the PHP `serialize()` text format
//!
//! The queue consumer unserializes `data.command` with its native
//! unserializer, so every token must match that grammar exactly:
//!
//! | Kind    | Token                                             |
//! |---------|---------------------------------------------------|
//! | string  | `s:<byte-len>:"<bytes>";`                         |
//! | integer | `i:<value>;`                                      |
//! | boolean | `b:<0\|1>;`                                       |
//! | null    | `N;`                                              |
//! | array   | `a:<entries>:{<key><value>...}`                   |
//! | object  | `O:<name-len>:"<name>":<fields>:{<s:name><value>...}` |
//!
//! String lengths are UTF-8 byte lengths. A character count here shifts the
//! reader by the difference and corrupts every token that follows.

use std::fmt::Write;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EncodeError {
    /// A value the grammar subset cannot carry (floats, binary, ...)
    #[error("unsupported value kind: {kind}")]
    UnsupportedValueKind { kind: &'static str },
}

/// Array key. PHP arrays only have integer or string keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

/// Payload value accepted by the encoder
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Sequence, emitted as an array with keys `0..n`
    List(Vec<Value>),
    Map(Mapping),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = EncodeError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int(i)),
                None if n.is_u64() => Err(EncodeError::UnsupportedValueKind { kind: "u64" }),
                None => Err(EncodeError::UnsupportedValueKind { kind: "float" }),
            },
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => {
                items.into_iter().map(Value::try_from).collect::<Result<_, _>>().map(Value::List)
            }
            serde_json::Value::Object(map) => Mapping::try_from(map).map(Value::Map),
        }
    }
}

/// Insertion-ordered key/value mapping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(Key, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`Mapping::insert`]
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find_map(|(k, v)| match k {
            Key::Str(s) if s == key => Some(v),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Key, Value)> {
        self.entries.iter()
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for Mapping {
    type Error = EncodeError;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut mapping = Mapping::new();
        for (k, v) in map {
            mapping.insert(k, Value::try_from(v)?);
        }
        Ok(mapping)
    }
}

/// Serialize `fields` as an object of class `name`.
///
/// The field count is the mapping's arity. Integer keys become string
/// property names, as PHP does for object properties.
pub fn encode_object(name: &str, fields: &Mapping) -> String {
    let mut out = String::with_capacity(64 + name.len());
    let _ = write!(out, "O:{}:\"{}\":{}:{{", name.len(), name, fields.len());
    for (key, value) in fields.iter() {
        match key {
            Key::Str(s) => write_str(&mut out, s),
            Key::Int(i) => write_str(&mut out, &i.to_string()),
        }
        write_value(&mut out, value);
    }
    out.push('}');
    out
}

/// Same as [`encode_object`] for untyped JSON input; floats fail fast
pub fn encode_json_object(
    name: &str,
    fields: serde_json::Map<String, serde_json::Value>,
) -> Result<String, EncodeError> {
    let mapping = Mapping::try_from(fields)?;
    Ok(encode_object(name, &mapping))
}

/// Serialize a single value
pub fn encode_value(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("N;"),
        Value::Bool(b) => out.push_str(if *b { "b:1;" } else { "b:0;" }),
        Value::Int(i) => write_int(out, *i),
        Value::Str(s) => write_str(out, s),
        Value::List(items) => {
            let _ = write!(out, "a:{}:{{", items.len());
            for (i, item) in items.iter().enumerate() {
                write_int(out, i as i64);
                write_value(out, item);
            }
            out.push('}');
        }
        Value::Map(map) => {
            let _ = write!(out, "a:{}:{{", map.len());
            for (key, item) in map.iter() {
                match key {
                    Key::Int(i) => write_int(out, *i),
                    Key::Str(s) => write_str(out, s),
                }
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

#[inline]
fn write_int(out: &mut String, value: i64) {
    let _ = write!(out, "i:{};", value);
}

#[inline]
fn write_str(out: &mut String, value: &str) {
    // str::len is the UTF-8 byte length
    let _ = write!(out, "s:{}:\"{}\";", value.len(), value);
}
