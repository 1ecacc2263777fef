use std::fmt;

use serde::de::Visitor;
use serde::ser::SerializeMap;
use serde::{Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A field value captured at insertion time.
///
/// Error-valued fields are tagged here as a closed variant instead of
/// being discovered by runtime type inspection, so extraction during
/// event construction is a plain pattern match.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Any JSON-representable value.
    Plain(Value),
    /// A generic error-valued field. `label` is an optional free-form
    /// diagnostic type name.
    Error {
        label: Option<String>,
        message: String,
    },
    /// A system-level numeric error (errno style).
    SystemError {
        label: Option<String>,
        message: String,
        code: i32,
    },
}

impl FieldValue {
    /// Capture an arbitrary serializable value. Failure means the value
    /// cannot be represented on the wire; [`FieldMap::set`] drops such
    /// fields silently.
    pub fn serialize<T: Serialize>(value: &T) -> Result<FieldValue, serde_json::Error> {
        Ok(FieldValue::Plain(serde_json::to_value(value)?))
    }

    pub fn error(message: impl Into<String>) -> FieldValue {
        FieldValue::Error {
            label: None,
            message: message.into(),
        }
    }

    pub fn labeled_error(label: impl Into<String>, message: impl Into<String>) -> FieldValue {
        FieldValue::Error {
            label: Some(label.into()),
            message: message.into(),
        }
    }

    pub fn system_error(message: impl Into<String>, code: i32) -> FieldValue {
        FieldValue::SystemError {
            label: None,
            message: message.into(),
            code,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, FieldValue::Plain(_))
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> FieldValue {
        FieldValue::Plain(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> FieldValue {
        FieldValue::Plain(Value::from(value))
    }
}

impl From<std::io::Error> for FieldValue {
    fn from(err: std::io::Error) -> FieldValue {
        match err.raw_os_error() {
            Some(code) => FieldValue::SystemError {
                label: None,
                message: err.to_string(),
                code,
            },
            None => FieldValue::Error {
                label: None,
                message: err.to_string(),
            },
        }
    }
}

/// Insertion-ordered field map with unique keys.
///
/// Iteration order is the order keys were first inserted; error
/// extraction during event construction follows it, so the order of
/// `info.errors` is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> FieldMap {
        FieldMap::default()
    }

    /// Insert a field; an existing key is replaced in place, keeping its
    /// original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.put(key.into(), value.into());
    }

    /// Capture any serializable value. Values that cannot be represented
    /// are dropped, reported only through `tracing`.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: &T) {
        let key = key.into();
        match FieldValue::serialize(value) {
            Ok(value) => self.put(key, value),
            Err(error) => tracing::debug!(field = %key, %error, "dropping unserializable field"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, FieldValue)> {
        self.fields.iter()
    }

    fn put(&mut self, key: String, value: FieldValue) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> FieldMap {
        let mut map = FieldMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<K: Into<String>, V: Into<FieldValue>> Extend<(K, V)> for FieldMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

pub(crate) fn serialize_pairs_as_map<S>(
    fields: &[(String, Value)],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (k, v) in fields {
        map.serialize_entry(k, v)?;
    }
    map.end()
}

pub(crate) fn deserialize_pairs_from_map<'de, D>(
    deserializer: D,
) -> Result<Vec<(String, Value)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct MapVisitor;

    impl<'de> Visitor<'de> for MapVisitor {
        type Value = Vec<(String, Value)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a JSON object")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, Value>()? {
                fields.push((key, value));
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(MapVisitor)
}
