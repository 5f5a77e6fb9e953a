//! Work items: ordered field → scalar mappings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of work. Each item produces exactly one HTTP request.
///
/// Field order is insertion order. Values are restricted to scalars
/// (string, number, bool, null); nested arrays/objects are rejected on
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Item {
    fields: Map<String, Value>,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Item::insert`].
    ///
    /// Arrays and objects are not valid item values and are stored as null,
    /// which templates then treat as a missing field. Use
    /// `Item::try_from(map)` to reject them instead.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Insert a field, replacing any previous value.
    ///
    /// Non-scalar values are coerced to null; see [`Item::with`].
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        let value = if is_scalar(&value) { value } else { Value::Null };
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text form of a field, as used for template substitution and parameters.
    pub fn get_text(&self, field: &str) -> Option<String> {
        self.get(field).map(scalar_text)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Item
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut item = Item::new();
        for (k, v) in iter {
            item.insert(k, v);
        }
        item
    }
}

impl TryFrom<Map<String, Value>> for Item {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        if let Some((name, _)) = fields.iter().find(|(_, v)| !is_scalar(v)) {
            return Err(format!("field '{}' is not a scalar value", name));
        }
        Ok(Self { fields })
    }
}

impl From<Item> for Map<String, Value> {
    fn from(item: Item) -> Self {
        item.fields
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Render a scalar the way it appears in URLs and parameters.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
