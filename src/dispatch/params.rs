//! Item → request parameter strategies.

use crate::types::{scalar_text, Item};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Ordered key/value pairs, sent as query string (GET) or form body (POST).
pub type Params = Vec<(String, String)>;

/// Caller-owned mapping from an item to its request parameters.
///
/// Any `Fn(&Item) -> Params + Send + Sync` closure implements this.
pub trait ItemToParams: Send + Sync {
    fn params(&self, item: &Item) -> Params;
}

impl<F> ItemToParams for F
where
    F: Fn(&Item) -> Params + Send + Sync,
{
    fn params(&self, item: &Item) -> Params {
        self(item)
    }
}

/// No parameters; the URL template carries everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParams;

impl ItemToParams for NoParams {
    fn params(&self, _item: &Item) -> Params {
        Vec::new()
    }
}

/// Declarative parameters: fixed values plus copies of item fields.
///
/// ```yaml
/// fixed:
///   op: waive
///   reason: OTHER
/// fields:
///   amount: amount   # param name: item field
/// ```
///
/// Fixed params come first, then field params, each sorted by name. A field
/// missing from the item is left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParamMapping {
    pub fixed: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
}

impl ParamMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fixed.insert(name.into(), value.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, item_field: impl Into<String>) -> Self {
        self.fields.insert(name.into(), item_field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty() && self.fields.is_empty()
    }

    /// Item fields this mapping reads.
    pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(String::as_str)
    }
}

impl ItemToParams for ParamMapping {
    fn params(&self, item: &Item) -> Params {
        let fixed = self.fixed.iter().map(|(k, v)| (k.clone(), v.clone()));
        let copied = self.fields.iter().filter_map(|(name, field)| {
            item.get(field).map(|v| (name.clone(), scalar_text(v)))
        });
        fixed.chain(copied).collect()
    }
}
