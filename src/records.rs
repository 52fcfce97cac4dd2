//! Record binding: which stored file each record holds for an image field.
//!
//! The render pipeline does not own records. It asks a [`RecordSource`] for
//! the `(pk, value)` pairs of a field and works from those. The shipped
//! source is a JSON [`Catalog`], an export of the owning application's
//! records:
//!
//! ```json
//! {
//!   "goods.goodsinfo.gpic": [
//!     { "pk": 1, "value": "image/goods/tea.jpg" },
//!     { "pk": 2, "value": null }
//!   ]
//! }
//! ```

use crate::variations::FieldSelector;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Catalog has no records for field '{0}'")]
    UnknownField(String),
}

/// One record's current value for an image field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Primary key; numeric keys are kept in their decimal form.
    #[serde(deserialize_with = "pk_as_string")]
    pub pk: String,
    /// Stored path, `None` when the field is empty.
    #[serde(default)]
    pub value: Option<String>,
}

impl FieldRecord {
    pub fn new(pk: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            pk: pk.into(),
            value: value.map(String::from),
        }
    }

    /// The stored path, treating an empty string like no value.
    pub fn stored_path(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }
}

fn pk_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPk {
        Int(i64),
        Str(String),
    }
    Ok(match RawPk::deserialize(deserializer)? {
        RawPk::Int(n) => n.to_string(),
        RawPk::Str(s) => s,
    })
}

/// Anything that can list the records of an image field.
pub trait RecordSource {
    /// Records holding a file for `selector`. Records whose value is null
    /// or empty are left out.
    fn records(&self, selector: &FieldSelector) -> Result<Vec<FieldRecord>, CatalogError>;
}

/// JSON export of field records, keyed by `app.model.field`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    fields: BTreeMap<String, Vec<FieldRecord>>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn insert(&mut self, selector: &FieldSelector, records: Vec<FieldRecord>) {
        self.fields.insert(selector.to_string(), records);
    }

    /// Field selectors present in the catalog, sorted.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl RecordSource for Catalog {
    fn records(&self, selector: &FieldSelector) -> Result<Vec<FieldRecord>, CatalogError> {
        let records = self
            .fields
            .get(&selector.to_string())
            .ok_or_else(|| CatalogError::UnknownField(selector.to_string()))?;
        Ok(records
            .iter()
            .filter(|r| r.stored_path().is_some())
            .cloned()
            .collect())
    }
}
