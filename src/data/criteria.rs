use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::fingerprint::fingerprint;
use crate::error::{DatasetError, Result};

/// Keys a criteria object may carry, sorted.
pub const CRITERIA_KEYS: [&str; 4] = ["attributes", "balance", "filter", "size"];

// ---------------------------------------------------------------------------
// Criteria – what to extract
// ---------------------------------------------------------------------------

/// Extraction request. Every field is optional:
///
/// * `attributes` – attributes to encode; defaults to all dataset attributes.
/// * `filter` – attribute → allowed values (labels, or sub-keys of a
///   continuous bundle). Restricts both inclusion and the index universe.
/// * `balance` – categorical attributes whose values are drawn in equal share.
/// * `size` – maximum number of samples; defaults to the dataset size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

impl Criteria {
    /// Parse criteria from JSON, rejecting unrecognized keys by name.
    pub fn from_json_value(value: JsonValue) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| DatasetError::InvalidCriteria("expected a JSON object".into()))?;
        if let Some(key) = obj.keys().find(|k| !CRITERIA_KEYS.contains(&k.as_str())) {
            return Err(DatasetError::UnknownCriteriaKey(key.clone()));
        }
        serde_json::from_value(value).map_err(|e| DatasetError::InvalidCriteria(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json_value(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn with_attributes<S: Into<String>>(mut self, atts: impl IntoIterator<Item = S>) -> Self {
        self.attributes = Some(atts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_filter<S: Into<String>>(
        mut self,
        attribute: &str,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.filter
            .get_or_insert_with(BTreeMap::new)
            .insert(attribute.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_balance<S: Into<String>>(mut self, atts: impl IntoIterator<Item = S>) -> Self {
        self.balance = Some(atts.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Allowed values for `attribute`, if it is filtered.
    pub fn filter_for(&self, attribute: &str) -> Option<&[String]> {
        self.filter
            .as_ref()
            .and_then(|f| f.get(attribute))
            .map(Vec::as_slice)
    }

    /// Balance attributes; empty when balancing is not requested.
    pub fn balance_attributes(&self) -> &[String] {
        self.balance.as_deref().unwrap_or(&[])
    }

    /// Order-independent form: lists sorted and de-duplicated, an empty
    /// balance list folded into "no balance".
    pub fn canonical(&self) -> Criteria {
        fn norm(values: &[String]) -> Vec<String> {
            let mut v = values.to_vec();
            v.sort();
            v.dedup();
            v
        }
        Criteria {
            attributes: self.attributes.as_deref().map(norm),
            filter: self
                .filter
                .as_ref()
                .map(|f| f.iter().map(|(k, v)| (k.clone(), norm(v))).collect()),
            balance: self
                .balance
                .as_deref()
                .filter(|b| !b.is_empty())
                .map(norm),
            size: self.size,
        }
    }

    /// Stable content hash, used as the extraction cache key.
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(self)
    }
}
