//! Attribute schema registry.
//!
//! A [`DatasetSchema`] fixes, for one raw dataset, the categorical label
//! attribute (taken from class directory names), the continuous feature bundle
//! (taken from the `_analysis.json` sidecars) and the on-disk layout rules.

use crate::data::model::{AttributeKind, Loss};
use crate::error::{DatasetError, Result};

// ---------------------------------------------------------------------------
// Layout of the raw tree and of the standardized output
// ---------------------------------------------------------------------------

/// How raw samples are recognized and how standardized output is sharded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    /// Audio file extension without the dot, compared case-insensitively.
    pub audio_extension: String,
    /// Appended to the audio file stem to locate its sidecar.
    pub sidecar_suffix: String,
    /// Files starting with this prefix are metadata artifacts (macOS `._x.wav`).
    pub hidden_prefix: String,
    /// Upper bound on per-sample descriptors in one `folder_<k>` shard.
    pub max_files_per_shard: usize,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            audio_extension: "wav".to_string(),
            sidecar_suffix: "_analysis.json".to_string(),
            hidden_prefix: "._".to_string(),
            max_files_per_shard: 10_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute specs
// ---------------------------------------------------------------------------

/// Categorical attribute with an enumerated, sorted value set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalSpec {
    pub name: String,
    pub values: Vec<String>,
}

/// Continuous bundle: named sub-keys tracked with min/max/mean/var.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuousSpec {
    pub name: String,
    pub keys: Vec<String>,
}

/// Full description of one dataset's attributes and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    pub name: String,
    pub version: String,
    pub layout: SourceLayout,
    pub label: CategoricalSpec,
    pub features: ContinuousSpec,
}

impl DatasetSchema {
    /// Build a schema with the default layout. Value and key lists are sorted
    /// and de-duplicated so index encoding is stable.
    pub fn new(
        name: &str,
        version: &str,
        label: CategoricalSpec,
        features: ContinuousSpec,
    ) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            layout: SourceLayout::default(),
            label: CategoricalSpec {
                name: label.name,
                values: sorted_unique(label.values),
            },
            features: ContinuousSpec {
                name: features.name,
                keys: sorted_unique(features.keys),
            },
        }
    }

    pub fn with_layout(mut self, layout: SourceLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Attribute names in sorted order.
    pub fn attribute_names(&self) -> Vec<String> {
        sorted_unique(vec![self.label.name.clone(), self.features.name.clone()])
    }

    /// Aggregation kind and loss tag for a named attribute.
    pub fn kind_of(&self, attribute: &str) -> Option<(AttributeKind, Loss)> {
        if attribute == self.label.name {
            Some((AttributeKind::Categorical, Loss::CrossEntropy))
        } else if attribute == self.features.name {
            Some((AttributeKind::Continuous, Loss::MeanSquared))
        } else {
            None
        }
    }
}

fn sorted_unique(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

// ---------------------------------------------------------------------------
// Built-in datasets
// ---------------------------------------------------------------------------

/// Mridangam stroke dataset: one directory per stroke class, AudioCommons
/// descriptors in the sidecars. `dynamic_range` is left out because it is
/// constant across the dataset and cannot be min-max normalized.
pub fn mridangam() -> DatasetSchema {
    let strings = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    DatasetSchema::new(
        "mridangam",
        "0.0.0",
        CategoricalSpec {
            name: "instrument".to_string(),
            values: strings(&[
                "bheem", "cha", "dheem", "dhin", "num", "ta", "tha", "thi", "thom",
            ]),
        },
        ContinuousSpec {
            name: "audio-commons".to_string(),
            keys: strings(&[
                "duration",
                "loudness",
                "temporal_centroid",
                "log_attack_time",
                "hardness",
                "depth",
                "brightness",
                "roughness",
                "boominess",
                "warmth",
                "sharpness",
            ]),
        },
    )
}

const DATASETS: &[(&str, fn() -> DatasetSchema)] = &[("mridangam", mridangam)];

/// Names of all registered datasets.
pub fn available_datasets() -> Vec<&'static str> {
    DATASETS.iter().map(|(name, _)| *name).collect()
}

/// Look up a registered dataset schema by name.
pub fn schema_for(name: &str) -> Result<DatasetSchema> {
    DATASETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, build)| build())
        .ok_or_else(|| DatasetError::UnknownDataset {
            name: name.to_string(),
            available: available_datasets().join(", "),
        })
}
