use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Attribute – one named dimension of description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Enumerated labels, aggregated by per-value count.
    Categorical,
    /// Bundle of named measurements, aggregated by min/max/mean/var.
    Continuous,
}

/// Loss-function tag consumed by the training side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loss {
    #[serde(rename = "xentropy")]
    CrossEntropy,
    #[serde(rename = "mse")]
    MeanSquared,
}

/// Aggregated statistics for one attribute.
///
/// `values` is the sorted value universe: labels for a categorical attribute,
/// sub-key names for a continuous bundle. Categorical attributes fill `count`;
/// continuous ones fill `max`/`min`/`mean`/`var`. The unused maps stay empty so
/// the record keeps one shape in both the JSON descriptor and the binary artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub values: Vec<String>,
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    pub loss: Loss,
    #[serde(default)]
    pub count: BTreeMap<String, usize>,
    #[serde(default)]
    pub max: BTreeMap<String, f64>,
    #[serde(default)]
    pub min: BTreeMap<String, f64>,
    #[serde(default)]
    pub mean: BTreeMap<String, f64>,
    #[serde(default)]
    pub var: BTreeMap<String, f64>,
}

impl Attribute {
    /// Categorical attribute with a zeroed counter per value.
    pub fn categorical(mut values: Vec<String>) -> Self {
        values.sort();
        values.dedup();
        let count = values.iter().map(|v| (v.clone(), 0)).collect();
        Self {
            values,
            kind: AttributeKind::Categorical,
            loss: Loss::CrossEntropy,
            count,
            max: BTreeMap::new(),
            min: BTreeMap::new(),
            mean: BTreeMap::new(),
            var: BTreeMap::new(),
        }
    }

    /// Continuous bundle with no statistics yet.
    pub fn continuous(mut keys: Vec<String>) -> Self {
        keys.sort();
        keys.dedup();
        Self {
            values: keys,
            kind: AttributeKind::Continuous,
            loss: Loss::MeanSquared,
            count: BTreeMap::new(),
            max: BTreeMap::new(),
            min: BTreeMap::new(),
            mean: BTreeMap::new(),
            var: BTreeMap::new(),
        }
    }

    pub fn is_categorical(&self) -> bool {
        self.kind == AttributeKind::Categorical
    }

    /// Position of `value` within the sorted value universe.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.binary_search_by(|v| v.as_str().cmp(value)).ok()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index_of(value).is_some()
    }
}

// ---------------------------------------------------------------------------
// SampleDescriptor – one per raw audio file
// ---------------------------------------------------------------------------

/// Value of one attribute on one sample.
///
/// A `null` measurement marks a sidecar entry that was present but not a
/// finite number; extraction treats it like a missing sub-key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Label(String),
    Features(BTreeMap<String, Option<f64>>),
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Label(s) => write!(f, "{s}"),
            SampleValue::Features(m) => write!(f, "<{} features>", m.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDescriptor {
    /// Path of the raw audio file.
    pub path: PathBuf,
    pub attributes: BTreeMap<String, SampleValue>,
}

impl SampleDescriptor {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn label(&self, attribute: &str) -> Option<&str> {
        match self.attributes.get(attribute) {
            Some(SampleValue::Label(s)) => Some(s),
            _ => None,
        }
    }

    pub fn features(&self, attribute: &str) -> Option<&BTreeMap<String, Option<f64>>> {
        match self.attributes.get(attribute) {
            Some(SampleValue::Features(m)) => Some(m),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// DatasetDescriptor – the standardized dataset
// ---------------------------------------------------------------------------

/// Produced once per raw dataset. `data` lists sample descriptor files in
/// scan order and `total_size == data.len()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub name: String,
    pub version: String,
    pub date: DateTime<Utc>,
    pub data: Vec<PathBuf>,
    pub total_size: usize,
    pub attributes: BTreeMap<String, Attribute>,
}

impl DatasetDescriptor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Extraction – criteria-specific derived dataset
// ---------------------------------------------------------------------------

/// Scoped record of one extraction. Attribute statistics are a copy of the
/// dataset-level ones, restricted to the criteria and recomputed over the
/// samples actually selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDescriptor {
    pub name: String,
    pub version: String,
    pub date: DateTime<Utc>,
    /// Criteria fingerprint, also the cache directory name.
    pub hash: String,
    /// Sample descriptor files of the accepted samples.
    pub data: Vec<PathBuf>,
    pub attributes: BTreeMap<String, Attribute>,
    pub output_file: PathBuf,
    pub size: usize,
}

/// The cached artifact: parallel lists of raw audio paths and encoded vectors.
///
/// Each vector holds, per working attribute in sorted order, either the
/// categorical index (a whole number) or the min-max normalized sub-keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub paths: Vec<PathBuf>,
    pub vectors: Vec<Vec<f64>>,
    pub descriptor: ExtractionDescriptor,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
