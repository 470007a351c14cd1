//! Test helper utilities
//!
//! Builds small raw dataset trees on disk for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusty_dataset::schema::{CategoricalSpec, ContinuousSpec};
use rusty_dataset::DatasetSchema;
use serde_json::{Map, Value};
use tempfile::TempDir;

/// Three classes, two features.
pub fn toy_schema() -> DatasetSchema {
    DatasetSchema::new(
        "toy",
        "0.1.0",
        CategoricalSpec {
            name: "class".into(),
            values: vec!["A".into(), "B".into(), "C".into()],
        },
        ContinuousSpec {
            name: "features".into(),
            keys: vec!["loudness".into(), "roughness".into()],
        },
    )
}

/// Write `<root>/<rel>.wav` and, when `sidecar` is given, its analysis file.
pub fn write_sample(root: &Path, rel: &str, sidecar: Option<&str>) -> PathBuf {
    let wav = root.join(format!("{rel}.wav"));
    fs::create_dir_all(wav.parent().unwrap()).unwrap();
    fs::write(&wav, b"").unwrap();
    if let Some(contents) = sidecar {
        fs::write(root.join(format!("{rel}_analysis.json")), contents).unwrap();
    }
    wav
}

/// Sidecar JSON from `(key, value)` pairs.
pub fn sidecar(values: &[(&str, f64)]) -> String {
    let map: Map<String, Value> = values
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect();
    Value::Object(map).to_string()
}

/// A tree with `counts[i]` samples in class `i`. Loudness cycles through
/// -60..=0 and roughness through 0..=10 so every feature has a spread.
pub fn build_tree(counts: &[(&str, usize)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (class, n) in counts {
        for i in 0..*n {
            let loudness = -60.0 + (i % 61) as f64;
            let roughness = (i % 11) as f64;
            write_sample(
                dir.path(),
                &format!("kit/{class}/{class}_{i:04}"),
                Some(&sidecar(&[("loudness", loudness), ("roughness", roughness)])),
            );
        }
    }
    dir
}
