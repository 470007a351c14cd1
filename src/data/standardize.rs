//! Standardizer: one pass over the raw tree producing per-sample descriptors
//! and the dataset-level descriptor.
//!
//! ```text
//!  <root>/.../<class>/<stem>.wav + <stem>_analysis.json
//!        │
//!        ▼
//!  <root>/<name>_standardized/folder_<k>/<n>_<stem>.json   (SampleDescriptor)
//!  <root>/<name>.json                                      (DatasetDescriptor)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use walkdir::WalkDir;

use super::loader::{load_sidecar, sidecar_path};
use super::model::{Attribute, DatasetDescriptor, SampleDescriptor, SampleValue};
use super::stats::FeatureAccumulator;
use crate::error::{DatasetError, Result};
use crate::io;
use crate::schema::{DatasetSchema, SourceLayout};

/// Directory (under the dataset root) holding extraction cache entries.
pub const EXTRACTIONS_DIR: &str = "extractions";

/// `<root>/<name>.json`
pub fn descriptor_path(root: &Path, schema: &DatasetSchema) -> PathBuf {
    root.join(format!("{}.json", schema.name))
}

/// `<root>/<name>_standardized`
pub fn standardized_dir(root: &Path, schema: &DatasetSchema) -> PathBuf {
    root.join(format!("{}_standardized", schema.name))
}

/// `<root>/extractions/<name>-<version>`: cache entries of one dataset schema.
pub fn extractions_dir(root: &Path, schema: &DatasetSchema) -> PathBuf {
    root.join(EXTRACTIONS_DIR)
        .join(format!("{}-{}", schema.name, schema.version))
}

/// 1-based shard folder number for the sample with 0-based global index
/// `global_counter`. Shards fill strictly in order, `max_per_shard` each.
pub fn shard_index(global_counter: usize, max_per_shard: usize) -> usize {
    global_counter / max_per_shard.max(1) + 1
}

// ---------------------------------------------------------------------------
// Class directory discovery
// ---------------------------------------------------------------------------

/// A directory that directly contains audio files; its own name is the label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDirectory {
    pub label: String,
    pub dir: PathBuf,
    /// Eligible audio files, sorted by name.
    pub samples: Vec<PathBuf>,
}

fn has_audio_extension(path: &Path, layout: &SourceLayout) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(&layout.audio_extension))
}

/// Walk `root` in file-name order and collect every class directory.
///
/// A file is eligible when it has the audio extension, does not start with
/// the hidden prefix, and its sidecar exists. Our own output folders are not
/// descended into.
pub fn discover_class_dirs(root: &Path, schema: &DatasetSchema) -> Result<Vec<ClassDirectory>> {
    let layout = &schema.layout;
    let skip = [standardized_dir(root, schema), root.join(EXTRACTIONS_DIR)];

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !skip.iter().any(|s| s.as_path() == e.path()));

    let mut classes = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let mut audio: Vec<PathBuf> = fs::read_dir(entry.path())?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_audio_extension(p, layout))
            .collect();
        if audio.is_empty() {
            continue;
        }
        audio.sort();

        let samples = audio
            .into_iter()
            .filter(|p| {
                let hidden = p
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(&layout.hidden_prefix));
                !hidden && sidecar_path(p, layout).exists()
            })
            .collect();

        classes.push(ClassDirectory {
            label: entry.file_name().to_string_lossy().into_owned(),
            dir: entry.path().to_path_buf(),
            samples,
        });
    }
    Ok(classes)
}

// ---------------------------------------------------------------------------
// Standardize
// ---------------------------------------------------------------------------

/// Standardize the raw dataset at `root`, or load the existing descriptor.
///
/// When `<root>/<name>.json` exists it is returned unchanged and the raw
/// tree is not scanned.
pub fn standardize(root: &Path, schema: &DatasetSchema) -> Result<DatasetDescriptor> {
    if !root.exists() {
        return Err(DatasetError::PathNotFound(root.to_path_buf()));
    }

    let descriptor_file = descriptor_path(root, schema);
    if descriptor_file.exists() {
        log::info!("Loading standardized descriptor {}", descriptor_file.display());
        return io::read_json(&descriptor_file);
    }

    log::info!("Standardizing {} dataset at {}", schema.name, root.display());
    let classes = discover_class_dirs(root, schema)?;
    let out_root = standardized_dir(root, schema);
    let max_per_shard = schema.layout.max_files_per_shard.max(1);

    let mut counts: BTreeMap<String, usize> =
        schema.label.values.iter().map(|v| (v.clone(), 0)).collect();
    let mut features = FeatureAccumulator::new();
    let mut data: Vec<PathBuf> = Vec::new();

    for class in &classes {
        let Some(count) = counts.get_mut(&class.label) else {
            log::warn!(
                "Skipping {}: '{}' is not a known {} value",
                class.dir.display(),
                class.label,
                schema.label.name
            );
            continue;
        };
        *count += class.samples.len();

        for audio in &class.samples {
            let i = data.len();
            let shard_dir = out_root.join(format!("folder_{}", shard_index(i, max_per_shard)));
            if i % max_per_shard == 0 {
                fs::create_dir_all(&shard_dir)?;
            }

            let sample = describe_sample(audio, &class.label, schema, &mut features)?;
            let stem = audio
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let output_file = shard_dir.join(format!("{i}_{stem}.json"));
            io::write_json(&output_file, &sample)?;
            data.push(output_file);
        }
        log::debug!("{}: {} samples", class.label, class.samples.len());
    }

    if data.is_empty() {
        return Err(DatasetError::EmptyDataset(root.to_path_buf()));
    }

    let mut label = Attribute::categorical(schema.label.values.clone());
    label.count = counts;

    let mut attributes = BTreeMap::new();
    attributes.insert(schema.label.name.clone(), label);
    attributes.insert(schema.features.name.clone(), features.finish());

    let descriptor = DatasetDescriptor {
        name: schema.name.clone(),
        version: schema.version.clone(),
        date: Utc::now(),
        total_size: data.len(),
        data,
        attributes,
    };
    io::write_json(&descriptor_file, &descriptor)?;

    log::info!(
        "Standardized {} samples into {}",
        descriptor.total_size,
        out_root.display()
    );
    Ok(descriptor)
}

/// Build the descriptor of one sample, folding its measurements into `features`.
fn describe_sample(
    audio: &Path,
    label: &str,
    schema: &DatasetSchema,
    features: &mut FeatureAccumulator,
) -> Result<SampleDescriptor> {
    let sidecar = sidecar_path(audio, &schema.layout);
    let measurements = load_sidecar(&sidecar, &schema.features.keys)?;

    for (key, value) in &measurements {
        match value {
            Some(v) => features.observe(key, *v),
            None => log::debug!("{}: '{key}' is not a finite number", sidecar.display()),
        }
    }

    let mut sample = SampleDescriptor::new(audio);
    sample
        .attributes
        .insert(schema.label.name.clone(), SampleValue::Label(label.to_string()));
    sample.attributes.insert(
        schema.features.name.clone(),
        SampleValue::Features(measurements),
    );
    Ok(sample)
}
