//! Extractor: derive a filtered, balanced, normalized subset of a
//! standardized dataset and cache it under the criteria fingerprint.
//!
//! ```text
//!  Criteria ──fingerprint──► cache hit? ──yes──► stored Extraction
//!                                 │ no
//!                                 ▼
//!  DatasetDescriptor ──► scoped attributes + target size
//!                                 │
//!        for each sample: filter → balance → encode → stop at size
//!                                 │
//!                                 ▼
//!                     Extraction (paths, vectors, descriptor) → store
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::criteria::Criteria;
use super::filter::{check_balance, check_filter, Rejection, ScopedAttributes};
use super::model::{
    Attribute, AttributeKind, DatasetDescriptor, Extraction, ExtractionDescriptor,
    SampleDescriptor,
};
use super::standardize::{extractions_dir, standardize};
use super::stats::VarianceAccumulator;
use crate::cache::{DirectoryStore, ExtractionStore};
use crate::error::{DatasetError, Result};
use crate::io;
use crate::schema::DatasetSchema;

const PROGRESS_EVERY: usize = 1000;

// ---------------------------------------------------------------------------
// Sample source
// ---------------------------------------------------------------------------

/// Where an extraction reads the standardized dataset from.
pub trait SampleSource {
    /// The dataset descriptor; may trigger standardization.
    fn dataset(&mut self) -> Result<DatasetDescriptor>;

    /// Load one sample descriptor named in `DatasetDescriptor::data`.
    fn sample(&mut self, reference: &Path) -> Result<SampleDescriptor>;
}

/// The standardized descriptors of a raw tree on disk.
#[derive(Debug, Clone)]
pub struct StandardizedTree {
    root: PathBuf,
    schema: DatasetSchema,
}

impl StandardizedTree {
    pub fn new(root: &Path, schema: &DatasetSchema) -> Self {
        Self {
            root: root.to_path_buf(),
            schema: schema.clone(),
        }
    }
}

impl SampleSource for StandardizedTree {
    fn dataset(&mut self) -> Result<DatasetDescriptor> {
        standardize(&self.root, &self.schema)
    }

    fn sample(&mut self, reference: &Path) -> Result<SampleDescriptor> {
        io::read_json(reference)
    }
}

// ---------------------------------------------------------------------------
// Criteria resolution
// ---------------------------------------------------------------------------

/// Build the scoped statistics of every working attribute.
///
/// The working set is `criteria.attributes` or all dataset attributes. A
/// filtered attribute has its universe narrowed to the (sorted) filter list,
/// keeping dataset-level statistics only for the retained sub-keys. Every
/// attribute starts with zeroed occurrence counters.
pub fn resolve_attributes(
    dataset: &DatasetDescriptor,
    criteria: &Criteria,
) -> Result<ScopedAttributes> {
    let mut working: Vec<String> = match &criteria.attributes {
        Some(atts) => atts.clone(),
        None => dataset.attributes.keys().cloned().collect(),
    };
    working.sort();
    working.dedup();

    if let Some(filter) = &criteria.filter {
        for name in filter.keys().filter(|k| !working.contains(k)) {
            log::warn!("Filter on '{name}' ignored: not a working attribute");
        }
    }

    let mut scoped = ScopedAttributes::new();
    for name in working {
        let base = dataset
            .attributes
            .get(&name)
            .ok_or_else(|| DatasetError::UnknownAttribute(name.clone()))?;

        let mut att = match criteria.filter_for(&name) {
            Some(allowed) => narrow(&name, base, allowed)?,
            None => base.clone(),
        };
        att.values.sort();
        att.count = att.values.iter().map(|v| (v.clone(), 0)).collect();

        if att.kind == AttributeKind::Continuous {
            check_normalizable(&name, &att)?;
        }
        scoped.insert(name, att);
    }
    Ok(scoped)
}

fn narrow(name: &str, base: &Attribute, allowed: &[String]) -> Result<Attribute> {
    let mut values = allowed.to_vec();
    values.sort();
    values.dedup();

    match base.kind {
        AttributeKind::Categorical => {
            if let Some(v) = values.iter().find(|v| !base.contains(v)) {
                return Err(DatasetError::InvalidCriteria(format!(
                    "filter value '{v}' is not a known '{name}' value"
                )));
            }
            Ok(Attribute::categorical(values))
        }
        AttributeKind::Continuous => {
            let mut att = Attribute::continuous(values);
            for key in &att.values {
                let stat = |m: &BTreeMap<String, f64>| {
                    m.get(key)
                        .copied()
                        .ok_or_else(|| DatasetError::UnknownAttribute(format!("{name}/{key}")))
                };
                let (max, min, mean) = (stat(&base.max)?, stat(&base.min)?, stat(&base.mean)?);
                let var = base.var.get(key).copied().unwrap_or(0.0);
                att.max.insert(key.clone(), max);
                att.min.insert(key.clone(), min);
                att.mean.insert(key.clone(), mean);
                att.var.insert(key.clone(), var);
            }
            Ok(att)
        }
    }
}

/// Every retained sub-key needs known bounds with `max != min`.
fn check_normalizable(name: &str, att: &Attribute) -> Result<()> {
    for key in &att.values {
        let (Some(&max), Some(&min)) = (att.max.get(key), att.min.get(key)) else {
            return Err(DatasetError::UnknownAttribute(format!("{name}/{key}")));
        };
        if max == min {
            return Err(DatasetError::DegenerateFeature {
                attribute: name.to_string(),
                key: key.clone(),
                value: max,
            });
        }
    }
    Ok(())
}

/// Maximum number of samples to draw.
///
/// `criteria.size` or the dataset size, tightened under balancing to
/// `values * smallest_count` per balance attribute. Counts come from the
/// dataset level, so later filtering can leave the result slightly uneven.
pub fn target_size(
    dataset: &DatasetDescriptor,
    criteria: &Criteria,
    scoped: &ScopedAttributes,
) -> Result<usize> {
    let mut size = criteria.size.unwrap_or(dataset.total_size);

    for b in criteria.balance_attributes() {
        let att = scoped.get(b).ok_or_else(|| {
            DatasetError::InvalidCriteria(format!("balance attribute '{b}' is not a working attribute"))
        })?;
        if !att.is_categorical() {
            return Err(DatasetError::InvalidCriteria(format!(
                "balance attribute '{b}' is not categorical"
            )));
        }
        let counts = &dataset
            .attributes
            .get(b)
            .ok_or_else(|| DatasetError::UnknownAttribute(b.clone()))?
            .count;
        let smallest = att
            .values
            .iter()
            .map(|v| counts.get(v).copied().unwrap_or(0))
            .min()
            .unwrap_or(0);
        size = size.min(att.values.len() * smallest);
    }
    Ok(size)
}

// ---------------------------------------------------------------------------
// Streaming pass
// ---------------------------------------------------------------------------

/// Run filter, balance and encode over `samples` in dataset order.
///
/// `samples` yields `(descriptor_file, sample)` pairs. The pass stops as soon
/// as the target size is reached; samples beyond that are never pulled.
pub fn extract_samples<I>(
    dataset: &DatasetDescriptor,
    criteria: &Criteria,
    hash: &str,
    output_file: PathBuf,
    samples: I,
) -> Result<Extraction>
where
    I: IntoIterator<Item = Result<(PathBuf, SampleDescriptor)>>,
{
    let mut scoped = resolve_attributes(dataset, criteria)?;
    let size = target_size(dataset, criteria, &scoped)?;
    let balance = criteria.balance_attributes();
    log::info!("Extracting up to {size} samples from {}", dataset.name);

    let mut variances: BTreeMap<String, VarianceAccumulator> = scoped
        .iter()
        .filter(|(_, att)| att.kind == AttributeKind::Continuous)
        .map(|(name, att)| (name.clone(), VarianceAccumulator::new(&att.mean)))
        .collect();

    let mut paths = Vec::new();
    let mut vectors = Vec::new();
    let mut references = Vec::new();

    let mut samples = samples.into_iter();
    let mut visited = 0;
    while paths.len() < size {
        let Some(item) = samples.next() else {
            break;
        };
        visited += 1;
        if visited % PROGRESS_EVERY == 0 {
            log::debug!("{visited} samples visited, {} accepted", paths.len());
        }
        let (reference, sample) = item?;

        let verdict = check_filter(&sample, &scoped)
            .and_then(|()| check_balance(&sample, &scoped, balance, size));
        match verdict {
            Ok(()) => {}
            Err(rejection @ Rejection::NonFinite { .. }) => {
                log::warn!("{}: {rejection}, skipping", reference.display());
                continue;
            }
            Err(rejection) => {
                log::debug!("{}: {rejection}, skipping", reference.display());
                continue;
            }
        }

        vectors.push(encode(&sample, &mut scoped, &mut variances)?);
        paths.push(sample.path);
        references.push(reference);
    }

    let accepted = paths.len();
    for (name, acc) in variances {
        match acc.finish(accepted) {
            Some(var) => {
                if let Some(att) = scoped.get_mut(&name) {
                    att.var = var;
                }
            }
            None => log::warn!("No samples accepted, '{name}' variance left unset"),
        }
    }

    log::info!("Extracted {accepted} samples ({hash})");
    Ok(Extraction {
        paths,
        vectors,
        descriptor: ExtractionDescriptor {
            name: dataset.name.clone(),
            version: dataset.version.clone(),
            date: Utc::now(),
            hash: hash.to_string(),
            data: references,
            attributes: scoped,
            output_file,
            size: accepted,
        },
    })
}

/// Encode one accepted sample, updating counters and variance sums.
///
/// Continuous sub-keys become `(raw - min) / (max - min)`; categorical
/// values become their index in the sorted value universe.
fn encode(
    sample: &SampleDescriptor,
    scoped: &mut ScopedAttributes,
    variances: &mut BTreeMap<String, VarianceAccumulator>,
) -> Result<Vec<f64>> {
    let mut vector = Vec::new();
    for (name, att) in scoped.iter_mut() {
        match att.kind {
            AttributeKind::Continuous => {
                let features = sample
                    .features(name)
                    .ok_or_else(|| DatasetError::UnknownAttribute(name.clone()))?;
                for key in &att.values {
                    let raw = features
                        .get(key)
                        .copied()
                        .flatten()
                        .ok_or_else(|| DatasetError::UnknownAttribute(format!("{name}/{key}")))?;
                    let (min, max) = (att.min[key], att.max[key]);
                    vector.push((raw - min) / (max - min));
                    if let Some(acc) = variances.get_mut(name) {
                        acc.observe(key, raw);
                    }
                }
            }
            AttributeKind::Categorical => {
                let label = sample
                    .label(name)
                    .ok_or_else(|| DatasetError::UnknownAttribute(name.clone()))?;
                let idx = att
                    .index_of(label)
                    .ok_or_else(|| DatasetError::UnknownAttribute(format!("{name}/{label}")))?;
                *att.count.entry(label.to_string()).or_insert(0) += 1;
                vector.push(idx as f64);
            }
        }
    }
    Ok(vector)
}

// ---------------------------------------------------------------------------
// Cached extraction
// ---------------------------------------------------------------------------

fn log_hit(hash: &str, cached: &Extraction) {
    let d = &cached.descriptor;
    log::info!(
        "Extraction {hash} exists, loading {} version {} ({})",
        d.name,
        d.version,
        d.date
    );
}

/// Return the cached extraction for `criteria`, computing and storing it on a
/// miss. A hit never touches `source`.
///
/// Computation for one fingerprint runs under the store's entry lock; a caller
/// that waited on the lock reads the winner's entry instead of recomputing.
/// The returned value is always the stored one.
pub fn extract_with<Src, S>(source: &mut Src, store: &mut S, criteria: &Criteria) -> Result<Extraction>
where
    Src: SampleSource,
    S: ExtractionStore,
{
    let hash = criteria.fingerprint()?;
    if let Some(cached) = store.get(&hash)? {
        log_hit(&hash, &cached);
        return Ok(cached);
    }

    let _lock = store.lock(&hash)?;
    if let Some(cached) = store.get(&hash)? {
        log_hit(&hash, &cached);
        return Ok(cached);
    }

    let dataset = source.dataset()?;
    let samples = dataset
        .data
        .iter()
        .map(|reference| source.sample(reference).map(|s| (reference.clone(), s)));
    let extraction =
        extract_samples(&dataset, criteria, &hash, store.artifact_path(&hash), samples)?;

    store.put(&hash, &extraction)?;
    Ok(store.get(&hash)?.unwrap_or(extraction))
}

/// Extract from the raw dataset at `root`, caching under
/// `<root>/extractions/<name>-<version>/<fingerprint>/`.
pub fn extract(root: &Path, schema: &DatasetSchema, criteria: &Criteria) -> Result<Extraction> {
    if !root.exists() {
        return Err(DatasetError::PathNotFound(root.to_path_buf()));
    }
    let mut store = DirectoryStore::new(extractions_dir(root, schema));
    let mut source = StandardizedTree::new(root, schema);
    extract_with(&mut source, &mut store, criteria)
}
