//! Dataset extraction for labeled audio samples.
//!
//! A raw tree of class directories holding audio files and their
//! precomputed `_analysis.json` feature sidecars is standardized once into
//! per-sample JSON descriptors and a dataset descriptor. Extractions then
//! derive filtered, balanced, min-max normalized subsets from it, cached on
//! disk under a fingerprint of the extraction criteria.
//!
//! ```no_run
//! use std::path::Path;
//! use rusty_dataset::{extract, schema, Criteria};
//!
//! let criteria = Criteria::default().with_balance(["instrument"]);
//! let extraction = extract(Path::new("/data/mridangam"), &schema::mridangam(), &criteria)?;
//! println!("{} samples", extraction.len());
//! # Ok::<(), rusty_dataset::DatasetError>(())
//! ```

pub mod cache;
pub mod data;
pub mod error;
pub mod io;
pub mod schema;

pub use cache::{DirectoryStore, ExtractionStore, InMemoryStore};
pub use data::criteria::Criteria;
pub use data::extract::{extract, extract_with, SampleSource, StandardizedTree};
pub use data::fingerprint::fingerprint;
pub use data::model::{
    Attribute, AttributeKind, DatasetDescriptor, Extraction, ExtractionDescriptor, Loss,
    SampleDescriptor, SampleValue,
};
pub use data::standardize::{shard_index, standardize};
pub use error::{DatasetError, Result};
pub use schema::DatasetSchema;
