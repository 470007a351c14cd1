/// Data layer: standardization, criteria, extraction.
///
/// Architecture:
/// ```text
///  raw tree: <class>/<stem>.wav + <stem>_analysis.json
///        │
///        ▼
///   ┌─────────────┐
///   │ standardize │  walk once → SampleDescriptor files + DatasetDescriptor
///   └─────────────┘
///        │
///        ▼
///   ┌─────────────┐   ┌─────────────┐
///   │   extract   │◄──│  criteria   │  fingerprint → cache key
///   └─────────────┘   └─────────────┘
///        │  filter → balance → encode
///        ▼
///   Extraction (paths, vectors, descriptor)
/// ```
pub mod criteria;
pub mod extract;
pub mod filter;
pub mod fingerprint;
pub mod loader;
pub mod model;
pub mod standardize;
pub mod stats;
