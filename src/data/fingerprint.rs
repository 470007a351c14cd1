use sha2::{Digest, Sha256};

use super::criteria::Criteria;
use crate::error::Result;

/// SHA-256 of the canonical criteria, hex encoded.
///
/// The canonical form sorts every list and orders map keys, so criteria that
/// differ only in ordering hash identically. Absent fields are omitted from
/// the hashed JSON rather than written as `null`.
pub fn fingerprint(criteria: &Criteria) -> Result<String> {
    let canonical = serde_json::to_vec(&criteria.canonical())?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}
