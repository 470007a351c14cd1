use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;

use crate::error::{DatasetError, Result};
use crate::schema::SourceLayout;

/// Measurements read from one sidecar, keyed by sub-key. `None` marks a value
/// that is present but not a finite number.
pub type Measurements = BTreeMap<String, Option<f64>>;

// ---------------------------------------------------------------------------
// Sidecar location
// ---------------------------------------------------------------------------

/// `<dir>/<stem>.wav` → `<dir>/<stem>_analysis.json`.
pub fn sidecar_path(audio: &Path, layout: &SourceLayout) -> PathBuf {
    let stem = audio
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    audio.with_file_name(format!("{stem}{}", layout.sidecar_suffix))
}

// ---------------------------------------------------------------------------
// Sidecar loader
// ---------------------------------------------------------------------------

/// Expected sidecar schema: a flat JSON object of measurements.
///
/// ```json
/// { "duration": 0.41, "loudness": -23.5, "roughness": NaN, "genre": "x" }
/// ```
///
/// Only the requested `keys` are returned; keys absent from the file are
/// omitted. Feature extractors written in Python emit bare `NaN`/`Infinity`
/// tokens, which are read as non-finite (`None`) rather than failing the parse.
pub fn load_sidecar(path: &Path, keys: &[String]) -> Result<Measurements> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue =
        serde_json::from_str(&null_non_finite(&text)).map_err(|e| DatasetError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let obj = root.as_object().ok_or_else(|| DatasetError::Malformed {
        path: path.to_path_buf(),
        reason: "expected a top-level JSON object".to_string(),
    })?;

    Ok(keys
        .iter()
        .filter_map(|key| obj.get(key).map(|v| (key.clone(), json_to_measurement(v))))
        .collect())
}

fn json_to_measurement(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Replace bare `NaN`, `Infinity` and `-Infinity` tokens outside of strings
/// with `null`.
fn null_non_finite(text: &str) -> String {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];

    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(tok) = TOKENS.iter().find(|t| rest.starts_with(**t)) {
            out.push_str("null");
            rest = &rest[tok.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}
