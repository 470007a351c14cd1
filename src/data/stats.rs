//! Running statistics folded over a single pass of samples.
//!
//! Both accumulators are plain values owned by the pass that feeds them and
//! finalized once the pass ends; nothing is shared across calls.

use std::collections::BTreeMap;

use super::model::Attribute;

// ---------------------------------------------------------------------------
// Dataset-level min / max / mean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Running {
    min: f64,
    max: f64,
    sum: f64,
    seen: usize,
}

/// Tracks min, max and the mean sum for each sub-key of a continuous bundle.
#[derive(Debug, Clone, Default)]
pub struct FeatureAccumulator {
    running: BTreeMap<String, Running>,
}

impl FeatureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finite measurement into the statistics for `key`.
    pub fn observe(&mut self, key: &str, value: f64) {
        debug_assert!(value.is_finite());
        match self.running.get_mut(key) {
            Some(r) => {
                r.min = r.min.min(value);
                r.max = r.max.max(value);
                r.sum += value;
                r.seen += 1;
            }
            None => {
                self.running.insert(
                    key.to_string(),
                    Running {
                        min: value,
                        max: value,
                        sum: value,
                        seen: 1,
                    },
                );
            }
        }
    }

    /// Number of measurements folded in for `key`.
    pub fn seen(&self, key: &str) -> usize {
        self.running.get(key).map_or(0, |r| r.seen)
    }

    /// Finalize into a continuous attribute. Only observed sub-keys appear;
    /// `mean` divides by the number of samples that supplied each key and
    /// `var` is left at zero for the extraction pass to compute.
    ///
    /// The divisor is the per-key count, not the total sample count; the two
    /// only differ when some sidecars lack a key.
    pub fn finish(self) -> Attribute {
        let mut att = Attribute::continuous(self.running.keys().cloned().collect());
        for (key, r) in self.running {
            att.min.insert(key.clone(), r.min);
            att.max.insert(key.clone(), r.max);
            att.mean.insert(key.clone(), r.sum / r.seen as f64);
            att.var.insert(key, 0.0);
        }
        att
    }
}

// ---------------------------------------------------------------------------
// Extraction-level variance
// ---------------------------------------------------------------------------

/// Sum of squared deviations from a fixed (dataset-level) mean.
#[derive(Debug, Clone, Default)]
pub struct VarianceAccumulator {
    mean: BTreeMap<String, f64>,
    sum_sq: BTreeMap<String, f64>,
}

impl VarianceAccumulator {
    pub fn new(mean: &BTreeMap<String, f64>) -> Self {
        Self {
            mean: mean.clone(),
            sum_sq: mean.keys().map(|k| (k.clone(), 0.0)).collect(),
        }
    }

    pub fn observe(&mut self, key: &str, value: f64) {
        let mean = self.mean.get(key).copied().unwrap_or(0.0);
        *self.sum_sq.entry(key.to_string()).or_insert(0.0) += (mean - value).powi(2);
    }

    /// Population variance per key over `n` samples; `None` when `n == 0`.
    pub fn finish(self, n: usize) -> Option<BTreeMap<String, f64>> {
        if n == 0 {
            return None;
        }
        Some(
            self.sum_sq
                .into_iter()
                .map(|(k, s)| (k, s / n as f64))
                .collect(),
        )
    }
}
