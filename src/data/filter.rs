use std::collections::BTreeMap;
use std::fmt;

use super::model::{Attribute, AttributeKind, SampleDescriptor, SampleValue};

/// Working attribute set of one extraction: name → scoped statistics.
pub type ScopedAttributes = BTreeMap<String, Attribute>;

// ---------------------------------------------------------------------------
// Why a sample was left out
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The sample does not carry a working attribute at all.
    MissingAttribute { attribute: String },
    /// A required continuous sub-key is absent.
    MissingFeature { attribute: String, key: String },
    /// A required continuous sub-key is NaN, infinite or null.
    NonFinite { attribute: String, key: String },
    /// Categorical value outside the resolved value universe.
    OutOfUniverse { attribute: String, value: String },
    /// The value has already reached its share of the balanced size.
    Balanced { attribute: String, value: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingAttribute { attribute } => write!(f, "no '{attribute}' attribute"),
            Rejection::MissingFeature { attribute, key } => {
                write!(f, "'{attribute}/{key}' missing")
            }
            Rejection::NonFinite { attribute, key } => {
                write!(f, "'{attribute}/{key}' is not a finite number")
            }
            Rejection::OutOfUniverse { attribute, value } => {
                write!(f, "'{attribute}' value '{value}' not selected")
            }
            Rejection::Balanced { attribute, value } => {
                write!(f, "'{attribute}' value '{value}' already at its balanced share")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filter pass
// ---------------------------------------------------------------------------

/// Check a sample against every working attribute.
///
/// A sample passes when it carries each working attribute and:
/// * continuous bundle → every resolved sub-key is present and finite
/// * categorical → its label is in the resolved (possibly filtered) universe
pub fn check_filter(sample: &SampleDescriptor, scoped: &ScopedAttributes) -> Result<(), Rejection> {
    for (name, att) in scoped {
        let Some(value) = sample.attributes.get(name) else {
            return Err(Rejection::MissingAttribute {
                attribute: name.clone(),
            });
        };
        match (att.kind, value) {
            (AttributeKind::Continuous, SampleValue::Features(features)) => {
                for key in &att.values {
                    match features.get(key) {
                        None => {
                            return Err(Rejection::MissingFeature {
                                attribute: name.clone(),
                                key: key.clone(),
                            })
                        }
                        Some(v) if !v.is_some_and(f64::is_finite) => {
                            return Err(Rejection::NonFinite {
                                attribute: name.clone(),
                                key: key.clone(),
                            })
                        }
                        Some(_) => {}
                    }
                }
            }
            (AttributeKind::Categorical, SampleValue::Label(label)) => {
                if !att.contains(label) {
                    return Err(Rejection::OutOfUniverse {
                        attribute: name.clone(),
                        value: label.clone(),
                    });
                }
            }
            (_, other) => {
                return Err(Rejection::OutOfUniverse {
                    attribute: name.clone(),
                    value: other.to_string(),
                })
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Balance pass
// ---------------------------------------------------------------------------

/// Per-value cap for a balance attribute: `size / number_of_values`.
pub fn balanced_share(size: usize, attribute: &Attribute) -> f64 {
    size as f64 / attribute.values.len().max(1) as f64
}

/// Reject the sample if, for any balance attribute, its value's running count
/// has already reached the balanced share of `size`.
pub fn check_balance(
    sample: &SampleDescriptor,
    scoped: &ScopedAttributes,
    balance: &[String],
    size: usize,
) -> Result<(), Rejection> {
    for b in balance {
        let (Some(att), Some(value)) = (scoped.get(b), sample.label(b)) else {
            return Err(Rejection::MissingAttribute {
                attribute: b.clone(),
            });
        };
        let seen = att.count.get(value).copied().unwrap_or(0);
        if seen as f64 >= balanced_share(size, att) {
            return Err(Rejection::Balanced {
                attribute: b.clone(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn scoped() -> ScopedAttributes {
        let mut feats = Attribute::continuous(vec!["loudness".into(), "roughness".into()]);
        feats.min.insert("loudness".into(), -60.0);
        feats.max.insert("loudness".into(), 0.0);
        BTreeMap::from([
            ("class".to_string(), Attribute::categorical(vec!["A".into(), "B".into()])),
            ("features".to_string(), feats),
        ])
    }

    fn sample(label: &str, feats: &[(&str, Option<f64>)]) -> SampleDescriptor {
        let mut s = SampleDescriptor::new(Path::new("/db/x.wav"));
        s.attributes.insert("class".into(), SampleValue::Label(label.into()));
        s.attributes.insert(
            "features".into(),
            SampleValue::Features(feats.iter().map(|(k, v)| (k.to_string(), *v)).collect()),
        );
        s
    }

    #[test]
    fn complete_sample_passes() {
        let s = sample("A", &[("loudness", Some(-3.0)), ("roughness", Some(0.2))]);
        assert_eq!(check_filter(&s, &scoped()), Ok(()));
    }

    #[test]
    fn missing_or_nan_feature_is_rejected() {
        let missing = sample("A", &[("loudness", Some(-3.0))]);
        assert!(matches!(
            check_filter(&missing, &scoped()),
            Err(Rejection::MissingFeature { key, .. }) if key == "roughness"
        ));

        let nan = sample("A", &[("loudness", Some(f64::NAN)), ("roughness", Some(0.2))]);
        assert!(matches!(
            check_filter(&nan, &scoped()),
            Err(Rejection::NonFinite { key, .. }) if key == "loudness"
        ));

        let null = sample("A", &[("loudness", None), ("roughness", Some(0.2))]);
        assert!(matches!(check_filter(&null, &scoped()), Err(Rejection::NonFinite { .. })));
    }

    #[test]
    fn label_outside_universe_is_rejected() {
        let s = sample("C", &[("loudness", Some(-3.0)), ("roughness", Some(0.2))]);
        assert!(matches!(
            check_filter(&s, &scoped()),
            Err(Rejection::OutOfUniverse { value, .. }) if value == "C"
        ));
    }

    #[test]
    fn absent_attribute_is_rejected() {
        let mut s = sample("A", &[("loudness", Some(-3.0)), ("roughness", Some(0.2))]);
        s.attributes.remove("class");
        assert!(matches!(
            check_filter(&s, &scoped()),
            Err(Rejection::MissingAttribute { .. })
        ));
    }

    #[test]
    fn balance_caps_each_value() {
        let mut atts = scoped();
        let balance = vec!["class".to_string()];
        let s = sample("A", &[]);
        assert_eq!(balanced_share(4, &atts["class"]), 2.0);

        assert_eq!(check_balance(&s, &atts, &balance, 4), Ok(()));
        atts.get_mut("class").unwrap().count.insert("A".into(), 2);
        assert!(matches!(
            check_balance(&s, &atts, &balance, 4),
            Err(Rejection::Balanced { .. })
        ));
        assert_eq!(check_balance(&sample("B", &[]), &atts, &balance, 4), Ok(()));
    }
}
