//! Extraction integration tests over real raw trees and the on-disk cache.

mod helpers;

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use helpers::{build_tree, sidecar, toy_schema, write_sample};
use rusty_dataset::cache::{ARTIFACT_FILE, DESCRIPTOR_FILE};
use rusty_dataset::data::standardize::extractions_dir;
use rusty_dataset::schema::{CategoricalSpec, ContinuousSpec};
use rusty_dataset::{
    extract, standardize, Criteria, DatasetError, DatasetSchema, Extraction, ExtractionDescriptor,
};
use tempfile::TempDir;

#[test]
fn balanced_extraction_caps_every_class() {
    let dir = build_tree(&[("A", 100), ("B", 40), ("C", 60)]);
    let criteria = Criteria::default().with_balance(["class"]);

    let e = extract(dir.path(), &toy_schema(), &criteria).unwrap();
    assert_eq!(e.len(), 120);
    assert_eq!(e.vectors.len(), 120);
    assert_eq!(e.descriptor.size, 120);

    let counts = &e.descriptor.attributes["class"].count;
    for class in ["A", "B", "C"] {
        assert!(counts[class] <= 40, "{class} drew {}", counts[class]);
        assert!((counts[class] as f64 - 40.0).abs() <= 1.0);
    }
}

#[test]
fn balance_with_explicit_size() {
    let dir = build_tree(&[("A", 30), ("B", 30), ("C", 30)]);
    let criteria = Criteria::default().with_balance(["class"]).with_size(31);

    let e = extract(dir.path(), &toy_schema(), &criteria).unwrap();
    assert_eq!(e.len(), 31);
    // Share is 31/3, so no class passes 11.
    let counts = &e.descriptor.attributes["class"].count;
    assert_eq!(counts.values().sum::<usize>(), 31);
    for class in ["A", "B", "C"] {
        assert!(counts[class] <= 11, "{counts:?}");
    }
}

#[test]
fn loudness_normalizes_against_dataset_bounds() {
    let dir = TempDir::new().unwrap();
    for (name, loudness) in [("lo", -60.0), ("mid", -30.0), ("hi", 0.0)] {
        write_sample(
            dir.path(),
            &format!("A/{name}"),
            Some(&sidecar(&[("loudness", loudness), ("roughness", 1.0)])),
        );
    }
    let criteria = Criteria::default().with_filter("features", ["loudness"]);

    let e = extract(dir.path(), &toy_schema(), &criteria).unwrap();
    // Sorted by file name: hi, lo, mid. Vector = [class index, loudness].
    assert_eq!(e.vectors, vec![vec![0.0, 1.0], vec![0.0, 0.0], vec![0.0, 0.5]]);
    let feats = &e.descriptor.attributes["features"];
    assert_eq!(feats.values, vec!["loudness"]);
    assert!(!feats.max.contains_key("roughness"));
}

#[test]
fn class_filter_limits_universe_to_two_indices() {
    let dir = build_tree(&[("A", 5), ("B", 5), ("C", 5)]);
    let criteria = Criteria::default().with_filter("class", ["B", "A"]);

    let e = extract(dir.path(), &toy_schema(), &criteria).unwrap();
    assert_eq!(e.len(), 10);
    assert_eq!(e.descriptor.attributes["class"].values, vec!["A", "B"]);
    assert!(e.paths.iter().all(|p| !p.to_string_lossy().contains("/C/")));
    for v in &e.vectors {
        assert!(v[0] == 0.0 || v[0] == 1.0);
    }
}

#[test]
fn sample_missing_required_feature_is_dropped() {
    let dir = TempDir::new().unwrap();
    write_sample(dir.path(), "A/full1", Some(&sidecar(&[("loudness", -60.0), ("roughness", 1.0)])));
    write_sample(dir.path(), "A/full2", Some(&sidecar(&[("loudness", 0.0), ("roughness", 3.0)])));
    write_sample(dir.path(), "A/partial", Some(&sidecar(&[("loudness", -10.0)])));
    write_sample(dir.path(), "B/nan", Some(r#"{"loudness": NaN, "roughness": 2.0}"#));
    write_sample(dir.path(), "B/full3", Some(&sidecar(&[("loudness", -5.0), ("roughness", 2.0)])));

    let e = extract(dir.path(), &toy_schema(), &Criteria::default()).unwrap();
    assert_eq!(e.len(), 3);
    assert!(e.paths.iter().all(|p| {
        let name = p.file_name().unwrap().to_string_lossy();
        name.starts_with("full")
    }));
    let counts = &e.descriptor.attributes["class"].count;
    assert_eq!(counts["A"], 2);
    assert_eq!(counts["B"], 1);
}

#[test]
fn extraction_invariants_hold() {
    let dir = build_tree(&[("A", 25), ("B", 17), ("C", 9)]);
    for criteria in [
        Criteria::default(),
        Criteria::default().with_size(10),
        Criteria::default().with_balance(["class"]),
        Criteria::default().with_filter("class", ["C"]).with_size(100),
    ] {
        let e = extract(dir.path(), &toy_schema(), &criteria).unwrap();
        assert_eq!(e.paths.len(), e.vectors.len());
        assert_eq!(e.paths.len(), e.descriptor.size);
        assert_eq!(e.descriptor.data.len(), e.descriptor.size);
        if let Some(size) = criteria.size {
            assert!(e.len() <= size);
        }
        for v in &e.vectors {
            // [class, loudness, roughness]
            assert_eq!(v.len(), 3);
            for x in &v[1..] {
                assert!((0.0..=1.0).contains(x), "{x} out of bounds");
            }
        }
    }
}

#[test]
fn cache_entry_is_reused() {
    let dir = build_tree(&[("A", 6), ("B", 6)]);
    let schema = toy_schema();
    let criteria = Criteria::default().with_filter("class", ["A", "B"]).with_size(8);

    let first = extract(dir.path(), &schema, &criteria).unwrap();
    let hash = criteria.fingerprint().unwrap();
    let entry = extractions_dir(dir.path(), &schema).join(&hash);
    assert!(entry.join(ARTIFACT_FILE).is_file());
    assert!(entry.join(DESCRIPTOR_FILE).is_file());
    assert_eq!(first.descriptor.hash, hash);
    assert_eq!(first.descriptor.output_file, entry.join(ARTIFACT_FILE));

    let json: ExtractionDescriptor =
        serde_json::from_str(&fs::read_to_string(entry.join(DESCRIPTOR_FILE)).unwrap()).unwrap();
    assert_eq!(json, first.descriptor);

    // Without the standardized descriptors only the cache can answer.
    fs::remove_dir_all(dir.path().join("toy_standardized")).unwrap();
    fs::remove_file(dir.path().join("toy.json")).unwrap();
    fs::remove_dir_all(dir.path().join("kit")).unwrap();

    let reordered = Criteria::default().with_size(8).with_filter("class", ["B", "A"]);
    let second = extract(dir.path(), &schema, &reordered).unwrap();
    assert_eq!(first, second);
}

#[test]
fn incomplete_cache_entry_is_recomputed() {
    let dir = build_tree(&[("A", 4), ("B", 4)]);
    let schema = toy_schema();
    let criteria = Criteria::default().with_size(5);

    let first = extract(dir.path(), &schema, &criteria).unwrap();
    let entry = extractions_dir(dir.path(), &schema).join(criteria.fingerprint().unwrap());
    fs::remove_file(entry.join(DESCRIPTOR_FILE)).unwrap();

    let second = extract(dir.path(), &schema, &criteria).unwrap();
    assert_eq!(first.paths, second.paths);
    assert_eq!(first.vectors, second.vectors);
    assert!(entry.join(DESCRIPTOR_FILE).is_file());
}

#[test]
fn extraction_standardizes_on_demand() {
    let dir = build_tree(&[("A", 3)]);
    let schema = toy_schema();
    extract(dir.path(), &schema, &Criteria::default().with_attributes(["class"])).unwrap();
    assert!(dir.path().join("toy.json").is_file());
    assert_eq!(standardize(dir.path(), &schema).unwrap().total_size, 3);
}

#[test]
fn unknown_criteria_key_fails_before_io() {
    let err = Criteria::from_json_str(r#"{"balance": ["class"], "shuffle": true}"#).unwrap_err();
    assert!(matches!(err, DatasetError::UnknownCriteriaKey(ref k) if k == "shuffle"));
}

#[test]
fn missing_root_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = extract(&dir.path().join("absent"), &toy_schema(), &Criteria::default()).unwrap_err();
    assert!(matches!(err, DatasetError::PathNotFound(_)));
    assert!(!dir.path().join("absent").exists());
}

/// Same features as the toy schema, but only class A is a known label.
fn single_class_schema() -> DatasetSchema {
    DatasetSchema::new(
        "other",
        "0.1.0",
        CategoricalSpec {
            name: "class".into(),
            values: vec!["A".into()],
        },
        ContinuousSpec {
            name: "features".into(),
            keys: vec!["loudness".into(), "roughness".into()],
        },
    )
}

#[test]
fn schemas_sharing_a_root_keep_separate_caches() {
    let dir = build_tree(&[("A", 5), ("B", 5)]);
    let criteria = Criteria::default().with_attributes(["class"]);

    let toy = extract(dir.path(), &toy_schema(), &criteria).unwrap();
    assert_eq!(toy.descriptor.name, "toy");
    assert_eq!(toy.len(), 10);

    let other = extract(dir.path(), &single_class_schema(), &criteria).unwrap();
    assert_eq!(other.descriptor.name, "other");
    assert_eq!(other.len(), 5);
    assert_ne!(
        extractions_dir(dir.path(), &toy_schema()),
        extractions_dir(dir.path(), &single_class_schema())
    );

    // Each schema still hits its own entry.
    assert_eq!(extract(dir.path(), &toy_schema(), &criteria).unwrap(), toy);
}

#[test]
fn concurrent_extractions_agree_with_the_stored_entry() {
    let dir = build_tree(&[("A", 40), ("B", 40)]);
    let schema = toy_schema();
    standardize(dir.path(), &schema).unwrap();
    let root = Arc::new(dir.path().to_path_buf());

    for round in 0..5 {
        let criteria = Criteria::default().with_size(30 + round);
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (root, barrier, criteria) = (root.clone(), barrier.clone(), criteria.clone());
                let schema = schema.clone();
                thread::spawn(move || -> Extraction {
                    barrier.wait();
                    extract(&root, &schema, &criteria).unwrap()
                })
            })
            .collect();
        let results: Vec<Extraction> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results[0], results[1], "round {round}");

        let entry = extractions_dir(&root, &schema).join(criteria.fingerprint().unwrap());
        let stored: ExtractionDescriptor =
            serde_json::from_str(&fs::read_to_string(entry.join(DESCRIPTOR_FILE)).unwrap())
                .unwrap();
        assert_eq!(stored, results[0].descriptor, "round {round}");
        let artifact: Extraction =
            bincode::deserialize(&fs::read(entry.join(ARTIFACT_FILE)).unwrap()).unwrap();
        assert_eq!(artifact, results[0], "round {round}");
    }
}
