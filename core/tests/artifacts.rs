//! Artifact bundle integration tests: atomic save, cross-checked load,
//! and the failures a damaged bundle must produce.

mod common;

use claimfraud_core::{
    artifact::{self, ArtifactBundle},
    classifier::Classifier,
    error::FraudError,
    training::TrainingPipeline,
};
use serde_json::Value;
use std::{fs, path::Path};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn trained_bundle(seed: u64) -> (ArtifactBundle, claimfraud_core::dataset::Dataset) {
    let dir = tempfile::tempdir().unwrap();
    let dataset = common::claims_dataset(120, seed);
    let (bundle, _) = TrainingPipeline::new(common::test_config(dir.path()))
        .fit_dataset(&dataset, None)
        .unwrap();
    (bundle, dataset)
}

fn expect_load_error(dir: &Path, expected_piece: &str) {
    match ArtifactBundle::load(dir) {
        Err(FraudError::ArtifactLoad { piece, .. }) => assert_eq!(piece, expected_piece),
        Err(other) => panic!("expected ArtifactLoad for {expected_piece}, got {other:?}"),
        Ok(_) => panic!("damaged bundle loaded"),
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A saved bundle loads back and predicts exactly as before.
#[test]
fn save_then_load_predicts_identically() {
    let (bundle, dataset) = trained_bundle(21);
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    bundle.save(&models).unwrap();

    let loaded = ArtifactBundle::load(&models).unwrap();
    assert_eq!(loaded.bundle_id(), bundle.bundle_id());
    assert_eq!(loaded.manifest(), bundle.manifest());

    let rows = bundle.encoder().transform(&dataset.records).unwrap();
    let reloaded_rows = loaded.encoder().transform(&dataset.records).unwrap();
    assert_eq!(rows, reloaded_rows);
    assert_eq!(
        bundle.classifier().predict_proba(&rows).unwrap(),
        loaded.classifier().predict_proba(&rows).unwrap()
    );
}

/// Saving leaves exactly the bundle directory behind, no staging or
/// retired siblings, and replaces an older bundle in place.
#[test]
fn save_replaces_bundle_without_leftovers() {
    let (first, _) = trained_bundle(22);
    let (second, _) = trained_bundle(23);
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");

    first.save(&models).unwrap();
    second.save(&models).unwrap();

    assert_eq!(entries(dir.path()), vec!["models".to_string()]);
    assert_eq!(
        entries(&models),
        vec![
            artifact::CLASSIFIER_FILE,
            artifact::ENCODERS_FILE,
            artifact::MANIFEST_FILE,
            artifact::SCALER_FILE,
            artifact::TARGET_ENCODER_FILE,
        ]
    );
    assert_eq!(ArtifactBundle::load(&models).unwrap().bundle_id(), second.bundle_id());
}

/// A bundle without its scaler file fails to load, naming the scaler.
#[test]
fn missing_scaler_fails_load() {
    let (bundle, _) = trained_bundle(24);
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    bundle.save(&models).unwrap();

    fs::remove_file(models.join(artifact::SCALER_FILE)).unwrap();
    expect_load_error(&models, "scaler");
}

/// A piece copied in from another bundle is rejected.
#[test]
fn mixed_bundle_ids_are_rejected() {
    let (first, _) = trained_bundle(25);
    let (second, _) = trained_bundle(26);
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    first.save(&a).unwrap();
    second.save(&b).unwrap();

    fs::copy(b.join(artifact::ENCODERS_FILE), a.join(artifact::ENCODERS_FILE)).unwrap();
    expect_load_error(&a, "encoders");
}

/// Truncated JSON is a load error for that piece, not a panic.
#[test]
fn corrupt_classifier_fails_load() {
    let (bundle, _) = trained_bundle(27);
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    bundle.save(&models).unwrap();

    fs::write(models.join(artifact::CLASSIFIER_FILE), "{\"bundle_id\": ").unwrap();
    expect_load_error(&models, "classifier");
}

/// A staging directory with no manifest is never a loadable bundle.
#[test]
fn directory_without_manifest_is_not_a_bundle() {
    let (bundle, _) = trained_bundle(28);
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    bundle.save(&models).unwrap();

    fs::remove_file(models.join(artifact::MANIFEST_FILE)).unwrap();
    expect_load_error(&models, "manifest");
    expect_load_error(&dir.path().join("nowhere"), "bundle");
}

/// Bundles written by a newer format are refused.
#[test]
fn unsupported_format_version_is_rejected() {
    let (bundle, _) = trained_bundle(29);
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    bundle.save(&models).unwrap();

    let path = models.join(artifact::MANIFEST_FILE);
    let mut manifest: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    manifest["format_version"] = Value::from(artifact::ARTIFACT_FORMAT_VERSION + 1);
    fs::write(&path, serde_json::to_string(&manifest).unwrap()).unwrap();

    expect_load_error(&models, "manifest");
}
