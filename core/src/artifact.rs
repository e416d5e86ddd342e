//! Artifact bundle: classifier, encoder table, scaler and target
//! encoder, persisted and loaded as one unit.
//!
//! RULE: The four pieces are versioned together. Every blob carries the
//! bundle id from the manifest; loading a blob from a different bundle
//! is an ArtifactLoad error, never a silent mix.
//!
//! Saving is atomic at directory level: all files are written into a
//! staging directory next to the target and the staging directory is
//! renamed into place only after every file is flushed. A crash
//! mid-save leaves at most a stray staging directory, never a partial
//! bundle under the target name.

use crate::{
    classifier::{Classifier, MlpClassifier},
    encoder::{EncoderTable, FeatureEncoder, Scaler},
    error::{FraudError, FraudResult},
    target::TargetEncoder,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use uuid::Uuid;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";
pub const ENCODERS_FILE: &str = "encoders.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const TARGET_ENCODER_FILE: &str = "target_encoder.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub bundle_id: Uuid,
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub feature_columns: Vec<String>,
    pub training_rows: usize,
    pub validation_rows: usize,
    pub best_epoch: Option<usize>,
    pub best_validation_loss: Option<f64>,
}

/// On-disk wrapper tying a piece to its bundle.
#[derive(Debug, Serialize, Deserialize)]
struct Blob<T> {
    bundle_id: Uuid,
    format_version: u32,
    payload: T,
}

/// Training facts recorded in the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BundleStats {
    pub training_rows: usize,
    pub validation_rows: usize,
    pub best_epoch: Option<usize>,
    pub best_validation_loss: Option<f64>,
}

/// The fitted model artifact. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBundle {
    manifest: Manifest,
    classifier: MlpClassifier,
    encoder: FeatureEncoder,
    target: TargetEncoder,
}

impl ArtifactBundle {
    pub fn new(
        classifier: MlpClassifier,
        encoder: FeatureEncoder,
        target: TargetEncoder,
        stats: BundleStats,
    ) -> FraudResult<Self> {
        let manifest = Manifest {
            bundle_id: Uuid::new_v4(),
            format_version: ARTIFACT_FORMAT_VERSION,
            created_at: Utc::now(),
            feature_columns: encoder.columns(),
            training_rows: stats.training_rows,
            validation_rows: stats.validation_rows,
            best_epoch: stats.best_epoch,
            best_validation_loss: stats.best_validation_loss,
        };
        let bundle = Self { manifest, classifier, encoder, target };
        bundle.check_coherence().map_err(|reason| FraudError::TrainingData { reason })?;
        Ok(bundle)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn bundle_id(&self) -> Uuid {
        self.manifest.bundle_id
    }

    pub fn classifier(&self) -> &MlpClassifier {
        &self.classifier
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn target(&self) -> &TargetEncoder {
        &self.target
    }

    fn check_coherence(&self) -> Result<(), String> {
        let width = self.encoder.feature_count();
        if self.classifier.input_dim() != width {
            return Err(format!(
                "classifier expects {} features but encoder produces {width}",
                self.classifier.input_dim()
            ));
        }
        if self.manifest.feature_columns != self.encoder.columns() {
            return Err("manifest feature columns do not match encoder columns".into());
        }
        Ok(())
    }

    /// Write the bundle to `dir`, replacing any bundle already there.
    pub fn save(&self, dir: impl AsRef<Path>) -> FraudResult<()> {
        let dir = dir.as_ref();
        let staging = sibling_path(dir, &format!("staging-{}", self.bundle_id()));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let id = self.bundle_id();
        write_json(&staging.join(CLASSIFIER_FILE), &blob(id, &self.classifier))?;
        write_json(&staging.join(ENCODERS_FILE), &blob(id, self.encoder.table()))?;
        write_json(&staging.join(SCALER_FILE), &blob(id, self.encoder.scaler()))?;
        write_json(&staging.join(TARGET_ENCODER_FILE), &blob(id, &self.target))?;
        // Manifest last: a staging dir without one is never a bundle.
        write_json(&staging.join(MANIFEST_FILE), &self.manifest)?;

        swap_into_place(&staging, dir)?;

        log::info!("artifact: saved bundle {} to {}", id, dir.display());
        Ok(())
    }

    /// Load and cross-check all four pieces from `dir`.
    pub fn load(dir: impl AsRef<Path>) -> FraudResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FraudError::ArtifactLoad {
                piece: "bundle".into(),
                reason: format!("{} is not a directory", dir.display()),
            });
        }

        let manifest: Manifest = read_json(dir, MANIFEST_FILE, "manifest")?;
        if manifest.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(FraudError::ArtifactLoad {
                piece: "manifest".into(),
                reason: format!(
                    "format version {} is not supported (expected {ARTIFACT_FORMAT_VERSION})",
                    manifest.format_version
                ),
            });
        }

        let id = manifest.bundle_id;
        let classifier: MlpClassifier = read_blob(dir, CLASSIFIER_FILE, "classifier", id)?;
        let table: EncoderTable = read_blob(dir, ENCODERS_FILE, "encoders", id)?;
        let scaler: Scaler = read_blob(dir, SCALER_FILE, "scaler", id)?;
        let target: TargetEncoder = read_blob(dir, TARGET_ENCODER_FILE, "target_encoder", id)?;

        target.validate().map_err(|e| load_error("target_encoder", e))?;
        let encoder = FeatureEncoder::from_parts(table, scaler).map_err(|e| load_error("encoders", e))?;

        let bundle = Self { manifest, classifier, encoder, target };
        bundle.check_coherence().map_err(|reason| FraudError::ArtifactLoad {
            piece: "bundle".into(),
            reason,
        })?;

        log::info!(
            "artifact: loaded bundle {} ({} features) from {}",
            id,
            bundle.encoder.feature_count(),
            dir.display()
        );
        Ok(bundle)
    }
}

// ── Checkpoints ──────────────────────────────────────────────────────────────

/// Best-so-far classifier snapshot written during training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: usize,
    pub validation_loss: f64,
    pub classifier: MlpClassifier,
}

pub const CHECKPOINT_FILE: &str = "best_classifier.json";

/// Checkpoint directory for a given artifact directory.
pub fn checkpoint_dir(artifact_dir: &Path) -> PathBuf {
    let name = artifact_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "models".into());
    artifact_dir.with_file_name(format!("{name}.checkpoint"))
}

/// Replace the checkpoint file atomically (write temp, then rename).
pub fn save_checkpoint(dir: &Path, checkpoint: &Checkpoint) -> FraudResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(CHECKPOINT_FILE);
    let tmp = dir.join(format!("{CHECKPOINT_FILE}.tmp"));
    write_json(&tmp, checkpoint)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

pub fn load_checkpoint(dir: &Path) -> FraudResult<Checkpoint> {
    read_json(dir, CHECKPOINT_FILE, "checkpoint")
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn blob<T>(bundle_id: Uuid, payload: &T) -> Blob<&T> {
    Blob { bundle_id, format_version: ARTIFACT_FORMAT_VERSION, payload }
}

/// Move `staging` to `dir`. An existing `dir` is retired first and put
/// back if the final rename fails, so `dir` never ends up missing.
fn swap_into_place(staging: &Path, dir: &Path) -> FraudResult<()> {
    let retired = sibling_path(dir, &format!("retired-{}", Uuid::new_v4()));
    if dir.exists() {
        fs::rename(dir, &retired)?;
    }
    if let Err(e) = fs::rename(staging, dir) {
        if retired.exists() {
            fs::rename(&retired, dir)?;
        }
        return Err(e.into());
    }
    if retired.exists() {
        if let Err(e) = fs::remove_dir_all(&retired) {
            log::warn!("artifact: could not remove retired bundle {}: {e}", retired.display());
        }
    }
    Ok(())
}

fn sibling_path(dir: &Path, tag: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".into());
    dir.with_file_name(format!(".{name}.{tag}"))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> FraudResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let mut file = fs::File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str, piece: &str) -> FraudResult<T> {
    let path = dir.join(file);
    let content = fs::read_to_string(&path).map_err(|e| FraudError::ArtifactLoad {
        piece: piece.to_string(),
        reason: format!("cannot read {}: {e}", path.display()),
    })?;
    serde_json::from_str(&content).map_err(|e| FraudError::ArtifactLoad {
        piece: piece.to_string(),
        reason: format!("cannot parse {}: {e}", path.display()),
    })
}

fn read_blob<T: DeserializeOwned>(dir: &Path, file: &str, piece: &str, bundle_id: Uuid) -> FraudResult<T> {
    let blob: Blob<T> = read_json(dir, file, piece)?;
    if blob.bundle_id != bundle_id {
        return Err(FraudError::ArtifactLoad {
            piece: piece.to_string(),
            reason: format!(
                "belongs to bundle {} but manifest names bundle {bundle_id}",
                blob.bundle_id
            ),
        });
    }
    if blob.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(FraudError::ArtifactLoad {
            piece: piece.to_string(),
            reason: format!("format version {} is not supported", blob.format_version),
        });
    }
    Ok(blob.payload)
}

fn load_error(piece: &str, err: FraudError) -> FraudError {
    FraudError::ArtifactLoad {
        piece: piece.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_swap_restores_live_bundle() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("models");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(MANIFEST_FILE), "{}").unwrap();

        let missing_staging = root.path().join(".models.staging-gone");
        assert!(swap_into_place(&missing_staging, &dir).is_err());

        assert_eq!(fs::read_to_string(dir.join(MANIFEST_FILE)).unwrap(), "{}");
        let leftovers: Vec<_> = fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1, "retired sibling left behind");
    }

    #[test]
    fn swap_replaces_existing_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("models");
        let staging = root.path().join(".models.staging-new");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("old.json"), "old").unwrap();
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("new.json"), "new").unwrap();

        swap_into_place(&staging, &dir).unwrap();

        assert!(dir.join("new.json").is_file());
        assert!(!dir.join("old.json").exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
    }
}
