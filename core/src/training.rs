//! Training pipeline: dataset in, artifact bundle out.
//!
//! ORDER (fixed):
//!   1. Encode target labels; reject anything outside the two classes.
//!   2. Stratified train/validation split (Split stream).
//!   3. Fit the FeatureEncoder on the training split ONLY.
//!   4. Encode both splits through the fitted encoder.
//!   5. Train the classifier with class weights, early stopping on
//!      validation loss, and a checkpoint of the best epoch.
//!   6. Restore the best weights, score the validation split, bundle.
//!
//! Persisting is a separate step (`TrainingPipeline::train` does both).

use crate::{
    artifact::{self, ArtifactBundle, BundleStats, Checkpoint},
    classifier::{ClassWeights, Classifier, MlpClassifier, TrainingStreams},
    config::FraudConfig,
    dataset::Dataset,
    encoder::FeatureEncoder,
    error::{FraudError, FraudResult},
    rng::{RngBank, StreamRng, StreamSlot},
    target::TargetEncoder,
    types::{ClassLabel, Matrix},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DECISION_THRESHOLD: f64 = 0.5;

// ── Split ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Split row indices so each class keeps its share in both halves.
/// Every class needs at least two rows so it can appear on both sides.
pub fn stratified_split(
    labels: &[ClassLabel],
    validation_fraction: f64,
    rng: &mut StreamRng,
) -> FraudResult<StratifiedSplit> {
    if labels.is_empty() {
        return Err(FraudError::EmptyDataset {
            context: "cannot split zero rows".into(),
        });
    }
    if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
        return Err(FraudError::TrainingData {
            reason: format!("validation fraction must be in (0, 1), got {validation_fraction}"),
        });
    }

    let mut train = Vec::new();
    let mut validation = Vec::new();

    for class in [0, 1] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == class)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            return Err(FraudError::TrainingData {
                reason: format!(
                    "class {class} has {} rows; at least 2 are needed to stratify",
                    members.len()
                ),
            });
        }
        rng.shuffle(&mut members);
        let n_val = ((members.len() as f64 * validation_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        validation.extend_from_slice(&members[..n_val]);
        train.extend_from_slice(&members[n_val..]);
    }

    train.sort_unstable();
    validation.sort_unstable();
    Ok(StratifiedSplit { train, validation })
}

// ── History ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: f64,
}

/// Confusion counts and rates at the 0.5 threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

impl ValidationReport {
    pub fn from_predictions(probs: &[f64], y: &[ClassLabel]) -> Self {
        let mut r = ValidationReport { rows: probs.len(), ..Default::default() };
        for (&p, &c) in probs.iter().zip(y) {
            match (p > DECISION_THRESHOLD, c == 1) {
                (true, true) => r.true_positives += 1,
                (true, false) => r.false_positives += 1,
                (false, false) => r.true_negatives += 1,
                (false, true) => r.false_negatives += 1,
            }
        }
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        r.accuracy = ratio(r.true_positives + r.true_negatives, r.rows);
        r.precision = ratio(r.true_positives, r.true_positives + r.false_positives);
        r.recall = ratio(r.true_positives, r.true_positives + r.false_negatives);
        r
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochRecord>,
    pub best_epoch: usize,
    pub best_validation_loss: f64,
    pub stopped_early: bool,
    pub class_weights: ClassWeights,
    pub training_rows: usize,
    pub validation_rows: usize,
    /// Validation rows dropped because they carried a category the
    /// training split never saw.
    pub validation_rows_skipped: usize,
    pub report: ValidationReport,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

pub struct TrainingPipeline {
    config: FraudConfig,
}

impl TrainingPipeline {
    pub fn new(config: FraudConfig) -> Self {
        Self { config }
    }

    /// Read the CSV, fit everything, and persist the bundle to the
    /// configured artifact directory.
    pub fn train(&self, dataset_path: impl AsRef<Path>) -> FraudResult<(ArtifactBundle, TrainingHistory)> {
        let dataset =
            Dataset::from_csv_path(dataset_path, &self.config.schema, &self.config.labels.column)?;
        let artifact_dir = &self.config.artifact_dir;
        let checkpoint_dir = artifact::checkpoint_dir(artifact_dir);

        let (bundle, history) = self.fit_dataset(&dataset, Some(checkpoint_dir.as_path()))?;
        bundle.save(artifact_dir)?;
        Ok((bundle, history))
    }

    /// Fit encoder and classifier on an in-memory dataset. Nothing is
    /// written except the optional best-epoch checkpoint.
    pub fn fit_dataset(
        &self,
        dataset: &Dataset,
        checkpoint_dir: Option<&Path>,
    ) -> FraudResult<(ArtifactBundle, TrainingHistory)> {
        let cfg = &self.config.training;
        if dataset.is_empty() {
            return Err(FraudError::EmptyDataset {
                context: "training dataset has no rows".into(),
            });
        }

        let labels = &self.config.labels;
        let target = TargetEncoder::new(labels.negative.clone(), labels.positive.clone())?;
        let y_all = target.encode_all(&dataset.labels)?;

        let bank = RngBank::new(cfg.seed);
        let split = stratified_split(&y_all, cfg.validation_fraction, &mut bank.for_stream(StreamSlot::Split))?;
        let train_ds = dataset.select(&split.train);
        let val_ds = dataset.select(&split.validation);

        let encoder = FeatureEncoder::fit(
            self.config.schema.clone(),
            &train_ds.records,
            &train_ds.labels,
        )?;

        let x_train = encoder.transform(&train_ds.records)?;
        let y_train: Vec<ClassLabel> = split.train.iter().map(|&i| y_all[i]).collect();

        let mut x_val: Matrix = Vec::with_capacity(val_ds.len());
        let mut y_val: Vec<ClassLabel> = Vec::with_capacity(val_ds.len());
        let mut skipped = 0;
        for (record, &idx) in val_ds.records.iter().zip(&split.validation) {
            match encoder.transform_one(record) {
                Ok(row) => {
                    x_val.push(row);
                    y_val.push(y_all[idx]);
                }
                Err(FraudError::UnknownCategory { field, value }) => {
                    log::warn!(
                        "training: validation row {idx} skipped, '{field}'='{value}' unseen in training split"
                    );
                    skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        if x_val.is_empty() {
            return Err(FraudError::TrainingData {
                reason: "no validation rows could be encoded with the training-split encoder".into(),
            });
        }

        let weights = ClassWeights::balanced(&y_train)?;
        log::info!(
            "training: {} train rows, {} validation rows ({} skipped), {} features, weights neg={:.3} pos={:.3}",
            x_train.len(),
            x_val.len(),
            skipped,
            encoder.feature_count(),
            weights.negative,
            weights.positive
        );

        let mut model = MlpClassifier::new(
            encoder.feature_count(),
            cfg.model.clone(),
            &mut bank.for_stream(StreamSlot::WeightInit),
        )?;
        log::info!(
            "training: network {:?} with {} parameters",
            cfg.model.hidden_layers,
            model.parameter_count()
        );
        let mut streams = TrainingStreams::from_bank(&bank);

        let validation_weights = ClassWeights::uniform();
        let mut epochs = Vec::new();
        let mut best: Option<(usize, f64, MlpClassifier)> = None;
        let mut epochs_without_improvement = 0;
        let mut stopped_early = false;

        for epoch in 1..=cfg.max_epochs {
            let train_loss = model.train_epoch(&x_train, &y_train, &weights, cfg.batch_size, &mut streams)?;
            let validation_loss = model.loss(&x_val, &y_val, &validation_weights)?;
            epochs.push(EpochRecord { epoch, train_loss, validation_loss });
            log::debug!("training: epoch {epoch} loss={train_loss:.4} val_loss={validation_loss:.4}");

            let improved = best.as_ref().map_or(true, |(_, loss, _)| validation_loss < *loss);
            if improved {
                epochs_without_improvement = 0;
                if let Some(dir) = checkpoint_dir {
                    let checkpoint = Checkpoint { epoch, validation_loss, classifier: model.clone() };
                    artifact::save_checkpoint(dir, &checkpoint)?;
                }
                best = Some((epoch, validation_loss, model.clone()));
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= cfg.patience {
                    log::info!(
                        "training: early stop at epoch {epoch}, no improvement for {} epochs",
                        cfg.patience
                    );
                    stopped_early = true;
                    break;
                }
            }
        }

        let (best_epoch, best_validation_loss, best_model) = best.ok_or_else(|| FraudError::TrainingData {
            reason: "training ran zero epochs".into(),
        })?;
        let model = best_model;

        let report = ValidationReport::from_predictions(&model.predict_proba(&x_val)?, &y_val);
        log::info!(
            "training: best epoch {best_epoch} val_loss={best_validation_loss:.4} accuracy={:.3} precision={:.3} recall={:.3}",
            report.accuracy,
            report.precision,
            report.recall
        );

        let history = TrainingHistory {
            epochs,
            best_epoch,
            best_validation_loss,
            stopped_early,
            class_weights: weights,
            training_rows: x_train.len(),
            validation_rows: x_val.len(),
            validation_rows_skipped: skipped,
            report,
        };

        let bundle = ArtifactBundle::new(
            model,
            encoder,
            target,
            BundleStats {
                training_rows: history.training_rows,
                validation_rows: history.validation_rows,
                best_epoch: Some(best_epoch),
                best_validation_loss: Some(best_validation_loss),
            },
        )?;

        Ok((bundle, history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts_confusion_cells() {
        let probs = [0.9, 0.2, 0.6, 0.4];
        let y = [1, 0, 0, 1];
        let r = ValidationReport::from_predictions(&probs, &y);
        assert_eq!((r.true_positives, r.true_negatives, r.false_positives, r.false_negatives), (1, 1, 1, 1));
        assert!((r.accuracy - 0.5).abs() < 1e-12);
    }

    #[test]
    fn split_needs_two_rows_per_class() {
        let mut rng = RngBank::new(1).for_stream(StreamSlot::Split);
        let err = stratified_split(&[0, 0, 0, 1], 0.2, &mut rng).unwrap_err();
        assert_eq!(err.kind(), "training_data");
    }

    #[test]
    fn split_covers_every_row_once() {
        let labels: Vec<ClassLabel> = (0..100).map(|i| u8::from(i % 4 == 0)).collect();
        let mut rng = RngBank::new(3).for_stream(StreamSlot::Split);
        let split = stratified_split(&labels, 0.2, &mut rng).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.validation).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert_eq!(split.validation.len(), 20);
    }
}
