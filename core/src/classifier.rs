//! Binary classifier contract and the feed-forward network behind it.
//!
//! RULE: A Classifier sees only encoded, scaled feature vectors.
//! It never touches raw claims, and `predict_proba` is a pure function
//! of the trained weights. Randomness exists only inside training
//! (shuffling, dropout) and always comes from the caller's streams.

use crate::{
    error::{FraudError, FraudResult},
    rng::{RngBank, StreamRng, StreamSlot},
    types::{ClassLabel, FeatureVector},
};
use serde::{Deserialize, Serialize};

const PROB_EPSILON: f64 = 1e-7;
const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

// ── Class weights ────────────────────────────────────────────────────────────

/// Per-class loss weights. Balanced weights are
/// `total / (2 * count_of_class)`, so the minority class counts more.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub negative: f64,
    pub positive: f64,
}

impl ClassWeights {
    pub fn uniform() -> Self {
        Self { negative: 1.0, positive: 1.0 }
    }

    pub fn balanced(y: &[ClassLabel]) -> FraudResult<Self> {
        let total = y.len() as f64;
        let positives = y.iter().filter(|&&c| c == 1).count() as f64;
        let negatives = total - positives;
        if positives == 0.0 || negatives == 0.0 {
            return Err(FraudError::TrainingData {
                reason: format!(
                    "both classes must be present to weight them ({negatives} negative, {positives} positive)"
                ),
            });
        }
        Ok(Self {
            negative: total / (2.0 * negatives),
            positive: total / (2.0 * positives),
        })
    }

    pub fn for_class(&self, class: ClassLabel) -> f64 {
        if class == 1 { self.positive } else { self.negative }
    }
}

/// Weighted binary cross-entropy averaged over rows.
pub fn weighted_bce(probs: &[f64], y: &[ClassLabel], weights: &ClassWeights) -> f64 {
    if probs.is_empty() {
        return 0.0;
    }
    let total: f64 = probs
        .iter()
        .zip(y)
        .map(|(&p, &c)| {
            let p = p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
            let ll = if c == 1 { p.ln() } else { (1.0 - p).ln() };
            -weights.for_class(c) * ll
        })
        .sum();
    total / probs.len() as f64
}

// ── Contract ─────────────────────────────────────────────────────────────────

/// RNG streams consumed while training.
pub struct TrainingStreams {
    pub shuffle: StreamRng,
    pub dropout: StreamRng,
}

impl TrainingStreams {
    pub fn from_bank(bank: &RngBank) -> Self {
        Self {
            shuffle: bank.for_stream(StreamSlot::Shuffle),
            dropout: bank.for_stream(StreamSlot::Dropout),
        }
    }
}

/// The contract every fraud model must fulfill.
pub trait Classifier {
    /// Width of the feature vectors this model accepts.
    fn input_dim(&self) -> usize;

    /// One pass over the training rows. Returns the mean training loss.
    fn train_epoch(
        &mut self,
        x: &[FeatureVector],
        y: &[ClassLabel],
        weights: &ClassWeights,
        batch_size: usize,
        streams: &mut TrainingStreams,
    ) -> FraudResult<f64>;

    /// Fraud probability per row, each in [0, 1].
    fn predict_proba(&self, x: &[FeatureVector]) -> FraudResult<Vec<f64>>;

    /// Weighted loss on held-out rows (no dropout).
    fn loss(&self, x: &[FeatureVector], y: &[ClassLabel], weights: &ClassWeights) -> FraudResult<f64> {
        let probs = self.predict_proba(x)?;
        Ok(weighted_bce(&probs, y, weights))
    }

    /// Plain fit: a fixed number of epochs, no validation.
    /// Early stopping lives in the training pipeline.
    fn fit(
        &mut self,
        x: &[FeatureVector],
        y: &[ClassLabel],
        weights: &ClassWeights,
        epochs: usize,
        batch_size: usize,
        streams: &mut TrainingStreams,
    ) -> FraudResult<Vec<f64>> {
        (0..epochs)
            .map(|_| self.train_epoch(x, y, weights, batch_size, streams))
            .collect()
    }
}

// ── Feed-forward network ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    pub hidden_layers: Vec<usize>,
    pub dropout: f64,
    pub learning_rate: f64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            dropout: 0.3,
            learning_rate: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DenseLayer {
    inputs: usize,
    outputs: usize,
    /// Row-major `outputs x inputs`.
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl DenseLayer {
    fn new(inputs: usize, outputs: usize, gain: f64, rng: &mut StreamRng) -> Self {
        let std = (gain / inputs as f64).sqrt();
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs).map(|_| rng.next_normal() * std).collect(),
            bias: vec![0.0; outputs],
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        (0..self.outputs)
            .map(|o| {
                let row = &self.weights[o * self.inputs..(o + 1) * self.inputs];
                row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + self.bias[o]
            })
            .collect()
    }

    fn zeros_like(&self) -> (Vec<f64>, Vec<f64>) {
        (vec![0.0; self.weights.len()], vec![0.0; self.bias.len()])
    }
}

/// First and second moment estimates for one layer.
#[derive(Debug, Clone, PartialEq)]
struct AdamMoments {
    m_w: Vec<f64>,
    v_w: Vec<f64>,
    m_b: Vec<f64>,
    v_b: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct AdamState {
    step: i32,
    layers: Vec<AdamMoments>,
}

/// Multi-layer perceptron: ReLU hidden layers with inverted dropout,
/// sigmoid output, Adam, class-weighted binary cross-entropy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    input_dim: usize,
    config: MlpConfig,
    layers: Vec<DenseLayer>,
    #[serde(skip)]
    optimizer: AdamState,
}

impl MlpClassifier {
    pub fn new(input_dim: usize, config: MlpConfig, rng: &mut StreamRng) -> FraudResult<Self> {
        if input_dim == 0 {
            return Err(FraudError::TrainingData {
                reason: "classifier needs at least one input feature".into(),
            });
        }
        if !(0.0..1.0).contains(&config.dropout) {
            return Err(FraudError::TrainingData {
                reason: format!("dropout must be in [0, 1), got {}", config.dropout),
            });
        }

        let mut layers = Vec::with_capacity(config.hidden_layers.len() + 1);
        let mut width = input_dim;
        for &hidden in &config.hidden_layers {
            layers.push(DenseLayer::new(width, hidden, 2.0, rng));
            width = hidden;
        }
        layers.push(DenseLayer::new(width, 1, 1.0, rng));

        Ok(Self {
            input_dim,
            config,
            layers,
            optimizer: AdamState::default(),
        })
    }

    /// Parameter count across all layers.
    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.weights.len() + l.bias.len()).sum()
    }

    fn check_row(&self, row: &[f64]) -> FraudResult<()> {
        if row.len() != self.input_dim {
            return Err(FraudError::FeatureCount {
                expected: self.input_dim,
                actual: row.len(),
            });
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let last = self.layers.len() - 1;
        let mut a = row.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&a);
            a = if i == last { z.into_iter().map(sigmoid).collect() } else { z.into_iter().map(relu).collect() };
        }
        a[0]
    }

    /// Forward + backward for one row, accumulating gradients.
    /// Returns the row's weighted loss.
    fn accumulate_gradients(
        &self,
        row: &[f64],
        class: ClassLabel,
        weight: f64,
        dropout: &mut StreamRng,
        grads: &mut [(Vec<f64>, Vec<f64>)],
    ) -> f64 {
        let last = self.layers.len() - 1;
        let keep = 1.0 - self.config.dropout;

        // activations[i] is the input to layer i
        let mut activations: Vec<Vec<f64>> = Vec::with_capacity(self.layers.len() + 1);
        // derivative of each hidden activation w.r.t. its pre-activation,
        // with the dropout mask folded in
        let mut local_grads: Vec<Vec<f64>> = Vec::with_capacity(last);
        activations.push(row.to_vec());

        for (i, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&activations[i]);
            if i == last {
                activations.push(z.into_iter().map(sigmoid).collect());
            } else {
                let mut a = Vec::with_capacity(z.len());
                let mut d = Vec::with_capacity(z.len());
                for zj in z {
                    let mask = if self.config.dropout > 0.0 && !dropout.chance(keep) {
                        0.0
                    } else {
                        1.0 / keep
                    };
                    let active = if zj > 0.0 { 1.0 } else { 0.0 };
                    a.push(relu(zj) * mask);
                    d.push(active * mask);
                }
                activations.push(a);
                local_grads.push(d);
            }
        }

        let p = activations[last + 1][0];
        let y = class as f64;
        let pc = p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
        let loss = -weight * (y * pc.ln() + (1.0 - y) * (1.0 - pc).ln());

        // dL/dz at the sigmoid output
        let mut delta = vec![weight * (p - y)];

        for i in (0..self.layers.len()).rev() {
            let layer = &self.layers[i];
            let input = &activations[i];
            let (gw, gb) = &mut grads[i];
            for o in 0..layer.outputs {
                let d = delta[o];
                if d == 0.0 {
                    continue;
                }
                gb[o] += d;
                let row = &mut gw[o * layer.inputs..(o + 1) * layer.inputs];
                for (g, x) in row.iter_mut().zip(input) {
                    *g += d * x;
                }
            }
            if i == 0 {
                break;
            }
            let local = &local_grads[i - 1];
            delta = (0..layer.inputs)
                .map(|j| {
                    let back: f64 = (0..layer.outputs)
                        .map(|o| layer.weights[o * layer.inputs + j] * delta[o])
                        .sum();
                    back * local[j]
                })
                .collect();
        }

        loss
    }

    fn apply_adam(&mut self, grads: &[(Vec<f64>, Vec<f64>)], scale: f64) {
        if self.optimizer.layers.is_empty() {
            self.optimizer.layers = self
                .layers
                .iter()
                .map(|l| {
                    let (w, b) = l.zeros_like();
                    AdamMoments { m_w: w.clone(), v_w: w, m_b: b.clone(), v_b: b }
                })
                .collect();
        }
        self.optimizer.step += 1;
        let t = self.optimizer.step;
        let lr = self.config.learning_rate * (1.0 - ADAM_BETA2.powi(t)).sqrt()
            / (1.0 - ADAM_BETA1.powi(t));

        for ((layer, moments), (gw, gb)) in self
            .layers
            .iter_mut()
            .zip(self.optimizer.layers.iter_mut())
            .zip(grads)
        {
            adam_update(&mut layer.weights, &mut moments.m_w, &mut moments.v_w, gw, scale, lr);
            adam_update(&mut layer.bias, &mut moments.m_b, &mut moments.v_b, gb, scale, lr);
        }
    }
}

impl Classifier for MlpClassifier {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn train_epoch(
        &mut self,
        x: &[FeatureVector],
        y: &[ClassLabel],
        weights: &ClassWeights,
        batch_size: usize,
        streams: &mut TrainingStreams,
    ) -> FraudResult<f64> {
        if x.is_empty() {
            return Err(FraudError::EmptyDataset {
                context: "cannot train on zero rows".into(),
            });
        }
        if x.len() != y.len() {
            return Err(FraudError::TrainingData {
                reason: format!("{} rows but {} labels", x.len(), y.len()),
            });
        }
        for row in x {
            self.check_row(row)?;
        }

        let batch_size = batch_size.max(1);
        let mut order: Vec<usize> = (0..x.len()).collect();
        streams.shuffle.shuffle(&mut order);

        let mut total_loss = 0.0;
        for batch in order.chunks(batch_size) {
            let mut grads: Vec<(Vec<f64>, Vec<f64>)> =
                self.layers.iter().map(DenseLayer::zeros_like).collect();
            for &idx in batch {
                total_loss += self.accumulate_gradients(
                    &x[idx],
                    y[idx],
                    weights.for_class(y[idx]),
                    &mut streams.dropout,
                    &mut grads,
                );
            }
            self.apply_adam(&grads, 1.0 / batch.len() as f64);
        }

        Ok(total_loss / x.len() as f64)
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> FraudResult<Vec<f64>> {
        x.iter()
            .map(|row| {
                self.check_row(row)?;
                Ok(self.predict_row(row))
            })
            .collect()
    }
}

fn adam_update(params: &mut [f64], m: &mut [f64], v: &mut [f64], grad: &[f64], scale: f64, lr: f64) {
    for (((p, m), v), g) in params.iter_mut().zip(m.iter_mut()).zip(v.iter_mut()).zip(grad) {
        let g = g * scale;
        *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
        *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
        *p -= lr * *m / (v.sqrt() + ADAM_EPSILON);
    }
}

fn relu(z: f64) -> f64 {
    z.max(0.0)
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
