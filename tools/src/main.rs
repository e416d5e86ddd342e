//! fraud-runner: offline training and line-oriented inference for
//! insurance-claim fraud detection.
//!
//! Usage:
//!   fraud-runner train   --data claims.csv --models ./models [--config fraud.json]
//!                        [--epochs 50] [--batch-size 32] [--seed 42]
//!   fraud-runner predict --models ./models   < claim.json
//!   fraud-runner serve   --models ./models   (one JSON request per stdin line)

use anyhow::{bail, Result};
use claimfraud_core::{
    inference::{ErrorResponse, InferenceService},
    training::TrainingHistory,
    ClaimRecord, FraudConfig, FraudError, TrainingPipeline,
};
use std::env;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcRequest {
    Claim(Box<ClaimRecord>),
    Features { features: Vec<f64> },
    Info,
    Quit,
}

#[derive(serde::Serialize)]
struct ModelInfo {
    bundle_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
    feature_count: usize,
    feature_columns: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let models = PathBuf::from(flag_value(&args, "--models").unwrap_or("./models"));

    match command {
        "train" => run_train(&args, models),
        "predict" => run_predict(models),
        "serve" => run_serve(models),
        _ => {
            println!("usage: fraud-runner <train|predict|serve> [flags]");
            println!("  train   --data <csv> --models <dir> [--config <json>] [--epochs N] [--batch-size N] [--seed N]");
            println!("  predict --models <dir>   (claim JSON on stdin)");
            println!("  serve   --models <dir>   (line-delimited JSON requests on stdin)");
            Ok(())
        }
    }
}

fn run_train(args: &[String], models: PathBuf) -> Result<()> {
    let Some(data) = flag_value(args, "--data") else {
        bail!("train needs --data <csv>");
    };

    let mut config = match flag_value(args, "--config") {
        Some(path) => FraudConfig::load(path)?,
        None => FraudConfig::default(),
    };
    config.artifact_dir = models;
    config.training.max_epochs = parse_arg(args, "--epochs", config.training.max_epochs);
    config.training.batch_size = parse_arg(args, "--batch-size", config.training.batch_size);
    config.training.seed = parse_arg(args, "--seed", config.training.seed);
    config.validate()?;

    println!("Claim fraud: fraud-runner train");
    println!("  data:       {data}");
    println!("  models:     {}", config.artifact_dir.display());
    println!("  epochs:     {}", config.training.max_epochs);
    println!("  batch size: {}", config.training.batch_size);
    println!("  seed:       {}", config.training.seed);
    println!();

    let pipeline = TrainingPipeline::new(config);
    let (bundle, history) = pipeline.train(data)?;
    print_summary(&bundle.bundle_id().to_string(), bundle.encoder().feature_count(), &history);
    Ok(())
}

fn run_predict(models: PathBuf) -> Result<()> {
    let service = InferenceService::load(&models)?;
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let mut stdout = io::stdout();
    let outcome = ClaimRecord::from_json(&input).and_then(|claim| service.predict_one(&claim));
    match outcome {
        Ok(result) => writeln!(stdout, "{}", serde_json::to_string(&result)?)?,
        Err(e) => {
            log::error!("prediction failed: {e}");
            writeln!(stdout, "{}", serde_json::to_string(&ErrorResponse::from(&e))?)?;
        }
    }
    Ok(())
}

fn run_serve(models: PathBuf) -> Result<()> {
    let service = InferenceService::load(&models)?;
    log::info!(
        "serving bundle {} ({} features)",
        service.bundle().bundle_id(),
        service.feature_count()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let request: IpcRequest = match serde_json::from_str(&buffer) {
            Ok(r) => r,
            Err(e) => {
                let err = FraudError::InvalidClaim { reason: e.to_string() };
                writeln!(stdout, "{}", serde_json::to_string(&ErrorResponse::from(&err))?)?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match request {
            IpcRequest::Quit => break,
            IpcRequest::Info => serde_json::to_string(&model_info(&service))?,
            IpcRequest::Claim(claim) => respond(service.predict_one(&claim))?,
            IpcRequest::Features { features } => respond(service.predict_features(&features))?,
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn respond<T: serde::Serialize>(outcome: Result<T, FraudError>) -> Result<String> {
    Ok(match outcome {
        Ok(value) => serde_json::to_string(&value)?,
        Err(e) => {
            if e.is_input_error() {
                log::warn!("rejected request: {e}");
            } else {
                log::error!("prediction failed: {e}");
            }
            serde_json::to_string(&ErrorResponse::from(&e))?
        }
    })
}

fn model_info(service: &InferenceService) -> ModelInfo {
    let manifest = service.bundle().manifest();
    ModelInfo {
        bundle_id: manifest.bundle_id.to_string(),
        created_at: manifest.created_at,
        feature_count: service.feature_count(),
        feature_columns: manifest.feature_columns.clone(),
    }
}

fn print_summary(bundle_id: &str, feature_count: usize, history: &TrainingHistory) {
    let report = &history.report;

    println!("=== TRAINING SUMMARY ===");
    println!("  bundle_id:       {bundle_id}");
    println!("  features:        {feature_count}");
    println!("  train rows:      {}", history.training_rows);
    println!("  validation rows: {}", history.validation_rows);
    if history.validation_rows_skipped > 0 {
        println!("  skipped rows:    {}", history.validation_rows_skipped);
    }
    println!("  epochs run:      {}", history.epochs.len());
    println!("  best epoch:      {}", history.best_epoch);
    println!("  best val loss:   {:.4}", history.best_validation_loss);
    println!("  stopped early:   {}", history.stopped_early);

    println!();
    println!("=== VALIDATION (threshold 0.5) ===");
    println!("  accuracy:  {:.3}", report.accuracy);
    println!("  precision: {:.3}", report.precision);
    println!("  recall:    {:.3}", report.recall);
    println!(
        "  TP {} | FP {} | TN {} | FN {}",
        report.true_positives, report.false_positives, report.true_negatives, report.false_negatives
    );
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
