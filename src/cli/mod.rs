//! Command-line interface
//!
//! Drives the same components as the HTTP server against the local data and
//! model directories.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Settings;
use crate::dataset::DatasetAccessor;
use crate::inference::Instance;
use crate::registry::Hyperparams;
use crate::server::AppState;
use crate::training::TrainRequest;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "tabular-mlops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train, store and serve tabular classification models")]
#[command(long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Server port (defaults to API_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host (defaults to API_HOST)
        #[arg(long)]
        host: Option<String>,
    },

    /// List trainable model families
    Classes,

    /// Train a model on a stored dataset
    Train {
        /// Dataset id
        #[arg(short, long)]
        dataset: String,

        /// Model family key
        #[arg(short, long, default_value = "random_forest")]
        model: String,

        /// Target column name
        #[arg(short, long, default_value = "target")]
        target: String,

        /// Hyperparameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value = "0.2")]
        test_size: f64,

        /// Keep row order when splitting
        #[arg(long)]
        no_shuffle: bool,

        /// Split seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Retrain under an existing model id
        #[arg(long)]
        model_id: Option<String>,
    },

    /// Predict with a stored model
    Predict {
        /// Model id
        #[arg(short, long)]
        model: String,

        /// JSON file with an array of instances or {"instances": [...]}
        #[arg(short, long)]
        instances: PathBuf,
    },

    /// Manage stored models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },

    /// Manage datasets
    Datasets {
        #[command(subcommand)]
        action: DatasetsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List stored models
    List,
    /// Show one model record
    Show { model_id: String },
    /// Delete a model
    Delete { model_id: String },
}

#[derive(Subcommand, Debug)]
pub enum DatasetsAction {
    /// Upload a CSV or JSON file
    Upload { path: PathBuf },
    /// List stored datasets
    List,
    /// Show the shape and columns of a dataset
    Info { dataset_id: String },
    /// Delete a dataset
    Delete { dataset_id: String },
}

// ─── Input parsing ─────────────────────────────────────────────────────────────

/// Parse an array of instance objects, bare or wrapped in `{"instances": ...}`.
pub fn parse_instances(raw: &str) -> anyhow::Result<Vec<Instance>> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let items = match value {
        serde_json::Value::Object(mut obj) if obj.contains_key("instances") => obj
            .remove("instances")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };
    Ok(serde_json::from_value(items)?)
}

fn parse_params(raw: Option<&str>) -> anyhow::Result<Option<Hyperparams>> {
    raw.map(|s| serde_json::from_str::<Hyperparams>(s))
        .transpose()
        .map_err(|e| anyhow::anyhow!("--params must be a JSON object: {}", e))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(mut settings: Settings, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        settings.host = host;
    }
    if let Some(port) = port {
        settings.port = port;
    }

    section("Serve");
    kv("Address", &format!("http://{}:{}", settings.host, settings.port));
    kv("Datasets", &settings.data_dir.display().to_string());
    kv("Models", &settings.models_dir.display().to_string());
    println!();

    crate::server::run_server(settings).await
}

pub fn cmd_classes(state: &AppState) -> anyhow::Result<()> {
    section("Model classes");
    for key in state.registry.list_keys() {
        let spec = state.registry.get(&key)?;
        let defaults = serde_json::to_string(&spec.defaults)?;
        println!("  {} {}", accent(&key), dim(&defaults));
    }
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    state: &AppState,
    dataset: &str,
    model: &str,
    target: &str,
    params: Option<&str>,
    test_size: f64,
    shuffle: bool,
    seed: u64,
    model_id: Option<String>,
) -> anyhow::Result<()> {
    section("Train");

    let mut request = TrainRequest::new(dataset, model)
        .with_target(target)
        .with_test_size(test_size)
        .with_shuffle(shuffle)
        .with_random_state(seed);
    if let Some(params) = parse_params(params)? {
        request = request.with_hyperparams(params);
    }
    if let Some(id) = model_id {
        request = request.with_model_id(id);
    }

    step_run(&format!("Training {}", model.cyan()));
    let start = Instant::now();
    let outcome = state.trainer.train(&request)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv("Model id", &outcome.model_id);
    for (name, value) in &outcome.metrics {
        println!("  {:<16} {}", muted(name), format!("{:.4}", value).white().bold());
    }
    println!();
    Ok(())
}

pub fn cmd_predict(state: &AppState, model_id: &str, instances_path: &Path) -> anyhow::Result<()> {
    section("Predict");

    let raw = std::fs::read_to_string(instances_path)?;
    let instances = parse_instances(&raw)?;

    let prediction = state.inference.predict(model_id, &instances)?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

pub fn cmd_models(state: &AppState, action: ModelsAction) -> anyhow::Result<()> {
    match action {
        ModelsAction::List => {
            section("Models");
            let records = state.store.list()?;
            if records.is_empty() {
                println!("  {}", dim("no models"));
            }
            for record in records {
                let accuracy = record
                    .metrics
                    .get("accuracy")
                    .map(|a| format!("acc {:.4}", a))
                    .unwrap_or_default();
                println!(
                    "  {}  {:<20} {:<34} {}",
                    accent(&record.model_id),
                    record.model_key,
                    muted(&record.created_at),
                    accuracy
                );
            }
            println!();
        }
        ModelsAction::Show { model_id } => {
            let record = state.store.get(&model_id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ModelsAction::Delete { model_id } => {
            if state.store.delete(&model_id)? {
                step_ok(&format!("Deleted model {}", model_id));
            } else {
                anyhow::bail!("Model not found: {}", model_id);
            }
        }
    }
    Ok(())
}

pub fn cmd_datasets(state: &AppState, action: DatasetsAction) -> anyhow::Result<()> {
    match action {
        DatasetsAction::Upload { path } => {
            section("Upload");
            let bytes = std::fs::read(&path)?;
            let filename = path.file_name().map(|f| f.to_string_lossy().to_string());

            step_run(&format!("Storing {}", path.display()));
            let uploaded = state.datasets.upload(&bytes, filename.as_deref(), None)?;
            step_done(&format!("{} rows × {} cols", uploaded.rows, uploaded.cols));
            kv("Dataset id", &uploaded.dataset_id);
            println!();
        }
        DatasetsAction::List => {
            section("Datasets");
            let items = state.datasets.list()?;
            if items.is_empty() {
                println!("  {}", dim("no datasets"));
            }
            for item in items {
                println!(
                    "  {}  {:>10} B  {}",
                    accent(&item.id),
                    item.size_bytes,
                    muted(item.original_filename.as_deref().unwrap_or("-"))
                );
            }
            println!();
        }
        DatasetsAction::Info { dataset_id } => {
            section("Dataset");
            let df = state.datasets.load(&dataset_id)?;
            kv("Rows", &df.height().to_string());
            kv("Columns", &df.width().to_string());
            for col in df.get_columns() {
                println!("  {:<16} {}", muted(col.name().as_str()), format!("{}", col.dtype()).white());
            }
            println!();
        }
        DatasetsAction::Delete { dataset_id } => {
            if state.datasets.delete(&dataset_id)? {
                step_ok(&format!("Deleted dataset {}", dataset_id));
            } else {
                anyhow::bail!("Dataset not found: {}", dataset_id);
            }
        }
    }
    Ok(())
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    let command = match cli.command {
        Commands::Serve { host, port } => return cmd_serve(settings, host, port).await,
        command => command,
    };

    let state = AppState::from_settings(settings)?;
    match command {
        Commands::Serve { .. } => Ok(()),
        Commands::Classes => cmd_classes(&state),
        Commands::Train {
            dataset,
            model,
            target,
            params,
            test_size,
            no_shuffle,
            seed,
            model_id,
        } => cmd_train(
            &state,
            &dataset,
            &model,
            &target,
            params.as_deref(),
            test_size,
            !no_shuffle,
            seed,
            model_id,
        ),
        Commands::Predict { model, instances } => cmd_predict(&state, &model, &instances),
        Commands::Models { action } => cmd_models(&state, action),
        Commands::Datasets { action } => cmd_datasets(&state, action),
    }
}
