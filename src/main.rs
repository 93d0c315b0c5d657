use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use wine_quality::config::ConfigurationManager;
use wine_quality::constants::{Stage, FORM_FIELDS};
use wine_quality::jobs::SubprocessLauncher;
use wine_quality::pipeline::{serving_score, PredictionPipeline, TrainingPipeline};
use wine_quality::{logging, observability, server};

#[derive(Parser)]
#[command(name = "wine_quality")]
#[command(about = "Wine quality regression: training pipeline and prediction server")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, params.toml and schema.toml
    /// (default: $WINE_QUALITY_CONFIG_DIR, then ./config)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all five stages: ingestion, validation, transformation, training, evaluation
    Train,
    /// Run one stage against the artifacts of earlier runs
    Stage {
        /// ingestion | validation | transformation | training | evaluation
        #[arg(value_parser = parse_stage)]
        stage: Stage,
    },
    /// Serve the prediction form and the training trigger
    Serve {
        /// Overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Score one wine from the command line
    Predict {
        /// Eleven comma-separated values in form-field order
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        features: Vec<f64>,
    },
}

fn parse_stage(name: &str) -> Result<Stage, String> {
    Stage::from_cli_name(name).ok_or_else(|| format!("unknown stage '{}'", name))
}

fn load_config(dir: Option<&PathBuf>) -> anyhow::Result<ConfigurationManager> {
    let manager = match dir {
        Some(dir) => ConfigurationManager::from_dir(dir),
        None => ConfigurationManager::load(),
    };
    manager.context("Failed to load configuration")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging();
    observability::init_metrics();

    let config_dir = cli.config_dir.clone();
    match cli.command {
        Commands::Train => {
            let manager = load_config(config_dir.as_ref())?;
            // The pipeline does blocking file and HTTP I/O
            let result = tokio::task::spawn_blocking(move || TrainingPipeline::new(manager).run())
                .await
                .context("Training task panicked")??;
            info!(
                "✅ Training finished: {} stages, rmse={:.4} mae={:.4} r2={:.4}",
                result.stages.len(),
                result.metrics.rmse,
                result.metrics.mae,
                result.metrics.r2
            );
        }
        Commands::Stage { stage } => {
            let manager = load_config(config_dir.as_ref())?;
            let summary = tokio::task::spawn_blocking(move || TrainingPipeline::new(manager).run_stage(stage))
                .await
                .context("Stage task panicked")??;
            info!("✅ {} in {}ms", summary.message, summary.elapsed.as_millis());
        }
        Commands::Serve { port } => {
            let manager = load_config(config_dir.as_ref())?;
            let mut server_config = manager.get_server_config();
            if let Some(port) = port {
                server_config.port = port;
            }
            let launcher = SubprocessLauncher::current_exe(config_dir)?;
            server::start_server(server_config, Arc::new(launcher)).await?;
        }
        Commands::Predict { features } => {
            if features.len() != FORM_FIELDS.len() {
                return Err(anyhow!(
                    "expected {} values ({}), got {}",
                    FORM_FIELDS.len(),
                    FORM_FIELDS.join(", "),
                    features.len()
                ));
            }
            let manager = load_config(config_dir.as_ref())?;
            let pipeline = PredictionPipeline::new(manager.model_file())?;
            let raw = pipeline.predict(&features)?;
            println!("Predicted quality: {} (raw {:.4})", serving_score(raw), raw);
        }
    }

    Ok(())
}
