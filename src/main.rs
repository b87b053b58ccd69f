use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use phishguard::api::start_server;
use phishguard::config::Settings;
use phishguard::features::FeatureSchema;
use phishguard::pipeline::{
    extract_feature_table, prepare_dataset, Pipeline, TrainingPipelineConfig,
};
use phishguard::url_cleaner::canonicalize;
use phishguard::utils::logger::init_logger;

#[derive(Parser)]
#[command(name = "phishguard", version, about = "URL phishing detection pipeline")]
struct Cli {
    /// Settings file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to a timestamped file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Print the canonical form of a URL
    Canonicalize {
        url: String,
        /// Skip shortened-link expansion
        #[arg(long)]
        no_resolve: bool,
    },
    /// Print the feature vector of a URL as JSON
    Features { url: String },
    /// Prepare a raw `url,label` CSV
    Prepare {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Build the feature table of a prepared CSV
    Extract {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Prepare and extract into a new timestamped artifact directory
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the feature schema document
    Schema {
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[actix_web::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_dir.as_deref())?;

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => start_server(&settings).await?,
        Command::Canonicalize { url, no_resolve } => {
            let canonical = if no_resolve {
                canonicalize(&url)
            } else {
                Pipeline::from_settings(&settings)
                    .await?
                    .canonicalize_and_resolve(&url)
                    .await?
            };
            println!("{}", canonical);
        }
        Command::Features { url } => {
            let (canonical, features) = Pipeline::from_settings(&settings).await?.featurize(&url).await?;
            info!("Features computed for {}", canonical);
            println!("{}", serde_json::to_string_pretty(&features)?);
        }
        Command::Prepare { input, output } => {
            let pipeline = Pipeline::from_settings(&settings).await?;
            let input = input.unwrap_or_else(|| settings.pipeline.raw_data_path.clone());
            let artifact = prepare_dataset(pipeline.resolver(), &input, &output).await?;
            println!("{} of {} rows written to {}", artifact.rows_out, artifact.rows_in, output.display());
        }
        Command::Extract { input, output } => {
            let pipeline = Pipeline::from_settings(&settings).await?;
            let extractor = Arc::new(pipeline.extractor().clone());
            let artifact = extract_feature_table(extractor, &input, &output).await?;
            println!("{} feature rows written to {}", artifact.rows, output.display());
        }
        Command::Run { input } => {
            let pipeline = Pipeline::from_settings(&settings).await?;
            let input = input.unwrap_or_else(|| settings.pipeline.raw_data_path.clone());
            let config = TrainingPipelineConfig::now(&settings.pipeline.artifact_dir);
            let artifacts = pipeline.run_training_data(&input, &config).await?;
            println!("{}", artifacts.preparation.processed_data_path.display());
            println!("{}", artifacts.extraction.features_data_path.display());
        }
        Command::Schema { output } => {
            let schema = FeatureSchema::current();
            match output {
                Some(path) => schema.write_to(&path)?,
                None => println!("{}", schema.to_json()?),
            }
        }
    }

    Ok(())
}
