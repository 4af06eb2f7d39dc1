use anyhow::Result;
use clap::{Parser, Subcommand};
use pricecast::application::worker::{PipelineSettings, TrainingPipeline};
use pricecast::config::Config;
use pricecast::domain::ml::ModelKind;
use pricecast::infrastructure::ServiceFactory;
use pricecast::infrastructure::persistence::FileArtifactStore;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Offline training and prediction for the forecasting worker", long_about = None)]
struct Args {
    /// Overrides the MODEL environment variable
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download missing history, rebuild the price tables and retrain
    Update,
    /// Retrain from the fragments already on disk, without downloading
    Train,
    /// Predict the next close from the freshest market data
    Predict,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(model) = &args.model {
        config.model.kind = ModelKind::from_str(model)?;
    }

    match args.command {
        Command::Update => {
            let worker = ServiceFactory::create_worker(&config);
            let report = worker.update().await?;
            for (token, outcome) in &report.tables {
                println!("{:<6} {:?}", token, outcome);
            }
            println!(
                "Downloaded {} fragments, trained {} on {} rows",
                report.downloaded, report.kind, report.training_rows
            );
        }
        Command::Train => {
            let settings = PipelineSettings::from_config(&config);
            let store = Arc::new(FileArtifactStore::from_config(&config));
            let (_, adapter) = ServiceFactory::create_provider(&config);
            let pipeline = TrainingPipeline::new(settings, store, adapter);

            let (tables, artifact) =
                tokio::task::spawn_blocking(move || pipeline.run(&BTreeMap::new())).await??;
            for (token, outcome) in &tables {
                println!("{:<6} {:?}", token, outcome);
            }
            println!(
                "Trained {} on {} rows ({} features, {} buckets)",
                artifact.kind,
                artifact.training_rows,
                artifact.width(),
                artifact.timeframe
            );
            info!("Model saved to {:?}", config.model_file_path);
        }
        Command::Predict => {
            let worker = ServiceFactory::create_worker(&config);
            let prediction = worker.inference().await?;
            println!("{} next close: {}", worker.token(), prediction);
        }
    }

    Ok(())
}
