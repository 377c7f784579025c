use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use sirene_area_search::config::{AppConfig, BackendChoice};
use sirene_area_search::search::SearchService;
use sirene_area_search::{import, server};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the area search API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Load the establishments CSV into the spatial database
    Import {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// CSV to import instead of `input.data_csv`
        #[arg(short, long, value_name = "CSV")]
        source: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            info!("Serving with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            let service = SearchService::from_config(&app_config)?;
            server::start_server(app_config, service).await?;
        }
        Commands::Import { config, source } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let BackendChoice::Indexed { url } = app_config.backend() else {
                return Err(anyhow!(
                    "No database configured. Set DATABASE_URL or [database].url before importing."
                ));
            };
            let source = source.unwrap_or_else(|| app_config.input.data_csv.clone());
            import::run_import(
                &url,
                &source,
                &app_config.input.geo_column,
                app_config.delimiter_byte(),
            )
            .await?;
        }
    }

    Ok(())
}
