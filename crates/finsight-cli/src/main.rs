mod forecast;
mod logs;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "finsight-cli")]
#[command(about = "finsight command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a forecast over local documents and print the record as JSON
    Forecast {
        /// Question the forecast should answer
        #[arg(long)]
        query: String,

        /// Document to extract metrics from, as `<path>` or `<path>@<url>` (repeatable)
        #[arg(long = "document", value_name = "PATH[@URL]")]
        documents: Vec<String>,

        /// YAML transcript file; defaults to `FINSIGHT_TRANSCRIPTS_PATH`
        #[arg(long)]
        transcripts: Option<PathBuf>,
    },
    /// Extract headline metrics from one document
    Extract {
        path: PathBuf,

        /// Source URL recorded with the archived text
        #[arg(long)]
        url: Option<String>,
    },
    /// Apply pending database migrations
    Migrate,
    /// List recent forecast requests
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = finsight_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Forecast {
            query,
            documents,
            transcripts,
        }) => forecast::run_forecast(&config, &query, &documents, transcripts.as_deref()).await?,
        Some(Commands::Extract { path, url }) => {
            forecast::run_extract(&config, path, url).await?;
        }
        Some(Commands::Migrate) => logs::run_migrate(&config).await?,
        Some(Commands::Logs { limit }) => logs::run_logs(&config, limit).await?,
        None => println!("finsight-cli ready; see --help for commands"),
    }

    Ok(())
}

/// Connect to Postgres when `DATABASE_URL` is configured.
pub(crate) async fn optional_pool(
    config: &finsight_core::AppConfig,
) -> anyhow::Result<Option<sqlx::PgPool>> {
    match config.database_url.as_deref() {
        Some(url) => {
            let pool =
                finsight_db::connect_pool(url, finsight_db::PoolConfig::from_app_config(config))
                    .await?;
            Ok(Some(pool))
        }
        None => Ok(None),
    }
}
