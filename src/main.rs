use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fileroute::config::Config;
use fileroute::server;
use fileroute::store::WorkflowDb;

#[derive(Parser)]
#[command(name = "fileroute")]
#[command(version, about = "Document routing and approval service")]
pub struct Cli {
    /// Data directory (defaults to FILEROUTE_DATA_DIR or ./.fileroute)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// Permissive CORS and bind on all interfaces
        #[arg(long)]
        dev: bool,
    },
    /// Create the data directory layout and seed demo users
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let data_dir = Config::resolve_data_dir(cli.data_dir.clone());
    let mut config = Config::load(data_dir).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { port, dev } => {
            if let Some(p) = port {
                config.port = p;
            }
            if dev {
                config.dev_mode = true;
            }
            config.ensure_directories()?;
            let _log_guard = init_logging(&config)?;
            server::start_server(config).await?;
        }
        Commands::Init => {
            cmd_init(&config)?;
        }
    }

    Ok(())
}

/// Console logging filtered by RUST_LOG, plus a daily-rotated file under
/// the log directory. The returned guard must stay alive for the file
/// writer to flush.
fn init_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(config.log_dir(), "fileroute.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().json().with_writer(file_writer))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(guard)
}

fn cmd_init(config: &Config) -> Result<()> {
    config.ensure_directories()?;
    let db = WorkflowDb::new(&config.db_path()).context("Failed to initialize database")?;

    let existing = db.list_users().context("Failed to list users")?;
    if existing.is_empty() {
        for (name, designation, office) in [
            ("Asha Rao", "Section Officer", "Establishment"),
            ("Vikram Mehta", "Deputy Director", "Establishment"),
            ("Leela Nair", "Director", "Administration"),
        ] {
            db.create_user(name, designation, office)
                .context("Failed to seed user")?;
        }
        println!("Seeded 3 demo users.");
    } else {
        println!("Users already present, skipping seed.");
    }

    println!("Initialized data directory at {}", config.data_dir.display());
    Ok(())
}
