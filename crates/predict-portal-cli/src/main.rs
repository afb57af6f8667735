//! predict-portal - sign in and submit records to a hosted prediction API
//! from the terminal.

mod app;
mod terminal;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use predict_portal_core::config::Config;
use predict_portal_core::models::Features;

use app::App;

#[derive(Parser)]
#[command(name = "predict-portal")]
#[command(about = "Sign in and run single or batch predictions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Signin {
        #[arg(short, long)]
        email: String,
    },

    /// Reset a forgotten password with an emailed verification code
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },

    /// Show who is signed in and for how long
    Status,

    /// Predict a single record
    Predict {
        #[arg(allow_negative_numbers = true)]
        var_1: f64,
        #[arg(allow_negative_numbers = true)]
        var_2: f64,
        #[arg(allow_negative_numbers = true)]
        var_3: f64,
        #[arg(allow_negative_numbers = true)]
        var_4: f64,
    },

    /// Upload a file and run a batch prediction on it
    Batch {
        file: PathBuf,
    },

    /// Sign out and forget the cached session
    Signout,
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). Output goes to stderr and,
/// when the cache directory is usable, to a log file there as well.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = config.cache_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix("predict-portal")
            .filename_suffix("log")
            .build(dir)
            .ok()
    });

    let (file_layer, guard) = match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => Config::load(),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let _guard = init_tracing(&config);
    info!("predict-portal starting");

    let app = App::new(config)?;
    let succeeded = match cli.command {
        Commands::Signin { email } => app.sign_in(&email).await?,
        Commands::ForgotPassword { email } => app.forgot_password(&email).await?,
        Commands::Status => app.status().await?,
        Commands::Predict {
            var_1,
            var_2,
            var_3,
            var_4,
        } => app.predict(Features::new(var_1, var_2, var_3, var_4)).await?,
        Commands::Batch { file } => app.batch(&file).await?,
        Commands::Signout => app.sign_out().await?,
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
