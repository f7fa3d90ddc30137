use clap::Parser;
use eyre::{Context, Result};
use log::info;
use std::fs;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Session;
use sitelog::config::{Config, LogLevel};
use sitelog::hooks::{HostHooks, install_panic_hook};

fn setup_logging(log_level: &LogLevel) -> Result<()> {
    let log_dir = Config::sitelog_dir().join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("sitelog.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG env var takes precedence, otherwise use config log_level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(match log_level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        });
    }

    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "config" }
    );
    Ok(())
}

fn run(cli: Cli, session: Session) -> Result<()> {
    match cli.command {
        Commands::Log { message, data } | Commands::Info { message, data } => {
            commands::capture::run(sitelog::Level::Info, &message, data.as_deref(), &session)
        }
        Commands::Warn { message, data } => {
            commands::capture::run(sitelog::Level::Warn, &message, data.as_deref(), &session)
        }
        Commands::Error { message, data } => {
            commands::capture::run(sitelog::Level::Error, &message, data.as_deref(), &session)
        }
        Commands::Pipe { level } => commands::pipe::run(level.into(), &session),
        Commands::Entries { level, last, format } => {
            commands::entries::run(level.map(Into::into), last, cli::OutputFormat::resolve(format), &session)
        }
        Commands::Clear => commands::clear::run(&session),
        Commands::Export { dir } => commands::export::run(dir, &session),
        Commands::Config { action } => commands::config::run(action, &session),
        Commands::Completions { shell } => commands::completions::run(shell),
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments first
    let cli = Cli::parse();

    // Load configuration (before logging, so log messages in Config::load are silent)
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config.log_level).context("Failed to setup logging")?;

    info!("Starting sitelog with config from: {:?}", cli.config);

    install_panic_hook(HostHooks::global());

    let session = Session::resolve(&cli, config);
    run(cli, session).context("Command failed")?;

    Ok(())
}
