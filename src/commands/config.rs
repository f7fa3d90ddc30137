use colored::*;
use eyre::Result;

use super::Session;
use crate::cli::{ConfigAction, OutputFormat};

pub fn run(action: ConfigAction, session: &Session) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), session),
        ConfigAction::Get { key } => get(&key, session),
    }
}

fn show(format: OutputFormat, session: &Session) -> Result<()> {
    // Show what the logger actually runs with, overrides included
    let mut config = session.config.clone();
    config.logger = session.logger.clone();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&config)?);
        }
        OutputFormat::Text => {
            println!("{}", "sitelog Configuration".bold());
            println!();

            println!("{}:", "paths".cyan());
            println!("  storage: {}", config.paths.storage.display());
            println!("  exports: {}", config.paths.exports.display());
            println!();

            let logger = &config.logger;
            println!("{}:", "logger".cyan());
            println!("  endpoint: {}", logger.endpoint.as_deref().unwrap_or("(none)"));
            println!("  api_key: {}", if logger.api_key.is_some() { "(set)" } else { "(none)" });
            println!("  site_id: {}", logger.site_id.as_deref().unwrap_or("(none)"));
            println!("  track_page_views: {}", logger.track_page_views);
            println!("  flush_interval_ms: {}", logger.flush_interval_ms);
            println!("  max_batch_size: {}", logger.max_batch_size);
            println!("  debug_mode: {}", logger.debug_mode);
            println!("  profile: {:?}", logger.profile);
            println!();

            println!("{}:", "page".cyan());
            println!("  hostname: {}", session.page.hostname);
            println!("  path: {}", session.page.path);
        }
    }

    Ok(())
}

fn get(key: &str, session: &Session) -> Result<()> {
    let logger = &session.logger;
    let value = match key {
        "log_level" | "log-level" => Some(session.config.log_level.as_filter().to_string()),
        "paths.storage" => Some(session.config.paths.storage.display().to_string()),
        "paths.exports" => Some(session.config.paths.exports.display().to_string()),
        "logger.endpoint" => Some(logger.endpoint.clone().unwrap_or_default()),
        "logger.site_id" => Some(logger.site_id.clone().unwrap_or_default()),
        "logger.track_page_views" => Some(logger.track_page_views.to_string()),
        "logger.flush_interval_ms" => Some(logger.flush_interval_ms.to_string()),
        "logger.max_batch_size" => Some(logger.max_batch_size.to_string()),
        "logger.debug_mode" => Some(logger.debug_mode.to_string()),
        "logger.profile" => Some(format!("{:?}", logger.profile).to_lowercase()),
        "page.hostname" => Some(session.page.hostname.clone()),
        "page.path" => Some(session.page.path.clone()),
        _ => None,
    };

    match value {
        Some(v) => println!("{}", v),
        None => {
            eprintln!("{} Unknown config key: {}", "✗".red(), key);
            std::process::exit(1);
        }
    }

    Ok(())
}
