use colored::*;
use eyre::{Context, Result};

use sitelog::Level;

use super::{Session, end_page};

/// Parse a `--data` argument as JSON
pub fn parse_data(data: Option<&str>) -> Result<Option<serde_json::Value>> {
    data.map(|raw| serde_json::from_str(raw).context("Invalid --data (expected JSON)"))
        .transpose()
}

pub fn run(level: Level, message: &str, data: Option<&str>, session: &Session) -> Result<()> {
    let data = parse_data(data)?;

    let logger = session.start_logger();
    let entry = match level {
        Level::Info => logger.info(message, data),
        Level::Warn => logger.warn(message, data),
        Level::Error => logger.error(message, data),
    };
    log::info!("Captured {} entry {}", entry.level.map_or("-", |l| l.as_str()), entry.id);

    end_page(&logger);

    println!("{} {} {}", "✓".green(), entry.id.dimmed(), entry.message);
    Ok(())
}
