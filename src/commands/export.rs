use colored::*;
use eyre::{Context, Result};
use std::path::PathBuf;

use sitelog::config::Config;

use super::Session;

pub fn run(dir: Option<PathBuf>, session: &Session) -> Result<()> {
    let dir = dir.unwrap_or_else(|| Config::expand_path(&session.config.paths.exports));

    let logger = session.open_logger();
    let export = logger.export_entries().context("Failed to serialize entries")?;
    let path = export
        .save_in(&dir)
        .context(format!("Failed to write export to {}", dir.display()))?;

    println!("{} Exported to {}", "✓".green(), path.display());
    Ok(())
}
