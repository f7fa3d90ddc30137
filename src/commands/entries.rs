use colored::*;
use eyre::Result;

use sitelog::Level;
use sitelog::logger::console::format_entry;

use super::Session;
use crate::cli::OutputFormat;

pub fn run(level: Option<Level>, last: Option<usize>, format: OutputFormat, session: &Session) -> Result<()> {
    let logger = session.open_logger();
    let mut entries = logger.get_entries(level);

    if let Some(count) = last {
        let start = entries.len().saturating_sub(count);
        entries.drain(..start);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&entries)?);
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("{} No entries", "ℹ".blue());
                return Ok(());
            }
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
            println!();
            println!("{} {} entries", "Σ".dimmed(), entries.len());
        }
    }

    Ok(())
}
