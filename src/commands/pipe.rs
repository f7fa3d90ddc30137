//! Long-lived capture session fed from stdin
//!
//! Behaves like a page that stays open: the flush timer runs while lines
//! arrive, and end of input is the teardown.

use colored::*;
use eyre::{Context, Result};
use std::io::{self, BufRead};

use sitelog::Level;

use super::{Session, end_page};

pub fn run(level: Level, session: &Session) -> Result<()> {
    let logger = session.start_logger();

    if logger.delivery_enabled() {
        eprintln!(
            "{} Capturing stdin, flushing every {}ms (Ctrl+D to stop)",
            "→".blue(),
            logger.config().flush_interval_ms
        );
    } else {
        eprintln!("{} Capturing stdin locally (Ctrl+D to stop)", "→".blue());
    }

    let stdin = io::stdin();
    let mut captured = 0usize;
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        match level {
            Level::Info => logger.info(message, None),
            Level::Warn => logger.warn(message, None),
            Level::Error => logger.error(message, None),
        };
        captured += 1;
    }

    let unsent = logger.pending().len();
    end_page(&logger);

    log::info!("Pipe session captured {} entries ({} pending at teardown)", captured, unsent);
    eprintln!("{} Captured {} entries", "✓".green(), captured);
    Ok(())
}
