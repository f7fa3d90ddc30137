use colored::*;
use eyre::Result;

use super::Session;

pub fn run(session: &Session) -> Result<()> {
    let logger = session.open_logger();
    let count = logger.get_entries(None).len();

    logger.clear_entries();

    log::info!("Cleared {} entries", count);
    println!("{} Cleared {} entries", "✓".green(), count);
    Ok(())
}
