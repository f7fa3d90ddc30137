pub mod capture;
pub mod clear;
pub mod completions;
pub mod config;
pub mod entries;
pub mod export;
pub mod pipe;

use std::sync::Arc;

use sitelog::config::{Config, LoggerConfig};
use sitelog::page::{PageContext, terminal_screen};
use sitelog::{EventLogger, FileStorage, HostHooks};

use crate::cli::Cli;

/// Everything resolved once at startup: file config, merged logger config, page
pub struct Session {
    pub config: Config,
    pub logger: LoggerConfig,
    pub page: PageContext,
}

impl Session {
    pub fn resolve(cli: &Cli, config: Config) -> Self {
        let logger = config.logger.merged(&cli.logger_overrides());

        let mut page = config.page.to_context();
        if let Some(ref path) = cli.path {
            page.path = path.clone();
        }
        page.screen = terminal_screen();

        Self { config, logger, page }
    }

    fn storage(&self) -> Arc<FileStorage> {
        Arc::new(FileStorage::new(Config::expand_path(&self.config.paths.storage)))
    }

    /// A full page load: page view, hooks, flush timer
    pub fn start_logger(&self) -> EventLogger {
        EventLogger::builder(self.logger.clone())
            .storage(self.storage())
            .page(self.page.clone())
            .hooks(HostHooks::global())
            .init()
    }

    /// Durable log only, for read and maintenance commands
    pub fn open_logger(&self) -> EventLogger {
        EventLogger::builder(self.logger.clone())
            .storage(self.storage())
            .page(self.page.clone())
            .open()
    }
}

/// Page unload: fire teardown hooks, then detach the logger
pub fn end_page(logger: &EventLogger) {
    HostHooks::global().teardown();
    logger.shutdown();
}
