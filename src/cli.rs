use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

use sitelog::config::{LoggerOverrides, Profile};

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

/// Level filter accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LevelArg {
    Info,
    Warn,
    Error,
}

impl From<LevelArg> for sitelog::Level {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Info => sitelog::Level::Info,
            LevelArg::Warn => sitelog::Level::Warn,
            LevelArg::Error => sitelog::Level::Error,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "sitelog",
    about = "Client-side event logger for static sites",
    version,
    after_help = "Logs are written to: ~/.local/share/sitelog/logs/sitelog.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to sitelog.yaml config file")]
    pub config: Option<PathBuf>,

    /// Page path recorded on captured entries
    #[arg(long, global = true)]
    pub path: Option<String>,

    /// Remote collection endpoint
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// API key sent with each batch
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Site identifier attached to every entry
    #[arg(long, global = true)]
    pub site_id: Option<String>,

    /// Mirror captured entries to the console
    #[arg(long, global = true)]
    pub debug: bool,

    /// Local-only profile: never send, always mirror
    #[arg(long, global = true)]
    pub local: bool,

    /// Do not record a page view for this invocation
    #[arg(long, global = true)]
    pub no_page_view: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn logger_overrides(&self) -> LoggerOverrides {
        LoggerOverrides {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            site_id: self.site_id.clone(),
            track_page_views: self.no_page_view.then_some(false),
            debug_mode: self.debug.then_some(true),
            profile: self.local.then_some(Profile::Local),
            ..LoggerOverrides::default()
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record an INFO entry
    Log {
        message: String,

        /// JSON payload attached to the entry
        #[arg(long)]
        data: Option<String>,
    },

    /// Record an INFO entry
    Info {
        message: String,

        /// JSON payload attached to the entry
        #[arg(long)]
        data: Option<String>,
    },

    /// Record a WARN entry
    Warn {
        message: String,

        /// JSON payload attached to the entry
        #[arg(long)]
        data: Option<String>,
    },

    /// Record an ERROR entry
    Error {
        message: String,

        /// JSON payload attached to the entry
        #[arg(long)]
        data: Option<String>,
    },

    /// Record each stdin line as an entry, flushing periodically
    Pipe {
        /// Level for every line
        #[arg(long, value_enum, default_value = "info")]
        level: LevelArg,
    },

    /// Show the durable log
    Entries {
        /// Only entries at this level
        #[arg(long, value_enum)]
        level: Option<LevelArg>,

        /// Show only the last N entries
        #[arg(long)]
        last: Option<usize>,

        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Empty the durable log and its storage
    Clear,

    /// Write the durable log to a dated JSON file
    Export {
        /// Directory to write into (defaults to paths.exports)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (dot notation)
        key: String,
    },
}
