//! Client-side event logger for static sites
//!
//! Captures page views, log calls and uncaught errors, keeps a bounded
//! durable log in key-value storage, and delivers pending entries to a
//! remote collector in batches with re-queue on failure.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sitelog::{EventLogger, FileStorage, LoggerConfig, PageContext};
//!
//! let logger = EventLogger::builder(LoggerConfig::default())
//!     .storage(Arc::new(FileStorage::new("/tmp/sitelog")))
//!     .page(PageContext::default().with_path("/docs"))
//!     .init();
//!
//! logger.error("checkout failed", Some(serde_json::json!({"step": 3})));
//! logger.shutdown();
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod export;
pub mod hooks;
pub mod logger;
pub mod page;
pub mod storage;
pub mod transport;

pub use config::{Config, LoggerConfig, LoggerOverrides, Profile};
pub use entry::{EntryKind, Level, LogEntry};
pub use export::EntryExport;
pub use hooks::{HookOutcome, HostEvent, HostHandler, HostHooks, Rejection, UncaughtError, install_panic_hook};
pub use logger::{EventLogger, EventLoggerBuilder, FlushOutcome, FlushTicket, MAX_ENTRIES};
pub use page::PageContext;
pub use storage::{FileStorage, MemoryStorage, STORAGE_KEY, Storage};
pub use transport::{BatchPayload, DeliveryMode, HttpTransport, Transport};
