//! The event logger: capture, persist, batch and deliver
//!
//! One [`EventLogger`] is built per page load (or process). It keeps two views
//! over captured entries:
//!
//! - the durable log: bounded to [`MAX_ENTRIES`], oldest evicted first,
//!   rewritten to storage on every mutation
//! - the pending queue: entries awaiting delivery, drained front-first in
//!   batches of `max_batch_size`
//!
//! A failed batch goes back to the front of the pending queue, ahead of
//! anything captured while it was in flight. There is no backoff and no retry
//! cap; the timer simply tries again on its next tick.

pub mod console;
pub mod timer;

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::{LoggerConfig, MIN_FLUSH_INTERVAL_MS, Profile};
use crate::entry::{EntryKind, Level, LogEntry, truncate_stack};
use crate::error::ExportError;
use crate::export::EntryExport;
use crate::hooks::{HandlerId, HookOutcome, HostEvent, HostHandler, HostHooks, Rejection, UncaughtError};
use crate::page::PageContext;
use crate::storage::{self, MemoryStorage, Storage};
use crate::transport::{BatchPayload, DeliveryMode, HttpTransport, Transport};

pub use timer::FlushTimer;

/// Capacity of the durable log
pub const MAX_ENTRIES: usize = 100;

pub const PAGEVIEW_MESSAGE: &str = "Page view";
pub const UNCAUGHT_ERROR_PREFIX: &str = "Uncaught error: ";
pub const UNHANDLED_REJECTION_PREFIX: &str = "Unhandled rejection: ";

struct State {
    entries: VecDeque<LogEntry>,
    pending: VecDeque<LogEntry>,
    page_loaded_at: DateTime<Utc>,
}

struct Inner {
    config: LoggerConfig,
    storage: Arc<dyn Storage>,
    transport: Option<Arc<dyn Transport>>,
    page: PageContext,
    hooks: Arc<HostHooks>,
    state: Mutex<State>,
    timer: Mutex<Option<FlushTimer>>,
    hook_id: Mutex<Option<HandlerId>>,
    initialized: AtomicBool,
    torn_down: AtomicBool,
}

/// Handle to a logger; clones share the same state
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<Inner>,
}

/// Result of one flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to send or sending disabled
    Skipped,
    /// Batch of this many entries accepted by the endpoint
    Delivered(usize),
    /// Batch failed and went back to the front of the pending queue
    Requeued(usize),
    /// Batch failed and was not retried (teardown, or logger gone)
    Dropped(usize),
}

enum Ticket {
    Done(FlushOutcome),
    Running(JoinHandle<FlushOutcome>),
}

/// Handle on an in-flight flush. Dropping it leaves the send running.
pub struct FlushTicket(Ticket);

impl FlushTicket {
    fn done(outcome: FlushOutcome) -> Self {
        Self(Ticket::Done(outcome))
    }

    /// Block until the send has completed
    pub fn wait(self) -> FlushOutcome {
        match self.0 {
            Ticket::Done(outcome) => outcome,
            Ticket::Running(handle) => handle.join().unwrap_or_else(|_| {
                log::warn!("Flush thread panicked");
                FlushOutcome::Skipped
            }),
        }
    }
}

pub struct EventLoggerBuilder {
    config: LoggerConfig,
    storage: Option<Arc<dyn Storage>>,
    transport: Option<Arc<dyn Transport>>,
    page: PageContext,
    hooks: Option<Arc<HostHooks>>,
}

impl EventLoggerBuilder {
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Replace the HTTP transport. Ignored while no endpoint is configured.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn page(mut self, page: PageContext) -> Self {
        self.page = page;
        self
    }

    /// Registry to hook into; defaults to [`HostHooks::global`]
    pub fn hooks(mut self, hooks: Arc<HostHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Construct without touching storage, hooks or timers
    pub fn build(self) -> EventLogger {
        let config = self.config.normalized();
        let transport: Option<Arc<dyn Transport>> = config.delivery_endpoint().map(|endpoint| {
            self.transport.unwrap_or_else(|| -> Arc<dyn Transport> {
                Arc::new(HttpTransport::new(endpoint, config.api_key.clone()))
            })
        });
        let storage: Arc<dyn Storage> = self.storage.unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        EventLogger {
            inner: Arc::new(Inner {
                storage,
                transport,
                page: self.page,
                hooks: self.hooks.unwrap_or_else(HostHooks::global),
                state: Mutex::new(State {
                    entries: VecDeque::new(),
                    pending: VecDeque::new(),
                    page_loaded_at: Utc::now(),
                }),
                timer: Mutex::new(None),
                hook_id: Mutex::new(None),
                initialized: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Build and load the durable log, nothing else
    pub fn open(self) -> EventLogger {
        let logger = self.build();
        logger.load();
        logger
    }

    /// Build and run the full startup sequence
    pub fn init(self) -> EventLogger {
        let logger = self.build();
        logger.init();
        logger
    }
}

impl EventLogger {
    pub fn builder(config: LoggerConfig) -> EventLoggerBuilder {
        EventLoggerBuilder {
            config,
            storage: None,
            transport: None,
            page: PageContext::default(),
            hooks: None,
        }
    }

    /// Startup: load, page view, hooks, timer. Later calls do nothing.
    pub fn init(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            log::debug!("Logger already initialized");
            return;
        }

        self.load();

        if self.inner.config.track_page_views {
            let data = self.inner.page.pageview_data();
            self.capture(EntryKind::Pageview, None, PAGEVIEW_MESSAGE, Some(data));
        }

        let handler: Arc<dyn HostHandler> = Arc::new(LoggerHook {
            logger: Arc::downgrade(&self.inner),
        });
        let id = self.inner.hooks.register(handler);
        *lock(&self.inner.hook_id) = Some(id);

        if self.inner.transport.is_some() {
            self.restart_timer(Duration::from_millis(self.inner.config.flush_interval_ms));
        }

        log::debug!(
            "Logger initialized: path={} delivery={} profile={:?}",
            self.inner.page.path,
            self.inner.transport.is_some(),
            self.inner.config.profile
        );
    }

    fn load(&self) {
        let loaded = storage::load_entries(self.inner.storage.as_ref());
        let mut state = self.state();
        let mut entries: VecDeque<LogEntry> = loaded.into();
        // Anything captured before loading stays newest
        entries.extend(state.entries.drain(..));
        evict_overflow(&mut entries);
        state.entries = entries;
        state.page_loaded_at = Utc::now();
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.inner.config
    }

    /// Capture time of the current page load
    pub fn page_loaded_at(&self) -> DateTime<Utc> {
        self.state().page_loaded_at
    }

    pub fn delivery_enabled(&self) -> bool {
        self.inner.transport.is_some()
    }

    pub fn log(&self, message: &str, data: Option<serde_json::Value>) -> LogEntry {
        self.capture(EntryKind::Log, Some(Level::Info), message, data)
    }

    pub fn info(&self, message: &str, data: Option<serde_json::Value>) -> LogEntry {
        self.log(message, data)
    }

    pub fn warn(&self, message: &str, data: Option<serde_json::Value>) -> LogEntry {
        self.capture(EntryKind::Log, Some(Level::Warn), message, data)
    }

    pub fn error(&self, message: &str, data: Option<serde_json::Value>) -> LogEntry {
        self.capture(EntryKind::Error, Some(Level::Error), message, data)
    }

    /// Record an error nobody caught. Always lets default reporting continue.
    pub fn capture_uncaught_error(&self, error: &UncaughtError) -> HookOutcome {
        self.record(uncaught_entry(self, error));
        HookOutcome::Continue
    }

    /// Record a rejected asynchronous operation nobody observed
    pub fn capture_unhandled_rejection(&self, rejection: &Rejection) -> HookOutcome {
        let data = serde_json::json!({
            "stack": rejection.stack.as_deref().map(truncate_stack),
        });
        let entry = self.new_entry(
            EntryKind::Error,
            Some(Level::Error),
            format!("{}{}", UNHANDLED_REJECTION_PREFIX, rejection.reason),
            Some(data),
        );
        self.record(entry);
        HookOutcome::Continue
    }

    /// Durable log, oldest first, optionally only entries at `level`
    pub fn get_entries(&self, level: Option<Level>) -> Vec<LogEntry> {
        let state = self.state();
        state
            .entries
            .iter()
            .filter(|e| level.is_none_or(|l| e.has_level(l)))
            .cloned()
            .collect()
    }

    /// Entries still awaiting delivery, oldest first
    pub fn pending(&self) -> Vec<LogEntry> {
        self.state().pending.iter().cloned().collect()
    }

    /// Empty the durable log, the pending queue and the storage slot
    pub fn clear_entries(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.pending.clear();
        storage::clear_entries(self.inner.storage.as_ref());
    }

    pub fn export_entries(&self) -> Result<EntryExport, ExportError> {
        let entries = self.get_entries(None);
        EntryExport::new(&entries)
    }

    /// Send up to `max_batch_size` pending entries in the background
    pub fn flush(&self) -> FlushTicket {
        self.flush_with(DeliveryMode::Background)
    }

    /// Replace the periodic flush timer. Queue contents are untouched.
    pub fn restart_timer(&self, interval: Duration) {
        if self.inner.transport.is_none() {
            return;
        }
        let interval = interval.max(Duration::from_millis(MIN_FLUSH_INTERVAL_MS));

        let weak = Arc::downgrade(&self.inner);
        let started = FlushTimer::start(interval, move || match weak.upgrade() {
            Some(inner) => {
                // Fire and forget; the ticket is dropped
                let _ = EventLogger { inner }.flush();
                true
            }
            None => false,
        });

        match started {
            Ok(timer) => {
                log::debug!("Flush timer running every {:?}", timer.interval());
                let previous = lock(&self.inner.timer).replace(timer);
                if let Some(previous) = previous {
                    previous.cancel();
                }
            }
            Err(e) => log::warn!("Failed to start flush timer: {}", e),
        }
    }

    /// Page is going away: stop the timer and push out what is pending.
    /// Only the first call does anything.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!(
            "Page unloading after {}ms",
            (Utc::now() - self.page_loaded_at()).num_milliseconds()
        );

        let timer = lock(&self.inner.timer).take();
        if let Some(timer) = timer {
            timer.cancel();
        }

        // Drain batch by batch; stop at the first failure
        loop {
            match self.flush_with(DeliveryMode::Beacon).wait() {
                FlushOutcome::Delivered(_) => continue,
                _ => break,
            }
        }
    }

    /// Teardown, then detach from the host hooks
    pub fn shutdown(&self) {
        self.teardown();
        if let Some(id) = lock(&self.inner.hook_id).take() {
            self.inner.hooks.unregister(id);
        }
    }

    fn flush_with(&self, mode: DeliveryMode) -> FlushTicket {
        let Some(transport) = self.inner.transport.clone() else {
            return FlushTicket::done(FlushOutcome::Skipped);
        };

        let batch: Vec<LogEntry> = {
            let mut state = self.state();
            if state.pending.is_empty() {
                return FlushTicket::done(FlushOutcome::Skipped);
            }
            let count = self.inner.config.max_batch_size.min(state.pending.len());
            state.pending.drain(..count).collect()
        };

        let payload = BatchPayload {
            site_id: self.inner.config.site_id.clone(),
            api_key: self.inner.config.api_key.clone(),
            entries: batch,
        };
        let count = payload.entries.len();

        match mode {
            DeliveryMode::Beacon => {
                let outcome = match transport.send(&payload, DeliveryMode::Beacon) {
                    Ok(()) => FlushOutcome::Delivered(count),
                    Err(e) => {
                        log::warn!("Final flush lost {} entries: {}", count, e);
                        FlushOutcome::Dropped(count)
                    }
                };
                FlushTicket::done(outcome)
            }
            DeliveryMode::Background => {
                let fallback = payload.entries.clone();
                let weak = Arc::downgrade(&self.inner);
                let spawned = thread::Builder::new()
                    .name("sitelog-send".to_string())
                    .spawn(move || deliver(transport.as_ref(), payload, weak));

                match spawned {
                    Ok(handle) => FlushTicket(Ticket::Running(handle)),
                    Err(e) => {
                        log::warn!("Failed to spawn send thread: {}", e);
                        self.requeue(fallback);
                        FlushTicket::done(FlushOutcome::Requeued(count))
                    }
                }
            }
        }
    }

    fn requeue(&self, batch: Vec<LogEntry>) {
        let mut state = self.state();
        for entry in batch.into_iter().rev() {
            state.pending.push_front(entry);
        }
    }

    fn new_entry(
        &self,
        kind: EntryKind,
        level: Option<Level>,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> LogEntry {
        LogEntry::new(
            kind,
            level,
            message,
            data,
            self.inner.config.site_id.clone(),
            self.inner.page.path.clone(),
        )
    }

    fn capture(
        &self,
        kind: EntryKind,
        level: Option<Level>,
        message: &str,
        data: Option<serde_json::Value>,
    ) -> LogEntry {
        let entry = self.new_entry(kind, level, message, data);
        self.record(entry.clone());
        entry
    }

    fn record(&self, entry: LogEntry) {
        {
            let mut state = self.state();
            self.append(&mut state, entry.clone());
        }
        self.mirror(&entry);
    }

    /// Like `record`, but gives up instead of waiting on the state lock.
    /// A panic raised while this thread holds the lock must not deadlock.
    fn try_record(&self, entry: LogEntry) {
        let mut state = match self.inner.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::warn!("Logger busy, dropping uncaught error: {}", entry.message);
                return;
            }
        };
        self.append(&mut state, entry.clone());
        drop(state);
        self.mirror(&entry);
    }

    fn append(&self, state: &mut State, entry: LogEntry) {
        state.entries.push_back(entry.clone());
        evict_overflow(&mut state.entries);
        state.pending.push_back(entry);
        storage::save_entries(self.inner.storage.as_ref(), &state.entries);
    }

    fn mirrors_console(&self) -> bool {
        self.inner.config.profile == Profile::Local || self.inner.config.debug_mode || self.inner.page.is_local_host()
    }

    fn mirror(&self, entry: &LogEntry) {
        if self.mirrors_console() {
            console::mirror(entry);
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock(&self.inner.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// FIFO by position, never by timestamp
fn evict_overflow(entries: &mut VecDeque<LogEntry>) {
    while entries.len() > MAX_ENTRIES {
        entries.pop_front();
    }
}

fn uncaught_entry(logger: &EventLogger, error: &UncaughtError) -> LogEntry {
    let data = serde_json::json!({
        "source": error.source,
        "line": error.line,
        "column": error.column,
        "stack": error.stack.as_deref().map(truncate_stack),
    });
    logger.new_entry(
        EntryKind::Error,
        Some(Level::Error),
        format!("{}{}", UNCAUGHT_ERROR_PREFIX, error.message),
        Some(data),
    )
}

fn deliver(transport: &dyn Transport, payload: BatchPayload, logger: Weak<Inner>) -> FlushOutcome {
    let count = payload.entries.len();
    match transport.send(&payload, DeliveryMode::Background) {
        Ok(()) => {
            log::debug!("Delivered {} entries", count);
            FlushOutcome::Delivered(count)
        }
        Err(e) => {
            log::debug!("Delivery failed, re-queueing {} entries: {}", count, e);
            match logger.upgrade() {
                Some(inner) => {
                    EventLogger { inner }.requeue(payload.entries);
                    FlushOutcome::Requeued(count)
                }
                None => FlushOutcome::Dropped(count),
            }
        }
    }
}

/// Bridges host events into a logger without keeping it alive
struct LoggerHook {
    logger: Weak<Inner>,
}

impl HostHandler for LoggerHook {
    fn handle(&self, event: &HostEvent) -> HookOutcome {
        let Some(inner) = self.logger.upgrade() else {
            return HookOutcome::Continue;
        };
        let logger = EventLogger { inner };

        match event {
            HostEvent::UncaughtError(error) => logger.try_record(uncaught_entry(&logger, error)),
            HostEvent::UnhandledRejection(rejection) => {
                logger.capture_unhandled_rejection(rejection);
            }
            HostEvent::Teardown => logger.teardown(),
        }
        HookOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, TransmitError};
    use crate::storage::STORAGE_KEY;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Behavior {
        Accept,
        Reject,
        Fail,
    }

    /// Records every batch; optionally waits on a gate before answering
    struct FakeTransport {
        behavior: Behavior,
        sent: Mutex<Vec<(BatchPayload, DeliveryMode)>>,
        gate: Option<Mutex<Receiver<()>>>,
    }

    impl FakeTransport {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                sent: Mutex::new(Vec::new()),
                gate: None,
            })
        }

        fn gated(behavior: Behavior) -> (Arc<Self>, Sender<()>) {
            let (tx, rx) = mpsc::channel();
            let transport = Arc::new(Self {
                behavior,
                sent: Mutex::new(Vec::new()),
                gate: Some(Mutex::new(rx)),
            });
            (transport, tx)
        }

        fn sent(&self) -> Vec<(BatchPayload, DeliveryMode)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for FakeTransport {
        fn send(&self, payload: &BatchPayload, mode: DeliveryMode) -> Result<(), TransmitError> {
            self.sent.lock().unwrap().push((payload.clone(), mode));
            if let Some(ref gate) = self.gate {
                gate.lock().unwrap().recv().unwrap();
            }
            match self.behavior {
                Behavior::Accept => Ok(()),
                Behavior::Reject => Err(TransmitError::Rejected),
                Behavior::Fail => Err(TransmitError::Network("connection refused".to_string())),
            }
        }
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disabled".to_string()))
        }
    }

    fn remote_config() -> LoggerConfig {
        LoggerConfig {
            endpoint: Some("https://collect.example/logs".to_string()),
            site_id: Some("docs".to_string()),
            track_page_views: false,
            flush_interval_ms: 60_000,
            ..LoggerConfig::default()
        }
    }

    fn public_page() -> PageContext {
        PageContext {
            hostname: "example.com".to_string(),
            path: "/guide".to_string(),
            ..PageContext::default()
        }
    }

    fn remote_logger(config: LoggerConfig, transport: Arc<FakeTransport>) -> (EventLogger, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let logger = EventLogger::builder(config)
            .storage(storage.clone())
            .transport(transport)
            .page(public_page())
            .hooks(Arc::new(HostHooks::new()))
            .init();
        (logger, storage)
    }

    fn local_logger(config: LoggerConfig, storage: Arc<MemoryStorage>) -> EventLogger {
        EventLogger::builder(config)
            .storage(storage)
            .page(public_page())
            .hooks(Arc::new(HostHooks::new()))
            .init()
    }

    fn messages(entries: &[LogEntry]) -> Vec<String> {
        entries.iter().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_pageview_plus_calls() {
        let storage = Arc::new(MemoryStorage::new());
        let logger = local_logger(LoggerConfig::default(), storage);

        logger.log("a", None);
        logger.info("b", None);
        logger.warn("c", None);
        logger.error("d", None);

        let entries = logger.get_entries(None);
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].kind, EntryKind::Pageview);
        assert_eq!(entries[0].message, PAGEVIEW_MESSAGE);
        assert!(entries[0].level.is_none());
        assert_eq!(entries[0].data.as_ref().unwrap()["userAgent"], PageContext::default().user_agent);
        assert_eq!(messages(&entries[1..]), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_error_scenario() {
        let config = LoggerConfig {
            track_page_views: false,
            ..LoggerConfig::default()
        };
        let logger = local_logger(config, Arc::new(MemoryStorage::new()));

        logger.error("boom", Some(serde_json::json!({"x": 1})));

        let entries = logger.get_entries(None);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.kind, EntryKind::Error);
        assert_eq!(entry.level, Some(Level::Error));
        assert_eq!(entry.message, "boom");
        assert_eq!(entry.data, Some(serde_json::json!({"x": 1})));
        assert_eq!(entry.path, "/guide");
        assert!(!entry.id.is_empty());
        assert!(DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let config = LoggerConfig {
            track_page_views: false,
            ..LoggerConfig::default()
        };
        let logger = local_logger(config, Arc::new(MemoryStorage::new()));

        for i in 1..=101 {
            logger.info(&format!("call {}", i), None);
        }

        let entries = logger.get_entries(None);
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].message, "call 2");
        assert_eq!(entries[MAX_ENTRIES - 1].message, "call 101");
    }

    #[test]
    fn test_cap_holds_with_pageview() {
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));
        for i in 0..150 {
            logger.info(&i.to_string(), None);
            let expected = (i + 2).min(MAX_ENTRIES);
            assert_eq!(logger.get_entries(None).len(), expected);
        }
    }

    #[test]
    fn test_reload_reproduces_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let config = LoggerConfig {
            site_id: Some("docs".to_string()),
            ..LoggerConfig::default()
        };
        let first = local_logger(config.clone(), storage.clone());
        first.info("one", Some(serde_json::json!({"nested": {"k": [1, 2, 3]}})));
        first.error("two", None);
        let before = first.get_entries(None);

        let reloaded = EventLogger::builder(config)
            .storage(storage)
            .page(public_page())
            .hooks(Arc::new(HostHooks::new()))
            .open();

        assert_eq!(reloaded.get_entries(None), before);
        // Reloading does not resurrect the pending queue
        assert!(reloaded.pending().is_empty());
    }

    #[test]
    fn test_second_load_adds_pageview() {
        let storage = Arc::new(MemoryStorage::new());
        let first = local_logger(LoggerConfig::default(), storage.clone());
        first.info("hello", None);

        let second = local_logger(LoggerConfig::default(), storage);
        let entries = second.get_entries(None);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].kind, EntryKind::Pageview);
    }

    #[test]
    fn test_init_is_idempotent() {
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));
        logger.init();
        assert_eq!(logger.get_entries(None).len(), 1);
    }

    #[test]
    fn test_malformed_storage_starts_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(STORAGE_KEY, "][").unwrap();

        let logger = local_logger(LoggerConfig::default(), storage);
        assert_eq!(logger.get_entries(None).len(), 1);
    }

    #[test]
    fn test_unavailable_storage_keeps_memory_state() {
        let logger = EventLogger::builder(LoggerConfig::default())
            .storage(Arc::new(BrokenStorage))
            .page(public_page())
            .hooks(Arc::new(HostHooks::new()))
            .init();

        logger.info("still works", None);
        logger.clear_entries();
        logger.warn("after clear", None);

        assert_eq!(messages(&logger.get_entries(None)), vec!["after clear"]);
    }

    #[test]
    fn test_filter_by_level() {
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));
        logger.error("e1", None);
        logger.info("i1", None);
        logger.warn("w1", None);
        logger.error("e2", None);

        assert_eq!(messages(&logger.get_entries(Some(Level::Error))), vec!["e1", "e2"]);
        assert_eq!(messages(&logger.get_entries(Some(Level::Warn))), vec!["w1"]);
        assert_eq!(messages(&logger.get_entries(Some(Level::Info))), vec!["i1"]);
    }

    #[test]
    fn test_clear_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let logger = local_logger(LoggerConfig::default(), storage.clone());
        logger.info("x", None);

        logger.clear_entries();

        assert!(logger.get_entries(None).is_empty());
        assert!(logger.pending().is_empty());
        assert!(storage.get(STORAGE_KEY).unwrap().is_none());

        let reloaded = EventLogger::builder(LoggerConfig::default())
            .storage(storage)
            .hooks(Arc::new(HostHooks::new()))
            .open();
        assert!(reloaded.get_entries(None).is_empty());
    }

    #[test]
    fn test_export_matches_durable_log() {
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));
        logger.info("a", Some(serde_json::json!({"k": "v"})));
        logger.error("b", None);

        let export = logger.export_entries().unwrap();
        assert!(export.filename.starts_with("static-site-logs-"));
        assert!(export.filename.ends_with(".json"));

        let parsed: Vec<LogEntry> = serde_json::from_str(&export.contents).unwrap();
        assert_eq!(parsed, logger.get_entries(None));
    }

    #[test]
    fn test_flush_without_endpoint_is_noop() {
        let transport = FakeTransport::new(Behavior::Accept);
        let config = LoggerConfig {
            track_page_views: false,
            ..LoggerConfig::default()
        };
        let storage = Arc::new(MemoryStorage::new());
        let logger = EventLogger::builder(config)
            .storage(storage)
            .transport(transport.clone())
            .page(public_page())
            .hooks(Arc::new(HostHooks::new()))
            .init();
        logger.info("x", None);

        assert!(!logger.delivery_enabled());
        assert_eq!(logger.flush().wait(), FlushOutcome::Skipped);
        assert_eq!(logger.pending().len(), 1);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_flush_empty_queue_is_noop() {
        let transport = FakeTransport::new(Behavior::Accept);
        let (logger, _) = remote_logger(remote_config(), transport.clone());

        assert_eq!(logger.flush().wait(), FlushOutcome::Skipped);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_flush_delivers_oldest_batch() {
        let transport = FakeTransport::new(Behavior::Accept);
        let config = LoggerConfig {
            max_batch_size: 2,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        logger.info("a", None);
        logger.info("b", None);
        logger.info("c", None);

        assert_eq!(logger.flush().wait(), FlushOutcome::Delivered(2));
        assert_eq!(messages(&logger.pending()), vec!["c"]);
        // Delivery never touches the durable log
        assert_eq!(logger.get_entries(None).len(), 3);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        let (payload, mode) = &sent[0];
        assert_eq!(*mode, DeliveryMode::Background);
        assert_eq!(payload.site_id.as_deref(), Some("docs"));
        assert_eq!(messages(&payload.entries), vec!["a", "b"]);
    }

    #[test]
    fn test_rejected_batch_requeued_at_front() {
        let transport = FakeTransport::new(Behavior::Reject);
        let config = LoggerConfig {
            max_batch_size: 2,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        logger.info("a", None);
        logger.info("b", None);
        logger.info("c", None);
        let before = logger.pending();

        assert_eq!(logger.flush().wait(), FlushOutcome::Requeued(2));
        assert_eq!(logger.pending(), before);
    }

    #[test]
    fn test_network_failure_requeued_at_front() {
        let transport = FakeTransport::new(Behavior::Fail);
        let (logger, _) = remote_logger(remote_config(), transport.clone());
        logger.info("a", None);
        logger.error("b", None);
        let before = logger.pending();

        assert_eq!(logger.flush().wait(), FlushOutcome::Requeued(2));
        assert_eq!(logger.pending(), before);

        // Retried as-is on the next attempt
        assert_eq!(logger.flush().wait(), FlushOutcome::Requeued(2));
        let sent = transport.sent();
        assert_eq!(sent[0].0.entries, sent[1].0.entries);
    }

    #[test]
    fn test_requeue_goes_ahead_of_newer_entries() {
        let (transport, gate) = FakeTransport::gated(Behavior::Fail);
        let config = LoggerConfig {
            max_batch_size: 2,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport);
        logger.info("a", None);
        logger.info("b", None);
        logger.info("c", None);

        let ticket = logger.flush();
        // Captured while the batch is in flight
        logger.info("d", None);
        gate.send(()).unwrap();

        assert_eq!(ticket.wait(), FlushOutcome::Requeued(2));
        assert_eq!(messages(&logger.pending()), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_concurrent_flushes_do_not_double_send() {
        let (transport, gate) = FakeTransport::gated(Behavior::Accept);
        let config = LoggerConfig {
            max_batch_size: 1,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        logger.info("a", None);
        logger.info("b", None);

        let first = logger.flush();
        let second = logger.flush();
        gate.send(()).unwrap();
        gate.send(()).unwrap();

        assert_eq!(first.wait(), FlushOutcome::Delivered(1));
        assert_eq!(second.wait(), FlushOutcome::Delivered(1));
        let mut sent: Vec<String> = transport
            .sent()
            .iter()
            .flat_map(|(payload, _)| messages(&payload.entries))
            .collect();
        sent.sort();
        assert_eq!(sent, vec!["a", "b"]);
        assert!(logger.pending().is_empty());
    }

    #[test]
    fn test_teardown_drains_with_beacon() {
        let transport = FakeTransport::new(Behavior::Accept);
        let config = LoggerConfig {
            max_batch_size: 2,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        for i in 0..5 {
            logger.info(&i.to_string(), None);
        }

        logger.teardown();

        assert!(logger.pending().is_empty());
        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|(_, mode)| *mode == DeliveryMode::Beacon));
    }

    #[test]
    fn test_teardown_failure_is_not_retried() {
        let transport = FakeTransport::new(Behavior::Fail);
        let config = LoggerConfig {
            max_batch_size: 2,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        for i in 0..5 {
            logger.info(&i.to_string(), None);
        }

        logger.teardown();

        // First batch dropped, the rest left alone
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(messages(&logger.pending()), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_teardown_runs_once() {
        let hooks = Arc::new(HostHooks::new());
        let transport = FakeTransport::new(Behavior::Fail);
        let config = LoggerConfig {
            max_batch_size: 2,
            ..remote_config()
        };
        let logger = EventLogger::builder(config)
            .storage(Arc::new(MemoryStorage::new()))
            .transport(transport.clone())
            .page(public_page())
            .hooks(hooks.clone())
            .init();
        for i in 0..5 {
            logger.info(&i.to_string(), None);
        }

        // The host fires teardown, then the embedder shuts down
        hooks.teardown();
        logger.shutdown();

        assert_eq!(transport.sent().len(), 1);
        assert_eq!(messages(&logger.pending()), vec!["2", "3", "4"]);
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_page_loaded_at_set_on_load() {
        let before = Utc::now();
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));
        let loaded_at = logger.page_loaded_at();

        assert!(loaded_at >= before);
        assert!(loaded_at <= Utc::now());
    }

    #[test]
    fn test_restart_timer_clamps_interval() {
        let (logger, _) = remote_logger(remote_config(), FakeTransport::new(Behavior::Accept));

        logger.restart_timer(Duration::ZERO);

        let interval = lock(&logger.inner.timer).as_ref().map(FlushTimer::interval);
        assert_eq!(interval, Some(Duration::from_millis(MIN_FLUSH_INTERVAL_MS)));
        logger.shutdown();
    }

    #[test]
    fn test_timer_flushes_periodically() {
        let transport = FakeTransport::new(Behavior::Accept);
        let config = LoggerConfig {
            flush_interval_ms: 100,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        logger.info("tick", None);

        let mut waited = 0;
        while transport.sent().is_empty() && waited < 50 {
            thread::sleep(Duration::from_millis(20));
            waited += 1;
        }

        assert!(logger.pending().is_empty());
        assert_eq!(messages(&transport.sent()[0].0.entries), vec!["tick"]);
        logger.shutdown();
    }

    #[test]
    fn test_restart_timer_keeps_pending() {
        let transport = FakeTransport::new(Behavior::Accept);
        let (logger, _) = remote_logger(remote_config(), transport.clone());
        logger.info("a", None);

        logger.restart_timer(Duration::from_secs(120));

        assert_eq!(messages(&logger.pending()), vec!["a"]);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_local_profile_never_sends() {
        let transport = FakeTransport::new(Behavior::Accept);
        let config = LoggerConfig {
            profile: Profile::Local,
            ..remote_config()
        };
        let (logger, _) = remote_logger(config, transport.clone());
        logger.info("a", None);

        assert!(!logger.delivery_enabled());
        assert_eq!(logger.flush().wait(), FlushOutcome::Skipped);
        logger.teardown();
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_uncaught_error_capture() {
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));
        let error = UncaughtError {
            message: "index out of bounds".to_string(),
            source: Some("src/app.rs".to_string()),
            line: Some(42),
            column: Some(7),
            stack: Some("f".repeat(2_000)),
        };

        let outcome = logger.capture_uncaught_error(&error);

        assert_eq!(outcome, HookOutcome::Continue);
        let entries = logger.get_entries(Some(Level::Error));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Uncaught error: index out of bounds");
        let data = entries[0].data.as_ref().unwrap();
        assert_eq!(data["source"], "src/app.rs");
        assert_eq!(data["line"], 42);
        assert_eq!(data["column"], 7);
        assert_eq!(data["stack"].as_str().unwrap().len(), 500);
    }

    #[test]
    fn test_rejection_without_stack() {
        let logger = local_logger(LoggerConfig::default(), Arc::new(MemoryStorage::new()));

        let outcome = logger.capture_unhandled_rejection(&Rejection {
            reason: "fetch timed out".to_string(),
            stack: None,
        });

        assert_eq!(outcome, HookOutcome::Continue);
        let entries = logger.get_entries(Some(Level::Error));
        assert_eq!(entries[0].message, "Unhandled rejection: fetch timed out");
        assert!(entries[0].data.as_ref().unwrap()["stack"].is_null());
    }

    #[test]
    fn test_host_hooks_route_into_logger() {
        let hooks = Arc::new(HostHooks::new());
        let transport = FakeTransport::new(Behavior::Accept);
        let logger = EventLogger::builder(remote_config())
            .storage(Arc::new(MemoryStorage::new()))
            .transport(transport.clone())
            .page(public_page())
            .hooks(hooks.clone())
            .init();

        assert_eq!(hooks.report_error(UncaughtError::new("bad state")), HookOutcome::Continue);
        assert_eq!(hooks.report_rejection("nope", Some("at task".to_string())), HookOutcome::Continue);
        assert_eq!(
            messages(&logger.get_entries(None)),
            vec!["Uncaught error: bad state", "Unhandled rejection: nope"]
        );

        hooks.teardown();
        assert!(logger.pending().is_empty());
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_uncaught_error_dropped_while_state_locked() {
        let hooks = Arc::new(HostHooks::new());
        let logger = EventLogger::builder(LoggerConfig::default())
            .page(public_page())
            .hooks(hooks.clone())
            .init();
        logger.info("before", None);

        // A panic raised while this thread holds the state must not deadlock
        let held = logger.state();
        assert_eq!(hooks.report_error(UncaughtError::new("reentrant")), HookOutcome::Continue);
        drop(held);

        assert_eq!(messages(&logger.get_entries(None)), vec!["Page view", "before"]);

        hooks.report_error(UncaughtError::new("later"));
        assert_eq!(logger.get_entries(Some(Level::Error)).len(), 1);
    }

    #[test]
    fn test_shutdown_unregisters() {
        let hooks = Arc::new(HostHooks::new());
        let logger = EventLogger::builder(LoggerConfig::default())
            .page(public_page())
            .hooks(hooks.clone())
            .init();
        assert_eq!(hooks.len(), 1);

        logger.shutdown();
        assert!(hooks.is_empty());
    }

    #[test]
    fn test_dropped_logger_ignores_hooks() {
        let hooks = Arc::new(HostHooks::new());
        let logger = EventLogger::builder(LoggerConfig::default())
            .page(public_page())
            .hooks(hooks.clone())
            .init();
        drop(logger);

        assert_eq!(hooks.report_error(UncaughtError::new("late")), HookOutcome::Continue);
    }

    #[test]
    fn test_entries_carry_site_and_path() {
        let (logger, _) = remote_logger(remote_config(), FakeTransport::new(Behavior::Accept));
        let entry = logger.warn("slow", None);

        assert_eq!(entry.site_id.as_deref(), Some("docs"));
        assert_eq!(entry.path, "/guide");
        assert_eq!(entry.level, Some(Level::Warn));
        assert_eq!(entry.kind, EntryKind::Log);
        assert_eq!(logger.pending(), vec![entry]);
    }
}
