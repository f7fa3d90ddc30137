//! Process-wide host hooks
//!
//! Uncaught errors, unhandled rejections and teardown are dispatched to every
//! registered handler in registration order. Handlers are chained, never
//! replaced, so registering a logger does not silence hooks installed before
//! or after it.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// An error nobody caught
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UncaughtError {
    pub message: String,
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub stack: Option<String>,
}

impl UncaughtError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Build from an error value; the source chain stands in for the stack
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut current = err.source();
        while let Some(cause) = current {
            chain.push(format!("caused by: {}", cause));
            current = cause.source();
        }

        Self {
            message: err.to_string(),
            stack: if chain.is_empty() { None } else { Some(chain.join("\n")) },
            ..Self::default()
        }
    }

    fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with non-string payload".to_string());

        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            message,
            source: info.location().map(|l| l.file().to_string()),
            line: info.location().map(|l| l.line()),
            column: info.location().map(|l| l.column()),
            stack,
        }
    }
}

/// An asynchronous failure that completed without anyone observing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: String,
    pub stack: Option<String>,
}

/// Events fired by the host environment
#[derive(Debug, Clone)]
pub enum HostEvent {
    UncaughtError(UncaughtError),
    UnhandledRejection(Rejection),
    Teardown,
}

/// What a handler wants done with the host's default reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Let default reporting happen
    Continue,
    /// Swallow the event
    Suppress,
}

/// A host hook handler
pub trait HostHandler: Send + Sync {
    fn handle(&self, event: &HostEvent) -> HookOutcome;
}

/// Identifies a registration so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Registry of chained host handlers
#[derive(Default)]
pub struct HostHooks {
    handlers: RwLock<Vec<(HandlerId, Arc<dyn HostHandler>)>>,
    next_id: AtomicU64,
}

static GLOBAL_HOOKS: OnceLock<Arc<HostHooks>> = OnceLock::new();

impl HostHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single process-wide registration point
    pub fn global() -> Arc<HostHooks> {
        GLOBAL_HOOKS.get_or_init(|| Arc::new(HostHooks::new())).clone()
    }

    pub fn register(&self, handler: Arc<dyn HostHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.push((id, handler));
        id
    }

    /// Returns false when the id was not registered
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every handler. Suppression by one handler does not skip the others.
    pub fn dispatch(&self, event: &HostEvent) -> HookOutcome {
        // Snapshot so handlers may register or unregister while running
        let handlers: Vec<Arc<dyn HostHandler>> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        let mut outcome = HookOutcome::Continue;
        for handler in handlers {
            if handler.handle(event) == HookOutcome::Suppress {
                outcome = HookOutcome::Suppress;
            }
        }
        outcome
    }

    pub fn report_error(&self, error: UncaughtError) -> HookOutcome {
        self.dispatch(&HostEvent::UncaughtError(error))
    }

    pub fn report_rejection(&self, reason: impl Into<String>, stack: Option<String>) -> HookOutcome {
        self.dispatch(&HostEvent::UnhandledRejection(Rejection {
            reason: reason.into(),
            stack,
        }))
    }

    pub fn teardown(&self) {
        self.dispatch(&HostEvent::Teardown);
    }
}

/// Route panics into `hooks`, then hand them to the previously installed hook.
///
/// The previous hook is skipped only when a handler suppresses the event.
pub fn install_panic_hook(hooks: Arc<HostHooks>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let outcome = hooks.report_error(UncaughtError::from_panic(info));
        if outcome == HookOutcome::Continue {
            previous(info);
        }
    }));
}
