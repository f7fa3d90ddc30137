//! Recurring flush timer

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Calls a tick function on a fixed period until cancelled.
///
/// The timer owns nothing but its thread; cancelling never touches queue state.
pub struct FlushTimer {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
}

impl FlushTimer {
    /// Start ticking. The thread also exits once `tick` returns false.
    pub fn start<F>(interval: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop, rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new().name("sitelog-flush".to_string()).spawn(move || {
            loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !tick() {
                            break;
                        }
                    }
                    // Stop requested or the timer was dropped
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;

        Ok(Self {
            stop,
            handle: Some(handle),
            interval,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stop and wait for an in-progress tick to finish
    pub fn cancel(mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("Flush timer thread panicked");
        }
    }
}

impl Drop for FlushTimer {
    fn drop(&mut self) {
        let _ = self.stop.send(());
    }
}
