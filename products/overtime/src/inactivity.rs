//! Idle countdown that signs a session out after a quiet period.

use std::{future::Future, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

/// Default idle period before a forced sign-out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Anything that reports user activity.
///
/// `None` means the source is gone (the identity changed or the session
/// ended) and the timer should stop without firing.
pub trait ActivitySource: Send + 'static {
    fn next_activity(&mut self) -> impl Future<Output = Option<()>> + Send;
}

impl ActivitySource for mpsc::Receiver<()> {
    fn next_activity(&mut self) -> impl Future<Output = Option<()>> + Send {
        self.recv()
    }
}

impl ActivitySource for mpsc::UnboundedReceiver<()> {
    fn next_activity(&mut self) -> impl Future<Output = Option<()>> + Send {
        self.recv()
    }
}

/// Handle to a running countdown. Dropping it cancels the countdown.
#[derive(Debug)]
pub struct InactivityTimer {
    task: JoinHandle<()>,
}

impl InactivityTimer {
    /// Start counting down immediately. Every activity signal restarts the
    /// full `timeout`; `on_expire` runs at most once.
    pub fn arm<S, F>(timeout: Duration, mut source: S, on_expire: F) -> Self
    where
        S: ActivitySource,
        F: FnOnce() + Send + 'static,
    {
        let mut on_expire = Some(on_expire);
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    signal = source.next_activity() => match signal {
                        Some(()) => continue,
                        None => {
                            debug!("activity source closed; inactivity timer stopped");
                            return;
                        }
                    },
                    _ = tokio::time::sleep(timeout) => {
                        debug!(?timeout, "inactivity timeout elapsed");
                        if let Some(hook) = on_expire.take() {
                            hook();
                        }
                        return;
                    }
                }
            }
        });
        Self { task }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
