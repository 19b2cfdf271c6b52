//! Lifecycle of the finding stream consumer.
//!
//! The supervisor runs a consumer cycle (subscribe and process until error
//! or shutdown) in a background task. When a cycle fails it waits the retry
//! delay and starts a new one, which resubscribes and resumes from the last
//! committed offsets. A zero delay makes the first failure fatal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::events::FindingStreamError;
use crate::metrics;

/// Why the supervisor stopped.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Finding consumer failed: {0}")]
    Consumer(#[from] FindingStreamError),

    #[error("Supervisor task failed: {0}")]
    Join(String),
}

/// Requests a supervisor shutdown; usable after its handle was consumed.
#[derive(Clone)]
pub struct ShutdownTrigger {
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Ask the consumer to stop after its current message.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Handle to a running supervisor.
pub struct SupervisorHandle {
    trigger: ShutdownTrigger,
    task: JoinHandle<Result<(), SupervisorError>>,
}

impl SupervisorHandle {
    /// Ask the consumer to stop after its current message.
    pub fn shutdown(&self) {
        self.trigger.shutdown();
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Wait for the supervisor to end.
    ///
    /// Returns `Ok(())` after a shutdown and the fatal error otherwise.
    pub async fn wait(self) -> Result<(), SupervisorError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SupervisorError::Join(e.to_string())),
        }
    }
}

/// Restarts the finding consumer after failures.
pub struct ConsumerSupervisor;

impl ConsumerSupervisor {
    /// Spawn a supervisor running `cycle` until shutdown or a fatal error.
    ///
    /// `cycle` receives the shutdown channel and must return `Ok(())` only
    /// once shutdown was requested.
    pub fn spawn<F, Fut>(retry_delay: Duration, mut cycle: F) -> SupervisorHandle
    where
        F: FnMut(watch::Receiver<bool>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FindingStreamError>> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(retry_delay_secs = retry_delay.as_secs(), "Finding consumer started");
            loop {
                let err = match cycle(shutdown_rx.clone()).await {
                    Ok(()) => {
                        info!("Finding consumer stopped");
                        return Ok(());
                    }
                    Err(e) => e,
                };

                if *shutdown_rx.borrow() {
                    warn!(error = %err, "Finding consumer failed during shutdown");
                    return Ok(());
                }
                if retry_delay.is_zero() {
                    error!(error = %err, "Finding consumer failed, retries disabled");
                    return Err(err.into());
                }

                metrics::CONSUMER_RESTARTS.inc();
                warn!(
                    error = %err,
                    retry_in_secs = retry_delay.as_secs(),
                    "Finding consumer failed, retrying"
                );

                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        info!("Finding consumer received shutdown signal while waiting to retry");
                        return Ok(());
                    }
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        });

        SupervisorHandle {
            trigger: ShutdownTrigger {
                shutdown_tx: Arc::new(shutdown_tx),
            },
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transport_error() -> FindingStreamError {
        StreamError::Transport("broker unavailable".to_string()).into()
    }

    #[tokio::test]
    async fn test_zero_delay_makes_first_error_fatal() {
        let cycles = Arc::new(AtomicUsize::new(0));
        let counter = cycles.clone();

        let handle = ConsumerSupervisor::spawn(Duration::ZERO, move |_shutdown| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(transport_error())
            }
        });

        let err = handle.wait().await.unwrap_err();
        assert!(matches!(
            err,
            SupervisorError::Consumer(FindingStreamError::Stream(StreamError::Transport(_)))
        ));
        assert_eq!(cycles.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_stops_consumed_handle() {
        let handle = ConsumerSupervisor::spawn(Duration::from_millis(10), |mut shutdown| async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            Ok(())
        });
        let trigger = handle.trigger();
        let waiting = tokio::spawn(handle.wait());

        trigger.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), waiting).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }

    #[tokio::test]
    async fn test_failed_cycle_is_retried() {
        let cycles = Arc::new(AtomicUsize::new(0));
        let counter = cycles.clone();

        let handle = ConsumerSupervisor::spawn(Duration::from_millis(10), move |mut shutdown| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(transport_error());
                }
                while !*shutdown.borrow() {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
        });

        while cycles.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.shutdown();
        handle.wait().await.unwrap();
        assert_eq!(cycles.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retry_sleep() {
        let handle = ConsumerSupervisor::spawn(Duration::from_secs(3600), |_shutdown| async {
            Err(transport_error())
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
