use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;

/// Supervises a group of concurrent workers sharing one cancellation token.
///
/// An external interrupt or the first worker error cancels every worker;
/// [`join`](ShutdownSupervisor::join) then waits for an orderly drain,
/// bounded by the drain timeout. Cancellation itself is a clean exit: only
/// a worker error makes `join` return `Err`, so a caller can map the result
/// straight to a process exit code.
pub struct ShutdownSupervisor {
    token: CancellationToken,
    workers: JoinSet<Result<(), PipelineError>>,
    drain_timeout: Duration,
}

impl ShutdownSupervisor {
    /// Create a supervisor with the given drain timeout.
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            workers: JoinSet::new(),
            drain_timeout,
        }
    }

    /// The shared cancellation token. Clones observe the same signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request cancellation of all workers.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Spawn a named worker. The worker receives the shared token and must
    /// observe it at every suspension point.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, f: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), PipelineError>> + Send + 'static,
    {
        let token = self.token.clone();
        self.workers.spawn(async move {
            debug!(worker = name, "worker started");
            let result = f(token).await;
            match &result {
                Ok(()) => debug!(worker = name, "worker exited"),
                Err(e) => error!(worker = name, error = %e, "worker failed"),
            }
            result
        });
    }

    /// Spawn the interrupt watcher: an external interrupt (Ctrl-C) cancels
    /// the group and counts as a clean shutdown.
    pub fn spawn_interrupt_watcher(&mut self) {
        self.spawn("interrupt-watcher", |token| async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "interrupt handler unavailable");
                    } else {
                        info!("interrupt received; starting shutdown");
                    }
                    token.cancel();
                }
            }
            Ok(())
        });
    }

    /// Wait for all workers to exit.
    ///
    /// The first worker error cancels the rest and becomes the return
    /// value. Once cancellation is observed, the remaining workers share
    /// one drain window before being aborted: the deadline is fixed when
    /// cancellation is first seen, not per straggler.
    pub async fn join(mut self) -> Result<(), PipelineError> {
        let mut first_error: Option<PipelineError> = None;
        let mut drain_deadline: Option<tokio::time::Instant> = None;

        loop {
            let next = if self.token.is_cancelled() {
                let deadline = *drain_deadline
                    .get_or_insert_with(|| tokio::time::Instant::now() + self.drain_timeout);
                match tokio::time::timeout_at(deadline, self.workers.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("drain timeout exceeded; aborting remaining workers");
                        self.workers.abort_all();
                        while self.workers.join_next().await.is_some() {}
                        break;
                    }
                }
            } else {
                self.workers.join_next().await
            };

            match next {
                None => break,
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    self.token.cancel();
                }
                Some(Err(join_err)) if join_err.is_cancelled() => {}
                Some(Err(join_err)) => {
                    if first_error.is_none() {
                        first_error = Some(PipelineError::WorkerPanic(join_err.to_string()));
                    }
                    self.token.cancel();
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("all workers drained");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftnet_ledger::LedgerError;

    fn supervisor() -> ShutdownSupervisor {
        ShutdownSupervisor::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn clean_join_when_all_workers_finish() {
        let mut sup = supervisor();
        sup.spawn("quick", |_| async { Ok(()) });
        sup.spawn("quick-too", |_| async { Ok(()) });
        assert!(sup.join().await.is_ok());
    }

    #[tokio::test]
    async fn first_error_cancels_the_group() {
        let mut sup = supervisor();
        let token = sup.token();

        sup.spawn("cooperative", |token| async move {
            token.cancelled().await;
            Ok(())
        });
        sup.spawn("failing", |_| async {
            Err(PipelineError::Ledger(LedgerError::Submission(
                "rejected".into(),
            )))
        });

        let err = sup.join().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Ledger(LedgerError::Submission(_))
        ));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_is_a_clean_exit() {
        let mut sup = supervisor();
        sup.spawn("cooperative", |token| async move {
            token.cancelled().await;
            Ok(())
        });
        sup.cancel();
        assert!(sup.join().await.is_ok());
    }

    #[tokio::test]
    async fn unresponsive_worker_is_aborted_after_drain_timeout() {
        let mut sup = supervisor();
        sup.spawn("stuck", |_| async {
            // Ignores the token entirely.
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        sup.cancel();
        // Must return despite the stuck worker, and without an error: the
        // shutdown itself was clean.
        assert!(sup.join().await.is_ok());
    }

    #[tokio::test]
    async fn drain_window_is_shared_by_all_stragglers() {
        let mut sup = supervisor();
        for name in ["stuck-a", "stuck-b", "stuck-c"] {
            sup.spawn(name, |_| async {
                // All three ignore the token.
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            });
        }
        sup.cancel();

        // One 200ms drain window for the whole group, not one per worker.
        let started = std::time::Instant::now();
        assert!(sup.join().await.is_ok());
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn worker_panic_is_reported() {
        let mut sup = supervisor();
        sup.spawn("panicking", |_| async { panic!("boom") });
        let err = sup.join().await.unwrap_err();
        assert!(matches!(err, PipelineError::WorkerPanic(_)));
    }
}
