//! Bounded poll-based waiting for dispatched operations

use std::time::Duration;

use tokio::time::Instant;

use super::{DispatchHandle, HostApi};

/// Result of checking or waiting on a set of handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// No handle is running any more
    Finished,
    /// The wait gave up with handles still running
    TimedOut,
    /// A single check found handles still running
    StillRunning,
}

/// Poll interval and optional upper bound on the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// One non-blocking look at the handles
pub async fn check_completion<H>(host: &H, handles: &[DispatchHandle]) -> WaitOutcome
where
    H: HostApi + ?Sized,
{
    for handle in handles {
        if host.is_running(*handle).await {
            return WaitOutcome::StillRunning;
        }
    }
    WaitOutcome::Finished
}

/// Poll until every handle has finished or `max_wait` elapses
pub async fn wait_for_completion<H>(
    host: &H,
    handles: &[DispatchHandle],
    poll: &PollConfig,
) -> WaitOutcome
where
    H: HostApi + ?Sized,
{
    let started = Instant::now();
    loop {
        if check_completion(host, handles).await == WaitOutcome::Finished {
            return WaitOutcome::Finished;
        }
        if let Some(max_wait) = poll.max_wait {
            if started.elapsed() >= max_wait {
                tracing::debug!(
                    handles = handles.len(),
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Gave up waiting for operations"
                );
                return WaitOutcome::TimedOut;
            }
        }
        tokio::time::sleep(poll.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::FormulaSource;
    use crate::host::DispatchRequest;
    use crate::models::{ActorAttributes, TargetNode, WorkerHost};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Handles finish at fixed instants measured from construction
    struct Clocked {
        start: Instant,
        finish: Vec<Duration>,
    }

    #[async_trait]
    impl HostApi for Clocked {
        async fn target(&self, _name: &str) -> Option<TargetNode> {
            None
        }

        async fn host(&self, _name: &str) -> Option<WorkerHost> {
            None
        }

        async fn actor(&self) -> ActorAttributes {
            ActorAttributes::default()
        }

        fn formulas(&self) -> Option<Arc<dyn FormulaSource>> {
            None
        }

        async fn dispatch(&self, _request: &DispatchRequest) -> Option<DispatchHandle> {
            None
        }

        async fn is_running(&self, handle: DispatchHandle) -> bool {
            self.start.elapsed() < self.finish[handle.0 as usize]
        }
    }

    fn clocked(finish_secs: &[u64]) -> Clocked {
        Clocked {
            start: Instant::now(),
            finish: finish_secs.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_all_finished() {
        let host = clocked(&[3, 7]);
        let poll = PollConfig::new(Duration::from_secs(1));
        let outcome = wait_for_completion(&host, &[DispatchHandle(0), DispatchHandle(1)], &poll).await;
        assert_eq!(outcome, WaitOutcome::Finished);
        assert!(host.start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let host = clocked(&[100]);
        let poll = PollConfig::new(Duration::from_secs(1)).with_max_wait(Duration::from_secs(5));
        let outcome = wait_for_completion(&host, &[DispatchHandle(0)], &poll).await;
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(host.start.elapsed() < Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_check() {
        let host = clocked(&[0, 10]);
        assert_eq!(
            check_completion(&host, &[DispatchHandle(0)]).await,
            WaitOutcome::Finished
        );
        assert_eq!(
            check_completion(&host, &[DispatchHandle(0), DispatchHandle(1)]).await,
            WaitOutcome::StillRunning
        );
        assert_eq!(check_completion(&host, &[]).await, WaitOutcome::Finished);
    }
}
