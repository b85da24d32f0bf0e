use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::OperationContext;
use crate::deploy::types::{DeploymentTask, TaskStatus};
use crate::error::Error;
use crate::types::Result;

/// Default delay between two task reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default upper bound on one whole wait
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Reads the current state of a vendor deployment task
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskReader: Send + Sync {
    async fn read_task(&self, ctx: &OperationContext, task_id: &str) -> Result<DeploymentTask>;
}

/// Fixed-interval poller for asynchronous deployments
#[derive(Debug, Clone, Copy)]
pub struct TaskPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Default for TaskPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl TaskPoller {
    /// Poller reading every `interval`, bounded by [`DEFAULT_POLL_TIMEOUT`]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }

    /// Bound the whole wait, on top of any deadline the caller's context has
    ///
    /// `None` leaves the caller's context as the only bound.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delay between two task reads
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on one whole wait, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Poll `task_id` until it reaches a terminal state
    ///
    /// The context is checked before every read, so an already-cancelled
    /// context returns without reading. Sleeps wake early on cancellation.
    pub async fn wait<R>(
        &self,
        ctx: &OperationContext,
        reader: &R,
        task_id: &str,
    ) -> Result<DeploymentTask>
    where
        R: TaskReader + ?Sized,
    {
        let ctx = match self.timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };

        let mut attempt: u32 = 0;
        loop {
            ctx.check()?;
            attempt += 1;

            let task = ctx.run(reader.read_task(&ctx, task_id)).await?;
            match task.effective_status() {
                TaskStatus::Succeeded => {
                    info!(task_id = %task_id, attempt, "Deployment task succeeded");
                    return Ok(task);
                }
                TaskStatus::Failed => {
                    warn!(task_id = %task_id, attempt, "Deployment task failed");
                    return Err(Error::TaskFailed {
                        id: task_id.to_string(),
                        message: task
                            .message
                            .unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                status => {
                    debug!(task_id = %task_id, attempt, status = %status, "Deployment task pending");
                }
            }

            ctx.sleep(self.interval).await?;
        }
    }
}
