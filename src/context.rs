use std::future::Future;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{CancelReason, Error};
use crate::types::Result;

/// Cancellable operation context threaded through every vendor call
///
/// Cloning shares the cancellation token; derived contexts created with
/// [`OperationContext::with_timeout`] inherit the parent's token and keep the
/// earlier of the two deadlines.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Create a context with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context that additionally expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a context that additionally expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Effective deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Reason the context is done, if it is
    pub fn done(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Fail with a cancellation error if the context is done
    pub fn check(&self) -> Result<()> {
        match self.done() {
            Some(reason) => Err(Error::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the context finishes first
    ///
    /// The future is dropped on cancellation, which aborts in-flight HTTP
    /// requests made through reqwest.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::Cancelled(CancelReason::Cancelled)),
            _ = sleep_until_opt(self.deadline) => Err(Error::Cancelled(CancelReason::DeadlineExceeded)),
            out = fut => out,
        }
    }

    /// Sleep for `duration`, waking early with an error if the context finishes
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.run(async {
            time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
