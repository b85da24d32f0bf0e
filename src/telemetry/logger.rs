use std::fmt;
use std::future::Future;
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::Dispatch;

use crate::error::Error;

/// Structured logger injected into providers
///
/// Wraps a `tracing` dispatcher. Every outbound vendor call is executed
/// inside it, so records go to the injected subscriber rather than whatever
/// global default happens to be installed. The default discards everything.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Logger that drops every record
    pub fn discard() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Logger backed by the given dispatcher
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Logger backed by a subscriber
    pub fn from_subscriber<S>(subscriber: S) -> Self
    where
        S: tracing::Subscriber + Send + Sync + 'static,
    {
        Self::from_dispatch(Dispatch::new(subscriber))
    }

    /// Normalise an optional logger, falling back to the discard logger
    pub fn or_discard(logger: Option<Logger>) -> Self {
        logger.unwrap_or_default()
    }

    /// Install this logger as the process-wide default dispatcher
    pub fn install_global(&self) -> Result<(), Error> {
        tracing::dispatcher::set_global_default(self.dispatch.clone()).map_err(|e| {
            Error::Config(format!("Failed to set global default subscriber: {}", e))
        })
    }

    /// Run `fut` with this logger as the active dispatcher
    pub fn scope<F: Future>(&self, fut: F) -> WithDispatch<F> {
        fut.with_subscriber(self.dispatch.clone())
    }

    /// Run a synchronous closure with this logger as the active dispatcher
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::discard()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::capturing_logger;
    use super::*;

    #[tokio::test]
    async fn test_scope_routes_records_to_injected_logger() {
        let (logger, writer) = capturing_logger();
        logger
            .scope(async {
                tracing::info!(provider = "mock", "vendor call");
            })
            .await;
        let text = writer.contents();
        assert!(text.contains("vendor call"));
        assert!(text.contains("provider="));
        assert!(text.contains("mock"));
    }

    #[test]
    fn test_missing_logger_falls_back_to_discard() {
        let logger = Logger::or_discard(None);
        logger.in_scope(|| tracing::error!("nobody listens"));
    }
}
