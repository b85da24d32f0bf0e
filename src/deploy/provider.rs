use async_trait::async_trait;

use crate::context::OperationContext;
use crate::telemetry::Logger;
use crate::types::{DeployResult, Result};

/// Live resource a certificate can be bound to
#[async_trait]
pub trait DeploymentTarget: Send + Sync {
    /// Bind the certificate to the configured resource(s)
    ///
    /// Not retried internally: "attach" style operations could create a
    /// duplicate attachment on every retry.
    async fn deploy(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult>;

    /// Replace the logger; `None` installs the discard logger
    fn set_logger(&mut self, logger: Option<Logger>);
}
