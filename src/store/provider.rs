use async_trait::async_trait;

use crate::context::OperationContext;
use crate::telemetry::Logger;
use crate::types::{Result, UploadResult};

/// Certificate inventory of a target system
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Register a certificate, reusing an equivalent existing object
    ///
    /// Calling this twice with the same certificate returns the same handle
    /// and leaves a single object in the inventory.
    async fn upload(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<UploadResult>;

    /// Replace the logger; `None` installs the discard logger
    fn set_logger(&mut self, logger: Option<Logger>);
}
