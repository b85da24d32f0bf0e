use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::OperationContext;
use crate::error::Error;
use crate::transport::{VendorRequest, VendorTransport};
use crate::types::Result;

/// Typed wrapper over a vendor transport
///
/// Every call is raced against the operation context and logged with the
/// provider and action only. Parameters are never logged since they carry
/// key material.
#[derive(Clone)]
pub struct VendorClient {
    provider: &'static str,
    transport: Arc<dyn VendorTransport>,
}

impl VendorClient {
    /// Client tagging every call with `provider`
    pub fn new(provider: &'static str, transport: Arc<dyn VendorTransport>) -> Self {
        Self {
            provider,
            transport,
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Call `action` and decode the response body into `T`
    pub async fn call<P, T>(&self, ctx: &OperationContext, action: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        debug!(provider = self.provider, action, "Calling vendor API");

        let value = ctx
            .run(self.transport.call(VendorRequest::new(action, params)))
            .await
            .map_err(|e| {
                warn!(provider = self.provider, action, error = %e, "Vendor API call failed");
                e
            })?;

        serde_json::from_value(value).map_err(|e| {
            Error::AmbiguousResponse(format!(
                "{} {} returned an unexpected body: {}",
                self.provider, action, e
            ))
        })
    }
}
