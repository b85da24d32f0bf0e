pub mod http;
pub mod mock;
pub mod signer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::types::Result;

pub use http::{HttpTransport, HttpTransportFactory};
pub use mock::{MockTransport, SharedTransportFactory};
pub use signer::{BearerSigner, RequestSigner, UnsignedSigner};

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One vendor API call: an action name and its JSON parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorRequest {
    pub action: String,
    pub params: Value,
}

impl VendorRequest {
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }
}

/// Sends vendor calls and returns the decoded response body
///
/// Implementations map transport failures to `Error::Transport` and
/// vendor-reported failures to `Error::Api`.
#[async_trait]
pub trait VendorTransport: Send + Sync {
    async fn call(&self, request: VendorRequest) -> Result<Value>;
}

/// Endpoint and credentials shared by every adapter's configuration
#[derive(Clone, Deserialize, Serialize)]
pub struct TransportSettings {
    /// Base URL of the vendor API
    #[serde(default)]
    pub endpoint: String,
    /// Bearer token, when the vendor uses one
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl TransportSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSettings")
            .field("endpoint", &self.endpoint)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Builds one transport per provider instance
pub trait TransportFactory: Send + Sync {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn VendorTransport>>;
}
