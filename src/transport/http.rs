use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::signer::{BearerSigner, RequestSigner, UnsignedSigner};
use crate::transport::{TransportFactory, TransportSettings, VendorRequest, VendorTransport};
use crate::types::Result;

/// Longest slice of an error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// JSON-over-HTTP vendor transport
///
/// Every call is a `POST <endpoint>/<action>` with the parameters as the
/// JSON body. A `{"error": {"code", "message"}}` body is reported as an API
/// error even on HTTP 200.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    signer: Arc<dyn RequestSigner>,
}

impl HttpTransport {
    /// Create a transport, signing with the bearer token when one is set
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let signer: Arc<dyn RequestSigner> = match settings.token.as_deref() {
            Some(token) if !token.is_empty() => Arc::new(BearerSigner::new(token)?),
            _ => Arc::new(UnsignedSigner),
        };
        Self::with_signer(settings, signer)
    }

    /// Create a transport with a custom request signer
    pub fn with_signer(settings: &TransportSettings, signer: Arc<dyn RequestSigner>) -> Result<Self> {
        if settings.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint is required".into()));
        }
        let endpoint = Url::parse(settings.endpoint.trim())?;
        if endpoint.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "endpoint {} cannot be used as a base URL",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            signer,
        })
    }

    fn action_url(&self, action: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .push(action);
        Ok(url)
    }
}

#[async_trait]
impl VendorTransport for HttpTransport {
    async fn call(&self, request: VendorRequest) -> Result<Value> {
        let url = self.action_url(&request.action)?;
        let body = serde_json::to_vec(&request.params)?;

        let builder = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body.clone());
        let builder = self.signer.sign(builder, &request.action, &body)?;

        let response = builder.send().await.map_err(|e| {
            Error::Transport(format!("Failed to send {} request: {}", request.action, e))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::Transport(format!("Failed to read {} response: {}", request.action, e))
        })?;
        debug!(action = %request.action, status = status.as_u16(), "Vendor response received");

        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{} returned HTTP {}: {}",
                request.action,
                status,
                truncate(&text)
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            Error::AmbiguousResponse(format!("{} returned invalid JSON: {}", request.action, e))
        })?;

        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            let code = err
                .get("code")
                .map(|c| match c {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "Unknown".to_string());
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(Error::api(code, message));
        }

        Ok(value)
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Factory handing every provider its own [`HttpTransport`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(&self, settings: &TransportSettings) -> Result<Arc<dyn VendorTransport>> {
        Ok(Arc::new(HttpTransport::new(settings)?))
    }
}
