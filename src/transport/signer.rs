use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;

use crate::error::Error;
use crate::types::Result;

/// Authenticates an outgoing vendor request
///
/// Vendor signature schemes live outside this crate; they plug in here.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: RequestBuilder, action: &str, body: &[u8]) -> Result<RequestBuilder>;
}

/// Sends requests as they are
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsignedSigner;

impl RequestSigner for UnsignedSigner {
    fn sign(&self, request: RequestBuilder, _action: &str, _body: &[u8]) -> Result<RequestBuilder> {
        Ok(request)
    }
}

/// Adds an `Authorization: Bearer` header
pub struct BearerSigner {
    header: HeaderValue,
}

impl BearerSigner {
    pub fn new(token: &str) -> Result<Self> {
        let mut header = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| Error::Config(format!("Invalid token: {}", e)))?;
        header.set_sensitive(true);
        Ok(Self { header })
    }
}

impl RequestSigner for BearerSigner {
    fn sign(&self, request: RequestBuilder, _action: &str, _body: &[u8]) -> Result<RequestBuilder> {
        Ok(request.header(AUTHORIZATION, self.header.clone()))
    }
}
