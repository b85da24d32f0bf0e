use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::transport::{TransportFactory, TransportSettings, VendorRequest, VendorTransport};
use crate::types::Result;

type Handler = dyn Fn(&VendorRequest) -> Result<Value> + Send + Sync;

/// Scripted vendor transport for testing
///
/// Answers every call with the handler and records the request.
pub struct MockTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<VendorRequest>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&VendorRequest) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<VendorRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Action names received so far, in order
    pub fn actions(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.action).collect()
    }

    /// Number of calls made for `action`
    pub fn count(&self, action: &str) -> usize {
        self.requests().iter().filter(|r| r.action == action).count()
    }
}

#[async_trait]
impl VendorTransport for MockTransport {
    async fn call(&self, request: VendorRequest) -> Result<Value> {
        debug!("Mock transport: {}", request.action);
        let response = (self.handler)(&request);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        response
    }
}

/// Factory returning the same transport to every provider
#[derive(Clone)]
pub struct SharedTransportFactory {
    transport: Arc<dyn VendorTransport>,
}

impl SharedTransportFactory {
    pub fn new(transport: Arc<dyn VendorTransport>) -> Self {
        Self { transport }
    }
}

impl TransportFactory for SharedTransportFactory {
    fn create(&self, _settings: &TransportSettings) -> Result<Arc<dyn VendorTransport>> {
        Ok(self.transport.clone())
    }
}
