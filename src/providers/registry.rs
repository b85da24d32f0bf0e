use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::config::{Settings, TargetConfig};
use crate::deploy::{DeploymentTarget, TaskPoller};
use crate::error::Error;
use crate::providers::cdn::{CdnConfig, CdnTarget};
use crate::providers::certstore::{cloud_cert_store, CertStoreConfig};
use crate::providers::loadbalancer::{LoadBalancerConfig, LoadBalancerTarget};
use crate::providers::panel::{PanelConfig, PanelTarget};
use crate::providers::waf::{WafConfig, WafTarget};
use crate::store::{CertificateStore, DedupUploader, MockInventory};
use crate::telemetry::Logger;
use crate::transport::{HttpTransportFactory, TransportFactory};
use crate::types::Result;

/// Every provider the registry can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// In-memory certificate store
    Mock,
    CloudCertStore,
    CloudLoadBalancer,
    CloudCdn,
    CloudWaf,
    HostingPanel,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Mock,
        ProviderKind::CloudCertStore,
        ProviderKind::CloudLoadBalancer,
        ProviderKind::CloudCdn,
        ProviderKind::CloudWaf,
        ProviderKind::HostingPanel,
    ];

    /// Discriminator used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::CloudCertStore => "cloud-certstore",
            ProviderKind::CloudLoadBalancer => "cloud-loadbalancer",
            ProviderKind::CloudCdn => "cloud-cdn",
            ProviderKind::CloudWaf => "cloud-waf",
            ProviderKind::HostingPanel => "hosting-panel",
        }
    }

    /// Whether the provider resolves to a [`CertificateStore`]
    pub fn is_store(&self) -> bool {
        matches!(self, ProviderKind::Mock | ProviderKind::CloudCertStore)
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnsupportedProvider(wanted.to_string()))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved provider instance
pub enum Provider {
    Store(Box<dyn CertificateStore>),
    Target(Box<dyn DeploymentTarget>),
}

impl Provider {
    pub fn is_store(&self) -> bool {
        matches!(self, Provider::Store(_))
    }

    /// The certificate store, or a configuration error for targets
    pub fn into_store(self) -> Result<Box<dyn CertificateStore>> {
        match self {
            Provider::Store(store) => Ok(store),
            Provider::Target(_) => Err(Error::Config(
                "provider is a deployment target, not a certificate store".into(),
            )),
        }
    }

    /// The deployment target, or a configuration error for stores
    pub fn into_target(self) -> Result<Box<dyn DeploymentTarget>> {
        match self {
            Provider::Target(target) => Ok(target),
            Provider::Store(_) => Err(Error::Config(
                "provider is a certificate store, not a deployment target".into(),
            )),
        }
    }

    /// Replace the logger of the wrapped instance; `None` discards
    pub fn set_logger(&mut self, logger: Option<Logger>) {
        match self {
            Provider::Store(store) => store.set_logger(logger),
            Provider::Target(target) => target.set_logger(logger),
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Store(_) => f.write_str("Provider::Store(..)"),
            Provider::Target(_) => f.write_str("Provider::Target(..)"),
        }
    }
}

fn default_mock_page_size() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct MockConfig {
    #[serde(default = "default_mock_page_size")]
    page_size: usize,
}

/// Builds provider instances from a discriminator and its settings
///
/// Every instance gets its own transport from the factory and a clone of
/// the registry's logger.
pub struct ProviderRegistry {
    logger: Logger,
    transports: Arc<dyn TransportFactory>,
    poller: TaskPoller,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            logger: Logger::discard(),
            transports: Arc::new(HttpTransportFactory),
            poller: TaskPoller::default(),
        }
    }
}

impl ProviderRegistry {
    /// Registry using HTTP transports and the discard logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger handed to every resolved instance
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Factory creating one transport per resolved instance
    pub fn with_transport_factory(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = transports;
        self
    }

    /// Poller used by targets that do not configure their own
    pub fn with_poller(mut self, poller: TaskPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Registry using the poll settings of `settings`
    pub fn from_settings(settings: &Settings) -> Self {
        Self::default().with_poller(settings.poller.poller())
    }

    /// Build the provider named by `discriminator`
    ///
    /// Unknown discriminators fail with [`Error::UnsupportedProvider`];
    /// invalid settings fail with [`Error::Config`] before any transport is
    /// created.
    pub fn resolve(&self, discriminator: &str, settings: &Value) -> Result<Provider> {
        let kind: ProviderKind = discriminator.parse()?;
        self.logger
            .in_scope(|| debug!(provider = kind.as_str(), "Resolving provider"));

        let mut provider = match kind {
            ProviderKind::Mock => {
                let config: MockConfig = parse_settings(kind, settings)?;
                Provider::Store(Box::new(DedupUploader::new(
                    "mock",
                    MockInventory::new(config.page_size),
                )))
            }
            ProviderKind::CloudCertStore => {
                let config: CertStoreConfig = parse_settings(kind, settings)?;
                config.validate()?;
                let transport = self.transports.create(&config.transport)?;
                Provider::Store(Box::new(cloud_cert_store(&config, transport)?))
            }
            ProviderKind::CloudLoadBalancer => {
                let config: LoadBalancerConfig = parse_settings(kind, settings)?;
                config.validate()?;
                let transport = self.transports.create(&config.transport)?;
                Provider::Target(Box::new(LoadBalancerTarget::new(config, transport)?))
            }
            ProviderKind::CloudCdn => {
                let config: CdnConfig = parse_settings(kind, settings)?;
                config.validate()?;
                let transport = self.transports.create(&config.transport)?;
                let poller = config.poller(self.poller);
                Provider::Target(Box::new(CdnTarget::new(config, transport)?.with_poller(poller)))
            }
            ProviderKind::CloudWaf => {
                let config: WafConfig = parse_settings(kind, settings)?;
                config.validate()?;
                let transport = self.transports.create(&config.transport)?;
                Provider::Target(Box::new(WafTarget::new(config, transport)?))
            }
            ProviderKind::HostingPanel => {
                let config: PanelConfig = parse_settings(kind, settings)?;
                config.validate()?;
                let transport = self.transports.create(&config.transport)?;
                Provider::Target(Box::new(PanelTarget::new(config, transport)?))
            }
        };

        provider.set_logger(Some(self.logger.clone()));
        Ok(provider)
    }

    /// Build the provider described by a configured target
    pub fn resolve_target(&self, target: &TargetConfig) -> Result<Provider> {
        self.resolve(&target.provider, &target.settings)
    }
}

fn parse_settings<T: DeserializeOwned>(kind: ProviderKind, settings: &Value) -> Result<T> {
    let value = match settings {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map_err(|e| Error::Config(format!("invalid {} settings: {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::test_support::self_signed;
    use crate::context::OperationContext;
    use crate::transport::{MockTransport, SharedTransportFactory};
    use serde_json::json;

    fn registry_with(transport: Arc<MockTransport>) -> ProviderRegistry {
        ProviderRegistry::new().with_transport_factory(Arc::new(SharedTransportFactory::new(transport)))
    }

    #[test]
    fn test_unknown_discriminator_fails_closed() {
        let err = ProviderRegistry::new()
            .resolve("ftp-server", &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(ref name) if name == "ftp-server"));
    }

    #[test]
    fn test_every_kind_round_trips_through_its_discriminator() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!("Cloud-CDN".parse::<ProviderKind>().unwrap(), ProviderKind::CloudCdn);
    }

    #[test]
    fn test_missing_settings_fail_before_transport() {
        let transport = Arc::new(MockTransport::new(|_| Ok(json!({}))));
        let registry = registry_with(transport.clone());

        let err = registry
            .resolve("cloud-loadbalancer", &json!({
                "endpoint": "https://lb.example.com",
                "resource_type": "listener"
            }))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = registry.resolve("cloud-waf", &json!({ "domain": 5 })).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_resolves_stores_and_targets() {
        let transport = Arc::new(MockTransport::new(|_| Ok(json!({}))));
        let registry = registry_with(transport);

        assert!(registry.resolve("mock", &Value::Null).unwrap().is_store());
        assert!(registry
            .resolve("cloud-certstore", &json!({ "endpoint": "https://certs.example.com" }))
            .unwrap()
            .is_store());
        let target = registry
            .resolve("hosting-panel", &json!({
                "endpoint": "https://panel.example.com",
                "site_name": "blog"
            }))
            .unwrap();
        assert!(!target.is_store());
        assert!(target.into_store().is_err());
    }

    #[tokio::test]
    async fn test_mock_store_deduplicates() {
        let store = ProviderRegistry::new()
            .resolve("mock", &json!({ "page_size": 2 }))
            .unwrap()
            .into_store()
            .unwrap();
        let fixture = self_signed(&["example.com"], 11);
        let ctx = OperationContext::new();

        let first = store.upload(&ctx, &fixture.cert_pem, &fixture.key_pem).await.unwrap();
        let again = store.upload(&ctx, &fixture.cert_pem, &fixture.key_pem).await.unwrap();
        assert_eq!(first.cert_id, "1");
        assert_eq!(again.cert_id, "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_registry_bounds_cdn_task_wait() {
        use crate::deploy::DEFAULT_POLL_TIMEOUT;
        use crate::error::CancelReason;
        use crate::transport::VendorRequest;
        use std::time::Duration;

        let transport = Arc::new(MockTransport::new(|req: &VendorRequest| {
            match req.action.as_str() {
                "ListCertificates" => Ok(json!({ "certificates": [] })),
                "UploadCertificate" => Ok(json!({ "location": "/v1/certificates/7" })),
                "BindCertificate" => Ok(json!({ "taskId": "task-7" })),
                _ => Ok(json!({ "task": { "id": "task-7", "status": "deploying" } })),
            }
        }));
        let target = registry_with(transport.clone())
            .resolve("cloud-cdn", &json!({
                "endpoint": "https://cdn.example.com",
                "secret": "shared-secret",
                "domains": ["static.example.com"]
            }))
            .unwrap()
            .into_target()
            .unwrap();
        let fixture = self_signed(&["static.example.com"], 21);

        let started = tokio::time::Instant::now();
        let err = target
            .deploy(&OperationContext::new(), &fixture.cert_pem, &fixture.key_pem)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled(CancelReason::DeadlineExceeded)));
        assert!(started.elapsed() >= DEFAULT_POLL_TIMEOUT);
        assert!(started.elapsed() < DEFAULT_POLL_TIMEOUT + Duration::from_secs(10));
        assert!(transport.count("GetDeploymentTask") > 1);
    }

    #[test]
    fn test_set_logger_none_is_safe() {
        let mut provider = ProviderRegistry::new().resolve("mock", &json!({})).unwrap();
        provider.set_logger(None);
        provider.set_logger(Some(Logger::discard()));
    }
}
