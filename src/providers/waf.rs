use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::context::OperationContext;
use crate::deploy::DeploymentTarget;
use crate::error::Error;
use crate::providers::certstore::{VendorInventory, DEFAULT_PAGE_SIZE};
use crate::providers::client::VendorClient;
use crate::store::{check_upload_input, CertificateStore, DedupUploader};
use crate::telemetry::Logger;
use crate::transport::{TransportSettings, VendorTransport};
use crate::types::{DeployResult, ResourceType, Result};

pub const PROVIDER: &str = "cloud-waf";

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Settings of a web application firewall target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WafConfig {
    #[serde(flatten)]
    pub transport: TransportSettings,
    /// `cloud-server` or `premium-host`
    pub resource_type: ResourceType,
    /// Protected domain whose host entry receives the certificate
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl WafConfig {
    /// Reject settings the target cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(Error::Config(format!("{}: endpoint is required", PROVIDER)));
        }
        if self.domain.trim().is_empty() {
            return Err(Error::Config(format!("{}: domain is required", PROVIDER)));
        }
        self.mode().map(|_| ())
    }

    fn mode(&self) -> Result<&'static str> {
        match self.resource_type {
            ResourceType::CloudServer => Ok("cloud"),
            ResourceType::PremiumHost => Ok("premium"),
            other => Err(Error::Config(format!(
                "{}: unsupported resource type {}",
                PROVIDER, other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Host {
    id: String,
    hostname: String,
    #[serde(default)]
    certificate_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListHostsResponse {
    #[serde(default)]
    hosts: Vec<Host>,
}

/// WAF target binding a certificate to one protected host
pub struct WafTarget {
    config: WafConfig,
    client: VendorClient,
    uploader: DedupUploader<VendorInventory>,
    logger: Logger,
}

impl WafTarget {
    pub fn new(config: WafConfig, transport: Arc<dyn VendorTransport>) -> Result<Self> {
        config.validate()?;
        let client = VendorClient::new(PROVIDER, transport);
        Ok(Self {
            uploader: DedupUploader::new(
                PROVIDER,
                VendorInventory::new(client.clone(), config.page_size),
            ),
            client,
            config,
            logger: Logger::discard(),
        })
    }

    async fn find_host(&self, ctx: &OperationContext, mode: &str) -> Result<Host> {
        let domain = self.config.domain.trim();
        let response: ListHostsResponse = self
            .client
            .call(ctx, "ListHosts", &json!({ "mode": mode, "hostname": domain }))
            .await?;

        response
            .hosts
            .into_iter()
            .find(|h| h.hostname.eq_ignore_ascii_case(domain))
            .ok_or_else(|| {
                Error::api(
                    "HostNotFound",
                    format!("no {} host protects {}", mode, domain),
                )
            })
    }

    async fn deploy_inner(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        let mode = self.config.mode()?;
        check_upload_input(cert_pem, key_pem)?;
        let host = self.find_host(ctx, mode).await?;
        let upload = self.uploader.upload(ctx, cert_pem, key_pem).await?;

        if host.certificate_id.as_deref() == Some(upload.cert_id.as_str()) {
            info!(provider = PROVIDER, host = %host.id, "Host already serves certificate");
        } else {
            let _: Value = self
                .client
                .call(
                    ctx,
                    "UpdateHost",
                    &json!({
                        "mode": mode,
                        "hostId": host.id,
                        "certificateId": upload.cert_id,
                        "certificateName": upload.cert_name,
                    }),
                )
                .await?;
            info!(provider = PROVIDER, host = %host.id, "Host certificate updated");
        }

        Ok(DeployResult::default()
            .with_upload(upload)
            .with_bound(vec![host.id]))
    }
}

#[async_trait]
impl DeploymentTarget for WafTarget {
    async fn deploy(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        self.logger
            .scope(self.deploy_inner(ctx, cert_pem, key_pem))
            .await
    }

    fn set_logger(&mut self, logger: Option<Logger>) {
        self.logger = Logger::or_discard(logger);
        self.uploader.set_logger(Some(self.logger.clone()));
    }
}
