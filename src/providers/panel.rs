use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::cert;
use crate::context::OperationContext;
use crate::deploy::DeploymentTarget;
use crate::error::Error;
use crate::providers::client::VendorClient;
use crate::telemetry::Logger;
use crate::transport::{TransportSettings, VendorTransport};
use crate::types::{DeployResult, ResourceType, Result};

pub const PROVIDER: &str = "hosting-panel";

/// Container the panel expects the certificate in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateFormat {
    #[default]
    Pem,
    Pfx,
    Jks,
}

fn default_resource_type() -> ResourceType {
    ResourceType::Website
}

fn default_alias() -> String {
    "certimate".to_string()
}

/// Settings of a hosting panel website target
#[derive(Clone, Deserialize, Serialize)]
pub struct PanelConfig {
    #[serde(flatten)]
    pub transport: TransportSettings,
    #[serde(default = "default_resource_type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub format: CertificateFormat,
    #[serde(default)]
    pub pfx_password: String,
    #[serde(default = "default_alias")]
    pub jks_alias: String,
    #[serde(default)]
    pub jks_key_password: String,
    #[serde(default)]
    pub jks_store_password: String,
}

impl fmt::Debug for PanelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelConfig")
            .field("transport", &self.transport)
            .field("resource_type", &self.resource_type)
            .field("site_name", &self.site_name)
            .field("format", &self.format)
            .field("jks_alias", &self.jks_alias)
            .finish_non_exhaustive()
    }
}

impl PanelConfig {
    /// Site name is required, and JKS output also needs both passwords
    pub fn validate(&self) -> Result<()> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(Error::Config(format!("{}: endpoint is required", PROVIDER)));
        }
        if self.resource_type != ResourceType::Website {
            return Err(Error::Config(format!(
                "{}: unsupported resource type {}",
                PROVIDER, self.resource_type
            )));
        }
        if self.site_name.trim().is_empty() {
            return Err(Error::Config(format!("{}: site_name is required", PROVIDER)));
        }
        if self.format == CertificateFormat::Jks {
            if self.jks_alias.trim().is_empty() {
                return Err(Error::Config(format!("{}: jks_alias is required", PROVIDER)));
            }
            if self.jks_key_password.is_empty() || self.jks_store_password.is_empty() {
                return Err(Error::Config(format!(
                    "{}: jks_key_password and jks_store_password are required",
                    PROVIDER
                )));
            }
        }
        Ok(())
    }
}

/// Hosting panel target setting a website's certificate
pub struct PanelTarget {
    config: PanelConfig,
    client: VendorClient,
    logger: Logger,
}

impl PanelTarget {
    pub fn new(config: PanelConfig, transport: Arc<dyn VendorTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: VendorClient::new(PROVIDER, transport),
            config,
            logger: Logger::discard(),
        })
    }

    /// Request parameters for the configured container format
    fn payload(&self, cert_pem: &str, key_pem: &str) -> Result<Value> {
        let site = self.config.site_name.trim();
        let payload = match self.config.format {
            CertificateFormat::Pem => {
                let (server, chain) = cert::extract_chain(cert_pem)?;
                cert::parse_private_key(key_pem)?;
                json!({
                    "siteName": site,
                    "format": "pem",
                    "certificate": server,
                    "chain": chain,
                    "privateKey": key_pem,
                })
            }
            CertificateFormat::Pfx => {
                let pfx = cert::to_pfx(cert_pem, key_pem, &self.config.pfx_password)?;
                json!({
                    "siteName": site,
                    "format": "pfx",
                    "bundle": STANDARD.encode(pfx),
                    "password": self.config.pfx_password,
                })
            }
            CertificateFormat::Jks => {
                let jks = cert::to_jks(
                    cert_pem,
                    key_pem,
                    &self.config.jks_alias,
                    &self.config.jks_key_password,
                    &self.config.jks_store_password,
                )?;
                json!({
                    "siteName": site,
                    "format": "jks",
                    "bundle": STANDARD.encode(jks),
                    "alias": self.config.jks_alias,
                    "keyPassword": self.config.jks_key_password,
                    "storePassword": self.config.jks_store_password,
                })
            }
        };
        Ok(payload)
    }

    async fn deploy_inner(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        let payload = self.payload(cert_pem, key_pem)?;
        let _: Value = self
            .client
            .call(ctx, "SetSiteCertificate", &payload)
            .await?;
        info!(
            provider = PROVIDER,
            site = %self.config.site_name,
            format = ?self.config.format,
            "Website certificate set"
        );
        Ok(DeployResult::default().with_bound(vec![self.config.site_name.trim().to_string()]))
    }
}

#[async_trait]
impl DeploymentTarget for PanelTarget {
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
    }
}
