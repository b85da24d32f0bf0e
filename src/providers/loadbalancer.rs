use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cert::{self, Certificate};
use crate::context::OperationContext;
use crate::deploy::{bind_all, rebind_sni, DeploymentTarget, SniCertificate};
use crate::error::Error;
use crate::providers::certstore::{VendorInventory, DEFAULT_PAGE_SIZE};
use crate::providers::client::VendorClient;
use crate::store::{CertificateStore, DedupUploader};
use crate::telemetry::Logger;
use crate::transport::{TransportSettings, VendorTransport};
use crate::types::{DeployResult, ResourceType, Result, UploadResult};

pub const PROVIDER: &str = "cloud-loadbalancer";

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Settings of a cloud load balancer target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadBalancerConfig {
    #[serde(flatten)]
    pub transport: TransportSettings,
    pub resource_type: ResourceType,
    /// Certificate object to overwrite, for [`ResourceType::Certificate`]
    #[serde(default)]
    pub certificate_id: Option<String>,
    /// Load balancer whose TLS listeners are all rebound
    #[serde(default)]
    pub load_balancer_id: Option<String>,
    /// Single listener to rebind
    #[serde(default)]
    pub listener_id: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn required<'a>(value: &'a Option<String>, field: &str, resource: ResourceType) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config(format!(
            "{}: {} is required for resource type {}",
            PROVIDER, field, resource
        ))),
    }
}

impl LoadBalancerConfig {
    /// The identifier matching `resource_type` must be set
    pub fn validate(&self) -> Result<()> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(Error::Config(format!("{}: endpoint is required", PROVIDER)));
        }
        match self.resource_type {
            ResourceType::Certificate => {
                required(&self.certificate_id, "certificate_id", self.resource_type)?;
            }
            ResourceType::LoadBalancer => {
                required(&self.load_balancer_id, "load_balancer_id", self.resource_type)?;
            }
            ResourceType::Listener => {
                required(&self.listener_id, "listener_id", self.resource_type)?;
            }
            other => {
                return Err(Error::Config(format!(
                    "{}: unsupported resource type {}",
                    PROVIDER, other
                )))
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachedCertificate {
    id: String,
    #[serde(default)]
    domains: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Listener {
    id: String,
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    sni_enabled: bool,
    #[serde(default)]
    default_certificate_id: Option<String>,
    #[serde(default)]
    sni_certificates: Vec<AttachedCertificate>,
}

impl Listener {
    fn terminates_tls(&self) -> bool {
        matches!(
            self.protocol.to_ascii_lowercase().as_str(),
            "https" | "ssl" | "tls" | "quic" | "terminated_https"
        )
    }
}

impl AsRef<str> for Listener {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Deserialize)]
struct ListListenersResponse {
    #[serde(default)]
    listeners: Vec<Listener>,
}

#[derive(Debug, Deserialize)]
struct DescribeListenerResponse {
    listener: Listener,
}

#[derive(Debug, Default, Deserialize)]
struct ReplaceCertificateResponse {
    #[serde(default)]
    name: Option<String>,
}

/// Load balancer target: direct replace, whole-balancer fan-out or one listener
pub struct LoadBalancerTarget {
    config: LoadBalancerConfig,
    client: VendorClient,
    inventory: VendorInventory,
    uploader: DedupUploader<VendorInventory>,
    logger: Logger,
}

impl LoadBalancerTarget {
    /// Validates `config` before building the target
    pub fn new(config: LoadBalancerConfig, transport: Arc<dyn VendorTransport>) -> Result<Self> {
        config.validate()?;
        let client = VendorClient::new(PROVIDER, transport);
        let inventory = VendorInventory::new(client.clone(), config.page_size);
        Ok(Self {
            uploader: DedupUploader::new(PROVIDER, inventory.clone()),
            inventory,
            client,
            config,
            logger: Logger::discard(),
        })
    }

    async fn replace_certificate(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        let cert_id = required(&self.config.certificate_id, "certificate_id", ResourceType::Certificate)?;
        cert::parse_certificate(cert_pem)?;

        let response: Option<ReplaceCertificateResponse> = self
            .client
            .call(
                ctx,
                "ReplaceCertificate",
                &json!({
                    "certificateId": cert_id,
                    "certificate": cert_pem,
                    "privateKey": key_pem,
                }),
            )
            .await?;
        info!(provider = PROVIDER, cert_id = %cert_id, "Certificate content replaced");

        let name = response.and_then(|r| r.name).unwrap_or_default();
        Ok(DeployResult::default()
            .with_upload(UploadResult::new(cert_id, name))
            .with_bound(vec![cert_id.to_string()]))
    }

    async fn deploy_load_balancer(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        let lb_id = required(&self.config.load_balancer_id, "load_balancer_id", ResourceType::LoadBalancer)?;
        let certificate = cert::parse_certificate(cert_pem)?;

        let response: ListListenersResponse = self
            .client
            .call(ctx, "ListListeners", &json!({ "loadBalancerId": lb_id }))
            .await?;
        let listeners: Vec<Listener> = response
            .listeners
            .into_iter()
            .filter(Listener::terminates_tls)
            .collect();
        if listeners.is_empty() {
            return Err(Error::Config(format!(
                "{}: load balancer {} has no TLS listeners",
                PROVIDER, lb_id
            )));
        }
        debug!(provider = PROVIDER, load_balancer = %lb_id, listeners = listeners.len(), "Resolved listeners");

        let upload = self.uploader.upload(ctx, cert_pem, key_pem).await?;
        let bound = bind_all(ctx, &listeners, |listener| {
            self.bind_listener(ctx, listener, &upload, &certificate)
        })
        .await?;

        Ok(DeployResult::default().with_upload(upload).with_bound(bound))
    }

    async fn deploy_listener(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        let listener_id = required(&self.config.listener_id, "listener_id", ResourceType::Listener)?;
        let certificate = cert::parse_certificate(cert_pem)?;

        let response: DescribeListenerResponse = self
            .client
            .call(ctx, "DescribeListener", &json!({ "listenerId": listener_id }))
            .await?;

        let upload = self.uploader.upload(ctx, cert_pem, key_pem).await?;
        self.bind_listener(ctx, &response.listener, &upload, &certificate)
            .await?;

        Ok(DeployResult::default()
            .with_upload(upload)
            .with_bound(vec![listener_id.to_string()]))
    }

    /// Point the listener at the uploaded certificate
    ///
    /// SNI listeners keep every alternate certificate serving other names.
    async fn bind_listener(
        &self,
        ctx: &OperationContext,
        listener: &Listener,
        upload: &UploadResult,
        certificate: &Certificate,
    ) -> Result<()> {
        let default_matches =
            listener.default_certificate_id.as_deref() == Some(upload.cert_id.as_str());
        let mut params = json!({
            "listenerId": listener.id,
            "defaultCertificateId": upload.cert_id,
        });

        if listener.sni_enabled {
            let attached = self.attached_with_domains(ctx, &listener.sni_certificates).await?;
            let plan = rebind_sni(
                &attached,
                SniCertificate::new(upload.cert_id.clone(), certificate.subject_alt_names.clone()),
            );
            if default_matches && plan.is_noop(&attached) {
                info!(provider = PROVIDER, listener = %listener.id, "Listener already serves certificate");
                return Ok(());
            }
            if !plan.replaced.is_empty() {
                debug!(
                    provider = PROVIDER,
                    listener = %listener.id,
                    replaced = ?plan.replaced,
                    "Dropping superseded SNI certificates"
                );
            }
            params["sniCertificateIds"] = json!(plan.cert_ids());
        } else if default_matches {
            info!(provider = PROVIDER, listener = %listener.id, "Listener already serves certificate");
            return Ok(());
        }

        let _: Value = self.client.call(ctx, "UpdateListener", &params).await?;
        Ok(())
    }

    /// Attached SNI certificates, fetching bodies for entries listed without names
    async fn attached_with_domains(
        &self,
        ctx: &OperationContext,
        attached: &[AttachedCertificate],
    ) -> Result<Vec<SniCertificate>> {
        let mut out = Vec::with_capacity(attached.len());
        for entry in attached {
            let mut domains = entry.domains.clone();
            if domains.is_empty() {
                match self.inventory.fetch_pem(ctx, &entry.id).await {
                    Ok(Some(pem)) => match cert::parse_certificate(&pem) {
                        Ok(parsed) => domains = parsed.subject_alt_names,
                        Err(e) => warn!(
                            provider = PROVIDER,
                            cert_id = %entry.id,
                            error = %e,
                            "Cannot read attached certificate, keeping it"
                        ),
                    },
                    Ok(None) => warn!(
                        provider = PROVIDER,
                        cert_id = %entry.id,
                        "Attached certificate body unavailable, keeping it"
                    ),
                    Err(e) if e.is_cancellation() => return Err(e),
                    Err(e) => warn!(
                        provider = PROVIDER,
                        cert_id = %entry.id,
                        error = %e,
                        "Cannot fetch attached certificate, keeping it"
                    ),
                }
            }
            out.push(SniCertificate::new(entry.id.clone(), domains));
        }
        Ok(out)
    }

    async fn deploy_inner(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        match self.config.resource_type {
            ResourceType::Certificate => self.replace_certificate(ctx, cert_pem, key_pem).await,
            ResourceType::LoadBalancer => self.deploy_load_balancer(ctx, cert_pem, key_pem).await,
            ResourceType::Listener => self.deploy_listener(ctx, cert_pem, key_pem).await,
            other => Err(Error::Config(format!(
                "{}: unsupported resource type {}",
                PROVIDER, other
            ))),
        }
    }
}

#[async_trait]
impl DeploymentTarget for LoadBalancerTarget {
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
