use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::context::OperationContext;
use crate::crypto::PrivateKeyTransportCipher;
use crate::deploy::{DeploymentTarget, DeploymentTask, TaskPoller, TaskReader, TaskStatus};
use crate::error::Error;
use crate::providers::certstore::{VendorInventory, DEFAULT_PAGE_SIZE};
use crate::providers::client::VendorClient;
use crate::store::{
    Candidate, CertificateStore, DedupUploader, InventoryPage, InventorySource, NewCertificate,
};
use crate::telemetry::Logger;
use crate::transport::{TransportSettings, VendorTransport};
use crate::types::{DeployResult, ResourceType, Result, UploadResult};

pub const PROVIDER: &str = "cloud-cdn";

/// Certificate identifier at the end of a resource location
static LOCATION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/certificates?/([^/?#\s]+)/?(?:[?#].*)?$").unwrap());

fn default_resource_type() -> ResourceType {
    ResourceType::Domain
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Settings of a CDN target
#[derive(Clone, Deserialize, Serialize)]
pub struct CdnConfig {
    #[serde(flatten)]
    pub transport: TransportSettings,
    /// Shared secret for private key transport encryption
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_resource_type")]
    pub resource_type: ResourceType,
    /// Accelerated domains to bind
    #[serde(default)]
    pub domains: Vec<String>,
    /// Overrides the registry's poll interval
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Overrides the registry's bound on waiting for the deployment task
    #[serde(default)]
    pub poll_timeout_secs: Option<u64>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl fmt::Debug for CdnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdnConfig")
            .field("transport", &self.transport)
            .field("secret", &"<redacted>")
            .field("resource_type", &self.resource_type)
            .field("domains", &self.domains)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl CdnConfig {
    /// Reject settings the target cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(Error::Config(format!("{}: endpoint is required", PROVIDER)));
        }
        if self.secret.is_empty() {
            return Err(Error::Config(format!("{}: secret is required", PROVIDER)));
        }
        if self.resource_type != ResourceType::Domain {
            return Err(Error::Config(format!(
                "{}: unsupported resource type {}",
                PROVIDER, self.resource_type
            )));
        }
        if self.domains.iter().all(|d| d.trim().is_empty()) {
            return Err(Error::Config(format!("{}: at least one domain is required", PROVIDER)));
        }
        if self.poll_interval_secs == Some(0) {
            return Err(Error::Config(format!(
                "{}: poll_interval_secs must be positive",
                PROVIDER
            )));
        }
        Ok(())
    }

    /// Poller for this target, falling back to `defaults` for unset values
    pub fn poller(&self, defaults: TaskPoller) -> TaskPoller {
        let interval = self
            .poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| defaults.interval());
        let timeout = match self.poll_timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.timeout(),
        };
        TaskPoller::new(interval).with_timeout(timeout)
    }
}

/// Pull the certificate id out of a resource location
pub fn certificate_id_from_location(location: &str) -> Result<String> {
    LOCATION_ID
        .captures(location.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            Error::AmbiguousResponse(format!(
                "cannot find a certificate id in location {:?}",
                location
            ))
        })
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    location: Option<String>,
}

/// CDN inventory: listing as the certificate manager, encrypted uploads
pub struct CdnInventory {
    listing: VendorInventory,
    cipher: PrivateKeyTransportCipher,
}

impl CdnInventory {
    pub fn new(listing: VendorInventory, cipher: PrivateKeyTransportCipher) -> Self {
        Self { listing, cipher }
    }
}

#[async_trait]
impl InventorySource for CdnInventory {
    fn page_size(&self) -> usize {
        self.listing.page_size()
    }

    async fn list_page(&self, ctx: &OperationContext, page: usize) -> Result<InventoryPage> {
        self.listing.list_page(ctx, page).await
    }

    async fn get_detail(
        &self,
        ctx: &OperationContext,
        candidate: &Candidate,
    ) -> Result<Option<String>> {
        self.listing.get_detail(ctx, candidate).await
    }

    async fn create(&self, ctx: &OperationContext, new: NewCertificate<'_>) -> Result<UploadResult> {
        let timestamp = Utc::now().timestamp();
        let request_date = PrivateKeyTransportCipher::request_date(timestamp)?;
        let encrypted_key = self.cipher.encrypt(new.key_pem, timestamp)?;

        let response: UploadResponse = self
            .listing
            .client()
            .call(
                ctx,
                "UploadCertificate",
                &json!({
                    "name": new.name,
                    "certificate": new.cert_pem,
                    "privateKey": encrypted_key,
                    "requestDate": request_date,
                }),
            )
            .await?;

        let location = response.location.ok_or_else(|| {
            Error::AmbiguousResponse(format!("{}: upload response has no location", PROVIDER))
        })?;
        let id = certificate_id_from_location(&location)?;
        Ok(UploadResult::new(id, new.name))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BindResponse {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VendorTask {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    submitted_at: Option<String>,
    #[serde(default)]
    finished_at: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    task: VendorTask,
}

fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|t| Utc.from_utc_datetime(&t))
        })
}

impl VendorTask {
    fn into_task(self, fallback_id: &str) -> DeploymentTask {
        let finished_at = self
            .finished_at
            .filter(|t| !t.trim().is_empty())
            // a present but unreadable finish time still marks completion
            .map(|t| parse_time(t.trim()).unwrap_or_else(Utc::now));

        DeploymentTask {
            id: self.id.unwrap_or_else(|| fallback_id.to_string()),
            status: TaskStatus::from_vendor(&self.status),
            submitted_at: self.submitted_at.as_deref().and_then(|t| parse_time(t.trim())),
            finished_at,
            message: self.message.filter(|m| !m.is_empty()),
        }
    }
}

/// Reads CDN deployment tasks through `GetDeploymentTask`
pub struct CdnTaskReader {
    client: VendorClient,
}

impl CdnTaskReader {
    pub fn new(client: VendorClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskReader for CdnTaskReader {
    async fn read_task(&self, ctx: &OperationContext, task_id: &str) -> Result<DeploymentTask> {
        let response: TaskResponse = self
            .client
            .call(ctx, "GetDeploymentTask", &json!({ "taskId": task_id }))
            .await?;
        Ok(response.task.into_task(task_id))
    }
}

/// CDN target: upload with an encrypted key, bind domains, wait for the task
pub struct CdnTarget {
    config: CdnConfig,
    client: VendorClient,
    uploader: DedupUploader<CdnInventory>,
    tasks: CdnTaskReader,
    poller: TaskPoller,
    logger: Logger,
}

impl CdnTarget {
    /// Target polling with the default [`TaskPoller`] unless overridden
    pub fn new(config: CdnConfig, transport: Arc<dyn VendorTransport>) -> Result<Self> {
        config.validate()?;
        let client = VendorClient::new(PROVIDER, transport);
        let inventory = CdnInventory::new(
            VendorInventory::new(client.clone(), config.page_size),
            PrivateKeyTransportCipher::new(config.secret.clone()),
        );
        Ok(Self {
            uploader: DedupUploader::new(PROVIDER, inventory),
            tasks: CdnTaskReader::new(client.clone()),
            poller: config.poller(TaskPoller::default()),
            client,
            config,
            logger: Logger::discard(),
        })
    }

    /// Replace the poller, mainly to shorten the interval
    pub fn with_poller(mut self, poller: TaskPoller) -> Self {
        self.poller = poller;
        self
    }

    async fn deploy_inner(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult> {
        let domains: Vec<String> = self
            .config
            .domains
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let upload = self.uploader.upload(ctx, cert_pem, key_pem).await?;

        let response: BindResponse = self
            .client
            .call(
                ctx,
                "BindCertificate",
                &json!({ "certificateId": upload.cert_id, "domains": domains }),
            )
            .await?;
        let task_id = response.task_id.filter(|t| !t.is_empty()).ok_or_else(|| {
            Error::AmbiguousResponse(format!("{}: bind response has no task id", PROVIDER))
        })?;
        info!(provider = PROVIDER, task_id = %task_id, "Deployment task submitted");

        let task = self
            .poller
            .wait(ctx, &self.tasks, &task_id)
            .await
            .map_err(|e| {
                warn!(provider = PROVIDER, task_id = %task_id, error = %e, "Deployment did not complete");
                e
            })?;

        Ok(DeployResult::default()
            .with_upload(upload)
            .with_bound(domains)
            .with_task(task))
    }
}

#[async_trait]
impl DeploymentTarget for CdnTarget {
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
