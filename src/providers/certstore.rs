use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::context::OperationContext;
use crate::error::Error;
use crate::providers::client::VendorClient;
use crate::store::{Candidate, DedupUploader, InventoryPage, InventorySource, NewCertificate};
use crate::transport::{TransportSettings, VendorTransport};
use crate::types::{Result, UploadResult};

pub const PROVIDER: &str = "cloud-certstore";

/// Default listing page size
pub const DEFAULT_PAGE_SIZE: usize = 20;

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Settings of a cloud certificate manager
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CertStoreConfig {
    #[serde(flatten)]
    pub transport: TransportSettings,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl CertStoreConfig {
    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.transport.endpoint.trim().is_empty() {
            return Err(Error::Config(format!("{}: endpoint is required", PROVIDER)));
        }
        if self.page_size == 0 {
            return Err(Error::Config(format!("{}: page_size must be positive", PROVIDER)));
        }
        Ok(())
    }
}

/// Listing entry as returned by `ListCertificates`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedCertificate {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    not_before: Option<DateTime<Utc>>,
    #[serde(default)]
    not_after: Option<DateTime<Utc>>,
    #[serde(default)]
    domains: Option<Vec<String>>,
    #[serde(default)]
    sha256_fingerprint: Option<String>,
}

impl From<ListedCertificate> for Candidate {
    fn from(listed: ListedCertificate) -> Self {
        let mut candidate = Candidate::new(listed.id, listed.name);
        if let (Some(not_before), Some(not_after)) = (listed.not_before, listed.not_after) {
            candidate = candidate.with_validity(not_before, not_after);
        }
        if let Some(domains) = listed.domains.filter(|d| !d.is_empty()) {
            candidate = candidate.with_sans(domains);
        }
        if let Some(fp) = listed.sha256_fingerprint.filter(|f| !f.is_empty()) {
            candidate = candidate.with_sha256(fp);
        }
        candidate
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListCertificatesResponse {
    #[serde(default)]
    certificates: Vec<ListedCertificate>,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    end_of_list: bool,
}

#[derive(Debug, Deserialize)]
struct GetCertificateResponse {
    #[serde(default)]
    certificate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadCertificateResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Certificate inventory of a cloud certificate manager
///
/// Also the upload half of the load balancer and WAF adapters, which keep
/// their certificates in the same vendor inventory.
#[derive(Clone)]
pub struct VendorInventory {
    client: VendorClient,
    page_size: usize,
}

impl VendorInventory {
    /// Inventory listing `page_size` certificates per page
    pub fn new(client: VendorClient, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    pub fn client(&self) -> &VendorClient {
        &self.client
    }

    /// Fetch the PEM body of the certificate `cert_id`
    pub async fn fetch_pem(&self, ctx: &OperationContext, cert_id: &str) -> Result<Option<String>> {
        let response: GetCertificateResponse = self
            .client
            .call(ctx, "GetCertificate", &json!({ "id": cert_id }))
            .await?;
        Ok(response.certificate.filter(|pem| !pem.trim().is_empty()))
    }
}

#[async_trait]
impl InventorySource for VendorInventory {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn list_page(&self, ctx: &OperationContext, page: usize) -> Result<InventoryPage> {
        let response: ListCertificatesResponse = self
            .client
            .call(
                ctx,
                "ListCertificates",
                &json!({ "page": page, "pageSize": self.page_size }),
            )
            .await?;

        Ok(InventoryPage {
            items: response.certificates.into_iter().map(Candidate::from).collect(),
            end_of_list: response.end_of_list,
            total: response.total,
        })
    }

    async fn get_detail(
        &self,
        ctx: &OperationContext,
        candidate: &Candidate,
    ) -> Result<Option<String>> {
        self.fetch_pem(ctx, &candidate.cert_id).await
    }

    async fn create(&self, ctx: &OperationContext, new: NewCertificate<'_>) -> Result<UploadResult> {
        let response: UploadCertificateResponse = self
            .client
            .call(
                ctx,
                "UploadCertificate",
                &json!({
                    "name": new.name,
                    "certificate": new.cert_pem,
                    "privateKey": new.key_pem,
                }),
            )
            .await?;

        let id = response.id.filter(|id| !id.is_empty()).ok_or_else(|| {
            Error::AmbiguousResponse(format!(
                "{} UploadCertificate response has no certificate id",
                self.client.provider()
            ))
        })?;
        Ok(UploadResult::new(
            id,
            response.name.unwrap_or_else(|| new.name.to_string()),
        ))
    }
}

/// Upload-only store backed by a cloud certificate manager
pub type CloudCertStore = DedupUploader<VendorInventory>;

/// Build the `cloud-certstore` provider
pub fn cloud_cert_store(
    config: &CertStoreConfig,
    transport: Arc<dyn VendorTransport>,
) -> Result<CloudCertStore> {
    config.validate()?;
    let client = VendorClient::new(PROVIDER, transport);
    Ok(DedupUploader::new(
        PROVIDER,
        VendorInventory::new(client, config.page_size),
    ))
}
