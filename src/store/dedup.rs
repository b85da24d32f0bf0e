use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cert::{self, Certificate};
use crate::context::OperationContext;
use crate::error::Error;
use crate::store::naming::generate_cert_name;
use crate::store::provider::CertificateStore;
use crate::telemetry::Logger;
use crate::types::{Result, UploadResult};

/// One certificate listed by a vendor inventory
///
/// Every optional field is a cheap discriminator the vendor may expose in
/// its listing; absent fields are simply not used for pre-filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Vendor identifier
    pub cert_id: String,
    /// Vendor display name
    pub cert_name: String,
    /// Start of validity
    pub not_before: Option<DateTime<Utc>>,
    /// End of validity
    pub not_after: Option<DateTime<Utc>>,
    /// DNS names, compared as a set
    pub subject_alt_names: Option<Vec<String>>,
    /// Hex SHA-1 of the DER certificate
    pub sha1_fingerprint: Option<String>,
    /// Hex SHA-256 of the DER certificate
    pub sha256_fingerprint: Option<String>,
}

impl Candidate {
    /// Candidate with no discriminators
    pub fn new(cert_id: impl Into<String>, cert_name: impl Into<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            cert_name: cert_name.into(),
            ..Self::default()
        }
    }

    /// Listing exposes the validity window
    pub fn with_validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self.not_after = Some(not_after);
        self
    }

    /// Listing exposes the DNS names
    pub fn with_sans(mut self, sans: Vec<String>) -> Self {
        self.subject_alt_names = Some(sans);
        self
    }

    /// Listing exposes a SHA-256 fingerprint
    pub fn with_sha256(mut self, fingerprint: impl Into<String>) -> Self {
        self.sha256_fingerprint = Some(fingerprint.into());
        self
    }

    /// Listing exposes a SHA-1 fingerprint
    pub fn with_sha1(mut self, fingerprint: impl Into<String>) -> Self {
        self.sha1_fingerprint = Some(fingerprint.into());
        self
    }

    fn to_result(&self) -> UploadResult {
        UploadResult::new(self.cert_id.clone(), self.cert_name.clone())
    }
}

/// One page of a vendor inventory listing
#[derive(Debug, Clone, Default)]
pub struct InventoryPage {
    /// Listed certificates, in vendor order
    pub items: Vec<Candidate>,
    /// Vendor explicitly signalled there is nothing after this page
    pub end_of_list: bool,
    /// Total number of items, when the vendor reports it
    pub total: Option<usize>,
}

impl InventoryPage {
    fn is_last(&self, page_size: usize, seen: usize) -> bool {
        self.end_of_list
            || self.items.is_empty()
            || self.items.len() < page_size
            || self.total.map_or(false, |total| seen >= total)
    }
}

/// Certificate about to be created in a vendor inventory
#[derive(Debug, Clone, Copy)]
pub struct NewCertificate<'a> {
    pub name: &'a str,
    pub cert_pem: &'a str,
    pub key_pem: &'a str,
    pub certificate: &'a Certificate,
}

/// Reject empty or unparseable upload input before any vendor call
pub fn check_upload_input(cert_pem: &str, key_pem: &str) -> Result<Certificate> {
    if cert_pem.trim().is_empty() {
        return Err(Error::Config("certificate PEM cannot be empty".into()));
    }
    if key_pem.trim().is_empty() {
        return Err(Error::Config("private key PEM cannot be empty".into()));
    }
    cert::parse_certificate(cert_pem)
}

/// Vendor-specific primitives the dedup engine is built from
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Items requested per page
    fn page_size(&self) -> usize;

    /// Fetch page `page` (1-based) of the inventory
    async fn list_page(&self, ctx: &OperationContext, page: usize) -> Result<InventoryPage>;

    /// Fetch the PEM body of a candidate; `None` when the vendor cannot return it
    async fn get_detail(&self, ctx: &OperationContext, candidate: &Candidate)
        -> Result<Option<String>>;

    /// Create a new certificate object
    async fn create(&self, ctx: &OperationContext, new: NewCertificate<'_>) -> Result<UploadResult>;
}

#[async_trait]
impl<T: InventorySource + ?Sized> InventorySource for Arc<T> {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    async fn list_page(&self, ctx: &OperationContext, page: usize) -> Result<InventoryPage> {
        (**self).list_page(ctx, page).await
    }

    async fn get_detail(
        &self,
        ctx: &OperationContext,
        candidate: &Candidate,
    ) -> Result<Option<String>> {
        (**self).get_detail(ctx, candidate).await
    }

    async fn create(&self, ctx: &OperationContext, new: NewCertificate<'_>) -> Result<UploadResult> {
        (**self).create(ctx, new).await
    }
}

/// Outcome of comparing a candidate's listing metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefilter {
    /// A fingerprint matched, no detail fetch needed
    Match,
    /// Some discriminator disagrees
    Mismatch,
    /// Metadata is consistent, the full body must be compared
    NeedsDetail,
}

fn normalize_fingerprint(fp: &str) -> String {
    fp.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Compare the cheap discriminators of `candidate` against `cert`
pub fn prefilter(candidate: &Candidate, cert: &Certificate) -> Prefilter {
    let fingerprints = [
        (candidate.sha256_fingerprint.as_deref(), cert.sha256_fingerprint()),
        (candidate.sha1_fingerprint.as_deref(), cert.sha1_fingerprint()),
    ];
    for (listed, actual) in fingerprints {
        if let Some(listed) = listed {
            return if normalize_fingerprint(listed) == actual {
                Prefilter::Match
            } else {
                Prefilter::Mismatch
            };
        }
    }

    if let (Some(not_before), Some(not_after)) = (candidate.not_before, candidate.not_after) {
        if !cert.same_validity(not_before, not_after) {
            return Prefilter::Mismatch;
        }
    }

    if let Some(sans) = &candidate.subject_alt_names {
        if cert::san_set(sans) != cert.san_set() {
            return Prefilter::Mismatch;
        }
    }

    Prefilter::NeedsDetail
}

/// [`CertificateStore`] built once on top of three vendor primitives
///
/// Walks the inventory page by page, pre-filters each candidate on listing
/// metadata, fetches the body only for survivors and compares with
/// [`cert::equal`]. The first match wins; otherwise a new object named
/// `certimate-<millis>` is created.
pub struct DedupUploader<S> {
    source: S,
    logger: Logger,
    provider: &'static str,
}

impl<S: InventorySource> DedupUploader<S> {
    /// Uploader over `source`; `provider` tags its log records
    pub fn new(provider: &'static str, source: S) -> Self {
        Self {
            source,
            logger: Logger::discard(),
            provider,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Search the inventory for an object equivalent to `cert`
    pub async fn find_existing(
        &self,
        ctx: &OperationContext,
        cert: &Certificate,
    ) -> Result<Option<UploadResult>> {
        let page_size = self.source.page_size().max(1);
        let mut page_no = 1;
        let mut seen = 0;

        loop {
            ctx.check()?;
            let page = self.source.list_page(ctx, page_no).await?;
            seen += page.items.len();
            debug!(
                provider = self.provider,
                page = page_no,
                items = page.items.len(),
                "Scanning certificate inventory"
            );

            for candidate in &page.items {
                match prefilter(candidate, cert) {
                    Prefilter::Mismatch => continue,
                    Prefilter::Match => return Ok(Some(candidate.to_result())),
                    Prefilter::NeedsDetail => {}
                }

                ctx.check()?;
                let Some(body) = self.source.get_detail(ctx, candidate).await? else {
                    continue;
                };
                match cert::parse_certificate(&body) {
                    Ok(existing) if cert::equal(&existing, cert) => {
                        return Ok(Some(candidate.to_result()));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(
                        provider = self.provider,
                        cert_id = %candidate.cert_id,
                        error = %e,
                        "Skipping unparseable inventory certificate"
                    ),
                }
            }

            if page.is_last(page_size, seen) {
                return Ok(None);
            }
            page_no += 1;
        }
    }

    async fn upload_inner(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<UploadResult> {
        let certificate = check_upload_input(cert_pem, key_pem)?;

        if let Some(existing) = self.find_existing(ctx, &certificate).await? {
            info!(
                provider = self.provider,
                cert_id = %existing.cert_id,
                "Certificate already exists, skipping upload"
            );
            return Ok(existing);
        }

        ctx.check()?;
        let name = generate_cert_name();
        let created = self
            .source
            .create(
                ctx,
                NewCertificate {
                    name: &name,
                    cert_pem,
                    key_pem,
                    certificate: &certificate,
                },
            )
            .await?;
        info!(
            provider = self.provider,
            cert_id = %created.cert_id,
            cert_name = %created.cert_name,
            "Certificate uploaded"
        );
        Ok(created)
    }
}

#[async_trait]
impl<S: InventorySource> CertificateStore for DedupUploader<S> {
    async fn upload(
        &self,
        ctx: &OperationContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<UploadResult> {
        self.logger
            .scope(self.upload_inner(ctx, cert_pem, key_pem))
            .await
    }

    fn set_logger(&mut self, logger: Option<Logger>) {
        self.logger = Logger::or_discard(logger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::test_support::self_signed;
    use crate::store::mock::MockInventory;

    fn parsed(sans: &[&str], serial: u64) -> (Certificate, String, String) {
        let fixture = self_signed(sans, serial);
        let cert = cert::parse_certificate(&fixture.cert_pem).unwrap();
        (cert, fixture.cert_pem, fixture.key_pem)
    }

    #[test]
    fn test_prefilter_fingerprint_short_circuits() {
        let (cert, _, _) = parsed(&["example.com"], 1);
        let fp = cert.sha256_fingerprint().to_uppercase();
        assert_eq!(prefilter(&Candidate::new("1", "a").with_sha256(fp), &cert), Prefilter::Match);
        assert_eq!(
            prefilter(&Candidate::new("1", "a").with_sha1("00:11"), &cert),
            Prefilter::Mismatch
        );
    }

    #[test]
    fn test_prefilter_validity_and_sans() {
        let (cert, _, _) = parsed(&["example.com", "www.example.com"], 1);

        let same = Candidate::new("1", "a")
            .with_validity(cert.not_before, cert.not_after)
            .with_sans(vec!["WWW.example.com".into(), "example.com".into()]);
        assert_eq!(prefilter(&same, &cert), Prefilter::NeedsDetail);

        let shifted = Candidate::new("1", "a").with_validity(cert.not_before, cert.not_before);
        assert_eq!(prefilter(&shifted, &cert), Prefilter::Mismatch);

        let other_names = Candidate::new("1", "a").with_sans(vec!["example.org".into()]);
        assert_eq!(prefilter(&other_names, &cert), Prefilter::Mismatch);

        assert_eq!(prefilter(&Candidate::new("1", "a"), &cert), Prefilter::NeedsDetail);
    }

    #[tokio::test]
    async fn test_upload_twice_creates_one_object() {
        let inventory = Arc::new(MockInventory::new(100));
        let store = DedupUploader::new("mock", inventory.clone());
        let ctx = OperationContext::new();
        let (_, cert_pem, key_pem) = parsed(&["example.com", "www.example.com"], 1);

        let first = store.upload(&ctx, &cert_pem, &key_pem).await.unwrap();
        let second = store.upload(&ctx, &cert_pem, &key_pem).await.unwrap();

        assert_eq!(first.cert_id, "1");
        assert_eq!(second, first);
        assert_eq!(inventory.len(), 1);
        assert!(first.cert_name.starts_with("certimate-"));
    }

    #[tokio::test]
    async fn test_new_serial_with_same_sans_creates_new_object() {
        let inventory = Arc::new(MockInventory::new(100));
        let store = DedupUploader::new("mock", inventory.clone());
        let ctx = OperationContext::new();

        let (_, pem_a, key_a) = parsed(&["example.com", "www.example.com"], 1);
        let (_, pem_b, key_b) = parsed(&["example.com", "www.example.com"], 2);

        assert_eq!(store.upload(&ctx, &pem_a, &key_a).await.unwrap().cert_id, "1");
        assert_eq!(store.upload(&ctx, &pem_a, &key_a).await.unwrap().cert_id, "1");
        assert_eq!(store.upload(&ctx, &pem_b, &key_b).await.unwrap().cert_id, "2");
        assert_eq!(inventory.len(), 2);
    }

    #[tokio::test]
    async fn test_search_walks_pages_until_match() {
        let inventory = Arc::new(MockInventory::new(2));
        let ctx = OperationContext::new();
        for serial in 10..15 {
            let (_, pem, _) = parsed(&[&format!("host{}.example.com", serial)], serial);
            inventory.insert(&pem).unwrap();
        }
        let (_, target_pem, key) = parsed(&["target.example.com"], 99);
        let target_id = inventory.insert(&target_pem).unwrap();

        let store = DedupUploader::new("mock", inventory.clone());
        let result = store.upload(&ctx, &target_pem, &key).await.unwrap();

        assert_eq!(result.cert_id, target_id);
        assert_eq!(inventory.list_calls(), 3);
        assert_eq!(inventory.len(), 6);
    }

    #[tokio::test]
    async fn test_metadata_prefilter_avoids_detail_fetch() {
        let inventory = Arc::new(MockInventory::new(50).exposing_metadata());
        let ctx = OperationContext::new();
        for serial in 1..4 {
            let (_, pem, _) = parsed(&[&format!("other{}.example.com", serial)], serial);
            inventory.insert(&pem).unwrap();
        }

        let store = DedupUploader::new("mock", inventory.clone());
        let (_, pem, key) = parsed(&["fresh.example.com"], 77);
        store.upload(&ctx, &pem, &key).await.unwrap();

        assert_eq!(inventory.detail_calls(), 0);
        assert_eq!(inventory.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_inputs_fail_before_listing() {
        let inventory = Arc::new(MockInventory::new(10));
        let store = DedupUploader::new("mock", inventory.clone());
        let ctx = OperationContext::new();

        assert!(matches!(store.upload(&ctx, "", "key").await, Err(Error::Config(_))));
        assert!(matches!(store.upload(&ctx, "cert", " ").await, Err(Error::Config(_))));
        assert!(matches!(
            store.upload(&ctx, "garbage", "key").await,
            Err(Error::MalformedCertificate(_))
        ));
        assert_eq!(inventory.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_search() {
        let inventory = Arc::new(MockInventory::new(10));
        let store = DedupUploader::new("mock", inventory.clone());
        let ctx = OperationContext::new();
        ctx.cancel();

        let (_, pem, key) = parsed(&["example.com"], 1);
        let err = store.upload(&ctx, &pem, &key).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(inventory.list_calls(), 0);
        assert_eq!(inventory.len(), 0);
    }
}
