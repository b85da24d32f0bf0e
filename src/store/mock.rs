use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

use crate::cert;
use crate::context::OperationContext;
use crate::store::dedup::{Candidate, InventoryPage, InventorySource, NewCertificate};
use crate::store::naming::generate_cert_name;
use crate::types::{Result, UploadResult};

/// Mock certificate entry
#[derive(Debug, Clone)]
struct MockCertEntry {
    id: String,
    cert_pem: String,
    candidate: Candidate,
}

/// In-memory certificate inventory for testing
///
/// Assigns sequential identifiers starting at `"1"`. By default the listing
/// only exposes id and name, forcing the engine to fetch every body; call
/// [`MockInventory::exposing_metadata`] to also list validity and SANs.
pub struct MockInventory {
    page_size: usize,
    expose_metadata: bool,
    entries: Mutex<Vec<MockCertEntry>>,
    list_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl MockInventory {
    /// Create an empty inventory listing `page_size` items per page
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            expose_metadata: false,
            entries: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
        }
    }

    /// List validity window and SANs alongside id and name
    pub fn exposing_metadata(mut self) -> Self {
        self.expose_metadata = true;
        self
    }

    /// Add a certificate directly, bypassing dedup
    pub fn insert(&self, cert_pem: &str) -> Result<String> {
        let name = generate_cert_name();
        self.push(&name, cert_pem)
    }

    fn push(&self, name: &str, cert_pem: &str) -> Result<String> {
        let parsed = cert::parse_certificate(cert_pem)?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let id = (entries.len() + 1).to_string();

        let mut candidate = Candidate::new(id.clone(), name);
        if self.expose_metadata {
            candidate = candidate
                .with_validity(parsed.not_before, parsed.not_after)
                .with_sans(parsed.subject_alt_names.clone());
        }

        entries.push(MockCertEntry {
            id: id.clone(),
            cert_pem: cert_pem.to_string(),
            candidate,
        });
        Ok(id)
    }

    /// Number of stored certificates
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many pages were listed so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// How many bodies were fetched so far
    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventorySource for MockInventory {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn list_page(&self, _ctx: &OperationContext, page: usize) -> Result<InventoryPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let start = page.saturating_sub(1) * self.page_size;
        let items: Vec<Candidate> = entries
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|e| e.candidate.clone())
            .collect();
        debug!("Mock inventory: listed page {} with {} items", page, items.len());

        Ok(InventoryPage {
            items,
            end_of_list: false,
            total: Some(entries.len()),
        })
    }

    async fn get_detail(
        &self,
        _ctx: &OperationContext,
        candidate: &Candidate,
    ) -> Result<Option<String>> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .iter()
            .find(|e| e.id == candidate.cert_id)
            .map(|e| e.cert_pem.clone()))
    }

    async fn create(&self, _ctx: &OperationContext, new: NewCertificate<'_>) -> Result<UploadResult> {
        let id = self.push(new.name, new.cert_pem)?;
        debug!("Mock inventory: created certificate {}", id);
        Ok(UploadResult::new(id, new.name))
    }
}
