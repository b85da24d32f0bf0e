pub mod dedup;
pub mod mock;
pub mod naming;
pub mod provider;

// Re-export key types
pub use dedup::{
    check_upload_input, Candidate, DedupUploader, InventoryPage, InventorySource, NewCertificate,
    Prefilter,
};
pub use mock::MockInventory;
pub use naming::generate_cert_name;
pub use provider::CertificateStore;
