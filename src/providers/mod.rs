pub mod cdn;
pub mod certstore;
pub mod client;
pub mod loadbalancer;
pub mod panel;
pub mod registry;
pub mod waf;

// Re-export key types
pub use cdn::{CdnConfig, CdnTarget};
pub use certstore::{cloud_cert_store, CertStoreConfig, CloudCertStore, VendorInventory};
pub use client::VendorClient;
pub use loadbalancer::{LoadBalancerConfig, LoadBalancerTarget};
pub use panel::{CertificateFormat, PanelConfig, PanelTarget};
pub use registry::{Provider, ProviderKind, ProviderRegistry};
pub use waf::{WafConfig, WafTarget};
