//! certdeploy - TLS certificate upload and deployment orchestration
//!
//! Uploads certificates to vendor inventories without creating duplicates,
//! binds them to load balancers, CDNs, firewalls and hosting panels, and
//! waits for asynchronous vendor deployments.

// Foundational layer
pub mod context;
pub mod error;
pub mod types;
pub mod telemetry;
pub mod config;

// Core layer
pub mod cert;
pub mod crypto;
pub mod store;
pub mod deploy;

// Provider layer
pub mod transport;
pub mod providers;

// Public key types
pub use crate::context::OperationContext;
pub use crate::deploy::{DeploymentTarget, DeploymentTask, TaskPoller, TaskStatus};
pub use crate::error::{Error, ErrorKind};
pub use crate::providers::{Provider, ProviderKind, ProviderRegistry};
pub use crate::store::CertificateStore;
pub use crate::telemetry::Logger;
pub use crate::types::{DeployResult, ResourceType, Result, UploadResult};
