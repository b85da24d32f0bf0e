use serde::{Deserialize, Serialize};
use std::fmt;

use crate::deploy::DeploymentTask;

/// Project-wide Result type
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Handle of a certificate object inside a target system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Durable vendor-side identifier
    pub cert_id: String,
    /// Human-readable label
    pub cert_name: String,
}

impl UploadResult {
    /// Handle for the vendor object `cert_id`
    pub fn new(cert_id: impl Into<String>, cert_name: impl Into<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            cert_name: cert_name.into(),
        }
    }
}

/// Successful deployment marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployResult {
    /// Certificate handle the targets were bound to, when one was uploaded
    pub upload: Option<UploadResult>,
    /// Sub-resources that were bound
    pub bound: Vec<String>,
    /// Terminal task when the binding was asynchronous
    pub task: Option<DeploymentTask>,
}

impl DeployResult {
    /// Record the certificate handle that was bound
    pub fn with_upload(mut self, upload: UploadResult) -> Self {
        self.upload = Some(upload);
        self
    }

    /// Record the sub-resources that were bound
    pub fn with_bound(mut self, bound: Vec<String>) -> Self {
        self.bound = bound;
        self
    }

    /// Record the terminal vendor task
    pub fn with_task(mut self, task: DeploymentTask) -> Self {
        self.task = Some(task);
        self
    }
}

/// Binding strategy selected by a target's configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    /// Replace the content of a known certificate object
    Certificate,
    /// Every HTTPS listener of a load balancer
    #[serde(alias = "loadbalancer")]
    LoadBalancer,
    /// A single listener
    Listener,
    /// A website on a hosting panel
    Website,
    /// A WAF host in cloud mode
    #[serde(alias = "cloudserver")]
    CloudServer,
    /// A WAF host in dedicated mode
    #[serde(alias = "premiumhost")]
    PremiumHost,
    /// One or more CDN domains
    Domain,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Certificate => write!(f, "certificate"),
            ResourceType::LoadBalancer => write!(f, "load-balancer"),
            ResourceType::Listener => write!(f, "listener"),
            ResourceType::Website => write!(f, "website"),
            ResourceType::CloudServer => write!(f, "cloud-server"),
            ResourceType::PremiumHost => write!(f, "premium-host"),
            ResourceType::Domain => write!(f, "domain"),
        }
    }
}
