pub mod fanout;
pub mod poller;
pub mod provider;
pub mod sni;
pub mod types;

pub use fanout::bind_all;
pub use poller::{TaskPoller, TaskReader, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
pub use provider::DeploymentTarget;
pub use sni::{rebind_sni, SniCertificate, SniRebind};
pub use types::{DeploymentTask, TaskStatus};
