pub mod chain;
pub mod equality;
pub mod jks;
pub mod key;
pub mod parse;
pub mod pfx;
pub mod types;

// Re-export key types
pub use chain::{encode_pem, extract_chain};
pub use equality::equal;
pub use jks::to_jks;
pub use key::{parse_private_key, KeyAlgorithm, PrivateKeyMaterial};
pub use parse::{parse_certificate, parse_certificates};
pub use pfx::to_pfx;
pub use types::{san_set, Certificate};
