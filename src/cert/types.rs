use chrono::{DateTime, Utc};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Parsed X.509 certificate
///
/// Owned snapshot of the fields used for deduplication; the DER it was
/// parsed from is kept for fingerprints and container encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Start of the validity window
    pub not_before: DateTime<Utc>,
    /// End of the validity window
    pub not_after: DateTime<Utc>,
    /// Subject common name, empty when absent
    pub common_name: String,
    /// DNS subject alternative names in certificate order, without duplicates
    pub subject_alt_names: Vec<String>,
    /// Decimal text of the serial number
    pub serial_number: String,
    /// Raw signature bytes
    pub signature: Vec<u8>,
    /// Dotted OID of the signature algorithm
    pub signature_algorithm: String,
    /// `serialNumber` attribute of the issuer name
    pub issuer_serial_number: Option<String>,
    /// `serialNumber` attribute of the subject name
    pub subject_serial_number: Option<String>,
    /// DER encoding
    pub der: Vec<u8>,
}

impl Certificate {
    /// Lower-case hex SHA-1 over the DER bytes
    pub fn sha1_fingerprint(&self) -> String {
        hex::encode(Sha1::digest(&self.der))
    }

    /// Lower-case hex SHA-256 over the DER bytes
    pub fn sha256_fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }

    /// SAN list as a case-insensitive set
    pub fn san_set(&self) -> BTreeSet<String> {
        san_set(&self.subject_alt_names)
    }

    /// Whether both validity bounds equal the given ones
    pub fn same_validity(&self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> bool {
        self.not_before == not_before && self.not_after == not_after
    }
}

/// Normalise a list of DNS names into a comparable set
pub fn san_set<S: AsRef<str>>(names: &[S]) -> BTreeSet<String> {
    names
        .iter()
        .map(|n| n.as_ref().trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}
