use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::cert::san_set;

/// Certificate attached to an SNI-capable listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SniCertificate {
    pub cert_id: String,
    /// DNS names the certificate serves
    pub domains: Vec<String>,
}

impl SniCertificate {
    pub fn new(cert_id: impl Into<String>, domains: Vec<String>) -> Self {
        Self {
            cert_id: cert_id.into(),
            domains,
        }
    }

    fn domain_set(&self) -> BTreeSet<String> {
        san_set(&self.domains)
    }
}

/// Outcome of merging a new certificate into a listener's SNI list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniRebind {
    /// Full certificate list to write back, new certificate last
    pub certificates: Vec<SniCertificate>,
    /// Identifiers of superseded certificates removed from the list
    pub replaced: Vec<String>,
}

impl SniRebind {
    /// Identifiers in the order they should be sent to the vendor
    pub fn cert_ids(&self) -> Vec<String> {
        self.certificates.iter().map(|c| c.cert_id.clone()).collect()
    }

    /// Whether writing back would change nothing
    pub fn is_noop(&self, attached: &[SniCertificate]) -> bool {
        self.certificates == attached
    }
}

/// Merge `new` into the attached SNI certificates
///
/// An attached certificate is superseded when its domain set equals the new
/// certificate's (case-insensitive, order-insensitive). Every other
/// attachment is kept in its original order. An attachment that already
/// carries the new identifier is folded into the single new entry.
pub fn rebind_sni(attached: &[SniCertificate], new: SniCertificate) -> SniRebind {
    let new_set = new.domain_set();
    let mut certificates = Vec::with_capacity(attached.len() + 1);
    let mut replaced = Vec::new();

    for current in attached {
        if current.cert_id == new.cert_id {
            continue;
        }
        if current.domain_set() == new_set {
            replaced.push(current.cert_id.clone());
        } else {
            certificates.push(current.clone());
        }
    }
    certificates.push(new);

    SniRebind {
        certificates,
        replaced,
    }
}
