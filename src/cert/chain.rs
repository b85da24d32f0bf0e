use pem::{EncodeConfig, LineEnding, Pem};

use crate::cert::parse::{certificate_from_der, pem_blocks};
use crate::error::Error;
use crate::types::Result;

/// Encode DER bytes as a PEM block with 64-column base64 lines
pub fn encode_pem(label: &str, der: &[u8]) -> String {
    pem::encode_config(
        &Pem::new(label, der),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

/// DER bytes of every certificate in a PEM chain, leaf first
///
/// The leaf is the first block that parses as a certificate.
pub fn chain_der(cert_pem: &str) -> Result<Vec<Vec<u8>>> {
    let mut chain = Vec::new();
    for block in pem_blocks(cert_pem) {
        if block.label != "CERTIFICATE" {
            continue;
        }
        if chain.is_empty() && certificate_from_der(&block.contents).is_err() {
            continue;
        }
        chain.push(block.contents);
    }

    if chain.is_empty() {
        return Err(Error::MalformedCertificate(
            "no PEM block parses as a certificate".into(),
        ));
    }
    Ok(chain)
}

/// Split a PEM chain into the server certificate and the intermediates
///
/// Both halves are re-encoded canonically, so feeding the server half back
/// in returns it unchanged with an empty intermediate half.
pub fn extract_chain(cert_pem: &str) -> Result<(String, String)> {
    let chain = chain_der(cert_pem)?;
    let server = encode_pem("CERTIFICATE", &chain[0]);
    let intermediate: String = chain[1..]
        .iter()
        .map(|der| encode_pem("CERTIFICATE", der))
        .collect();
    Ok((server, intermediate))
}
