use crate::cert::chain::chain_der;
use crate::cert::key::parse_private_key;
use crate::error::Error;
use crate::types::Result;

/// Friendly name stored on the PKCS#12 bags
const FRIENDLY_NAME: &str = "certimate";

/// Build a password-protected PKCS#12 container from a PEM chain and key
///
/// The leaf goes into the certificate bag, every other chain member into
/// the CA bags.
pub fn to_pfx(cert_pem: &str, key_pem: &str, password: &str) -> Result<Vec<u8>> {
    let chain = chain_der(cert_pem)?;
    let key = parse_private_key(key_pem)?;

    let cas: Vec<&[u8]> = chain[1..].iter().map(Vec::as_slice).collect();
    let pfx = p12::PFX::new_with_cas(&chain[0], key.pkcs8_der(), &cas, password, FRIENDLY_NAME)
        .ok_or_else(|| Error::Crypto("failed to build PKCS#12 container".into()))?;

    Ok(pfx.to_der())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::test_support::{ca_signed_chain, self_signed};

    #[test]
    fn test_pfx_mac_verifies_with_password() {
        let fixture = ca_signed_chain(&["example.com"], 5);
        let der = to_pfx(&fixture.cert_pem, &fixture.key_pem, "s3cret").unwrap();

        let pfx = p12::PFX::parse(&der).unwrap();
        assert!(pfx.verify_mac("s3cret"));
        assert!(!pfx.verify_mac("wrong"));
    }

    #[test]
    fn test_pfx_rejects_missing_key() {
        let fixture = self_signed(&["example.com"], 5);
        let err = to_pfx(&fixture.cert_pem, &fixture.cert_pem, "pw").unwrap_err();
        assert!(matches!(err, Error::UnsupportedKey(_)));
    }
}
