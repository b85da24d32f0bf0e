use const_oid::db::rfc5912::{ID_EC_PUBLIC_KEY, RSA_ENCRYPTION};
use der::asn1::AnyRef;
use der::{Decode, Encode};
use pkcs8::{AlgorithmIdentifierRef, PrivateKeyInfo};
use rustls_pki_types::PrivateKeyDer;
use sec1::EcPrivateKey;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;
use crate::types::Result;

/// Key algorithm of a parsed private key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa,
    Ec,
    Other,
}

/// Private key normalised to PKCS#8 DER, wiped on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKeyMaterial {
    pkcs8: Vec<u8>,
    #[zeroize(skip)]
    algorithm: KeyAlgorithm,
}

impl PrivateKeyMaterial {
    /// PKCS#8 `PrivateKeyInfo` DER
    pub fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyMaterial")
            .field("algorithm", &self.algorithm)
            .field("pkcs8", &"[REDACTED]")
            .finish()
    }
}

/// Parse a PEM private key (PKCS#8, PKCS#1 RSA or SEC1 EC) into PKCS#8
pub fn parse_private_key(key_pem: &str) -> Result<PrivateKeyMaterial> {
    let mut reader = key_pem.as_bytes();
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::UnsupportedKey(format!("unreadable private key PEM: {}", e)))?
        .ok_or_else(|| Error::UnsupportedKey("no private key found in PEM input".into()))?;

    match key {
        PrivateKeyDer::Pkcs8(key) => {
            let pkcs8 = key.secret_pkcs8_der().to_vec();
            let algorithm = pkcs8_algorithm(&pkcs8)?;
            Ok(PrivateKeyMaterial { pkcs8, algorithm })
        }
        PrivateKeyDer::Pkcs1(key) => Ok(PrivateKeyMaterial {
            pkcs8: wrap_pkcs1(key.secret_pkcs1_der())?,
            algorithm: KeyAlgorithm::Rsa,
        }),
        PrivateKeyDer::Sec1(key) => Ok(PrivateKeyMaterial {
            pkcs8: wrap_sec1(key.secret_sec1_der())?,
            algorithm: KeyAlgorithm::Ec,
        }),
        _ => Err(Error::UnsupportedKey("unknown private key encoding".into())),
    }
}

fn encode_key_info(info: PrivateKeyInfo<'_>) -> Result<Vec<u8>> {
    info.to_der()
        .map_err(|e| Error::UnsupportedKey(format!("cannot encode PKCS#8 key: {}", e)))
}

fn wrap_pkcs1(pkcs1: &[u8]) -> Result<Vec<u8>> {
    let algorithm = AlgorithmIdentifierRef {
        oid: RSA_ENCRYPTION,
        parameters: Some(AnyRef::NULL),
    };
    encode_key_info(PrivateKeyInfo::new(algorithm, pkcs1))
}

/// SEC1 keys only carry their curve in the optional parameters field
fn wrap_sec1(sec1: &[u8]) -> Result<Vec<u8>> {
    let key = EcPrivateKey::from_der(sec1)
        .map_err(|e| Error::UnsupportedKey(format!("invalid EC private key: {}", e)))?;
    let curve = key
        .parameters
        .and_then(|params| params.named_curve())
        .ok_or_else(|| Error::UnsupportedKey("EC private key without named curve".into()))?;

    let algorithm = AlgorithmIdentifierRef {
        oid: ID_EC_PUBLIC_KEY,
        parameters: Some(AnyRef::from(&curve)),
    };
    encode_key_info(PrivateKeyInfo::new(algorithm, sec1))
}

fn pkcs8_algorithm(pkcs8: &[u8]) -> Result<KeyAlgorithm> {
    let info = PrivateKeyInfo::from_der(pkcs8)
        .map_err(|e| Error::UnsupportedKey(format!("invalid PKCS#8 key: {}", e)))?;

    let oid = info.algorithm.oid;
    Ok(if oid == RSA_ENCRYPTION {
        KeyAlgorithm::Rsa
    } else if oid == ID_EC_PUBLIC_KEY {
        KeyAlgorithm::Ec
    } else {
        KeyAlgorithm::Other
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::chain::encode_pem;
    use crate::cert::test_support::self_signed;
    use const_oid::db::rfc5912::SECP_256_R_1;
    use sec1::EcParameters;

    #[test]
    fn test_parse_pkcs8_ec_key() {
        let fixture = self_signed(&["example.com"], 1);
        let key = parse_private_key(&fixture.key_pem).unwrap();
        assert_eq!(key.algorithm(), KeyAlgorithm::Ec);
        assert!(!key.pkcs8_der().is_empty());
    }

    #[test]
    fn test_debug_redacts_key_bytes() {
        let fixture = self_signed(&["example.com"], 1);
        let key = parse_private_key(&fixture.key_pem).unwrap();
        let text = format!("{:?}", key);
        assert!(text.contains("REDACTED"));
    }

    #[test]
    fn test_sec1_key_is_wrapped_with_curve() {
        let secret = [0x11u8; 32];
        let sec1 = EcPrivateKey {
            private_key: &secret,
            parameters: Some(EcParameters::NamedCurve(SECP_256_R_1)),
            public_key: None,
        }
        .to_der()
        .unwrap();
        let pem = encode_pem("EC PRIVATE KEY", &sec1);

        let key = parse_private_key(&pem).unwrap();
        assert_eq!(key.algorithm(), KeyAlgorithm::Ec);
        let info = PrivateKeyInfo::from_der(key.pkcs8_der()).unwrap();
        assert_eq!(info.algorithm.oid, ID_EC_PUBLIC_KEY);
        assert_eq!(info.algorithm.parameters_oid().unwrap(), SECP_256_R_1);
        assert_eq!(info.private_key, sec1.as_slice());
    }

    #[test]
    fn test_pkcs1_key_is_wrapped_as_rsa() {
        let pkcs1 = [0x30u8, 0x03, 0x02, 0x01, 0x00];
        let pem = encode_pem("RSA PRIVATE KEY", &pkcs1);

        let key = parse_private_key(&pem).unwrap();
        assert_eq!(key.algorithm(), KeyAlgorithm::Rsa);
        let info = PrivateKeyInfo::from_der(key.pkcs8_der()).unwrap();
        assert_eq!(info.algorithm.oid, RSA_ENCRYPTION);
        assert_eq!(info.algorithm.parameters, Some(AnyRef::NULL));
        assert_eq!(info.private_key, &pkcs1[..]);
    }

    #[test]
    fn test_sec1_key_without_curve_is_unsupported() {
        let secret = [0x22u8; 32];
        let sec1 = EcPrivateKey {
            private_key: &secret,
            parameters: None,
            public_key: None,
        }
        .to_der()
        .unwrap();
        let pem = encode_pem("EC PRIVATE KEY", &sec1);
        assert!(matches!(parse_private_key(&pem), Err(Error::UnsupportedKey(_))));
    }

    #[test]
    fn test_missing_key_is_unsupported() {
        let fixture = self_signed(&["example.com"], 1);
        assert!(matches!(
            parse_private_key(&fixture.cert_pem),
            Err(Error::UnsupportedKey(_))
        ));
    }
}
