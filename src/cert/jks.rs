//! Java KeyStore (JKS v2) writer for a single private-key entry

use chrono::Utc;
use der::asn1::{AnyRef, ObjectIdentifier, OctetStringRef};
use der::{Encode, Sequence};
use pkcs8::AlgorithmIdentifierRef;
use rand::RngCore;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::cert::chain::chain_der;
use crate::cert::key::parse_private_key;
use crate::error::Error;
use crate::types::Result;

const MAGIC: u32 = 0xFEED_FEED;
const VERSION: u32 = 2;
const TAG_PRIVATE_KEY: u32 = 1;
const SALT_LEN: usize = 20;
const INTEGRITY_WHITENER: &[u8] = b"Mighty Aphrodite";

/// Sun JKS key protector algorithm
const OID_JKS_KEY_PROTECTOR: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.42.2.17.1.1");

/// `EncryptedPrivateKeyInfo` carrying a key-protector blob
#[derive(Sequence)]
struct ProtectedKeyInfo<'a> {
    algorithm: AlgorithmIdentifierRef<'a>,
    encrypted_data: OctetStringRef<'a>,
}

/// Build a JKS keystore holding one private key entry
///
/// The entry's chain holds the leaf certificate only; intermediates in
/// `cert_pem` are not written.
pub fn to_jks(
    cert_pem: &str,
    key_pem: &str,
    alias: &str,
    key_password: &str,
    store_password: &str,
) -> Result<Vec<u8>> {
    if alias.is_empty() {
        return Err(Error::Config("keystore alias cannot be empty".into()));
    }
    let chain = chain_der(cert_pem)?;
    let key = parse_private_key(key_pem)?;

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let protected = protect_key(key.pkcs8_der(), key_password, &salt)?;

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());

    out.extend_from_slice(&TAG_PRIVATE_KEY.to_be_bytes());
    write_utf(&mut out, &alias.to_lowercase())?;
    out.extend_from_slice(&Utc::now().timestamp_millis().to_be_bytes());
    write_bytes(&mut out, &protected)?;

    out.extend_from_slice(&1u32.to_be_bytes());
    write_utf(&mut out, "X.509")?;
    write_bytes(&mut out, &chain[0])?;

    let digest = integrity_digest(&out, store_password);
    out.extend_from_slice(&digest);
    Ok(out)
}

/// Password chars as UTF-16BE bytes, as the JDK feeds them to SHA-1
fn password_bytes(password: &str) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(password.encode_utf16().flat_map(u16::to_be_bytes).collect())
}

/// JKS key protector: SHA-1 keystream XOR plus a plaintext check digest
fn protect_key(plain: &[u8], password: &str, salt: &[u8; SALT_LEN]) -> Result<Vec<u8>> {
    let passwd = password_bytes(password);

    let mut keystream = Zeroizing::new(Vec::with_capacity(plain.len() + 20));
    let mut digest = salt.to_vec();
    while keystream.len() < plain.len() {
        let mut hasher = Sha1::new();
        hasher.update(passwd.as_slice());
        hasher.update(&digest);
        digest = hasher.finalize().to_vec();
        keystream.extend_from_slice(&digest);
    }

    let mut encrypted = Vec::with_capacity(SALT_LEN + plain.len() + 20);
    encrypted.extend_from_slice(salt);
    encrypted.extend(plain.iter().zip(keystream.iter()).map(|(p, k)| p ^ k));

    let mut check = Sha1::new();
    check.update(passwd.as_slice());
    check.update(plain);
    encrypted.extend_from_slice(&check.finalize());

    let envelope = ProtectedKeyInfo {
        algorithm: AlgorithmIdentifierRef {
            oid: OID_JKS_KEY_PROTECTOR,
            parameters: Some(AnyRef::NULL),
        },
        encrypted_data: OctetStringRef::new(&encrypted).map_err(envelope_error)?,
    };
    envelope.to_der().map_err(envelope_error)
}

fn envelope_error(e: der::Error) -> Error {
    Error::Crypto(format!("cannot encode protected key: {}", e))
}

fn integrity_digest(body: &[u8], store_password: &str) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(password_bytes(store_password).as_slice());
    hasher.update(INTEGRITY_WHITENER);
    hasher.update(body);
    hasher.finalize().into()
}

fn write_utf(out: &mut Vec<u8>, text: &str) -> Result<()> {
    let len = u16::try_from(text.len())
        .map_err(|_| Error::Config("keystore string too long".into()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(text.as_bytes());
    Ok(())
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::Config("keystore entry too large".into()))?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::test_support::ca_signed_chain;
    use der::Decode;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_be_bytes(bytes[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_jks_header_and_integrity_digest() {
        let fixture = ca_signed_chain(&["example.com"], 9);
        let store = to_jks(&fixture.cert_pem, &fixture.key_pem, "Tomcat", "keypass", "storepass")
            .unwrap();

        assert_eq!(read_u32(&store, 0), MAGIC);
        assert_eq!(read_u32(&store, 4), VERSION);
        assert_eq!(read_u32(&store, 8), 1);
        assert_eq!(read_u32(&store, 12), TAG_PRIVATE_KEY);
        assert_eq!(&store[16..18], &6u16.to_be_bytes());
        assert_eq!(&store[18..24], b"tomcat");

        let (body, digest) = store.split_at(store.len() - 20);
        assert_eq!(digest, integrity_digest(body, "storepass"));
        assert_ne!(digest, integrity_digest(body, "other"));
    }

    /// Undo the key protector with `password`, checking the trailing digest
    fn recover_key(protected: &[u8], password: &str) -> Option<Vec<u8>> {
        let envelope = ProtectedKeyInfo::from_der(protected).unwrap();
        assert_eq!(envelope.algorithm.oid, OID_JKS_KEY_PROTECTOR);
        let encrypted = envelope.encrypted_data.as_bytes();
        let (salt, rest) = encrypted.split_at(SALT_LEN);
        let (xored, check) = rest.split_at(rest.len() - 20);

        let passwd = password_bytes(password);
        let mut digest = salt.to_vec();
        let mut plain = Vec::with_capacity(xored.len());
        for chunk in xored.chunks(20) {
            let mut hasher = Sha1::new();
            hasher.update(passwd.as_slice());
            hasher.update(&digest);
            digest = hasher.finalize().to_vec();
            plain.extend(chunk.iter().zip(digest.iter()).map(|(c, k)| c ^ k));
        }

        let mut expected = Sha1::new();
        expected.update(passwd.as_slice());
        expected.update(&plain);
        (expected.finalize().as_slice() == check).then_some(plain)
    }

    #[test]
    fn test_protected_key_recovers_with_password() {
        let plain: Vec<u8> = (0u8..70).collect();
        let salt = [7u8; SALT_LEN];
        let protected = protect_key(&plain, "changeit", &salt).unwrap();

        assert_eq!(recover_key(&protected, "changeit"), Some(plain));
        assert_eq!(recover_key(&protected, "wrong"), None);
    }

    #[test]
    fn test_entry_chain_holds_leaf_only() {
        let fixture = ca_signed_chain(&["example.com"], 9);
        let store = to_jks(&fixture.cert_pem, &fixture.key_pem, "tomcat", "keypass", "storepass")
            .unwrap();

        // magic, version, count, tag, alias, timestamp
        let mut at = 4 + 4 + 4 + 4 + 2 + "tomcat".len() + 8;
        let key_len = read_u32(&store, at) as usize;
        at += 4 + key_len;
        assert_eq!(read_u32(&store, at), 1);
        at += 4;

        assert_eq!(&store[at..at + 2], &5u16.to_be_bytes());
        assert_eq!(&store[at + 2..at + 7], b"X.509");
        at += 7;
        let cert_len = read_u32(&store, at) as usize;
        at += 4;
        let chain = chain_der(&fixture.cert_pem).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(&store[at..at + cert_len], chain[0].as_slice());
        assert_eq!(store.len(), at + cert_len + 20);
    }

    #[test]
    fn test_stored_key_is_the_pkcs8_key() {
        let fixture = ca_signed_chain(&["example.com"], 9);
        let store = to_jks(&fixture.cert_pem, &fixture.key_pem, "tomcat", "keypass", "storepass")
            .unwrap();

        let at = 4 + 4 + 4 + 4 + 2 + "tomcat".len() + 8;
        let key_len = read_u32(&store, at) as usize;
        let protected = &store[at + 4..at + 4 + key_len];
        let expected = parse_private_key(&fixture.key_pem).unwrap();
        assert_eq!(
            recover_key(protected, "keypass").as_deref(),
            Some(expected.pkcs8_der())
        );
    }

    #[test]
    fn test_empty_alias_rejected() {
        let fixture = ca_signed_chain(&["example.com"], 9);
        assert!(to_jks(&fixture.cert_pem, &fixture.key_pem, "", "a", "b").is_err());
    }
}
