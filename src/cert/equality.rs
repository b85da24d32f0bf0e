use crate::cert::types::Certificate;

/// Whether two certificates are the same logical certificate
///
/// Compares signature bytes, signature algorithm, serial number and the
/// issuer/subject serialNumber attributes. No public key verification is
/// performed: the result is only fit for deduplication, not for trust
/// decisions.
pub fn equal(a: &Certificate, b: &Certificate) -> bool {
    a.signature == b.signature
        && a.signature_algorithm == b.signature_algorithm
        && a.serial_number == b.serial_number
        && a.issuer_serial_number == b.issuer_serial_number
        && a.subject_serial_number == b.subject_serial_number
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::parse::parse_certificate;
    use crate::cert::test_support::self_signed;

    fn sample() -> Certificate {
        parse_certificate(&self_signed(&["example.com", "www.example.com"], 42).cert_pem).unwrap()
    }

    #[test]
    fn test_equal_is_reflexive_and_symmetric() {
        let a = sample();
        let b = parse_certificate(&crate::cert::chain::encode_pem("CERTIFICATE", &a.der)).unwrap();
        assert!(equal(&a, &a));
        assert!(equal(&a, &b));
        assert!(equal(&b, &a));
    }

    #[test]
    fn test_serial_difference_breaks_equality() {
        let a = sample();
        let mut b = a.clone();
        b.serial_number = "43".to_string();
        assert!(!equal(&a, &b));
        assert!(!equal(&b, &a));
    }

    #[test]
    fn test_signature_and_name_serial_differences_break_equality() {
        let a = sample();

        let mut b = a.clone();
        b.signature[0] ^= 0xFF;
        assert!(!equal(&a, &b));

        let mut c = a.clone();
        c.signature_algorithm = "1.2.840.113549.1.1.11".to_string();
        assert!(!equal(&a, &c));

        let mut d = a.clone();
        d.subject_serial_number = Some("SN-1".to_string());
        assert!(!equal(&a, &d));
    }

    #[test]
    fn test_reissued_certificate_with_same_names_is_different() {
        let a = sample();
        let b = parse_certificate(&self_signed(&["example.com", "www.example.com"], 42).cert_pem)
            .unwrap();
        // ECDSA signatures are randomized, so a fresh issuance never collides
        assert!(!equal(&a, &b));
    }
}
