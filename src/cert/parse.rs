use chrono::{DateTime, TimeZone, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::pem::Pem;
use x509_parser::time::ASN1Time;
use x509_parser::x509::X509Name;

use crate::cert::types::Certificate;
use crate::error::Error;
use crate::types::Result;

/// OID of the X.520 `serialNumber` name attribute
const OID_SERIAL_NUMBER_ATTR: &str = "2.5.4.5";

/// PEM blocks of `text`, in order, skipping anything unreadable
pub(crate) fn pem_blocks(text: &str) -> Vec<Pem> {
    Pem::iter_from_buffer(text.as_bytes())
        .filter_map(|block| block.ok())
        .collect()
}

/// Parse the first certificate of a PEM document
pub fn parse_certificate(cert_pem: &str) -> Result<Certificate> {
    parse_certificates(cert_pem)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::MalformedCertificate("no certificate found in PEM input".into()))
}

/// Parse every certificate of a PEM chain, leaf first
///
/// Blocks that are not labelled CERTIFICATE are ignored; a CERTIFICATE
/// block that does not parse fails the whole chain.
pub fn parse_certificates(cert_pem: &str) -> Result<Vec<Certificate>> {
    let mut certs = Vec::new();
    for block in pem_blocks(cert_pem) {
        if block.label != "CERTIFICATE" {
            continue;
        }
        certs.push(certificate_from_der(&block.contents)?);
    }

    if certs.is_empty() {
        return Err(Error::MalformedCertificate(
            "no certificate found in PEM input".into(),
        ));
    }
    Ok(certs)
}

/// Parse a single DER certificate
pub fn certificate_from_der(der: &[u8]) -> Result<Certificate> {
    use x509_parser::prelude::FromDer;

    let (_, x509) = X509Certificate::from_der(der)
        .map_err(|e| Error::MalformedCertificate(format!("invalid X.509 data: {}", e)))?;

    Ok(Certificate {
        not_before: asn1_to_utc(&x509.validity().not_before)?,
        not_after: asn1_to_utc(&x509.validity().not_after)?,
        common_name: common_name(x509.subject()),
        subject_alt_names: dns_names(&x509)?,
        serial_number: x509.tbs_certificate.serial.to_string(),
        signature: x509.signature_value.data.to_vec(),
        signature_algorithm: x509.signature_algorithm.algorithm.to_id_string(),
        issuer_serial_number: serial_attribute(x509.issuer()),
        subject_serial_number: serial_attribute(x509.subject()),
        der: der.to_vec(),
    })
}

fn asn1_to_utc(time: &ASN1Time) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(time.timestamp(), 0)
        .single()
        .ok_or_else(|| Error::MalformedCertificate("validity time out of range".into()))
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn serial_attribute(name: &X509Name<'_>) -> Option<String> {
    name.iter_attributes()
        .find(|attr| attr.attr_type().to_id_string() == OID_SERIAL_NUMBER_ATTR)
        .and_then(|attr| attr.as_str().ok())
        .map(str::to_string)
}

fn dns_names(x509: &X509Certificate<'_>) -> Result<Vec<String>> {
    let san = x509
        .subject_alternative_name()
        .map_err(|e| Error::MalformedCertificate(format!("invalid SAN extension: {}", e)))?;

    let mut names: Vec<String> = Vec::new();
    if let Some(san) = san {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                if !names.iter().any(|n| n == dns) {
                    names.push(dns.to_string());
                }
            }
        }
    }
    Ok(names)
}
