#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use certdeploy::Logger;
use rcgen::{BasicConstraints, CertificateParams, IsCa};

/// PEM certificate (or chain) and its key
pub struct Fixture {
    pub cert_pem: String,
    pub key_pem: String,
}

fn leaf_params(sans: &[&str], serial: u64) -> CertificateParams {
    let mut params = CertificateParams::new(sans.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    params.not_before = rcgen::date_time_ymd(2025, 1, 1);
    params.not_after = rcgen::date_time_ymd(2025, 4, 1);
    params.serial_number = Some(serial);
    params
}

/// Self-signed leaf valid 2025-01-01 .. 2025-04-01
pub fn self_signed(sans: &[&str], serial: u64) -> Fixture {
    let cert = rcgen::Certificate::from_params(leaf_params(sans, serial)).unwrap();
    Fixture {
        cert_pem: cert.serialize_pem().unwrap(),
        key_pem: cert.serialize_private_key_pem(),
    }
}

/// Leaf signed by a throwaway CA, PEM holding leaf then CA
pub fn ca_signed_chain(sans: &[&str], serial: u64) -> Fixture {
    let mut ca_params = CertificateParams::new(Vec::<String>::new());
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca = rcgen::Certificate::from_params(ca_params).unwrap();
    let leaf = rcgen::Certificate::from_params(leaf_params(sans, serial)).unwrap();
    Fixture {
        cert_pem: format!(
            "{}{}",
            leaf.serialize_pem_with_signer(&ca).unwrap(),
            ca.serialize_pem().unwrap()
        ),
        key_pem: leaf.serialize_private_key_pem(),
    }
}

/// In-memory log sink
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Logger writing text records into the returned sink
pub fn capturing_logger() -> (Logger, Captured) {
    let sink = Captured::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (Logger::from_subscriber(subscriber), sink)
}
