use chrono::{DateTime, Utc};

/// Prefix of every certificate name generated by this crate
pub const NAME_PREFIX: &str = "certimate";

/// Name for a new certificate object, `certimate-<unix millis>`
pub fn generate_cert_name() -> String {
    cert_name_at(Utc::now())
}

/// Name for a certificate created at `at`
pub fn cert_name_at(at: DateTime<Utc>) -> String {
    format!("{}-{}", NAME_PREFIX, at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_name_uses_millisecond_timestamp() {
        let at = Utc.timestamp_millis_opt(1_735_689_600_123).unwrap();
        assert_eq!(cert_name_at(at), "certimate-1735689600123");
    }

    #[test]
    fn test_generated_name_has_prefix() {
        let name = generate_cert_name();
        let millis: i64 = name.strip_prefix("certimate-").unwrap().parse().unwrap();
        assert!(millis > 0);
    }
}
