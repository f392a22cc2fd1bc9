//! IP anonymizer. IPv4 masks the low octet (/24); IPv6 masks to /64.
//! Input must already be a canonical textual IP; anything that doesn't
//! parse passes through unchanged rather than erroring.

use std::net::IpAddr;

/// Idempotent: anonymizing an already-anonymized address returns the same
/// address.
pub fn anonymize_ip(ip: &str) -> String {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let octets = v4.octets();
            format!("{}.{}.{}.0", octets[0], octets[1], octets[2])
        }
        Ok(IpAddr::V6(v6)) => {
            let segments = v6.segments();
            let masked = [segments[0], segments[1], segments[2], segments[3], 0, 0, 0, 0];
            IpAddr::V6(masked.into()).to_string()
        }
        Err(_) => ip.to_string(),
    }
}
