//! The normalized record. Produced once per envelope by the
//! pipeline orchestrator, then ownership transfers to every sink by value;
//! sinks never mutate it. A plain `Serialize` struct built by the
//! component that owns the data, not by the thing that later renders it.

use serde::Serialize;

use crate::wire::{EdnsExtension, ResourceRecord};

#[derive(Debug, Clone, Serialize, Default)]
pub struct NormalizedRecord {
    pub identity: String,
    pub network: NetworkInfo,
    pub dns: DnsInfo,
    pub geo: GeoInfo,
    pub time: TimeInfo,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct NetworkInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_port: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_port: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub asn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub aso: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DnsInfo {
    pub operation: String,
    #[serde(rename = "type")]
    pub direction: String,
    pub id: u16,
    pub rcode: String,
    pub qname: String,
    pub qtype: String,
    pub payload: Vec<u8>,
    pub length: usize,
    pub flags: DnsFlags,
    pub rrs: RrSections,
    /// Sticky: set on first parse failure, never cleared.
    pub malformed_packet: u8,
    pub latency: f64,
    pub latency_str: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct DnsFlags {
    pub qr: bool,
    pub tc: bool,
    pub aa: bool,
    pub ra: bool,
    pub ad: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RrSections {
    pub answers: Vec<RecordView>,
    pub nameservers: Vec<RecordView>,
    pub records: Vec<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<EdnsView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub name: String,
    #[serde(rename = "type")]
    pub rtype: String,
    pub class: u16,
    pub ttl: u32,
    pub rdata: String,
}

impl From<&ResourceRecord> for RecordView {
    fn from(rr: &ResourceRecord) -> Self {
        RecordView {
            name: rr.name.clone(),
            rtype: rr.rtype.name(),
            class: rr.class,
            ttl: rr.ttl,
            rdata: rr.rdata.clone(),
        }
    }
}

pub fn record_views(records: &[ResourceRecord]) -> Vec<RecordView> {
    records.iter().map(RecordView::from).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct EdnsView {
    pub udp_payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    #[serde(rename = "do")]
    pub do_bit: bool,
    pub options: Vec<EdnsOptionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdnsOptionView {
    pub code: u16,
    pub name: String,
    pub data: Vec<u8>,
}

impl From<&EdnsExtension> for EdnsView {
    fn from(ext: &EdnsExtension) -> Self {
        EdnsView {
            udp_payload_size: ext.udp_payload_size,
            extended_rcode: ext.extended_rcode,
            version: ext.version,
            do_bit: ext.do_bit,
            options: ext
                .options
                .iter()
                .map(|o| EdnsOptionView { code: o.code, name: o.name.clone(), data: o.data.clone() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct GeoInfo {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub continent: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub country_iso: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TimeInfo {
    pub sec: u64,
    pub nsec: u32,
    pub ts_float: f64,
    pub ts_rfc3339_utc_nano: String,
}

impl TimeInfo {
    /// `ts_float = sec + nsec·10⁻⁹`; the RFC3339 string is the same instant
    /// in UTC at nanosecond precision.
    pub fn from_parts(sec: u64, nsec: u32) -> Self {
        let ts_float = sec as f64 + (nsec as f64) * 1e-9;
        let ts_rfc3339_utc_nano = chrono::DateTime::<chrono::Utc>::from_timestamp(sec as i64, nsec)
            .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true))
            .unwrap_or_default();
        Self { sec, nsec, ts_float, ts_rfc3339_utc_nano }
    }
}

/// Six-decimal text rendering of a latency.
pub fn format_latency(latency: f64) -> String {
    format!("{:.6}", latency)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_info_ts_float_matches_sec_nsec() {
        let t = TimeInfo::from_parts(1_700_000_000, 250_000_000);
        assert!((t.ts_float - 1_700_000_000.25).abs() < 1e-9);
    }

    #[test]
    fn rfc3339_renders_nanosecond_precision() {
        let t = TimeInfo::from_parts(1_700_000_000, 25_000_000);
        assert!(t.ts_rfc3339_utc_nano.ends_with('Z'));
        assert!(t.ts_rfc3339_utc_nano.contains('.'));
    }

    #[test]
    fn latency_str_is_six_decimals() {
        assert_eq!(format_latency(0.025), "0.025000");
        assert_eq!(format_latency(0.0), "0.000000");
    }

    #[test]
    fn zero_valued_network_fields_are_omitted_from_json() {
        let info = NetworkInfo::default();
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("query_ip"));
        assert!(!json.contains("asn"));
    }
}
