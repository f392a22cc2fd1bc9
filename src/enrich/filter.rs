//! Filter predicate. Configured by qname patterns, client-IP CIDRs, and
//! rcode values; any match drops the record unless an explicit allow rule
//! also matches — allow overrides drop.

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

use crate::config::FilteringConfig;
use crate::record::NormalizedRecord;

#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    drop_qname_patterns: Vec<String>,
    drop_client_cidrs: Vec<IpNet>,
    drop_rcodes: Vec<String>,
    allow_qname_patterns: Vec<String>,
    allow_client_cidrs: Vec<IpNet>,
}

impl FilterRules {
    pub fn new(config: &FilteringConfig) -> anyhow::Result<Self> {
        Ok(Self {
            drop_qname_patterns: config.drop_qname_patterns.clone(),
            drop_client_cidrs: parse_cidrs(&config.drop_client_cidrs)?,
            drop_rcodes: config.drop_rcodes.iter().map(|r| r.to_ascii_uppercase()).collect(),
            allow_qname_patterns: config.allow_qname_patterns.clone(),
            allow_client_cidrs: parse_cidrs(&config.allow_client_cidrs)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.drop_qname_patterns.is_empty()
            && self.drop_client_cidrs.is_empty()
            && self.drop_rcodes.is_empty()
    }
}

fn parse_cidrs(raw: &[String]) -> anyhow::Result<Vec<IpNet>> {
    raw.iter().map(|s| IpNet::from_str(s).map_err(|e| anyhow::anyhow!("invalid CIDR '{}': {}", s, e))).collect()
}

/// Returns `true` if the record should be discarded and not counted by
/// downstream sinks.
pub fn should_drop(rules: &FilterRules, record: &NormalizedRecord) -> bool {
    if rules.is_empty() {
        return false;
    }

    let qname = record.dns.qname.to_ascii_lowercase();
    let client_ip: Option<IpAddr> = record.network.query_ip.as_deref().and_then(|ip| ip.parse().ok());
    let rcode = record.dns.rcode.to_ascii_uppercase();

    let allowed = rules.allow_qname_patterns.iter().any(|p| glob_match(p, &qname))
        || client_ip.map(|ip| rules.allow_client_cidrs.iter().any(|net| net.contains(&ip))).unwrap_or(false);
    if allowed {
        return false;
    }

    let dropped = rules.drop_qname_patterns.iter().any(|p| glob_match(p, &qname))
        || client_ip.map(|ip| rules.drop_client_cidrs.iter().any(|net| net.contains(&ip))).unwrap_or(false)
        || rules.drop_rcodes.iter().any(|r| r == &rcode);

    dropped
}

/// A minimal `*`-glob matcher (no character classes, just wildcard
/// segments) — enough for qname patterns like `*.ads.example.com`.
fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !text[pos..].starts_with(part) {
                return false;
            }
            pos += part.len();
        } else if i == parts.len() - 1 {
            return text[pos..].ends_with(part);
        } else if let Some(found) = text[pos..].find(part) {
            pos += found + part.len();
        } else {
            return false;
        }
    }
    true
}
