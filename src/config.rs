//! Configuration surface. Loaded once at startup from TOML; a snapshot is
//! read-only for the lifetime of a run — changing it requires a restart,
//! not a hot reload.

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub ingress: IngressConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub qname_lowercase: bool,
    #[serde(default)]
    pub quiet_text: QuietTextConfig,
    #[serde(default)]
    pub filtering: FilteringConfig,
    #[serde(default)]
    pub geoip: GeoipConfig,
    #[serde(default)]
    pub user_privacy: UserPrivacyConfig,
    pub sinks: Vec<SinkConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngressConfig {
    /// Unix domain socket the external collector connects to and streams
    /// length-prefixed frames over. Collectors themselves are out of
    /// scope here — this is just the transport the pipeline listens on.
    pub unix_socket_path: String,
    #[serde(default = "default_ingress_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QuietTextConfig {
    #[serde(default)]
    pub dnstap: bool,
    #[serde(default)]
    pub dns: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilteringConfig {
    /// Drop a record if its qname matches one of these patterns (simple
    /// `*`-glob or exact match against a lowercased qname).
    #[serde(default)]
    pub drop_qname_patterns: Vec<String>,
    /// Drop a record if its client IP falls in one of these CIDRs.
    #[serde(default)]
    pub drop_client_cidrs: Vec<String>,
    /// Drop a record if its rcode short text matches one of these.
    #[serde(default)]
    pub drop_rcodes: Vec<String>,
    /// Allow overrides drop: a record matching any allow rule is never
    /// dropped, even if it also matches a drop rule.
    #[serde(default)]
    pub allow_qname_patterns: Vec<String>,
    #[serde(default)]
    pub allow_client_cidrs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GeoipConfig {
    pub db_city_path: Option<String>,
    pub db_asn_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserPrivacyConfig {
    #[serde(default)]
    pub anonymize_ip: bool,
    #[serde(default)]
    pub minimize_qname: bool,
    /// Rightmost-label depth kept by the qname minimizer, e.g. 2 keeps
    /// "example.com" from "www.example.com".
    #[serde(default = "default_minimize_depth")]
    pub minimize_depth: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Text {
        path: String,
        #[serde(default = "default_sink_capacity")]
        capacity: usize,
    },
    Json {
        path: String,
        #[serde(default = "default_sink_capacity")]
        capacity: usize,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true, address: default_metrics_address(), port: default_metrics_port() }
    }
}

fn default_true() -> bool {
    true
}
fn default_ingress_capacity() -> usize {
    512
}
fn default_query_timeout() -> u64 {
    10
}
fn default_minimize_depth() -> usize {
    2
}
fn default_sink_capacity() -> usize {
    256
}
fn default_metrics_address() -> String {
    "0.0.0.0".to_string()
}
fn default_metrics_port() -> u16 {
    9411
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse config '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Config invalid at startup is fatal before the pipeline starts running.
    fn validate(&self) -> anyhow::Result<()> {
        if self.sinks.is_empty() {
            anyhow::bail!("at least one sink must be configured");
        }
        for cidr in self.filtering.drop_client_cidrs.iter().chain(&self.filtering.allow_client_cidrs) {
            cidr.parse::<ipnet::IpNet>()
                .map_err(|e| anyhow::anyhow!("invalid CIDR '{}' in filtering config: {}", cidr, e))?;
        }
        if self.user_privacy.minimize_depth == 0 {
            anyhow::bail!("user_privacy.minimize_qname depth must be at least 1");
        }
        Ok(())
    }
}
