//! GeoIP enricher. No MaxMind-format reader ships with this crate — that
//! would be a fabricated dependency no example in this codebase's lineage
//! pulls in. Instead the lookup is behind a small injectable trait with a
//! CSV/TSV file-backed implementation
//! (`ip_prefix,continent,country_iso,city,asn,aso` rows), loaded from the
//! `geoip.db_*` config paths, plus a `NullGeoipDatabase` that always
//! misses cleanly when no database is configured.

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;
use tracing::{error, warn};

#[derive(Debug, Clone, Default)]
pub struct GeoLookup {
    pub continent: String,
    pub country_iso: String,
    pub city: String,
    pub asn: String,
    pub aso: String,
}

/// A missing database or lookup miss yields empty strings; errors are
/// logged but non-fatal.
pub trait GeoipDatabase: Send + Sync {
    fn lookup(&self, ip: &str) -> GeoLookup;
}

/// Used when no `geoip.db_*` path is configured.
pub struct NullGeoipDatabase;

impl GeoipDatabase for NullGeoipDatabase {
    fn lookup(&self, _ip: &str) -> GeoLookup {
        GeoLookup::default()
    }
}

struct CsvRow {
    prefix: IpNet,
    continent: String,
    country_iso: String,
    city: String,
    asn: String,
    aso: String,
}

/// A file-backed database: one prefix per row, longest-prefix-length match
/// wins among overlapping entries.
pub struct CsvGeoipDatabase {
    rows: Vec<CsvRow>,
}

impl CsvGeoipDatabase {
    /// Load a CSV/TSV file of `ip_prefix,continent,country_iso,city,asn,aso`
    /// rows. A header line (first field not parseable as a CIDR) is skipped.
    /// Malformed rows are skipped with a warning rather than failing the
    /// whole load.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read geoip database '{}': {}", path, e))?;
        let mut rows = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(&[',', '\t'][..]).map(|f| f.trim()).collect();
            let Ok(prefix) = IpNet::from_str(fields[0]) else {
                if lineno != 0 {
                    warn!(path, lineno, "skipping geoip row with unparseable prefix");
                }
                continue;
            };
            rows.push(CsvRow {
                prefix,
                continent: fields.get(1).unwrap_or(&"").to_string(),
                country_iso: fields.get(2).unwrap_or(&"").to_string(),
                city: fields.get(3).unwrap_or(&"").to_string(),
                asn: fields.get(4).unwrap_or(&"").to_string(),
                aso: fields.get(5).unwrap_or(&"").to_string(),
            });
        }
        Ok(Self { rows })
    }

    fn find(&self, ip: IpAddr) -> Option<&CsvRow> {
        self.rows
            .iter()
            .filter(|r| r.prefix.contains(&ip))
            .max_by_key(|r| r.prefix.prefix_len())
    }
}

impl GeoipDatabase for CsvGeoipDatabase {
    fn lookup(&self, ip: &str) -> GeoLookup {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return GeoLookup::default();
        };
        match self.find(addr) {
            Some(row) => GeoLookup {
                continent: row.continent.clone(),
                country_iso: row.country_iso.clone(),
                city: row.city.clone(),
                asn: row.asn.clone(),
                aso: row.aso.clone(),
            },
            None => GeoLookup::default(),
        }
    }
}

/// Combines an optional city database and an optional ASN database
/// (`geoip.db_city_path` / `geoip.db_asn_path` are independent settings).
/// When only one file is configured it is queried for whichever fields it has;
/// when both are configured, city/continent/country come from the city
/// database and asn/aso come from the ASN database.
pub struct CompositeGeoipDatabase {
    city: Option<CsvGeoipDatabase>,
    asn: Option<CsvGeoipDatabase>,
}

impl CompositeGeoipDatabase {
    /// Loads whichever of `db_city_path`/`db_asn_path` are configured. A
    /// database that fails to load (missing file, unreadable, malformed
    /// path) is logged at error level and treated as absent rather than
    /// failing startup — a GeoIP DB problem is a non-fatal enrichment
    /// failure, not invalid config.
    pub fn load(config: &crate::config::GeoipConfig) -> Self {
        let city = config.db_city_path.as_deref().and_then(|path| match CsvGeoipDatabase::load(path) {
            Ok(db) => Some(db),
            Err(e) => {
                error!(path, error = %e, "failed to load geoip city database, continuing with empty lookups");
                None
            }
        });
        let asn = config.db_asn_path.as_deref().and_then(|path| match CsvGeoipDatabase::load(path) {
            Ok(db) => Some(db),
            Err(e) => {
                error!(path, error = %e, "failed to load geoip asn database, continuing with empty lookups");
                None
            }
        });
        Self { city, asn }
    }
}

impl GeoipDatabase for CompositeGeoipDatabase {
    fn lookup(&self, ip: &str) -> GeoLookup {
        let mut result = GeoLookup::default();
        if let Some(db) = &self.city {
            let g = db.lookup(ip);
            result.continent = g.continent;
            result.country_iso = g.country_iso;
            result.city = g.city;
            result.asn = g.asn;
            result.aso = g.aso;
        }
        if let Some(db) = &self.asn {
            let g = db.lookup(ip);
            result.asn = g.asn;
            result.aso = g.aso;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(rows: &[&str]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("geoip-test-{}.csv", rows.len()));
        let mut f = std::fs::File::create(&path).unwrap();
        for row in rows {
            writeln!(f, "{}", row).unwrap();
        }
        path
    }

    #[test]
    fn null_database_always_misses() {
        let db = NullGeoipDatabase;
        let geo = db.lookup("93.184.216.34");
        assert_eq!(geo.city, "");
    }

    #[test]
    fn csv_database_matches_containing_prefix() {
        let path = write_temp_csv(&[
            "ip_prefix,continent,country_iso,city,asn,aso",
            "93.184.216.0/24,NA,US,Norwell,AS15133,Edgecast",
        ]);
        let db = CsvGeoipDatabase::load(path.to_str().unwrap()).unwrap();
        let geo = db.lookup("93.184.216.34");
        assert_eq!(geo.country_iso, "US");
        assert_eq!(geo.asn, "AS15133");
    }

    #[test]
    fn csv_database_miss_yields_empty_strings() {
        let path = write_temp_csv(&["ip_prefix,continent,country_iso,city,asn,aso"]);
        let db = CsvGeoipDatabase::load(path.to_str().unwrap()).unwrap();
        let geo = db.lookup("10.0.0.1");
        assert_eq!(geo.city, "");
        assert_eq!(geo.country_iso, "");
    }

    #[test]
    fn longest_prefix_wins_on_overlap() {
        let path = write_temp_csv(&[
            "10.0.0.0/8,NA,US,Broad,AS1,Broad Org",
            "10.0.0.0/24,NA,US,Narrow,AS2,Narrow Org",
        ]);
        let db = CsvGeoipDatabase::load(path.to_str().unwrap()).unwrap();
        let geo = db.lookup("10.0.0.5");
        assert_eq!(geo.city, "Narrow");
    }

    #[test]
    fn composite_load_degrades_to_empty_on_missing_file() {
        let config = crate::config::GeoipConfig {
            db_city_path: Some("/nonexistent/does-not-exist.csv".to_string()),
            db_asn_path: None,
        };
        // Must not panic or return an error: a missing database file is a
        // non-fatal enrichment failure, not invalid startup config.
        let db = CompositeGeoipDatabase::load(&config);
        let geo = db.lookup("93.184.216.34");
        assert_eq!(geo.city, "");
        assert_eq!(geo.country_iso, "");
    }
}
