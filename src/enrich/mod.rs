//! Enrichers. Each is a capability-check + operation pair, independently
//! toggleable by the config surface. The pipeline orchestrator
//! (`pipeline.rs`) calls them in a fixed order: qname minimization, then
//! filter (which may drop the record), then geo, then IP anonymization,
//! then short-text substitution.

pub mod anonymize;
pub mod filter;
pub mod geoip;
pub mod qname_minimize;
pub mod quiet_text;

pub use anonymize::anonymize_ip;
pub use filter::{should_drop, FilterRules};
pub use geoip::{CompositeGeoipDatabase, GeoLookup, GeoipDatabase, NullGeoipDatabase};
pub use qname_minimize::minimize_qname;
pub use quiet_text::apply_quiet_text;
