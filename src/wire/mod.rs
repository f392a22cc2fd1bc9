//! DNS wire-format parser.
//!
//! Four independently callable operations — `decode_header`,
//! `decode_question`, `decode_records` (answers/authority/additional share
//! one routine, called once per section), and `decode_edns` — each of which
//! fails with a [`crate::errors::WireError`] rather than panicking. Callers
//! (the pipeline orchestrator) decide what "non-fatal" means: stop parsing
//! further sections, flag the record, and keep going.

pub mod answer;
pub mod edns;
pub mod header;
pub mod name;
pub mod question;
pub mod types;

pub use answer::{decode_records, ResourceRecord};
pub use edns::{decode_edns, EdnsExtension, EdnsOption};
pub use header::{decode_header, DnsHeader};
pub use question::{decode_question, Question};
