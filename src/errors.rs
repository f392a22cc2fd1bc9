//! Typed failure modes for the wire parser.
//!
//! Every variant here is non-fatal to the pipeline: callers catch it, set
//! `malformed_packet=1` on the record in progress, and keep going. The
//! enum exists so callers can match on error kind instead of parsing
//! error strings.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("packet too short: {len} bytes (needed at least {needed})")]
    ShortPacket { len: usize, needed: usize },

    #[error("label at offset {offset} extends past the end of the packet")]
    BadLabel { offset: usize },

    #[error("domain name at offset {offset} exceeds 255 bytes decoded")]
    NameTooLong { offset: usize },

    #[error("compression pointer at offset {offset} targets {target}, which is not strictly backward")]
    BadPointer { offset: usize, target: usize },

    #[error("compression chain at offset {offset} exceeded the hop limit")]
    CompressionLoop { offset: usize },

    #[error("resource record at offset {offset} has rdata extending past the packet")]
    TruncatedRdata { offset: usize },
}

impl WireError {
    pub fn short_packet(len: usize, needed: usize) -> Self {
        WireError::ShortPacket { len, needed }
    }
}
