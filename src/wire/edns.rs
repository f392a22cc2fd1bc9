//! EDNS0 OPT pseudo-record decoding (RFC 6891).

use crate::wire::answer::ResourceRecord;
use crate::wire::types::{EdnsOptionCode, RecordType};

#[derive(Debug, Clone)]
pub struct EdnsOption {
    pub code: u16,
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct EdnsExtension {
    pub udp_payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    pub do_bit: bool,
    pub options: Vec<EdnsOption>,
}

/// Find the OPT RR in an already-decoded additional section and extract its
/// EDNS fields. Returns `None` if no OPT RR is present — that is not an
/// error, just the absence of EDNS on this message.
///
/// This walks the same decoded records that
/// `decode_records` already produced for the additional section (rather
/// than re-scanning the raw bytes), so `records` (with its generic hex/typed
/// rendering of the OPT RR) and this `EdnsExtension` are populated from a
/// single parse pass.
pub fn decode_edns(records: &[ResourceRecord]) -> Option<EdnsExtension> {
    let opt = records.iter().find(|r| r.rtype == RecordType::OPT)?;

    // class carries the requestor's UDP payload size.
    let udp_payload_size = opt.class;
    // ttl is repurposed: high byte = extended rcode, next byte = version,
    // low 16 bits = flags (bit 15 = DO).
    let ttl = opt.ttl;
    let extended_rcode = ((ttl >> 24) & 0xFF) as u8;
    let version = ((ttl >> 16) & 0xFF) as u8;
    let flags = (ttl & 0xFFFF) as u16;
    let do_bit = (flags & 0x8000) != 0;

    let options = parse_options(&opt.rdata_raw);

    Some(EdnsExtension { udp_payload_size, extended_rcode, version, do_bit, options })
}

fn parse_options(rdata: &[u8]) -> Vec<EdnsOption> {
    let mut options = Vec::new();
    let mut offset = 0;
    while offset + 4 <= rdata.len() {
        let code = u16::from_be_bytes([rdata[offset], rdata[offset + 1]]);
        let length = u16::from_be_bytes([rdata[offset + 2], rdata[offset + 3]]) as usize;
        offset += 4;
        if offset + length > rdata.len() {
            break;
        }
        let data = rdata[offset..offset + length].to_vec();
        offset += length;
        let name = EdnsOptionCode::from(code).name();
        options.push(EdnsOption { code, name, data });
    }
    options
}
