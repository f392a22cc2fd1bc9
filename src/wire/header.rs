//! 12-byte DNS header decoding.

use crate::errors::WireError;
use crate::wire::types::ResponseCode;

#[derive(Debug, Clone, Copy)]
pub struct DnsHeader {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rd: bool,
    pub ra: bool,
    pub ad: bool,
    pub cd: bool,
    pub rcode: ResponseCode,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

/// Decode the fixed 12-byte header. Fails with [`WireError::ShortPacket`] if
/// `payload` is shorter than 12 bytes; does not otherwise validate counts.
pub fn decode_header(payload: &[u8]) -> Result<DnsHeader, WireError> {
    if payload.len() < 12 {
        return Err(WireError::short_packet(payload.len(), 12));
    }

    let id = u16::from_be_bytes([payload[0], payload[1]]);
    let flags = u16::from_be_bytes([payload[2], payload[3]]);

    Ok(DnsHeader {
        id,
        qr: (flags >> 15) & 1 == 1,
        opcode: ((flags >> 11) & 0xF) as u8,
        aa: (flags >> 10) & 1 == 1,
        tc: (flags >> 9) & 1 == 1,
        rd: (flags >> 8) & 1 == 1,
        ra: (flags >> 7) & 1 == 1,
        ad: (flags >> 5) & 1 == 1,
        cd: (flags >> 4) & 1 == 1,
        rcode: ResponseCode::from(flags & 0xF),
        qdcount: u16::from_be_bytes([payload[4], payload[5]]),
        ancount: u16::from_be_bytes([payload[6], payload[7]]),
        nscount: u16::from_be_bytes([payload[8], payload[9]]),
        arcount: u16::from_be_bytes([payload[10], payload[11]]),
    })
}
