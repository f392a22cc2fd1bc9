//! Question-section decoding.

use crate::errors::WireError;
use crate::wire::name::decode_name;
use crate::wire::types::{DnsClass, RecordType};

#[derive(Debug, Clone)]
pub struct Question {
    pub qname: String,
    pub qtype: RecordType,
    pub qclass: DnsClass,
}

/// Decode the first question starting at offset 12. Returns the question
/// plus the offset immediately following it.
pub fn decode_question(payload: &[u8]) -> Result<(Question, usize), WireError> {
    let mut offset = 12;
    let qname = decode_name(payload, &mut offset)?;

    if offset + 4 > payload.len() {
        return Err(WireError::short_packet(payload.len(), offset + 4));
    }

    let qtype = RecordType::from(u16::from_be_bytes([payload[offset], payload[offset + 1]]));
    let qclass = DnsClass::from(u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]));
    offset += 4;

    Ok((Question { qname, qtype, qclass }, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::name::encode_name;

    #[test]
    fn decodes_a_question() {
        let mut payload = vec![0u8; 12];
        payload.extend_from_slice(&encode_name("example.com"));
        payload.extend_from_slice(&1u16.to_be_bytes()); // A
        payload.extend_from_slice(&1u16.to_be_bytes()); // IN
        let (q, next) = decode_question(&payload).unwrap();
        assert_eq!(q.qname, "example.com");
        assert_eq!(q.qtype, RecordType::A);
        assert_eq!(next, payload.len());
    }

    #[test]
    fn rejects_truncated_qdcount_zero_body() {
        let payload = vec![0u8; 12];
        let err = decode_question(&payload).unwrap_err();
        assert!(matches!(err, WireError::ShortPacket { .. }));
    }
}
