//! Framed-record decoder and the tap operation enumeration.
//!
//! Collectors hand the pipeline one length-delimited Dnstap protobuf frame
//! at a time (the length prefix itself is stripped upstream by the ingress
//! transport); this module unmarshals the frame body. There is no
//! general-purpose protobuf dependency in this crate: the wire format here
//! is the small, fixed `Dnstap`/`Message` schema, walked by hand the same
//! way `wire::name` hand-parses RFC 1035 rather than reaching for a DNS
//! library.

use std::net::IpAddr;

/// The fixed 14-value tap operation enum. Numeric codes are meaningful:
/// parity selects query vs. response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOperation {
    AuthQuery,
    AuthResponse,
    ResolverQuery,
    ResolverResponse,
    ClientQuery,
    ClientResponse,
    StubQuery,
    StubResponse,
    ToolQuery,
    ToolResponse,
    UpdateQuery,
    UpdateResponse,
    ForwarderQuery,
    ForwarderResponse,
}

impl TapOperation {
    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            1 => TapOperation::AuthQuery,
            2 => TapOperation::AuthResponse,
            3 => TapOperation::ResolverQuery,
            4 => TapOperation::ResolverResponse,
            5 => TapOperation::ClientQuery,
            6 => TapOperation::ClientResponse,
            7 => TapOperation::StubQuery,
            8 => TapOperation::StubResponse,
            9 => TapOperation::ToolQuery,
            10 => TapOperation::ToolResponse,
            11 => TapOperation::UpdateQuery,
            12 => TapOperation::UpdateResponse,
            13 => TapOperation::ForwarderQuery,
            14 => TapOperation::ForwarderResponse,
            _ => return None,
        })
    }

    pub fn code(self) -> u64 {
        match self {
            TapOperation::AuthQuery => 1,
            TapOperation::AuthResponse => 2,
            TapOperation::ResolverQuery => 3,
            TapOperation::ResolverResponse => 4,
            TapOperation::ClientQuery => 5,
            TapOperation::ClientResponse => 6,
            TapOperation::StubQuery => 7,
            TapOperation::StubResponse => 8,
            TapOperation::ToolQuery => 9,
            TapOperation::ToolResponse => 10,
            TapOperation::UpdateQuery => 11,
            TapOperation::UpdateResponse => 12,
            TapOperation::ForwarderQuery => 13,
            TapOperation::ForwarderResponse => 14,
        }
    }

    /// True for odd codes: `type==query` iff this is odd.
    pub fn is_query(self) -> bool {
        self.code() % 2 == 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            TapOperation::AuthQuery => "AUTH_QUERY",
            TapOperation::AuthResponse => "AUTH_RESPONSE",
            TapOperation::ResolverQuery => "RESOLVER_QUERY",
            TapOperation::ResolverResponse => "RESOLVER_RESPONSE",
            TapOperation::ClientQuery => "CLIENT_QUERY",
            TapOperation::ClientResponse => "CLIENT_RESPONSE",
            TapOperation::StubQuery => "STUB_QUERY",
            TapOperation::StubResponse => "STUB_RESPONSE",
            TapOperation::ToolQuery => "TOOL_QUERY",
            TapOperation::ToolResponse => "TOOL_RESPONSE",
            TapOperation::UpdateQuery => "UPDATE_QUERY",
            TapOperation::UpdateResponse => "UPDATE_RESPONSE",
            TapOperation::ForwarderQuery => "FORWARDER_QUERY",
            TapOperation::ForwarderResponse => "FORWARDER_RESPONSE",
        }
    }

    /// Two-letter quiet-text code used when quiet text is enabled.
    pub fn short_text(&self) -> &'static str {
        match self {
            TapOperation::AuthQuery => "AQ",
            TapOperation::AuthResponse => "AR",
            TapOperation::ResolverQuery => "RQ",
            TapOperation::ResolverResponse => "RR",
            TapOperation::ClientQuery => "CQ",
            TapOperation::ClientResponse => "CR",
            TapOperation::StubQuery => "SQ",
            TapOperation::StubResponse => "SR",
            TapOperation::ToolQuery => "TQ",
            TapOperation::ToolResponse => "TR",
            TapOperation::UpdateQuery => "UQ",
            TapOperation::UpdateResponse => "UR",
            TapOperation::ForwarderQuery => "FQ",
            TapOperation::ForwarderResponse => "FR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketFamily {
    Inet,
    Inet6,
}

impl SocketFamily {
    pub fn name(&self) -> &'static str {
        match self {
            SocketFamily::Inet => "INET",
            SocketFamily::Inet6 => "INET6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketProtocol {
    Udp,
    Tcp,
    Dot,
    Doh,
    Doq,
}

impl SocketProtocol {
    pub fn name(&self) -> &'static str {
        match self {
            SocketProtocol::Udp => "UDP",
            SocketProtocol::Tcp => "TCP",
            SocketProtocol::Dot => "DOT",
            SocketProtocol::Doh => "DOH",
            SocketProtocol::Doq => "DOQ",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    pub ip: Option<IpAddr>,
    pub port: Option<u32>,
}

/// A decoded `Message`. All fields are optional; absence is not an error.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub operation: Option<TapOperation>,
    pub socket_family: Option<SocketFamily>,
    pub socket_protocol: Option<SocketProtocol>,
    pub query: Endpoint,
    pub response: Endpoint,
    pub query_time_sec: Option<u64>,
    pub query_time_nsec: Option<u32>,
    pub response_time_sec: Option<u64>,
    pub response_time_nsec: Option<u32>,
    pub query_message: Option<Vec<u8>>,
    pub response_message: Option<Vec<u8>>,
}

/// A decoded `Dnstap` envelope.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub identity: Option<String>,
    pub message: Option<Message>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope frame truncated at byte {0}")]
    Truncated(usize),
    #[error("envelope frame contains an unrecognized wire type {0}")]
    BadWireType(u64),
    #[error("message.type enum value {0} is not one of the 14 known tap operations")]
    UnknownOperation(u64),
}

/// Decode one framed envelope. Any structural failure here is an envelope
/// decode failure — the caller drops the record silently rather than
/// flagging it malformed, since there is no normalized record to attach
/// the flag to yet.
pub fn decode_envelope(frame: &[u8]) -> Result<Envelope, EnvelopeError> {
    let mut env = Envelope::default();
    let mut pos = 0usize;

    while pos < frame.len() {
        let (field, wire_type) = read_tag(frame, &mut pos)?;
        match (field, wire_type) {
            (1, 2) => {
                let bytes = read_bytes(frame, &mut pos)?;
                env.identity = Some(String::from_utf8_lossy(bytes).into_owned());
            }
            (14, 2) => {
                let bytes = read_bytes(frame, &mut pos)?;
                env.message = Some(decode_message(bytes)?);
            }
            (_, 0) => {
                read_varint(frame, &mut pos)?;
            }
            (_, 2) => {
                read_bytes(frame, &mut pos)?;
            }
            (_, wt) => return Err(EnvelopeError::BadWireType(wt)),
        }
    }

    Ok(env)
}

fn decode_message(data: &[u8]) -> Result<Message, EnvelopeError> {
    let mut msg = Message::default();
    let mut pos = 0usize;

    while pos < data.len() {
        let (field, wire_type) = read_tag(data, &mut pos)?;
        match (field, wire_type) {
            (1, 0) => {
                let code = read_varint(data, &mut pos)?;
                msg.operation = Some(
                    TapOperation::from_code(code).ok_or(EnvelopeError::UnknownOperation(code))?,
                );
            }
            (2, 0) => {
                let v = read_varint(data, &mut pos)?;
                msg.socket_family = match v {
                    1 => Some(SocketFamily::Inet),
                    2 => Some(SocketFamily::Inet6),
                    _ => None,
                };
            }
            (3, 0) => {
                let v = read_varint(data, &mut pos)?;
                msg.socket_protocol = match v {
                    1 => Some(SocketProtocol::Udp),
                    2 => Some(SocketProtocol::Tcp),
                    3 => Some(SocketProtocol::Dot),
                    4 => Some(SocketProtocol::Doh),
                    5 => Some(SocketProtocol::Doq),
                    _ => None,
                };
            }
            (4, 2) => msg.query.ip = parse_ip(read_bytes(data, &mut pos)?),
            (5, 0) => msg.query.port = Some(read_varint(data, &mut pos)? as u32),
            (6, 2) => msg.response.ip = parse_ip(read_bytes(data, &mut pos)?),
            (7, 0) => msg.response.port = Some(read_varint(data, &mut pos)? as u32),
            (8, 0) => msg.query_time_sec = Some(read_varint(data, &mut pos)?),
            (9, 0) => msg.query_time_nsec = Some(read_varint(data, &mut pos)? as u32),
            (10, 2) => msg.query_message = Some(read_bytes(data, &mut pos)?.to_vec()),
            (12, 0) => msg.response_time_sec = Some(read_varint(data, &mut pos)?),
            (13, 0) => msg.response_time_nsec = Some(read_varint(data, &mut pos)? as u32),
            (14, 2) => msg.response_message = Some(read_bytes(data, &mut pos)?.to_vec()),
            (_, 0) => {
                read_varint(data, &mut pos)?;
            }
            (_, 2) => {
                read_bytes(data, &mut pos)?;
            }
            (_, wt) => return Err(EnvelopeError::BadWireType(wt)),
        }
    }

    Ok(msg)
}

fn parse_ip(raw: &[u8]) -> Option<IpAddr> {
    match raw.len() {
        4 => Some(IpAddr::from(<[u8; 4]>::try_from(raw).ok()?)),
        16 => Some(IpAddr::from(<[u8; 16]>::try_from(raw).ok()?)),
        _ => None,
    }
}

fn read_tag(data: &[u8], pos: &mut usize) -> Result<(u64, u64), EnvelopeError> {
    let tag = read_varint(data, pos)?;
    Ok((tag >> 3, tag & 0x7))
}

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, EnvelopeError> {
    let mut result = 0u64;
    let mut shift = 0;
    loop {
        let byte = *data.get(*pos).ok_or(EnvelopeError::Truncated(*pos))?;
        *pos += 1;
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 64 {
            return Err(EnvelopeError::Truncated(*pos));
        }
    }
    Ok(result)
}

fn read_bytes<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8], EnvelopeError> {
    let len = read_varint(data, pos)? as usize;
    let start = *pos;
    let end = start.checked_add(len).ok_or(EnvelopeError::Truncated(start))?;
    if end > data.len() {
        return Err(EnvelopeError::Truncated(start));
    }
    *pos = end;
    Ok(&data[start..end])
}

// ── test-only wire encoder, used to build synthetic envelopes ──────────────

#[cfg(test)]
pub mod encode {
    use super::*;

    fn write_varint(out: &mut Vec<u8>, mut v: u64) {
        loop {
            let byte = (v & 0x7F) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    fn write_tag(out: &mut Vec<u8>, field: u64, wire_type: u64) {
        write_varint(out, (field << 3) | wire_type);
    }

    fn write_bytes(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
        write_tag(out, field, 2);
        write_varint(out, bytes.len() as u64);
        out.extend_from_slice(bytes);
    }

    fn write_varint_field(out: &mut Vec<u8>, field: u64, v: u64) {
        write_tag(out, field, 0);
        write_varint(out, v);
    }

    #[derive(Default)]
    pub struct MessageBuilder {
        pub operation: Option<TapOperation>,
        pub socket_family: Option<SocketFamily>,
        pub socket_protocol: Option<SocketProtocol>,
        pub query_ip: Option<IpAddr>,
        pub query_port: Option<u32>,
        pub response_ip: Option<IpAddr>,
        pub response_port: Option<u32>,
        pub query_time: Option<(u64, u32)>,
        pub response_time: Option<(u64, u32)>,
        pub query_message: Option<Vec<u8>>,
        pub response_message: Option<Vec<u8>>,
    }

    impl MessageBuilder {
        pub fn encode(&self) -> Vec<u8> {
            let mut out = Vec::new();
            if let Some(op) = self.operation {
                write_varint_field(&mut out, 1, op.code());
            }
            if let Some(f) = self.socket_family {
                write_varint_field(&mut out, 2, match f { SocketFamily::Inet => 1, SocketFamily::Inet6 => 2 });
            }
            if let Some(p) = self.socket_protocol {
                let code = match p {
                    SocketProtocol::Udp => 1,
                    SocketProtocol::Tcp => 2,
                    SocketProtocol::Dot => 3,
                    SocketProtocol::Doh => 4,
                    SocketProtocol::Doq => 5,
                };
                write_varint_field(&mut out, 3, code);
            }
            if let Some(ip) = self.query_ip {
                write_bytes(&mut out, 4, &ip_bytes(ip));
            }
            if let Some(p) = self.query_port {
                write_varint_field(&mut out, 5, p as u64);
            }
            if let Some(ip) = self.response_ip {
                write_bytes(&mut out, 6, &ip_bytes(ip));
            }
            if let Some(p) = self.response_port {
                write_varint_field(&mut out, 7, p as u64);
            }
            if let Some((sec, nsec)) = self.query_time {
                write_varint_field(&mut out, 8, sec);
                write_varint_field(&mut out, 9, nsec as u64);
            }
            if let Some(ref m) = self.query_message {
                write_bytes(&mut out, 10, m);
            }
            if let Some((sec, nsec)) = self.response_time {
                write_varint_field(&mut out, 12, sec);
                write_varint_field(&mut out, 13, nsec as u64);
            }
            if let Some(ref m) = self.response_message {
                write_bytes(&mut out, 14, m);
            }
            out
        }
    }

    fn ip_bytes(ip: IpAddr) -> Vec<u8> {
        match ip {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        }
    }

    pub fn encode_envelope(identity: &str, message: &MessageBuilder) -> Vec<u8> {
        let mut out = Vec::new();
        write_bytes(&mut out, 1, identity.as_bytes());
        write_bytes(&mut out, 14, &message.encode());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::encode::{encode_envelope, MessageBuilder};
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn decodes_a_client_query() {
        let msg = MessageBuilder {
            operation: Some(TapOperation::ClientQuery),
            socket_family: Some(SocketFamily::Inet),
            socket_protocol: Some(SocketProtocol::Udp),
            query_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            query_port: Some(54321),
            response_ip: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            response_port: Some(53),
            query_time: Some((1_700_000_000, 0)),
            query_message: Some(vec![1, 2, 3]),
            ..Default::default()
        };
        let frame = encode_envelope("test-id", &msg);
        let env = decode_envelope(&frame).unwrap();
        assert_eq!(env.identity.as_deref(), Some("test-id"));
        let m = env.message.unwrap();
        assert_eq!(m.operation, Some(TapOperation::ClientQuery));
        assert!(m.operation.unwrap().is_query());
        assert_eq!(m.query.port, Some(54321));
        assert_eq!(m.query_message, Some(vec![1, 2, 3]));
    }

    #[test]
    fn unknown_operation_code_errors() {
        let mut out = Vec::new();
        // field 1 (operation), wire type 0 (varint), value 99 — not in 1..=14
        out.push((1 << 3) | 0);
        out.push(99);
        let err = decode_message(&out).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnknownOperation(99)));
    }

    #[test]
    fn truncated_frame_errors() {
        let err = decode_envelope(&[0x0A]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Truncated(_)));
    }
}
