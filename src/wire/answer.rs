//! Resource record (answer / authority / additional) decoding.

use crate::errors::WireError;
use crate::wire::name::decode_name;
use crate::wire::types::RecordType;

#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: RecordType,
    pub class: u16,
    pub ttl: u32,
    /// Best-effort rendering of rdata per the record type. Unknown
    /// types (and OPT, whose structured form is produced by `edns.rs`
    /// instead) render as uppercase hex with no separator.
    pub rdata: String,
    /// Raw rdata bytes, kept around for callers that need to re-decode
    /// (e.g. the correlation cache's TTL extraction, the EDNS scanner).
    pub rdata_raw: Vec<u8>,
}

/// Decode `count` resource records starting at `*offset`, advancing it past
/// the last one. `full_packet` is the entire DNS payload, needed so that
/// rdata domain names (CNAME, NS, PTR, DNAME, the name fields inside SOA/MX/SRV)
/// can follow compression pointers into earlier parts of the packet.
pub fn decode_records(
    full_packet: &[u8],
    offset: &mut usize,
    count: u16,
) -> Result<Vec<ResourceRecord>, WireError> {
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = decode_name(full_packet, offset)?;

        if *offset + 10 > full_packet.len() {
            return Err(WireError::ShortPacket { len: full_packet.len(), needed: *offset + 10 });
        }
        let rtype = RecordType::from(u16::from_be_bytes([full_packet[*offset], full_packet[*offset + 1]]));
        let class = u16::from_be_bytes([full_packet[*offset + 2], full_packet[*offset + 3]]);
        let ttl = u32::from_be_bytes([
            full_packet[*offset + 4],
            full_packet[*offset + 5],
            full_packet[*offset + 6],
            full_packet[*offset + 7],
        ]);
        let rdlength = u16::from_be_bytes([full_packet[*offset + 8], full_packet[*offset + 9]]) as usize;
        *offset += 10;

        if *offset + rdlength > full_packet.len() {
            return Err(WireError::TruncatedRdata { offset: *offset });
        }
        let rdata_offset = *offset;
        let rdata_raw = full_packet[rdata_offset..rdata_offset + rdlength].to_vec();
        let rdata = format_rdata(rtype, &rdata_raw, full_packet, rdata_offset);
        *offset += rdlength;

        records.push(ResourceRecord { name, rtype, class, ttl, rdata, rdata_raw });
    }
    Ok(records)
}

fn format_rdata(rtype: RecordType, raw: &[u8], full_packet: &[u8], rdata_offset: usize) -> String {
    match rtype {
        RecordType::A if raw.len() == 4 => format!("{}.{}.{}.{}", raw[0], raw[1], raw[2], raw[3]),
        RecordType::AAAA if raw.len() == 16 => (0..8)
            .map(|i| format!("{:x}", u16::from_be_bytes([raw[i * 2], raw[i * 2 + 1]])))
            .collect::<Vec<_>>()
            .join(":"),
        RecordType::NS | RecordType::CNAME | RecordType::PTR | RecordType::DNAME => {
            let mut pos = rdata_offset;
            decode_name(full_packet, &mut pos).unwrap_or_else(|_| hex(raw))
        }
        RecordType::MX if raw.len() >= 3 => {
            let preference = u16::from_be_bytes([raw[0], raw[1]]);
            let mut pos = rdata_offset + 2;
            let exchange = decode_name(full_packet, &mut pos).unwrap_or_else(|_| hex(&raw[2..]));
            format!("{} {}", preference, exchange)
        }
        RecordType::SRV if raw.len() >= 7 => {
            let priority = u16::from_be_bytes([raw[0], raw[1]]);
            let weight = u16::from_be_bytes([raw[2], raw[3]]);
            let port = u16::from_be_bytes([raw[4], raw[5]]);
            let mut pos = rdata_offset + 6;
            let target = decode_name(full_packet, &mut pos).unwrap_or_else(|_| hex(&raw[6..]));
            format!("{} {} {} {}", priority, weight, port, target)
        }
        RecordType::SOA => format_soa(raw, full_packet, rdata_offset).unwrap_or_else(|| hex(raw)),
        RecordType::TXT => format_txt(raw),
        _ => hex(raw),
    }
}

fn format_soa(raw: &[u8], full_packet: &[u8], rdata_offset: usize) -> Option<String> {
    let mut pos = rdata_offset;
    let mname = decode_name(full_packet, &mut pos).ok()?;
    let rname = decode_name(full_packet, &mut pos).ok()?;
    // `pos` now sits right after rname within full_packet; the remaining
    // five u32 fields are read relative to that position, not the rdata
    // boundary, since mname/rname may have been pointer-compressed.
    if pos + 20 > full_packet.len() {
        return None;
    }
    let serial = u32::from_be_bytes(full_packet[pos..pos + 4].try_into().ok()?);
    let refresh = u32::from_be_bytes(full_packet[pos + 4..pos + 8].try_into().ok()?);
    let retry = u32::from_be_bytes(full_packet[pos + 8..pos + 12].try_into().ok()?);
    let expire = u32::from_be_bytes(full_packet[pos + 12..pos + 16].try_into().ok()?);
    let minimum = u32::from_be_bytes(full_packet[pos + 16..pos + 20].try_into().ok()?);
    let _ = raw;
    Some(format!(
        "{} {} {} {} {} {} {}",
        mname, rname, serial, refresh, retry, expire, minimum
    ))
}

fn format_txt(raw: &[u8]) -> String {
    let mut out = String::new();
    let mut pos = 0;
    while pos < raw.len() {
        let len = raw[pos] as usize;
        pos += 1;
        if pos + len > raw.len() {
            break;
        }
        out.push_str(&String::from_utf8_lossy(&raw[pos..pos + len]));
        pos += len;
    }
    format!("\"{}\"", out)
}

fn hex(raw: &[u8]) -> String {
    raw.iter().map(|b| format!("{:02X}", b)).collect()
}
