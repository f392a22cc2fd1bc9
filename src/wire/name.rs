//! Domain name decoding with label-compression support (RFC 1035 §4.1.4).

use crate::errors::WireError;

const MAX_NAME_LEN: usize = 255;
const MAX_LABEL_LEN: usize = 63;
const MAX_POINTER_HOPS: usize = 128;

/// Decode one domain name starting at `*offset`, advancing `*offset` past the
/// name as it appears in the wire stream (i.e. past the first compression
/// pointer encountered, not past the target it points at).
///
/// Enforces compression-pointer safety invariants:
/// - pointer targets must be strictly less than the offset of the pointer
///   byte itself (no forward or self-referential pointers),
/// - at most [`MAX_POINTER_HOPS`] pointer hops,
/// - total decoded name length at most 255 bytes, each label at most 63.
pub fn decode_name(data: &[u8], offset: &mut usize) -> Result<String, WireError> {
    let mut labels: Vec<String> = Vec::new();
    let mut total_len = 0usize;
    let mut pos = *offset;
    let mut jumped = false;
    let mut hops = 0usize;

    loop {
        if pos >= data.len() {
            return Err(WireError::ShortPacket { len: data.len(), needed: pos + 1 });
        }

        let len_byte = data[pos];

        if (len_byte & 0xC0) == 0xC0 {
            if pos + 1 >= data.len() {
                return Err(WireError::ShortPacket { len: data.len(), needed: pos + 2 });
            }
            let target = (((len_byte & 0x3F) as usize) << 8) | data[pos + 1] as usize;
            if target >= pos {
                return Err(WireError::BadPointer { offset: pos, target });
            }
            if !jumped {
                *offset = pos + 2;
                jumped = true;
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(WireError::CompressionLoop { offset: pos });
            }
            pos = target;
            continue;
        }

        if len_byte == 0 {
            if !jumped {
                *offset = pos + 1;
            }
            break;
        }

        let label_len = len_byte as usize;
        if label_len > MAX_LABEL_LEN {
            return Err(WireError::BadLabel { offset: pos });
        }
        pos += 1;
        if pos + label_len > data.len() {
            return Err(WireError::BadLabel { offset: pos });
        }

        total_len += label_len + 1;
        if total_len > MAX_NAME_LEN {
            return Err(WireError::NameTooLong { offset: pos });
        }

        labels.push(String::from_utf8_lossy(&data[pos..pos + label_len]).into_owned());
        pos += label_len;
    }

    Ok(labels.join("."))
}

/// Encode a domain name into wire format (used by test fixtures).
pub fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    if !name.is_empty() {
        for label in name.split('.') {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
    }
    out.push(0);
    out
}
