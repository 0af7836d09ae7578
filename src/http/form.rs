//! `application/x-www-form-urlencoded` decoding.
//!
//! # Rules
//! - `+` decodes to a space
//! - `%XX` decodes to one byte (hex digits are case-insensitive)
//! - A malformed escape (non-hex digit, or cut off by the end of input) is
//!   passed through literally, one character at a time
//! - Values stop at the next raw `&`; an encoded `%26` does not terminate
//!
//! Truncation to the caller's capacity is silent.

/// Decode one url-encoded component.
pub fn decode_component(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    decode_into(input, &mut out, usize::MAX);
    out
}

/// Find `key` in `body` and return its decoded value.
///
/// `key` is the bare field name (`"frequency"`, not `"frequency="`). The
/// match must start a field: either at the start of `body` or right after
/// a `&`. Returns `None` when the field is absent and `Some(String::new())`
/// when it is present but empty. At most `capacity` decoded bytes are kept.
pub fn extract_form_value(body: &[u8], key: &str, capacity: usize) -> Option<String> {
    let raw = find_field(body, key.trim_end_matches('=').as_bytes())?;
    let mut out = Vec::with_capacity(raw.len().min(capacity));
    decode_into(raw, &mut out, capacity);
    Some(String::from_utf8_lossy(&out).into_owned())
}

/// Raw (still encoded) value of the first field named `key`.
fn find_field<'a>(body: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
    body.split(|&b| b == b'&').find_map(|field| {
        let rest = field.strip_prefix(key)?;
        rest.strip_prefix(b"=")
    })
}

fn decode_into(input: &[u8], out: &mut Vec<u8>, capacity: usize) {
    let mut i = 0;
    while i < input.len() && out.len() < capacity {
        let byte = match input[i] {
            b'+' => b' ',
            b'%' => {
                match (hex_value(input.get(i + 1)), hex_value(input.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        i += 2;
                        (hi << 4) | lo
                    }
                    _ => b'%',
                }
            }
            other => other,
        };
        out.push(byte);
        i += 1;
    }
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    match byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
