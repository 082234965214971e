use encoding_rs::UTF_16LE;
use std::convert::TryInto;

#[inline]
pub fn le_u32(d: &[u8]) -> u32 {
    u32::from_le_bytes(d[..4].try_into().unwrap())
}

#[inline]
pub fn le_u16(d: &[u8]) -> u16 {
    u16::from_le_bytes(d[..2].try_into().unwrap())
}

/// Decodes ascii, returning `None` when any byte is outside of the ascii range. Fields in foreign
/// locales are occasionally written in other encodings, and those must not halt a parse.
pub fn decode_ascii(input: &[u8]) -> Option<String> {
    if input.is_ascii() {
        // ascii is always valid utf-8
        std::str::from_utf8(input).ok().map(String::from)
    } else {
        None
    }
}

/// Decodes little endian utf-16 without any replacement characters, `None` on unpaired
/// surrogates.
pub fn decode_utf16(input: &[u8]) -> Option<String> {
    UTF_16LE
        .decode_without_bom_handling_and_without_replacement(input)
        .map(|s| s.into_owned())
}

/// Lossy variant of `decode_utf16` for fields that are only inspected, never round tripped.
pub fn decode_utf16_lossy(input: &[u8]) -> String {
    let (s, _) = UTF_16LE.decode_without_bom_handling(input);
    s.into_owned()
}

/// The on-disk form of a wide string: the character count followed by the utf-16le code units.
pub fn encode_wide_prefixed(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    let mut out = Vec::with_capacity(4 + units.len() * 2);
    out.extend_from_slice(&(units.len() as u32).to_le_bytes());
    for unit in units {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

/// Utf-16le code units of a string without any length prefix.
pub fn encode_wide(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|x| x.to_le_bytes()).collect()
}

/// Offset of the first occurrence of `needle` at or after `from`.
pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }

    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|x| x + from)
}
