//! Binary content detection.
//!
//! A null byte within the first few hundred bytes is a reliable signal
//! that a file is not text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// How many leading bytes (or chars) are inspected.
pub const DEFAULT_CHECK_LENGTH: usize = 1000;

/// True if the first `check_length` bytes contain a null byte.
pub fn is_binary_buffer(buffer: &[u8], check_length: usize) -> bool {
    let end = buffer.len().min(check_length);
    buffer[..end].contains(&0)
}

/// Decode base64 content and sniff the decoded bytes.
///
/// Whitespace (line-wrapped payloads) is ignored. Input that is not valid
/// base64 is reported as not binary.
pub fn is_binary_base64(base64_content: &str, check_length: usize) -> bool {
    match decode_base64(base64_content) {
        Ok(bytes) => is_binary_buffer(&bytes, check_length),
        Err(_) => false,
    }
}

/// Decode base64 while tolerating embedded whitespace.
pub fn decode_base64(content: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_byte_within_prefix() {
        let mut data = vec![b'a'; 64];
        data[10] = 0;
        assert!(is_binary_buffer(&data, DEFAULT_CHECK_LENGTH));
        assert!(!is_binary_buffer(&vec![b'a'; 64], DEFAULT_CHECK_LENGTH));
    }

    #[test]
    fn test_null_byte_beyond_prefix_is_ignored() {
        let mut data = vec![b'x'; 2000];
        data[1500] = 0;
        assert!(!is_binary_buffer(&data, DEFAULT_CHECK_LENGTH));
        assert!(is_binary_buffer(&data, 1501));
    }

    #[test]
    fn test_utf8_text_is_not_binary() {
        let text = "fn main() { println!(\"héllo wörld ✓\"); }\n".repeat(40);
        assert!(!is_binary_buffer(text.as_bytes(), DEFAULT_CHECK_LENGTH));
        assert!(is_binary_buffer(b"abc\0def", DEFAULT_CHECK_LENGTH));
    }

    #[test]
    fn test_base64_detection() {
        let png_header = [0x89u8, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00];
        let encoded = STANDARD.encode(png_header);
        assert!(is_binary_base64(&encoded, DEFAULT_CHECK_LENGTH));

        let text = STANDARD.encode("plain readable text");
        assert!(!is_binary_base64(&text, DEFAULT_CHECK_LENGTH));
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let encoded = STANDARD.encode(b"line one\nline two\n");
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(decode_base64(&wrapped).unwrap(), b"line one\nline two\n");
    }
}
