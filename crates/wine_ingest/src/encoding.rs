//! Encoding detection (spec §4.B step 1), grounded in `csv_processor.py`'s
//! chardet-then-fallback-chain approach, reimplemented as a fixed
//! candidate order since no chardet-equivalent crate is in the example
//! pack: sample up to 10 KB, use the first candidate that decodes cleanly.

const SAMPLE_SIZE: usize = 10 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    Utf8Sig,
    Utf8,
    Windows1252,
}

/// Detect the encoding of `bytes` by sampling its first 10 KB and
/// decoding the full buffer with the winning candidate.
pub fn detect_and_decode(bytes: &[u8]) -> (String, DetectedEncoding) {
    let sample = &bytes[..bytes.len().min(SAMPLE_SIZE)];

    if let Some(stripped) = sample.strip_prefix(b"\xef\xbb\xbf") {
        if std::str::from_utf8(stripped).is_ok() {
            let full = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
            return (String::from_utf8_lossy(full).into_owned(), DetectedEncoding::Utf8Sig);
        }
    }

    if std::str::from_utf8(sample).is_ok() {
        return (String::from_utf8_lossy(bytes).into_owned(), DetectedEncoding::Utf8);
    }

    // windows-1252 (cp1252) is a strict superset of latin-1's printable
    // range and never fails to decode a single byte, so it is the terminal
    // fallback — matching the original's utf-8 -> latin-1 -> cp1252 chain
    // collapsing to "always succeeds eventually".
    let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    (text.into_owned(), DetectedEncoding::Windows1252)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plain_utf8() {
        let (text, enc) = detect_and_decode("Château".as_bytes());
        assert_eq!(enc, DetectedEncoding::Utf8);
        assert_eq!(text, "Château");
    }

    #[test]
    fn strips_utf8_bom() {
        let mut bytes = vec![0xef, 0xbb, 0xbf];
        bytes.extend_from_slice("name,qty".as_bytes());
        let (text, enc) = detect_and_decode(&bytes);
        assert_eq!(enc, DetectedEncoding::Utf8Sig);
        assert_eq!(text, "name,qty");
    }

    #[test]
    fn falls_back_to_windows_1252_for_invalid_utf8() {
        let bytes = vec![b'A', 0xe0, b'B']; // 0xe0 is invalid as a UTF-8 lead byte here
        let (_, enc) = detect_and_decode(&bytes);
        assert_eq!(enc, DetectedEncoding::Windows1252);
    }
}
