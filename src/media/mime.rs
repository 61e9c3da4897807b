//! Content sniffing and base64 payload decoding.

use crate::core::{Result, SchemaError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Container formats whose real type only the declared MIME type reveals.
const ZIP_CONTAINERS: &[&str] = &[
    "application/vnd.openxmlformats-officedocument",
    "application/vnd.oasis.opendocument",
    "application/vnd.apple",
    "application/x-iwork",
];

/// A decoded base64 upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub bytes: Vec<u8>,
    pub declared_mime: Option<String>,
}

/// Decode a raw base64 string or a `data:<mime>;base64,<data>` URI.
pub fn decode_base64_payload(payload: &str) -> Result<DecodedPayload> {
    let payload = payload.trim();
    let (declared_mime, data) = match payload.strip_prefix("data:") {
        Some(uri) => {
            let (header, data) = uri
                .split_once(',')
                .ok_or_else(|| SchemaError::Media("malformed data URI".to_string()))?;
            let mime = header
                .split(';')
                .next()
                .filter(|mime| !mime.is_empty())
                .map(str::to_string);
            (mime, data)
        }
        None => (None, payload),
    };

    let bytes = STANDARD
        .decode(data.as_bytes())
        .map_err(|err| SchemaError::Media(format!("invalid base64 payload: {err}")))?;

    Ok(DecodedPayload {
        bytes,
        declared_mime,
    })
}

/// MIME type from leading bytes.
///
/// Zip-based office documents sniff as `application/zip`; the declared type
/// wins for those. Undetectable binary content is `application/octet-stream`.
pub fn sniff_mime(bytes: &[u8], declared: Option<&str>) -> String {
    let detected = detect(bytes);

    if let (Some("application/zip"), Some(declared)) = (detected, declared) {
        if ZIP_CONTAINERS.iter().any(|prefix| declared.starts_with(prefix)) {
            return declared.to_string();
        }
    }

    if let (Some("text/plain"), Some(declared)) = (detected, declared) {
        if declared.starts_with("text/") {
            return declared.to_string();
        }
    }

    detected.unwrap_or(OCTET_STREAM).to_string()
}

fn detect(bytes: &[u8]) -> Option<&'static str> {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1", "application/msword"),
    ];

    if let Some((_, mime)) = SIGNATURES.iter().find(|(magic, _)| bytes.starts_with(magic)) {
        return Some(mime);
    }

    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    if !bytes.is_empty() && !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok() {
        return Some("text/plain");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_data_uri_is_decoded() {
        let encoded = format!("data:image/png;base64,{}", STANDARD.encode(PNG_HEADER));
        let decoded = decode_base64_payload(&encoded).unwrap();
        assert_eq!(decoded.bytes, PNG_HEADER);
        assert_eq!(decoded.declared_mime.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_raw_base64_is_decoded() {
        let decoded = decode_base64_payload(&STANDARD.encode(b"hello")).unwrap();
        assert_eq!(decoded.bytes, b"hello");
        assert!(decoded.declared_mime.is_none());
        assert!(decode_base64_payload("data:image/png;base64").is_err());
        assert!(decode_base64_payload("***").is_err());
    }

    #[test]
    fn test_sniffing_prefers_content() {
        assert_eq!(sniff_mime(PNG_HEADER, Some("application/pdf")), "image/png");
        assert_eq!(sniff_mime(b"a,b\n1,2\n", Some("text/csv")), "text/csv");
        assert_eq!(sniff_mime(b"plain", None), "text/plain");
        assert_eq!(
            sniff_mime(
                b"PK\x03\x04rest",
                Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
            ),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(sniff_mime(b"PK\x03\x04rest", Some("image/png")), "application/zip");
        assert_eq!(sniff_mime(&[0, 1, 2], None), OCTET_STREAM);
    }
}
