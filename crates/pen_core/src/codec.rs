//! Blob codec: binary payloads to/from transport-safe text.
//!
//! # Responsibility
//! - Encode payload bytes as standard padded base64, in bounded chunks.
//! - Wrap/unwrap the `data:<mime>;base64,<payload>` form used in bundles.
//! - Sniff image mime types from magic bytes.
//!
//! # Invariants
//! - Chunk size is a multiple of 3, so chunked output equals single-pass
//!   output byte for byte.
//! - `decode_data_url(encode_data_url(mime, bytes))` yields `bytes`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Input bytes per base64 chunk.
pub const ENCODE_CHUNK_BYTES: usize = 3 * 0x2000;

/// Mime type used when nothing better is known.
pub const FALLBACK_MIME: &str = "application/octet-stream";

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("invalid data url: {0}")]
    InvalidDataUrl(&'static str),
}

/// Decoded data-url payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    /// Mime type declared in the data url; `None` for bare base64 input or an
    /// empty declaration.
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// Encodes `bytes` as base64, one bounded chunk at a time.
pub fn encode_base64(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Decodes standard padded base64. Surrounding whitespace is ignored.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text.trim())?)
}

/// Wraps `bytes` into `data:<mime>;base64,<payload>`.
pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let payload = encode_base64(bytes);
    let mut out = String::with_capacity(
        DATA_URL_PREFIX.len() + mime_type.len() + BASE64_MARKER.len() + 1 + payload.len(),
    );
    out.push_str(DATA_URL_PREFIX);
    out.push_str(mime_type);
    out.push_str(BASE64_MARKER);
    out.push(',');
    out.push_str(&payload);
    out
}

/// Decodes a data url, or bare base64 when no `data:` prefix is present.
pub fn decode_data_url(text: &str) -> Result<DecodedBlob, CodecError> {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix(DATA_URL_PREFIX) else {
        return Ok(DecodedBlob {
            mime_type: None,
            data: decode_base64(trimmed)?,
        });
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or(CodecError::InvalidDataUrl("missing `,` separator"))?;
    let mime = header
        .strip_suffix(BASE64_MARKER)
        .ok_or(CodecError::InvalidDataUrl("only base64 data urls are supported"))?;
    // Parameters such as `;charset=utf-8` are kept out of the mime type.
    let mime = mime.split(';').next().unwrap_or_default().trim();

    Ok(DecodedBlob {
        mime_type: (!mime.is_empty()).then(|| mime.to_string()),
        data: decode_base64(payload)?,
    })
}

/// Sniffs an image mime type from magic bytes.
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"BM", "image/bmp"),
    ];

    for (magic, mime) in SIGNATURES {
        if bytes.starts_with(magic) {
            return mime;
        }
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }
    if looks_like_svg(bytes) {
        return "image/svg+xml";
    }
    FALLBACK_MIME
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        // The cut at 512 bytes may land inside a multi-byte character.
        Err(err) if err.error_len().is_none() => {
            match std::str::from_utf8(&head[..err.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };
    let text = text.trim_start_matches('\u{feff}').trim_start();
    text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_encoding_matches_single_pass() {
        let bytes: Vec<u8> = (0..(ENCODE_CHUNK_BYTES * 3 + 7))
            .map(|idx| (idx % 251) as u8)
            .collect();
        assert_eq!(encode_base64(&bytes), STANDARD.encode(&bytes));
    }

    #[test]
    fn data_url_roundtrip_keeps_mime_and_bytes() {
        let url = encode_data_url("application/pdf", b"%PDF-1.7");
        assert!(url.starts_with("data:application/pdf;base64,"));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(decoded.data, b"%PDF-1.7");
    }

    #[test]
    fn decode_accepts_bare_base64_and_empty_mime() {
        let bare = decode_data_url("aGVsbG8=").unwrap();
        assert_eq!(bare.mime_type, None);
        assert_eq!(bare.data, b"hello");

        let empty_mime = decode_data_url("data:;base64,aGVsbG8=").unwrap();
        assert_eq!(empty_mime.mime_type, None);
        assert_eq!(empty_mime.data, b"hello");
    }

    #[test]
    fn decode_rejects_non_base64_data_url() {
        let err = decode_data_url("data:text/plain,hello").unwrap_err();
        assert!(matches!(err, CodecError::InvalidDataUrl(_)));
        let err = decode_data_url("data:text/plain;base64,@@@").unwrap_err();
        assert!(matches!(err, CodecError::InvalidBase64(_)));
    }

    #[test]
    fn sniff_recognizes_common_image_formats() {
        assert_eq!(sniff_image_mime(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(sniff_image_mime(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(sniff_image_mime(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(
            sniff_image_mime(b"<?xml version=\"1.0\"?><svg></svg>"),
            "image/svg+xml"
        );
        assert_eq!(sniff_image_mime(b"plain"), FALLBACK_MIME);
    }

    #[test]
    fn sniff_svg_when_head_cut_splits_a_character() {
        let mut svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"><title>".to_vec();
        while svg.len() < 511 {
            svg.push(b'a');
        }
        svg.extend_from_slice("é</title></svg>".as_bytes());
        assert!(std::str::from_utf8(&svg[..512]).is_err());
        assert_eq!(sniff_image_mime(&svg), "image/svg+xml");

        assert_eq!(sniff_image_mime(b"<svg \xff\xfe>"), FALLBACK_MIME);
    }
}
