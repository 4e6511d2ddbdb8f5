//! Image record model and data URI encoding

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Primary key of an image record (milliseconds since epoch unless caller-chosen).
pub type ImageId = i64;

/// MIME type used when the source declares none and sniffing fails.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Key path of the primary key inside a stored record.
pub const KEY_PATH: &str = "id";

/// One stored image.
///
/// `data` is a self-describing data URI; the store never looks inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: ImageId,
    pub data: String,
}

impl Record {
    pub fn new(id: ImageId, data: impl Into<String>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Parse the stored data URI back into its MIME type and bytes.
    pub fn decode(&self) -> StoreResult<DataUri> {
        DataUri::parse(&self.data)
    }
}

/// A base64 `data:` URI, the encoding images are stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Build a data URI for `bytes`.
    ///
    /// A non-empty declared MIME type wins; otherwise the type is sniffed from
    /// the image magic bytes, falling back to `application/octet-stream`.
    pub fn new(declared_mime: Option<&str>, bytes: Vec<u8>) -> Self {
        let mime_type = match declared_mime.map(str::trim) {
            Some(mime) if !mime.is_empty() => mime.to_string(),
            _ => sniff_mime_type(&bytes).to_string(),
        };
        Self { mime_type, bytes }
    }

    /// Parse a `data:<mime>;base64,<payload>` string.
    pub fn parse(uri: &str) -> StoreResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| StoreError::Decode("missing data: scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| StoreError::Decode("missing ',' separator in data URI".into()))?;
        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            StoreError::Decode("only base64 data URIs are supported".into())
        })?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| StoreError::Decode(format!("invalid base64 payload: {}", e)))?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data:{};base64,{}",
            self.mime_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

/// Guess an image MIME type from magic bytes.
fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_declared_mime_wins() {
        let uri = DataUri::new(Some("image/webp"), PNG_HEADER.to_vec());
        assert_eq!(uri.mime_type, "image/webp");
    }

    #[test]
    fn test_sniffs_png_when_undeclared() {
        let uri = DataUri::new(Some(""), PNG_HEADER.to_vec());
        assert_eq!(uri.mime_type, "image/png");
    }

    #[test]
    fn test_unknown_bytes_fall_back() {
        let uri = DataUri::new(None, b"plain text".to_vec());
        assert_eq!(uri.mime_type, FALLBACK_MIME_TYPE);
    }

    #[test]
    fn test_display_format() {
        let uri = DataUri::new(Some("image/gif"), b"GIF".to_vec());
        assert_eq!(uri.to_string(), "data:image/gif;base64,R0lG");
    }

    #[test]
    fn test_record_decode() {
        let record = Record::new(1686733930721, "data:image/png;base64,iVBORw==");
        let decoded = record.decode().unwrap();
        assert_eq!(decoded.mime_type, "image/png");
        assert_eq!(decoded.bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_parse_rejects_non_data_uri() {
        assert!(matches!(
            DataUri::parse("https://example.com/cat.png"),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_rejects_percent_encoded() {
        assert!(matches!(
            DataUri::parse("data:text/plain,hello"),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_base64() {
        assert!(matches!(
            DataUri::parse("data:image/png;base64,@@@"),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn test_record_serializes_as_id_and_data() {
        let record = Record::new(7, "data:image/png;base64,");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":7,"data":"data:image/png;base64,"}"#);
    }
}
