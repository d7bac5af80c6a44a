//! Source text extraction.
//!
//! Uploads arrive as raw bytes plus the original filename; the extension
//! decides the extractor. Unsupported extensions are rejected here, before
//! any document row or vector record exists.

use crate::core::errors::RagError;

pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, RagError> {
    match extension_of(filename).as_deref() {
        Some("txt") => extract_plain_text(filename, bytes),
        Some("pdf") => extract_pdf(filename, bytes),
        _ => Err(RagError::Extraction(format!(
            "unsupported file type: {filename}"
        ))),
    }
}

fn extract_plain_text(filename: &str, bytes: &[u8]) -> Result<String, RagError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| RagError::Extraction(format!("{filename} is not valid UTF-8 text")))
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> Result<String, RagError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| RagError::Extraction(format!("failed to read {filename}: {err}")))
}

fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let text = extract_text("notes.txt", "hello world".as_bytes()).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn extension_is_case_insensitive() {
        let text = extract_text("NOTES.TXT", "hello".as_bytes()).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn invalid_utf8_is_an_extraction_error() {
        let err = extract_text("notes.txt", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        for name in ["slides.pptx", "archive.zip", "noextension"] {
            let err = extract_text(name, b"data").unwrap_err();
            assert!(matches!(err, RagError::Extraction(_)), "{name}");
        }
    }

    #[test]
    fn malformed_pdf_is_an_extraction_error() {
        let err = extract_text("broken.pdf", b"not a pdf at all").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }
}
