//! PDF structure parsing.
//!
//! Only the page count is needed here; it is the routing signal that
//! decides the credit reward and whether a document goes through the
//! repair pipeline or is uploaded as-is.

use std::path::Path;

use thiserror::Error;

/// Typed failure for documents that cannot be page-counted.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to read PDF file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("PDF has no pages")]
    NoPages,
}

/// Count the pages of a PDF document on disk.
///
/// Any valid document reports at least one page.
pub fn count_pages(path: &Path) -> Result<usize, PdfError> {
    let bytes = std::fs::read(path)?;
    count_pages_in_bytes(&bytes)
}

/// Count the pages of a PDF already in memory.
pub fn count_pages_in_bytes(bytes: &[u8]) -> Result<usize, PdfError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| PdfError::Parse(e.to_string()))?;
    let count = doc.get_pages().len();
    if count == 0 {
        return Err(PdfError::NoPages);
    }
    Ok(count)
}


#[cfg(test)]
mod tests {
    use super::test_support::build_pdf;
    use super::*;

    #[test]
    fn single_page() {
        assert_eq!(count_pages_in_bytes(&build_pdf(1)).unwrap(), 1);
    }

    #[test]
    fn multi_page() {
        assert_eq!(count_pages_in_bytes(&build_pdf(10)).unwrap(), 10);
    }

    #[test]
    fn from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, build_pdf(3)).unwrap();
        assert_eq!(count_pages(&path).unwrap(), 3);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = count_pages_in_bytes(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, PdfError::Parse(_)));
    }

    #[test]
    fn missing_file_is_io() {
        let err = count_pages(Path::new("/nonexistent/doc.pdf")).unwrap_err();
        assert!(matches!(err, PdfError::Io(_)));
    }
}
