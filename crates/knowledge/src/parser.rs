//! Upload type detection and extracted-text cleanup.

use firegpt_core::{AppError, AppResult};
use std::path::Path;

/// Accepted upload extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "pdf"];

/// Document classification for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl DocumentKind {
    /// Detect the declared kind from a file name's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "bmp" => Some(Self::Bmp),
            "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Detect the actual kind from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        const SIGNATURES: &[(&[u8], DocumentKind)] = &[
            (b"%PDF-", DocumentKind::Pdf),
            (b"\x89PNG\r\n\x1a\n", DocumentKind::Png),
            (b"\xff\xd8\xff", DocumentKind::Jpeg),
            (b"BM", DocumentKind::Bmp),
            (b"II*\x00", DocumentKind::Tiff),
            (b"MM\x00*", DocumentKind::Tiff),
        ];

        SIGNATURES
            .iter()
            .find(|(magic, _)| bytes.starts_with(magic))
            .map(|(_, kind)| *kind)
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    /// File suffix used for the temporary copy handed to extractors.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Pdf => ".pdf",
            Self::Png => ".png",
            Self::Bmp => ".bmp",
            Self::Tiff => ".tiff",
        }
    }
}

/// Check a named upload against the allow-list and its magic bytes.
pub fn classify_upload(filename: &str, bytes: &[u8]) -> AppResult<DocumentKind> {
    let declared = DocumentKind::from_path(Path::new(filename)).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Unsupported file type for '{}'. Allowed: {}",
            filename,
            ALLOWED_EXTENSIONS.join(", ")
        ))
    })?;

    match DocumentKind::sniff(bytes) {
        Some(actual) if actual == declared => Ok(declared),
        Some(actual) => Err(AppError::InvalidInput(format!(
            "'{}' is named as {} but contains {}",
            filename,
            declared.as_str(),
            actual.as_str()
        ))),
        None => Err(AppError::InvalidInput(format!(
            "'{}' does not look like a {} file",
            filename,
            declared.as_str()
        ))),
    }
}

/// Normalize OCR and pdftotext output: drop form feeds, trim lines and
/// collapse runs of blank lines.
pub fn clean_extracted_text(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut blank_run = 0;

    for line in raw.replace('\u{c}', "\n").lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run == 1 && !result.is_empty() {
                result.push('\n');
            }
            continue;
        }
        blank_run = 0;
        result.push_str(trimmed);
        result.push('\n');
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_detection_is_case_insensitive() {
        assert_eq!(DocumentKind::from_path(Path::new("map.PNG")), Some(DocumentKind::Png));
        assert_eq!(DocumentKind::from_path(Path::new("a.jpeg")), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::from_path(Path::new("a.JPG")), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentKind::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(DocumentKind::sniff(b"%PDF-1.7\n"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::sniff(b"\x89PNG\r\n\x1a\n...."), Some(DocumentKind::Png));
        assert_eq!(DocumentKind::sniff(b"\xff\xd8\xff\xe0"), Some(DocumentKind::Jpeg));
        assert_eq!(DocumentKind::sniff(b"MM\x00*rest"), Some(DocumentKind::Tiff));
        assert_eq!(DocumentKind::sniff(b"hello"), None);
        assert_eq!(DocumentKind::sniff(b""), None);
    }

    #[test]
    fn test_classify_accepts_matching_upload() {
        assert_eq!(classify_upload("plan.pdf", b"%PDF-1.4").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn test_classify_rejects_mismatch() {
        let result = classify_upload("photo.png", b"%PDF-1.4");
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_classify_rejects_unknown_extension() {
        let result = classify_upload("script.sh", b"#!/bin/sh");
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_clean_extracted_text() {
        let raw = "  Page one  \n\n\n\nLine two\n\u{c}Page two\n   \n";
        assert_eq!(clean_extracted_text(raw), "Page one\n\nLine two\n\nPage two");
    }
}
