//! # PDF Overlay
//!
//! Documents whose recipients have PDF-native fields cannot be sent as-is:
//! current field values must be burned into the file first. That rendering
//! lives outside this crate, behind [`PdfWriter`].

use crate::document::Document;
use crate::error::{Result, TemplateError};
use crate::recipient::Recipient;

/// Renders current field values into a document's PDF.
pub trait PdfWriter: Send + Sync {
    /// Return the PDF bytes of `document` with every field of `recipients`
    /// assigned to it applied.
    fn apply_fields(&self, document: &Document, recipients: &[&Recipient]) -> Result<Vec<u8>>;
}

/// Writer used when the host supplies none. Static documents never reach
/// it; anything else fails with [`TemplateError::Overlay`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPdfWriter;

impl PdfWriter for UnsupportedPdfWriter {
    fn apply_fields(&self, document: &Document, _recipients: &[&Recipient]) -> Result<Vec<u8>> {
        Err(TemplateError::Overlay(format!(
            "document {} has fields to apply but no PDF writer is configured",
            document.path().display()
        )))
    }
}
