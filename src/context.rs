//! Build context — shared resources handed to template construction.
//!
//! Most callers want [`BuildContext::empty`]: the process-wide id allocator
//! and no PDF writer, which is enough for templates whose documents are all
//! static. Hosts that render overlays, or that want ids isolated from other
//! templates, construct their own.

use std::sync::Arc;

use crate::allocator::DocumentIdAllocator;
use crate::pdf::{PdfWriter, UnsupportedPdfWriter};

/// Shared resources used while building and serializing templates.
#[derive(Clone)]
pub struct BuildContext {
    /// Source of wire document ids.
    pub allocator: Arc<DocumentIdAllocator>,
    /// Renderer for documents that are not static.
    pub pdf_writer: Arc<dyn PdfWriter>,
}

impl BuildContext {
    /// Create a context from explicit resources.
    pub fn new(allocator: Arc<DocumentIdAllocator>, pdf_writer: Arc<dyn PdfWriter>) -> Self {
        Self {
            allocator,
            pdf_writer,
        }
    }

    /// A fresh allocator starting at 1 and no PDF writer.
    pub fn isolated() -> Self {
        Self::new(
            Arc::new(DocumentIdAllocator::new()),
            Arc::new(UnsupportedPdfWriter),
        )
    }

    /// Process-wide allocator and no PDF writer.
    pub fn empty() -> Self {
        Self::new(DocumentIdAllocator::global(), Arc::new(UnsupportedPdfWriter))
    }

    /// Replace the PDF writer.
    pub fn with_pdf_writer(mut self, pdf_writer: Arc<dyn PdfWriter>) -> Self {
        self.pdf_writer = pdf_writer;
        self
    }
}
