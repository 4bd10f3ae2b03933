//! # Documents
//!
//! A [`Document`] is one physical PDF in a template plus its declared
//! metadata. It decides whether the file can be sent byte-for-byte
//! ("static") or needs field values burned in first, and produces its entry
//! in the composite request.
//!
//! Every document gets a fresh wire id at construction. The id declared in
//! the template (`document_id`) is kept only for matching fields to
//! documents and never reaches the wire.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::allocator::DocumentIdAllocator;
use crate::data::{self, DataMap};
use crate::error::{Result, TemplateError};
use crate::field::Field;
use crate::pdf::PdfWriter;
use crate::recipient::Recipient;

/// One PDF in a template.
#[derive(Debug)]
pub struct Document {
    data: DataMap,
    base_directory: PathBuf,
    document_id: u32,
    blank_pdf: OnceLock<Vec<u8>>,
}

impl Document {
    /// Build a document from its template description.
    ///
    /// `document_id` and `path` are required.
    pub fn new(
        data: DataMap,
        base_directory: impl Into<PathBuf>,
        allocator: &DocumentIdAllocator,
    ) -> Result<Self> {
        for key in ["document_id", "path"] {
            if !data::is_set(&data, key) {
                return Err(TemplateError::MissingKey {
                    context: "document",
                    key,
                });
            }
        }

        Ok(Self {
            data,
            base_directory: base_directory.into(),
            document_id: allocator.next(),
            blank_pdf: OnceLock::new(),
        })
    }

    /// Shallow-merge computed attributes over the loaded ones.
    pub fn merge(&mut self, other: DataMap) {
        self.data.extend(other);
    }

    pub fn data(&self) -> &DataMap {
        &self.data
    }

    /// Wire id, unique within the allocator's rotation.
    pub fn document_id(&self) -> u32 {
        self.document_id
    }

    /// The `document_id` from the template, used to match fields.
    pub fn original_document_id(&self) -> String {
        data::text_at(&self.data, "document_id").unwrap_or_default()
    }

    pub fn name(&self) -> Option<String> {
        data::text_at(&self.data, "name")
    }

    /// Base directory joined with the declared relative path.
    pub fn path(&self) -> PathBuf {
        self.base_directory
            .join(data::text_at(&self.data, "path").unwrap_or_default())
    }

    pub fn fields_for_recipient<'r>(&self, recipient: &'r Recipient) -> Vec<&'r Field> {
        recipient.fields_for_document(self)
    }

    pub fn tabs_for_recipient<'r>(&self, recipient: &'r Recipient) -> Vec<&'r Field> {
        recipient.tabs_for_document(self)
    }

    /// True when no recipient has a PDF field on this document.
    /// Signature and initial tabs alone keep a document static.
    pub fn is_static(&self, recipients: &[&Recipient]) -> bool {
        recipients
            .iter()
            .all(|recipient| self.fields_for_recipient(recipient).is_empty())
    }

    /// File contents, read on first use and cached.
    pub fn blank_pdf_bytes(&self) -> Result<&[u8]> {
        if let Some(bytes) = self.blank_pdf.get() {
            return Ok(bytes);
        }

        let path = self.path();
        let bytes = std::fs::read(&path).map_err(|e| TemplateError::io(&path, e))?;
        tracing::debug!(path = %path.display(), len = bytes.len(), "read document");
        Ok(self.blank_pdf.get_or_init(|| bytes))
    }

    /// PDF bytes to send: the file itself when static, otherwise the
    /// writer's rendering with field values applied.
    pub fn to_pdf_bytes(
        &self,
        recipients: &[&Recipient],
        pdf_writer: &dyn PdfWriter,
    ) -> Result<Cow<'_, [u8]>> {
        if self.is_static(recipients) {
            Ok(Cow::Borrowed(self.blank_pdf_bytes()?))
        } else {
            tracing::debug!(document_id = self.document_id, "applying fields to PDF");
            Ok(Cow::Owned(pdf_writer.apply_fields(self, recipients)?))
        }
    }

    /// Write the bytes [`Document::to_pdf_bytes`] would send to `path`.
    pub fn save_pdf(
        &self,
        path: &Path,
        recipients: &[&Recipient],
        pdf_writer: &dyn PdfWriter,
    ) -> Result<()> {
        let bytes = self.to_pdf_bytes(recipients, pdf_writer)?;
        std::fs::write(path, bytes).map_err(|e| TemplateError::io(path, e))
    }

    /// Entry for the composite request: declared data without `path`, the
    /// wire `document_id`, and unless `multipart` the bytes as base64.
    pub fn serialize(
        &self,
        recipients: &[&Recipient],
        multipart: bool,
        pdf_writer: &dyn PdfWriter,
    ) -> Result<DataMap> {
        let mut entry = self.data.clone();
        entry.remove("path");
        entry.insert("document_id".to_string(), Value::from(self.document_id));

        if !multipart {
            let bytes = self.to_pdf_bytes(recipients, pdf_writer)?;
            entry.insert(
                "document_base64".to_string(),
                Value::String(STANDARD.encode(bytes)),
            );
        }

        Ok(entry)
    }
}
