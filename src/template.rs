//! # Templates
//!
//! A [`Template`] is one signing package loaded from
//! `{base_directory}/{template_name}.yml`:
//!
//! ```yaml
//! name: purchase agreement
//! template_options: { email_subject: Please sign }
//! recipients:
//!   signers:
//!     - recipient_id: "1"
//!       role_name: buyer
//!       pdf_fields: { text_tabs: [...] }
//!       tabs: { sign_here_tabs: [...] }
//!   carbon_copies: [...]
//! documents:
//!   - document_id: "1"
//!     name: agreement.pdf
//!     path: agreement.pdf
//! ```
//!
//! The template owns its documents and recipients, resolves each field's
//! document by its declared id whenever an entry is built, and assembles composite entries for the signing
//! API, either with documents inline as base64 or with the PDF bytes split
//! out as multipart parts.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::context::BuildContext;
use crate::data::{self, DataMap};
use crate::document::Document;
use crate::error::{Result, TemplateError};
use crate::field::Field;
use crate::pdf::PdfWriter;
use crate::recipient::Recipient;

/// Template file extensions, in lookup order.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// Recipient type label (`signers`, `carbon_copies`, …) → recipients.
pub type RecipientsByType = IndexMap<String, Vec<Recipient>>;

/// Borrowed selection of recipients grouped by type.
pub type RecipientSelection<'a> = IndexMap<String, Vec<&'a Recipient>>;

/// Options for [`Template::composite_entry`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryOptions {
    /// Leave document bytes out of the entry and return them as parts.
    pub multipart: bool,
}

/// One composite template entry of the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeEntry {
    pub sequence: String,
    /// `None` when no recipients were given.
    pub recipients: Option<IndexMap<String, Vec<DataMap>>>,
    pub documents: Vec<DataMap>,
}

/// Out-of-band PDF payload referenced by document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPart {
    pub id: u32,
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

/// Result of [`Template::composite_entry`].
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeOutput {
    Inline(CompositeEntry),
    Multipart(CompositeEntry, Vec<BinaryPart>),
}

impl CompositeOutput {
    pub fn entry(&self) -> &CompositeEntry {
        match self {
            CompositeOutput::Inline(entry) | CompositeOutput::Multipart(entry, _) => entry,
        }
    }

    /// Split into the entry and its parts (empty when inline).
    pub fn into_parts(self) -> (CompositeEntry, Vec<BinaryPart>) {
        match self {
            CompositeOutput::Inline(entry) => (entry, Vec::new()),
            CompositeOutput::Multipart(entry, parts) => (entry, parts),
        }
    }
}

/// A loaded signing package.
pub struct Template {
    base_directory: PathBuf,
    template_name: String,
    data: DataMap,
    recipients: RecipientsByType,
    documents: Vec<Document>,
    document_index: HashMap<String, usize>,
    pdf_writer: Arc<dyn PdfWriter>,
}

impl Template {
    /// Load `{base_directory}/{template_name}.yml` (or `.yaml`).
    pub fn load(
        base_directory: impl AsRef<Path>,
        template_name: &str,
        ctx: &BuildContext,
    ) -> Result<Self> {
        let base_directory = base_directory.as_ref();
        let base_directory = std::path::absolute(base_directory)
            .map_err(|e| TemplateError::io(base_directory, e))?;
        let path = template_path(&base_directory, template_name);
        tracing::debug!(path = %path.display(), "loading template");

        let value = data::read_yaml(&path)?;
        Self::from_value(base_directory, template_name, value, ctx)
    }

    /// Load several templates from one directory in parallel. Ids come from
    /// the context's shared allocator, so documents across all returned
    /// templates get distinct wire ids within one rotation.
    pub fn load_all(
        base_directory: impl AsRef<Path>,
        template_names: &[&str],
        ctx: &BuildContext,
    ) -> Result<Vec<Self>> {
        let base_directory = base_directory.as_ref();
        template_names
            .par_iter()
            .map(|name| Self::load(base_directory, name, ctx))
            .collect()
    }

    /// Build a template from already-loaded, normalized data.
    pub fn from_value(
        base_directory: impl Into<PathBuf>,
        template_name: &str,
        value: Value,
        ctx: &BuildContext,
    ) -> Result<Self> {
        let base_directory = base_directory.into();
        let data = match value {
            Value::Object(data) => data,
            other => {
                return Err(TemplateError::InvalidData(format!(
                    "template: expected a mapping, got {}",
                    other
                )));
            }
        };

        let recipients = parse_recipients(&data)?;
        let documents = parse_documents(&data, &base_directory, ctx)?;

        let mut document_index = HashMap::new();
        for (position, document) in documents.iter().enumerate() {
            document_index
                .entry(document.original_document_id())
                .or_insert(position);
        }

        tracing::debug!(
            template = template_name,
            documents = documents.len(),
            recipients = recipients.values().map(Vec::len).sum::<usize>(),
            "loaded template"
        );

        Ok(Self {
            base_directory,
            template_name: template_name.to_string(),
            data,
            recipients,
            documents,
            document_index,
            pdf_writer: Arc::clone(&ctx.pdf_writer),
        })
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn data(&self) -> &DataMap {
        &self.data
    }

    pub fn name(&self) -> Option<String> {
        data::text_at(&self.data, "name")
    }

    /// Opaque options passed through to the caller.
    pub fn template_options(&self) -> Option<&Value> {
        self.data.get("template_options")
    }

    pub fn recipients(&self) -> &RecipientsByType {
        &self.recipients
    }

    pub fn recipients_mut(&mut self) -> &mut RecipientsByType {
        &mut self.recipients
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [Document] {
        &mut self.documents
    }

    pub fn pdf_writer(&self) -> &dyn PdfWriter {
        &*self.pdf_writer
    }

    pub fn signers(&self) -> &[Recipient] {
        self.recipients
            .get("signers")
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Document whose template-declared id is `original_id`.
    pub fn document_by_original_id(&self, original_id: &str) -> Option<&Document> {
        self.document_index
            .get(original_id)
            .map(|&position| &self.documents[position])
    }

    /// The document a field was declared against, if any.
    pub fn document_for_field(&self, field: &Field) -> Option<&Document> {
        field.resolve_document(self)
    }

    // ========================================================================
    // RECIPIENT SELECTION
    // ========================================================================

    /// Every recipient, grouped by type.
    pub fn recipients_by_type(&self) -> RecipientSelection<'_> {
        self.recipients
            .iter()
            .map(|(kind, recipients)| (kind.clone(), recipients.iter().collect()))
            .collect()
    }

    /// Recipients whose role is in `roles`, grouped by type. Types with no
    /// match are left out.
    pub fn recipients_by_type_for_roles(&self, roles: &[&str]) -> RecipientSelection<'_> {
        self.recipients
            .iter()
            .filter_map(|(kind, recipients)| {
                let matching: Vec<&Recipient> = recipients
                    .iter()
                    .filter(|recipient| has_role(recipient, roles))
                    .collect();
                (!matching.is_empty()).then(|| (kind.clone(), matching))
            })
            .collect()
    }

    /// All recipients matching any of `roles`, regardless of type.
    pub fn recipients_for_roles(&self, roles: &[&str]) -> Vec<&Recipient> {
        self.recipients
            .values()
            .flatten()
            .filter(|recipient| has_role(recipient, roles))
            .collect()
    }

    /// First recipient with `role`.
    pub fn recipient_for_role(&self, role: &str) -> Option<&Recipient> {
        self.recipients
            .values()
            .flatten()
            .find(|recipient| recipient.role_name().as_deref() == Some(role))
    }

    /// Visit each recipient's tabs, then its fields, recipient by recipient.
    pub fn for_each_recipient_tab(recipients: &[&Recipient], mut visit: impl FnMut(&Field)) {
        for recipient in recipients {
            recipient.tabs().values().flatten().for_each(&mut visit);
            recipient.fields().values().flatten().for_each(&mut visit);
        }
    }

    /// Mutable variant of [`Template::for_each_recipient_tab`] over the
    /// recipients holding one of `roles`.
    pub fn for_each_recipient_tab_mut(&mut self, roles: &[&str], mut visit: impl FnMut(&mut Field)) {
        for recipient in self.recipients.values_mut().flatten() {
            if !has_role(recipient, roles) {
                continue;
            }
            recipient.tabs_mut().values_mut().flatten().for_each(&mut visit);
            recipient.fields_mut().values_mut().flatten().for_each(&mut visit);
        }
    }

    // ========================================================================
    // COMPOSITE ENTRY
    // ========================================================================

    /// Assemble one composite template entry for `recipients`.
    ///
    /// Every document is rendered against the full flattened recipient set.
    /// With `options.multipart` the entry carries no document bytes and the
    /// PDFs come back as parts, in document order.
    pub fn composite_entry(
        &self,
        recipients: &RecipientSelection<'_>,
        sequence: impl Display,
        options: EntryOptions,
    ) -> Result<CompositeOutput> {
        let all_recipients: Vec<&Recipient> = recipients.values().flatten().copied().collect();
        let pdf_writer = self.pdf_writer();

        let recipients_entry: Option<IndexMap<String, Vec<DataMap>>> =
            (!recipients.is_empty()).then(|| {
                recipients
                    .iter()
                    .map(|(kind, recipients)| {
                        (kind.clone(), recipients.iter().map(|r| r.serialize(self)).collect())
                    })
                    .collect()
            });

        let documents = self
            .documents
            .iter()
            .map(|document| document.serialize(&all_recipients, options.multipart, pdf_writer))
            .collect::<Result<Vec<_>>>()?;

        let entry = CompositeEntry {
            sequence: sequence.to_string(),
            recipients: recipients_entry,
            documents,
        };

        if !options.multipart {
            return Ok(CompositeOutput::Inline(entry));
        }

        let parts = self
            .documents
            .iter()
            .zip(&entry.documents)
            .map(|(document, emitted)| {
                Ok(BinaryPart {
                    id: document.document_id(),
                    filename: data::text_at(emitted, "name"),
                    data: document.to_pdf_bytes(&all_recipients, pdf_writer)?.into_owned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompositeOutput::Multipart(entry, parts))
    }
}

fn has_role(recipient: &Recipient, roles: &[&str]) -> bool {
    recipient
        .role_name()
        .is_some_and(|role| roles.contains(&role.as_str()))
}

fn template_path(base_directory: &Path, template_name: &str) -> PathBuf {
    TEMPLATE_EXTENSIONS
        .iter()
        .map(|ext| base_directory.join(format!("{}.{}", template_name, ext)))
        .find(|path| path.is_file())
        .unwrap_or_else(|| base_directory.join(format!("{}.{}", template_name, TEMPLATE_EXTENSIONS[0])))
}

fn parse_recipients(data: &DataMap) -> Result<RecipientsByType> {
    data::object(data, "template", "recipients")?
        .iter()
        .map(|(kind, recipients)| {
            let recipients = match recipients {
                Value::Array(recipients) => recipients
                    .iter()
                    .map(|recipient| Recipient::new(data::as_object(recipient, "recipient")?))
                    .collect::<Result<Vec<_>>>()?,
                other => {
                    return Err(TemplateError::InvalidData(format!(
                        "template: recipients '{}' must be a list, got {}",
                        kind, other
                    )));
                }
            };
            Ok((kind.clone(), recipients))
        })
        .collect()
}

fn parse_documents(data: &DataMap, base_directory: &Path, ctx: &BuildContext) -> Result<Vec<Document>> {
    data::array(data, "template", "documents")?
        .iter()
        .map(|document| {
            Document::new(
                data::as_object(document, "document")?,
                base_directory,
                &ctx.allocator,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn template() -> Template {
        let value = json!({
            "name": "template_name",
            "template_options": {"some": "template", "options": true},
            "recipients": {
                "signers": [
                    {"recipient_id": "1", "role_name": "signer_0", "pdf_fields": {}, "tabs": {}},
                    {"recipient_id": "2", "role_name": "signer_1", "pdf_fields": {}, "tabs": {}},
                ],
                "carbon_copies": [
                    {"recipient_id": "123", "role_name": "test", "pdf_fields": {}, "tabs": {}},
                ],
            },
            "documents": [{"document_id": "42", "path": "some_path.pdf"}],
        });
        Template::from_value("/templates", "template_name", value, &BuildContext::isolated())
            .unwrap()
    }

    fn template_with_fields() -> Template {
        let value = json!({
            "recipients": {
                "signers": [{
                    "role_name": "buyer",
                    "pdf_fields": {
                        "text_tabs": [
                            {"tab_type": "text", "tab_label": "t1", "document_id": "2"},
                            {"tab_type": "text", "tab_label": "t2", "document_id": "9"},
                        ],
                        "checkbox_tabs": [{"tab_type": "checkbox", "tab_label": "c1", "document_id": "1"}],
                    },
                    "tabs": {
                        "sign_here_tabs": [{"tab_type": "signhere", "tab_label": "s1", "document_id": "1"}],
                        "initial_here_tabs": [{"tab_type": "initialhere", "tab_label": "i1", "document_id": "2"}],
                    },
                }],
            },
            "documents": [
                {"document_id": "1", "path": "one.pdf"},
                {"document_id": "2", "path": "two.pdf"},
            ],
        });
        Template::from_value("/templates", "fields", value, &BuildContext::isolated()).unwrap()
    }

    fn roles(recipients: &[&Recipient]) -> Vec<String> {
        recipients.iter().filter_map(|r| r.role_name()).collect()
    }

    #[test]
    fn test_parses_recipients_in_order() {
        let template = template();
        let kinds: Vec<&str> = template.recipients().keys().map(String::as_str).collect();
        assert_eq!(kinds, vec!["signers", "carbon_copies"]);
        assert_eq!(template.signers().len(), 2);
        assert_eq!(
            Value::Object(template.signers()[1].data().clone()),
            json!({"recipient_id": "2", "role_name": "signer_1"})
        );
    }

    #[test]
    fn test_parses_documents() {
        let template = template();
        assert_eq!(template.documents().len(), 1);
        assert_eq!(
            Value::Object(template.documents()[0].data().clone()),
            json!({"document_id": "42", "path": "some_path.pdf"})
        );
        assert_eq!(
            template.documents()[0].path(),
            PathBuf::from("/templates/some_path.pdf")
        );
    }

    #[test]
    fn test_template_options() {
        let template = template();
        assert_eq!(
            template.template_options(),
            Some(&json!({"some": "template", "options": true}))
        );
        assert_eq!(template.name(), Some("template_name".to_string()));
    }

    #[test]
    fn test_missing_required_keys_fail_fast() {
        let ctx = BuildContext::isolated();
        let err = Template::from_value("/t", "x", json!({"documents": []}), &ctx).err().unwrap();
        assert!(matches!(err, TemplateError::MissingKey { key: "recipients", .. }));

        let err = Template::from_value("/t", "x", json!({"recipients": {}}), &ctx).err().unwrap();
        assert!(matches!(err, TemplateError::MissingKey { key: "documents", .. }));

        let err = Template::from_value("/t", "x", json!([1, 2]), &ctx).err().unwrap();
        assert!(matches!(err, TemplateError::InvalidData(_)));
    }

    #[test]
    fn test_recipients_for_roles() {
        let template = template();
        assert_eq!(
            roles(&template.recipients_for_roles(&["signer_1", "test"])),
            vec!["signer_1", "test"]
        );
        assert!(template.recipients_for_roles(&["nobody"]).is_empty());
    }

    #[test]
    fn test_recipient_for_role() {
        let template = template();
        let found = template.recipient_for_role("test").unwrap();
        assert!(std::ptr::eq(found, &template.recipients()["carbon_copies"][0]));
        assert!(template.recipient_for_role("fake").is_none());
    }

    #[test]
    fn test_recipients_by_type_for_roles_drops_empty_types() {
        let template = template();
        let selection = template.recipients_by_type_for_roles(&["signer_0"]);
        let kinds: Vec<&str> = selection.keys().map(String::as_str).collect();
        assert_eq!(kinds, vec!["signers"]);
        assert_eq!(roles(&selection["signers"]), vec!["signer_0"]);
    }

    #[test]
    fn test_for_each_recipient_tab_visits_tabs_before_fields() {
        let template = template_with_fields();
        let recipients = template.recipients_for_roles(&["buyer"]);

        let mut labels = Vec::new();
        Template::for_each_recipient_tab(&recipients, |field| {
            labels.push(field.label().unwrap());
        });
        assert_eq!(labels, vec!["s1", "i1", "t1", "t2", "c1"]);
    }

    #[test]
    fn test_for_each_recipient_tab_mut() {
        let mut template = template_with_fields();
        template.for_each_recipient_tab_mut(&["buyer"], |field| field.set_disabled(true));

        let recipients = template.recipients_for_roles(&["buyer"]);
        let mut all_disabled = true;
        Template::for_each_recipient_tab(&recipients, |field| {
            all_disabled &= field.is_disabled();
        });
        assert!(all_disabled);
    }

    #[test]
    fn test_fields_resolve_to_documents() {
        let template = template_with_fields();
        let signer = &template.signers()[0];

        let t1 = signer.field_by_label("t1").unwrap();
        let two = template.document_by_original_id("2").unwrap();
        assert_eq!(t1.document_id(&template), Some(two.document_id()));
        assert!(std::ptr::eq(template.document_for_field(t1).unwrap(), two));

        let t2 = signer.field_by_label("t2").unwrap();
        assert_eq!(t2.document_id(&template), None);
        assert!(t2.resolve_document(&template).is_none());
        assert_eq!(t2.serialize(&template)["document_id"], Value::Null);
    }

    #[test]
    fn test_document_id_merged_after_load_is_resolved() {
        let mut template = template_with_fields();
        let two = template.document_by_original_id("2").unwrap().document_id();

        let sign = template.recipients_mut()["signers"][0]
            .field_by_label_mut("s1")
            .unwrap();
        sign.merge(json!({"document_id": "2"}).as_object().unwrap().clone());

        let signer = &template.signers()[0];
        let sign = signer.field_by_label("s1").unwrap();
        assert_eq!(sign.resolve_document(&template).map(Document::document_id), Some(two));
        assert_eq!(sign.document_id(&template), Some(two));

        let entry = signer.serialize(&template);
        assert_eq!(entry["tabs"]["sign_here_tabs"][0]["document_id"], json!(two));
    }

    #[test]
    fn test_tab_added_after_load_is_resolved() {
        let mut template = template_with_fields();
        let one = template.document_by_original_id("1").unwrap().document_id();

        let data = json!({"tab_type": "signhere", "tab_label": "s2", "document_id": "1"});
        let tab = Field::new(data.as_object().unwrap().clone()).unwrap();
        template.recipients_mut()["signers"][0]
            .tabs_mut()
            .entry("sign_here_tabs".to_string())
            .or_default()
            .push(tab);

        let added = template.signers()[0].field_by_label("s2").unwrap();
        assert_eq!(added.document_id(&template), Some(one));

        let entry = template.signers()[0].serialize(&template);
        let sign_here = entry["tabs"]["sign_here_tabs"].as_array().unwrap();
        assert_eq!(sign_here.len(), 2);
        assert_eq!(sign_here[1]["tab_label"], json!("s2"));
        assert_eq!(sign_here[1]["document_id"], json!(one));
    }

    #[test]
    fn test_documents_mut_merges_into_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("some_path.pdf"), b"pdf").unwrap();
        let value = json!({
            "recipients": {},
            "documents": [{"document_id": "42", "path": "some_path.pdf", "name": "n.pdf"}],
        });
        let mut template =
            Template::from_value(dir.path(), "t", value, &BuildContext::isolated()).unwrap();

        let rename = json!({"name": "renamed.pdf"}).as_object().unwrap().clone();
        template.documents_mut()[0].merge(rename);

        let output = template
            .composite_entry(&RecipientSelection::new(), 1, EntryOptions { multipart: true })
            .unwrap();
        assert_eq!(output.entry().documents[0]["name"], json!("renamed.pdf"));
        let (_, parts) = output.into_parts();
        assert_eq!(parts[0].filename.as_deref(), Some("renamed.pdf"));
    }

    #[test]
    fn test_staticness_per_document() {
        let template = template_with_fields();
        let recipients = template.recipients_for_roles(&["buyer"]);
        let one = template.document_by_original_id("1").unwrap();
        let two = template.document_by_original_id("2").unwrap();
        assert!(!one.is_static(&recipients));
        assert!(!two.is_static(&recipients));

        let signer = &template.signers()[0];
        assert_eq!(one.tabs_for_recipient(signer).len(), 1);
        assert_eq!(two.fields_for_recipient(signer).len(), 1);
    }

    #[test]
    fn test_composite_entry_without_recipients() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("some_path.pdf"), b"pdf").unwrap();
        let value = json!({
            "recipients": {},
            "documents": [{"document_id": "42", "path": "some_path.pdf", "name": "n.pdf"}],
        });
        let template =
            Template::from_value(dir.path(), "t", value, &BuildContext::isolated()).unwrap();

        let output = template
            .composite_entry(&RecipientSelection::new(), 3, EntryOptions::default())
            .unwrap();
        let entry = output.entry();
        assert_eq!(entry.sequence, "3");
        assert_eq!(entry.recipients, None);
        assert_eq!(entry.documents.len(), 1);
        assert_eq!(entry.documents[0]["document_base64"], json!("cGRm"));

        let serialized = serde_json::to_value(entry).unwrap();
        assert_eq!(serialized["recipients"], Value::Null);
    }
}
