//! # Recipients
//!
//! A [`Recipient`] is one party of the envelope (signer, carbon copy, …).
//! Its template entry carries two groups of fields, each keyed by tab type:
//!
//! - `pdf_fields`: interactive fields that exist inside the PDF
//! - `tabs`: signature, initial and other annotation marks
//!
//! Both are split off the recipient data on construction; the rest passes
//! through to the wire untouched.

use indexmap::IndexMap;
use serde_json::Value;

use crate::data::{self, DataMap};
use crate::document::Document;
use crate::error::{Result, TemplateError};
use crate::field::Field;
use crate::template::Template;

/// Fields grouped by tab type, in declaration order.
pub type FieldsByType = IndexMap<String, Vec<Field>>;

/// One party of the envelope.
#[derive(Debug, Clone)]
pub struct Recipient {
    data: DataMap,
    fields: FieldsByType,
    tabs: FieldsByType,
}

impl Recipient {
    pub fn new(mut data: DataMap) -> Result<Self> {
        let fields = parse_fields(data.remove("pdf_fields"))?;
        let tabs = parse_fields(data.remove("tabs"))?;
        Ok(Self { data, fields, tabs })
    }

    /// Recipient data without `pdf_fields` and `tabs`.
    pub fn data(&self) -> &DataMap {
        &self.data
    }

    pub fn role_name(&self) -> Option<String> {
        data::text_at(&self.data, "role_name")
    }

    pub fn recipient_id(&self) -> Option<String> {
        data::text_at(&self.data, "recipient_id")
    }

    /// PDF-native fields by type.
    pub fn fields(&self) -> &FieldsByType {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldsByType {
        &mut self.fields
    }

    /// Annotation tabs by type.
    pub fn tabs(&self) -> &FieldsByType {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut FieldsByType {
        &mut self.tabs
    }

    /// First field or tab whose label matches.
    pub fn field_by_label(&self, label: &str) -> Option<&Field> {
        self.fields
            .values()
            .chain(self.tabs.values())
            .flatten()
            .find(|field| field.label().as_deref() == Some(label))
    }

    pub fn field_by_label_mut(&mut self, label: &str) -> Option<&mut Field> {
        self.fields
            .values_mut()
            .chain(self.tabs.values_mut())
            .flatten()
            .find(|field| field.label().as_deref() == Some(label))
    }

    /// PDF fields placed on `document`.
    pub fn fields_for_document(&self, document: &Document) -> Vec<&Field> {
        on_document(&self.fields, document)
    }

    /// Tabs placed on `document`.
    pub fn tabs_for_document(&self, document: &Document) -> Vec<&Field> {
        on_document(&self.tabs, document)
    }

    /// Wire entry: recipient data plus a `tabs` map of every tab and every
    /// uploadable PDF field, grouped by type. Document ids are resolved
    /// against `template`.
    pub fn serialize(&self, template: &Template) -> DataMap {
        let mut grouped: IndexMap<&str, Vec<Value>> = IndexMap::new();

        for (kind, tabs) in &self.tabs {
            grouped
                .entry(kind.as_str())
                .or_default()
                .extend(tabs.iter().map(|tab| Value::Object(tab.serialize(template))));
        }
        for (kind, fields) in &self.fields {
            let uploadable = fields
                .iter()
                .filter(|field| field.uploadable())
                .map(|field| Value::Object(field.serialize(template)));
            grouped.entry(kind.as_str()).or_default().extend(uploadable);
        }

        let tabs: DataMap = grouped
            .into_iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(kind, entries)| (kind.to_string(), Value::Array(entries)))
            .collect();

        let mut entry = self.data.clone();
        entry.insert("tabs".to_string(), Value::Object(tabs));
        entry
    }
}

fn on_document<'a>(fields: &'a FieldsByType, document: &Document) -> Vec<&'a Field> {
    let id = document.original_document_id();
    fields
        .values()
        .flatten()
        .filter(|field| field.original_document_id().as_deref() == Some(id.as_str()))
        .collect()
}

fn parse_fields(value: Option<Value>) -> Result<FieldsByType> {
    let groups = match value {
        None | Some(Value::Null) => return Ok(FieldsByType::new()),
        Some(Value::Object(groups)) => groups,
        Some(other) => {
            return Err(TemplateError::InvalidData(format!(
                "recipient: fields must be grouped by type, got {}",
                other
            )));
        }
    };

    groups
        .into_iter()
        .map(|(kind, entries)| {
            let fields = match entries {
                Value::Null => Vec::new(),
                Value::Array(entries) => entries
                    .iter()
                    .map(|entry| Field::new(data::as_object(entry, "recipient field")?))
                    .collect::<Result<Vec<_>>>()?,
                other => {
                    return Err(TemplateError::InvalidData(format!(
                        "recipient: '{}' must be a list, got {}",
                        kind, other
                    )));
                }
            };
            Ok((kind, fields))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BuildContext;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn signer() -> Recipient {
        let data = json!({
            "recipient_id": "1",
            "role_name": "buyer",
            "routing_order": "1",
            "pdf_fields": {
                "text_tabs": [
                    {"tab_type": "text", "tab_label": "full_name", "document_id": "1"},
                    {"tab_type": "text", "tab_label": "address", "document_id": "2"},
                ],
                "checkbox_tabs": [
                    {"tab_type": "checkbox", "tab_label": "agree", "document_id": "1"},
                ],
            },
            "tabs": {
                "sign_here_tabs": [
                    {"tab_type": "signhere", "tab_label": "sign", "document_id": "2"},
                ],
            },
        });
        Recipient::new(data.as_object().unwrap().clone()).unwrap()
    }

    #[test]
    fn test_data_excludes_fields_and_tabs() {
        let recipient = signer();
        assert_eq!(
            Value::Object(recipient.data().clone()),
            json!({"recipient_id": "1", "role_name": "buyer", "routing_order": "1"})
        );
        assert_eq!(recipient.role_name(), Some("buyer".to_string()));
        assert_eq!(recipient.recipient_id(), Some("1".to_string()));
    }

    #[test]
    fn test_fields_keep_type_order() {
        let recipient = signer();
        let kinds: Vec<&str> = recipient.fields().keys().map(String::as_str).collect();
        assert_eq!(kinds, vec!["text_tabs", "checkbox_tabs"]);
        assert_eq!(recipient.tabs()["sign_here_tabs"].len(), 1);
    }

    #[test]
    fn test_missing_groups_are_empty() {
        let data = json!({"role_name": "cc"});
        let recipient = Recipient::new(data.as_object().unwrap().clone()).unwrap();
        assert!(recipient.fields().is_empty());
        assert!(recipient.tabs().is_empty());
    }

    #[test]
    fn test_malformed_groups_fail() {
        let data = json!({"role_name": "cc", "tabs": ["nope"]});
        assert!(matches!(
            Recipient::new(data.as_object().unwrap().clone()),
            Err(TemplateError::InvalidData(_))
        ));
    }

    #[test]
    fn test_field_by_label() {
        let mut recipient = signer();
        assert!(recipient.field_by_label("sign").unwrap().is_signature());
        assert!(recipient.field_by_label("missing").is_none());

        recipient.field_by_label_mut("full_name").unwrap().set_value("Ada");
        assert_eq!(
            recipient.field_by_label("full_name").unwrap().data()["value"],
            json!("Ada")
        );
    }

    #[test]
    fn test_serialize_includes_tabs_and_uploadable_fields_only() {
        let mut recipient = signer();
        recipient.field_by_label_mut("agree").unwrap().set_uploadable(true);

        let template = Template::from_value(
            "/templates",
            "t",
            json!({"recipients": {}, "documents": [{"document_id": "2", "path": "two.pdf"}]}),
            &BuildContext::isolated(),
        )
        .unwrap();
        let entry = recipient.serialize(&template);
        assert_eq!(entry["role_name"], json!("buyer"));

        let tabs = entry["tabs"].as_object().unwrap();
        let kinds: Vec<&str> = tabs.keys().map(String::as_str).collect();
        assert_eq!(kinds, vec!["sign_here_tabs", "checkbox_tabs"]);
        assert_eq!(tabs["checkbox_tabs"][0]["locked"], json!("true"));
        assert_eq!(tabs["sign_here_tabs"][0]["tab_label"], json!("sign"));
        assert_eq!(tabs["sign_here_tabs"][0]["document_id"], json!(1));
        assert_eq!(tabs["checkbox_tabs"][0]["document_id"], Value::Null);
    }
}
