//! # Fields
//!
//! A [`Field`] is one form element placed on a document for a recipient.
//! Fields come in three shapes:
//!
//! - **simple**: text, checkbox, signature, initial and any other tab type
//! - **radio group**: owns mutually exclusive `radios`
//! - **list**: owns single-select `list_items`
//!
//! ## Coordinates
//!
//! Positions in downloaded templates are systematically off for fields that
//! live inside the PDF. On construction every PDF-native field and every
//! group child is shifted by `(+3, +1)`; the original values are kept and
//! restored when the field is serialized for upload, since the remote side
//! applies the same offset again. Signature and initial marks keep their
//! corrected placement on the wire.
//!
//! ```
//! use envelope_templates::{BuildContext, Template, field::Field};
//! use serde_json::json;
//!
//! let template = json!({
//!     "recipients": {},
//!     "documents": [{"document_id": "1", "path": "a.pdf"}],
//! });
//! let template =
//!     Template::from_value("/templates", "t", template, &BuildContext::isolated()).unwrap();
//!
//! let data = json!({"tab_type": "text", "document_id": "1", "x_position": "100", "y_position": "200"});
//! let field = Field::new(data.as_object().unwrap().clone()).unwrap();
//! assert_eq!((field.x(), field.y()), (103, 201));
//!
//! let entry = field.serialize(&template);
//! assert_eq!(entry["x_position"], "100");
//! assert_eq!(entry["y_position"], "200");
//! assert_eq!(entry["document_id"], 1);
//! ```

use std::fmt;

use serde_json::Value;

use crate::data::{self, DataMap};
use crate::document::Document;
use crate::error::Result;
use crate::template::Template;

/// Raw `tab_type` values understood by [`FieldKind`].
pub mod field_types {
    pub const TEXT: &str = "text";
    pub const SSN: &str = "ssn";
    pub const CHECKBOX: &str = "checkbox";
    pub const RADIO_GROUP: &str = "radiogroup";
    pub const LIST: &str = "list";
    pub const SIGNATURE: &str = "signhere";
    pub const INITIAL: &str = "initialhere";
}

/// Font size used when a field declares none.
pub const DEFAULT_FONT_SIZE: i64 = 10;

/// Font color used when a field declares none.
pub const DEFAULT_FONT_COLOR: &str = "black";

/// Horizontal shift applied to PDF-native fields and group children.
pub const X_CORRECTION: i64 = 3;

/// Vertical shift applied to PDF-native fields and group children.
pub const Y_CORRECTION: i64 = 1;

const X_POSITION: &str = "x_position";
const Y_POSITION: &str = "y_position";
const RADIOS: &str = "radios";
const LIST_ITEMS: &str = "list_items";

/// What a field is, derived from its `tab_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// `text` or `ssn`
    Text,
    Checkbox,
    RadioGroup,
    List,
    /// `signhere`
    Signature,
    /// `initialhere`
    Initial,
    /// Any other tab type, or none. Treated as an annotation mark.
    Other(String),
}

impl FieldKind {
    /// Classify a raw `tab_type`.
    pub fn from_tab_type(tab_type: Option<&str>) -> Self {
        match tab_type {
            Some(field_types::TEXT) | Some(field_types::SSN) => FieldKind::Text,
            Some(field_types::CHECKBOX) => FieldKind::Checkbox,
            Some(field_types::RADIO_GROUP) => FieldKind::RadioGroup,
            Some(field_types::LIST) => FieldKind::List,
            Some(field_types::SIGNATURE) => FieldKind::Signature,
            Some(field_types::INITIAL) => FieldKind::Initial,
            Some(other) => FieldKind::Other(other.to_string()),
            None => FieldKind::Other(String::new()),
        }
    }

    /// Kinds that are real interactive fields inside the PDF.
    pub fn is_pdf_field(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::Checkbox | FieldKind::RadioGroup | FieldKind::List
        )
    }
}

/// Current value of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Text(n.to_string())
    }
}

/// Resolved placement and styling, with fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub font_size: i64,
    pub font_color: String,
}

/// One form element. See the module docs.
#[derive(Debug, Clone)]
pub struct Field {
    data: DataMap,
    kind: FieldKind,
    children: Vec<Field>,
    is_child: bool,
    original_positions: DataMap,
    disabled: bool,
    uploadable: bool,
}

impl Field {
    /// Build a field from its template description.
    ///
    /// Fails when a radio group has no `radios` list or a list has no
    /// `list_items`.
    pub fn new(data: DataMap) -> Result<Self> {
        Self::build(data, false)
    }

    fn build(mut data: DataMap, is_child: bool) -> Result<Self> {
        let kind = FieldKind::from_tab_type(data.get("tab_type").and_then(Value::as_str));

        let children_key = match kind {
            FieldKind::RadioGroup => Some(RADIOS),
            FieldKind::List => Some(LIST_ITEMS),
            _ => None,
        };
        let children = match children_key {
            Some(key) => {
                let children = data::array(&data, "field", key)?
                    .iter()
                    .map(|child| Self::build(data::as_object(child, "field child")?, true))
                    .collect::<Result<Vec<_>>>()?;
                // the key keeps its slot; serialize fills it with the live children
                if let Some(slot) = data.get_mut(key) {
                    *slot = Value::Null;
                }
                children
            }
            None => Vec::new(),
        };

        let mut field = Self {
            data,
            kind,
            children,
            is_child,
            original_positions: DataMap::new(),
            disabled: false,
            uploadable: false,
        };
        field.correct_positions();
        Ok(field)
    }

    fn correct_positions(&mut self) {
        let (dx, dy) = if self.is_pdf_field() || self.is_child {
            (X_CORRECTION, Y_CORRECTION)
        } else {
            (0, 0)
        };

        for (key, delta) in [(X_POSITION, dx), (Y_POSITION, dy)] {
            if !data::is_set(&self.data, key) {
                continue;
            }
            let old = data::integer(self.data.get(key));
            self.data
                .insert(key.to_string(), Value::String((old + delta).to_string()));
            self.original_positions
                .insert(key.to_string(), Value::String(old.to_string()));
        }
    }

    /// Wire representation, with `document_id` replaced by the wire id of
    /// the document it resolves to in `template` (null when it resolves to
    /// none).
    pub fn serialize(&self, template: &Template) -> DataMap {
        let mut entry = self.data.clone();
        entry.insert(
            "document_id".to_string(),
            self.document_id(template).map_or(Value::Null, Value::from),
        );

        match self.kind {
            FieldKind::RadioGroup => {
                entry.insert(RADIOS.to_string(), self.serialize_children(template));
            }
            FieldKind::List => {
                entry.extend(self.original_positions.clone());
                entry.insert(LIST_ITEMS.to_string(), self.serialize_children(template));
            }
            // PDF fields need positions un-corrected when uploaded
            _ if self.is_pdf_field() || self.is_child => {
                entry.extend(self.original_positions.clone());
            }
            _ => {}
        }

        entry
    }

    fn serialize_children(&self, template: &Template) -> Value {
        Value::Array(
            self.children
                .iter()
                .map(|child| Value::Object(child.serialize(template)))
                .collect(),
        )
    }

    /// Shallow-merge extra attributes into the field data.
    pub fn merge(&mut self, other: DataMap) {
        self.data.extend(other);
    }

    pub fn data(&self) -> &DataMap {
        &self.data
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    // ========================================================================
    // VALUES
    // ========================================================================

    /// Checkbox: its selected state. Groups: the selected child's value.
    /// Everything else: the stored `value`.
    pub fn value(&self) -> Option<FieldValue> {
        match self.kind {
            FieldKind::Checkbox => Some(FieldValue::Bool(self.selected())),
            FieldKind::RadioGroup | FieldKind::List => {
                self.selected_item().and_then(Field::value)
            }
            _ => data::text_at(&self.data, "value").map(FieldValue::Text),
        }
    }

    /// Set the field value.
    ///
    /// For groups this selects the child whose value equals the string form
    /// of `value` and deselects every other child, even when nothing matches.
    pub fn set_value(&mut self, value: impl Into<FieldValue>) {
        let value = value.into().to_string();

        match self.kind {
            FieldKind::Checkbox => {
                self.data
                    .insert("selected".to_string(), Value::String(value));
            }
            FieldKind::RadioGroup | FieldKind::List => {
                for child in &mut self.children {
                    let matches = data::text_at(&child.data, "value").as_deref() == Some(value.as_str());
                    child
                        .data
                        .insert("selected".to_string(), Value::String(matches.to_string()));
                }
            }
            _ => {
                self.data.insert("value".to_string(), Value::String(value));
            }
        }
    }

    /// True when the stored `selected` attribute reads `"true"`.
    pub fn selected(&self) -> bool {
        data::text_at(&self.data, "selected").as_deref() == Some("true")
    }

    /// First selected radio or list item.
    pub fn selected_item(&self) -> Option<&Field> {
        match self.kind {
            FieldKind::RadioGroup | FieldKind::List => {
                self.children.iter().find(|child| child.selected())
            }
            _ => None,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Whether the field is re-submitted as a tab definition.
    pub fn uploadable(&self) -> bool {
        if self.is_pdf_field() {
            self.uploadable
        } else {
            true
        }
    }

    /// Mark the field uploadable and lock it (or every radio of a group).
    pub fn set_uploadable(&mut self, uploadable: bool) {
        self.uploadable = uploadable;
        let locked = Value::String(uploadable.to_string());

        if self.is_radio_group() {
            for radio in &mut self.children {
                radio.data.insert("locked".to_string(), locked.clone());
            }
        } else {
            self.data.insert("locked".to_string(), locked);
        }
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    pub fn label(&self) -> Option<String> {
        data::text_at(&self.data, "group_name").or_else(|| data::text_at(&self.data, "tab_label"))
    }

    pub fn name(&self) -> Option<String> {
        data::text_at(&self.data, "name").or_else(|| data::text_at(&self.data, "text"))
    }

    pub fn recipient_id(&self) -> Option<String> {
        data::text_at(&self.data, "recipient_id")
    }

    /// The `document_id` declared in the template. Only used for matching.
    pub fn original_document_id(&self) -> Option<String> {
        data::text_at(&self.data, "document_id")
    }

    /// Wire id of the owning document, if the declared id matches one.
    pub fn document_id(&self, template: &Template) -> Option<u32> {
        self.resolve_document(template).map(Document::document_id)
    }

    /// Look up the owning document among the template's documents.
    pub fn resolve_document<'t>(&self, template: &'t Template) -> Option<&'t Document> {
        template.document_by_original_id(self.original_document_id()?.as_str())
    }

    // ========================================================================
    // GEOMETRY
    // ========================================================================

    pub fn x(&self) -> i64 {
        data::integer(self.data.get(X_POSITION))
    }

    pub fn y(&self) -> i64 {
        data::integer(self.data.get(Y_POSITION))
    }

    /// Some fields only list height.
    pub fn width(&self) -> i64 {
        if data::is_set(&self.data, "width") {
            data::integer(self.data.get("width"))
        } else {
            self.height()
        }
    }

    /// Height is the font size if not otherwise specified.
    pub fn height(&self) -> i64 {
        match data::integer(self.data.get("height")) {
            0 => self.font_size(),
            height => height,
        }
    }

    /// Parses descriptors like `"size9"`.
    pub fn font_size(&self) -> i64 {
        match data::text_at(&self.data, "font_size") {
            Some(size) => data::integer(Some(&Value::String(size.replace("size", "")))),
            None => DEFAULT_FONT_SIZE,
        }
    }

    pub fn font_color(&self) -> String {
        data::text_at(&self.data, "font_color").unwrap_or_else(|| DEFAULT_FONT_COLOR.to_string())
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            x: self.x(),
            y: self.y(),
            width: self.width(),
            height: self.height(),
            font_size: self.font_size(),
            font_color: self.font_color(),
        }
    }

    /// 1-based page. Radio groups take the page of their first radio.
    pub fn page_number(&self) -> i64 {
        if self.is_radio_group() {
            self.children.first().map_or(0, Field::page_number)
        } else {
            data::integer(self.data.get("page_number"))
        }
    }

    pub fn page_index(&self) -> i64 {
        self.page_number() - 1
    }

    // ========================================================================
    // KIND
    // ========================================================================

    pub fn is_pdf_field(&self) -> bool {
        self.kind.is_pdf_field()
    }

    pub fn is_text(&self) -> bool {
        self.kind == FieldKind::Text
    }

    pub fn is_checkbox(&self) -> bool {
        self.kind == FieldKind::Checkbox
    }

    pub fn is_radio_group(&self) -> bool {
        self.kind == FieldKind::RadioGroup
    }

    pub fn is_list(&self) -> bool {
        self.kind == FieldKind::List
    }

    pub fn is_signature(&self) -> bool {
        matches!(self.kind, FieldKind::Signature | FieldKind::Initial)
    }

    /// True for radios and list items.
    pub fn is_child(&self) -> bool {
        self.is_child
    }

    pub fn radios(&self) -> &[Field] {
        if self.is_radio_group() { &self.children[..] } else { &[] }
    }

    pub fn list_items(&self) -> &[Field] {
        if self.is_list() { &self.children[..] } else { &[] }
    }
}
