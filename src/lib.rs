//! # Envelope Templates - Composite Request Builder
//!
//! Envelope Templates turns a declarative, file-based description of a
//! signing package into the composite template entries an e-signature API
//! expects. It provides:
//!
//! - **Template loading**: YAML templates with documents, recipients and fields
//! - **Field values**: text, checkbox, radio groups and single-select lists
//! - **Coordinate correction**: PDF field positions fixed on load, restored on upload
//! - **Static detection**: documents without PDF fields are sent byte-for-byte
//! - **Composite entries**: inline base64 documents or multipart binary parts
//!
//! ## Quick Start
//!
//! ```no_run
//! use envelope_templates::{BuildContext, EntryOptions, Template};
//!
//! let ctx = BuildContext::empty();
//! let mut template = Template::load("templates", "purchase_agreement", &ctx)?;
//!
//! // Fill in a value for the buyer
//! if let Some(signer) = template.recipients_mut().get_mut("signers") {
//!     if let Some(name) = signer[0].field_by_label_mut("full_name") {
//!         name.set_value("Ada Lovelace");
//!     }
//! }
//!
//! // Build the first composite template entry
//! let recipients = template.recipients_by_type();
//! let output = template.composite_entry(&recipients, 1, EntryOptions::default())?;
//! println!("{}", serde_json::to_string_pretty(output.entry())?);
//!
//! # Ok::<(), envelope_templates::TemplateError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`template`] | Template loading and composite entry assembly |
//! | [`document`] | Documents, static detection, document entries |
//! | [`recipient`] | Recipients and their fields and tabs |
//! | [`field`] | Field values, geometry and serialization |
//! | [`allocator`] | Rotating wire document ids |
//! | [`pdf`] | PDF overlay renderer seam |
//! | [`context`] | Shared build resources |
//! | [`data`] | YAML loading and key normalization |
//! | [`error`] | Error types |

pub mod allocator;
pub mod context;
pub mod data;
pub mod document;
pub mod error;
pub mod field;
pub mod pdf;
pub mod recipient;
pub mod template;

// Re-exports for convenience
pub use context::BuildContext;
pub use document::Document;
pub use error::{Result, TemplateError};
pub use field::{Field, FieldValue};
pub use pdf::{PdfWriter, UnsupportedPdfWriter};
pub use recipient::Recipient;
pub use template::{BinaryPart, CompositeEntry, CompositeOutput, EntryOptions, Template};
