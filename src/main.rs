//! # Envelope Templates CLI
//!
//! Command-line interface for building composite template requests.
//!
//! ## Usage
//!
//! ```bash
//! # Show recipients and documents of a template
//! envelope-templates inspect templates purchase_agreement
//!
//! # Print the composite entry with documents inline
//! envelope-templates entry templates purchase_agreement
//!
//! # Only the buyer, as sequence 2
//! envelope-templates entry templates purchase_agreement --role buyer --sequence 2
//!
//! # Multipart: entry to stdout, PDFs written to a directory
//! envelope-templates entry templates purchase_agreement --parts-dir out/
//!
//! # Save the PDF that would be sent for one document
//! envelope-templates pdf templates purchase_agreement --document 1 --output doc.pdf
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use envelope_templates::{
    BinaryPart, BuildContext, EntryOptions, Template, TemplateError, template::RecipientSelection,
};

/// Envelope Templates - composite request builder
#[derive(Parser, Debug)]
#[command(name = "envelope-templates")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List recipients and documents of a template
    Inspect {
        /// Directory holding the template and its PDFs
        base_directory: PathBuf,

        /// Template name, without extension
        template: String,
    },

    /// Print a composite template entry as JSON
    Entry {
        /// Directory holding the template and its PDFs
        base_directory: PathBuf,

        /// Template name, without extension
        template: String,

        /// Sequence number of the entry
        #[arg(long, default_value = "1")]
        sequence: u32,

        /// Only include recipients with this role (repeatable)
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<String>,

        /// Multipart mode: write document bytes to this directory instead of inlining them
        #[arg(long, value_name = "DIR")]
        parts_dir: Option<PathBuf>,

        /// Write JSON to a file instead of stdout
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Save the PDF that would be sent for one document
    Pdf {
        /// Directory holding the template and its PDFs
        base_directory: PathBuf,

        /// Template name, without extension
        template: String,

        /// Document id as declared in the template
        #[arg(long)]
        document: String,

        /// Only consider recipients with this role (repeatable)
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<String>,

        /// Output PDF path
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), TemplateError> {
    let cli = Cli::parse();
    let ctx = BuildContext::empty();

    match cli.command {
        Commands::Inspect {
            base_directory,
            template,
        } => {
            let template = Template::load(&base_directory, &template, &ctx)?;
            let all = template.recipients_by_type();
            let flat: Vec<_> = all.values().flatten().copied().collect();

            println!("Recipients:");
            for (kind, recipients) in template.recipients() {
                for recipient in recipients {
                    println!(
                        "  {:<16} {:<20} {} fields, {} tabs",
                        kind,
                        recipient.role_name().unwrap_or_default(),
                        recipient.fields().values().map(Vec::len).sum::<usize>(),
                        recipient.tabs().values().map(Vec::len).sum::<usize>(),
                    );
                }
            }

            println!("\nDocuments:");
            for document in template.documents() {
                println!(
                    "  {:<6} {:<30} {}",
                    document.original_document_id(),
                    document.name().unwrap_or_default(),
                    if document.is_static(&flat) { "static" } else { "overlay" },
                );
            }
            Ok(())
        }

        Commands::Entry {
            base_directory,
            template,
            sequence,
            roles,
            parts_dir,
            output,
        } => {
            let template = Template::load(&base_directory, &template, &ctx)?;
            let recipients = select(&template, &roles);
            let options = EntryOptions {
                multipart: parts_dir.is_some(),
            };

            let (entry, parts) = template
                .composite_entry(&recipients, sequence, options)?
                .into_parts();

            if let Some(dir) = parts_dir {
                std::fs::create_dir_all(&dir).map_err(|e| TemplateError::io(&dir, e))?;
                for part in &parts {
                    let path = part_path(&dir, part);
                    std::fs::write(&path, &part.data).map_err(|e| TemplateError::io(&path, e))?;
                    eprintln!("Wrote {}", path.display());
                }
            }

            let json = serde_json::to_string_pretty(&entry)?;
            match output {
                Some(path) => std::fs::write(&path, json).map_err(|e| TemplateError::io(&path, e))?,
                None => println!("{}", json),
            }
            Ok(())
        }

        Commands::Pdf {
            base_directory,
            template,
            document,
            roles,
            output,
        } => {
            let template = Template::load(&base_directory, &template, &ctx)?;
            let recipients = select(&template, &roles);
            let flat: Vec<_> = recipients.values().flatten().copied().collect();

            let found = template.document_by_original_id(&document).ok_or_else(|| {
                TemplateError::InvalidData(format!("no document with id '{}'", document))
            })?;
            found.save_pdf(&output, &flat, template.pdf_writer())?;
            println!("Saved {}", output.display());
            Ok(())
        }
    }
}

/// All recipients, or only those holding one of `roles`.
fn select<'a>(template: &'a Template, roles: &[String]) -> RecipientSelection<'a> {
    if roles.is_empty() {
        template.recipients_by_type()
    } else {
        let roles: Vec<&str> = roles.iter().map(String::as_str).collect();
        template.recipients_by_type_for_roles(&roles)
    }
}

/// `{dir}/{id}-{filename}`. Only the last component of the document name is
/// used, so parts always land directly in `dir`.
fn part_path(dir: &Path, part: &BinaryPart) -> PathBuf {
    let filename = part
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or("document.pdf");
    dir.join(format!("{}-{}", part.id, filename))
}
