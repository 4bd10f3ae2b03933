//! # Document ID Allocation
//!
//! Every outgoing document gets a fresh wire identifier, overriding the one
//! declared in the template. Multipart uploads reference each binary part by
//! document id, so ids must not collide inside one request even when two
//! templates declare the same `document_id`.
//!
//! Ids rotate through `1..=999`:
//!
//! ```
//! use envelope_templates::allocator::DocumentIdAllocator;
//!
//! let ids = DocumentIdAllocator::starting_at(998);
//! assert_eq!(ids.next(), 998);
//! assert_eq!(ids.next(), 999);
//! assert_eq!(ids.next(), 1);
//! ```

use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU32, Ordering};

/// Largest id handed out before wrapping back to [`FIRST_ID`].
pub const MAX_ID: u32 = 999;

/// First id handed out, and the id after [`MAX_ID`].
pub const FIRST_ID: u32 = 1;

static GLOBAL: OnceLock<Arc<DocumentIdAllocator>> = OnceLock::new();

/// Thread-safe rotating id source.
#[derive(Debug)]
pub struct DocumentIdAllocator {
    next: AtomicU32,
}

impl DocumentIdAllocator {
    /// Create an allocator whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(FIRST_ID)
    }

    /// Create an allocator whose first id is `first`, clamped into `1..=999`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first.clamp(FIRST_ID, MAX_ID)),
        }
    }

    /// Process-wide allocator shared by every [`crate::BuildContext::empty`].
    pub fn global() -> Arc<DocumentIdAllocator> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(DocumentIdAllocator::new())))
    }

    /// Hand out the next id.
    pub fn next(&self) -> u32 {
        // fetch_update only fails when the closure returns None
        let id = match self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(rotate(v)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        tracing::trace!(id, "allocated document id");
        id
    }
}

impl Default for DocumentIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn rotate(id: u32) -> u32 {
    if id >= MAX_ID { FIRST_ID } else { id + 1 }
}
