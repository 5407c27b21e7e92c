//! utmkeep-dom: form document boundary and replay.
//! The `FormDocument` trait is the DOM subset replay needs;
//! `MemoryDocument` implements it over an element arena.

pub mod document;
pub mod inspect;
pub mod memory;
pub mod replay;

pub use document::{FormDocument, NodeId};
pub use inspect::{FieldStatus, check_fields, clear_fields};
pub use memory::MemoryDocument;
pub use replay::{ReplayReport, Replayer};
