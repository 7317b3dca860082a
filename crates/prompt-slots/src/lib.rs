//! Prompt slots: the structured visual description of a scene that drives
//! image-generation prompt assembly.
//!
//! The slot tree is shared through `Arc` at every level. Mutations return a
//! new tree that copies only the branch they touch, so untouched siblings stay
//! pointer-equal to the previous version.

use thiserror::Error;

mod edit;
mod editor;
mod model;
mod preview;
mod validate;

pub use edit::{CharacterField, CompositionField};
pub use editor::{SaveError, SlotsEditor};
pub use model::*;
pub use preview::preview;
pub use validate::{validate, SlotField, ValidationIssue, ValidationReport};

#[derive(Debug, Error)]
pub enum SlotsError {
    #[error("malformed prompt slots: {0}")]
    Malformed(#[from] serde_json::Error),
}
