use std::future::Future;
use thiserror::Error;

use crate::model::PromptSlots;
use crate::preview::preview;
use crate::validate::{validate, ValidationReport};

#[derive(Debug, Error)]
pub enum SaveError<E> {
    #[error("prompt slots are incomplete: {0}")]
    Invalid(ValidationReport),
    #[error("saving prompt slots failed: {0}")]
    Callback(#[source] E),
}

type PreviewCallback = Box<dyn FnMut(&str) + Send>;

/// Editing session over one scene's prompt slots.
///
/// Every change recomputes the preview synchronously and forwards it to the
/// registered callback. Validation only runs on demand.
pub struct SlotsEditor {
    scene_id: Option<String>,
    slots: PromptSlots,
    preview: String,
    errors: ValidationReport,
    editing: bool,
    saving: bool,
    on_preview: Option<PreviewCallback>,
}

impl SlotsEditor {
    pub fn new(initial: Option<PromptSlots>) -> Self {
        let slots = initial.unwrap_or_default();
        Self {
            scene_id: None,
            preview: preview(&slots),
            slots,
            errors: ValidationReport::default(),
            editing: true,
            saving: false,
            on_preview: None,
        }
    }

    pub fn for_scene(scene_id: impl Into<String>, initial: Option<PromptSlots>) -> Self {
        Self {
            scene_id: Some(scene_id.into()),
            ..Self::new(initial)
        }
    }

    /// Registers the preview listener and immediately sends it the current preview.
    pub fn on_preview_change(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        let mut callback: PreviewCallback = Box::new(callback);
        callback(&self.preview);
        self.on_preview = Some(callback);
        self
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.scene_id.as_deref()
    }

    pub fn slots(&self) -> &PromptSlots {
        &self.slots
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn errors(&self) -> &ValidationReport {
        &self.errors
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Save is offered only while idle and with no outstanding errors from
    /// the last validation.
    pub fn can_save(&self) -> bool {
        !self.saving && self.errors.is_valid()
    }

    /// Applies one state transition to the slot tree.
    pub fn apply(&mut self, edit: impl FnOnce(&PromptSlots) -> PromptSlots) {
        self.slots = edit(&self.slots);
        self.refresh_preview();
    }

    /// Replaces the tree with fresh server data, e.g. after a reload.
    pub fn reset(&mut self, slots: PromptSlots) {
        self.slots = slots;
        self.refresh_preview();
    }

    fn refresh_preview(&mut self) {
        let next = preview(&self.slots);
        if next != self.preview {
            self.preview = next;
            if let Some(cb) = self.on_preview.as_mut() {
                cb(&self.preview);
            }
        }
    }

    pub fn validate(&mut self) -> bool {
        self.errors = validate(&self.slots);
        self.errors.is_valid()
    }

    pub fn cancel(&mut self) {
        self.editing = false;
    }

    /// Validates, then hands a snapshot of the slots to `save`.
    ///
    /// A rejected save keeps the editor open and returns the callback's error
    /// to the caller; a successful one closes editing.
    pub async fn save<F, Fut, T, E>(&mut self, save: F) -> Result<T, SaveError<E>>
    where
        F: FnOnce(PromptSlots) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.validate() {
            return Err(SaveError::Invalid(self.errors.clone()));
        }

        self.saving = true;
        let result = save(self.slots.clone()).await;
        self.saving = false;

        match result {
            Ok(value) => {
                self.editing = false;
                Ok(value)
            }
            Err(err) => {
                tracing::error!(
                    scene_id = ?self.scene_id,
                    "saving prompt slots failed"
                );
                Err(SaveError::Callback(err))
            }
        }
    }
}
