//! Client for the PreViz backend.
//!
//! Script upload and parse polling, scene editing, progressive frame
//! generation, storyboard export, prompt-slot storage and ComfyUI workflow
//! management, all behind the [`DataSource`] trait so the same session code
//! runs against the real API or the built-in demo fixtures.

pub mod comfy;
pub mod config;
pub mod enrich;
pub mod error;
pub mod generation;
pub mod poller;
pub mod source;
pub mod studio;
pub mod upload;
pub mod workflow;

pub use comfy::{ComfyProbe, ComfyStatus};
pub use config::ClientConfig;
pub use enrich::{enrich_scene_flow, EnrichOutcome};
pub use error::{ApiError, Result};
pub use generation::{GenerateOptions, GenerationMode};
pub use poller::{ParsePoller, PollCancel, PollOutcome};
pub use source::{
    build_source, DataSource, FallbackSource, FixtureSource, RemoteSource, SourceKind,
    SourceSelection,
};
pub use studio::{InFlight, Step, Studio};
pub use upload::{ScriptFile, ScriptFormat, MAX_UPLOAD_BYTES};
pub use workflow::{validate_workflow, WorkflowFile, WorkflowKind, WorkflowUploadResult, WorkflowValidationError};
