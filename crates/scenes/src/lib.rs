//! Data model shared by the PreViz client: scripts and their parsing status,
//! scenes, generated frames and per-scene visualization records.
//!
//! Everything here mirrors the backend's JSON (camelCase on the wire) and is
//! tolerant of missing or `null` fields, which the backend sends freely.

use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use thiserror::Error;

pub mod frame;
pub mod scene;
pub mod script;
pub mod visual;

pub use frame::{DetailLevel, Frame, FrameTechMeta, GenerateRequest, GenerationPath, RegenerateRequest, StyleMeta};
pub use scene::{Scene, SceneDraft, SceneStatus};
pub use script::{ParsingStatus, ScriptStatus, UploadResponse};
pub use visual::{FrameCard, SceneVisual};

pub type SceneId = String;
pub type ScriptId = String;
pub type FrameId = String;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown detail level '{0}'")]
    UnknownDetailLevel(String),
    #[error("unknown generation path '{0}'")]
    UnknownPath(String),
    #[error("unknown scene status '{0}'")]
    UnknownSceneStatus(String),
    #[error("frame {frame_id} is not in the history of scene {scene_id}")]
    FrameNotInHistory { scene_id: SceneId, frame_id: FrameId },
}

pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads an optional enum from its string form; values this client does not
/// know are dropped instead of failing the whole payload.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}
