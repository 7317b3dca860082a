use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::frame::{DetailLevel, Frame};
use crate::{lenient, nullable, ModelError};

/// Per-scene pipeline status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SceneStatus {
    Pending,
    Processing,
    Parsed,
    Generating,
    Ready,
    Failed,
}

impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneStatus::Pending => "PENDING",
            SceneStatus::Processing => "PROCESSING",
            SceneStatus::Parsed => "PARSED",
            SceneStatus::Generating => "GENERATING",
            SceneStatus::Ready => "READY",
            SceneStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(SceneStatus::Pending),
            "PROCESSING" => Ok(SceneStatus::Processing),
            "PARSED" => Ok(SceneStatus::Parsed),
            "GENERATING" => Ok(SceneStatus::Generating),
            "READY" => Ok(SceneStatus::Ready),
            "FAILED" => Ok(SceneStatus::Failed),
            _ => Err(ModelError::UnknownSceneStatus(s.to_string())),
        }
    }
}

/// A contiguous unit of a script with its extracted metadata and the frames
/// generated for it.
///
/// `generated_frames` only ever grows from the client's point of view;
/// `current_frame` is a pointer into it that can be moved with
/// [`Scene::select_frame`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub location: String,
    #[serde(default, deserialize_with = "nullable")]
    pub characters: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub props: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub semantic_summary: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<SceneStatus>,
    /// Raw parser output, kept for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_json: Option<String>,
    #[serde(default)]
    pub current_frame: Option<Frame>,
    #[serde(default, deserialize_with = "nullable")]
    pub generated_frames: Vec<Frame>,
}

impl Scene {
    pub fn label(&self) -> String {
        match self.scene_number {
            Some(n) => format!("#{n} {}", self.title),
            None => self.title.clone(),
        }
    }

    /// Appends a freshly generated frame and makes it current.
    pub fn push_frame(&mut self, frame: Frame) {
        self.current_frame = Some(frame.clone());
        self.generated_frames.push(frame);
    }

    pub fn select_frame(&mut self, frame_id: &str) -> Result<&Frame, ModelError> {
        let frame = self
            .generated_frames
            .iter()
            .find(|f| f.id == frame_id)
            .cloned()
            .ok_or_else(|| ModelError::FrameNotInHistory {
                scene_id: self.id.clone(),
                frame_id: frame_id.to_string(),
            })?;
        Ok(&*self.current_frame.insert(frame))
    }

    pub fn has_sketch(&self) -> bool {
        self.generated_frames.iter().any(Frame::is_sketch)
            || self.current_frame.as_ref().is_some_and(Frame::is_sketch)
    }

    pub fn frames_at(&self, level: DetailLevel) -> impl Iterator<Item = &Frame> {
        self.generated_frames
            .iter()
            .filter(move |f| f.detail_level == Some(level))
    }

    /// Prompt to start editing from when the scene has none of its own.
    pub fn default_prompt(&self) -> String {
        let mut prompt = self.description.clone();
        if !self.location.is_empty() {
            prompt.push_str(&format!(" Локация: {}.", self.location));
        }
        if !self.characters.is_empty() {
            prompt.push_str(&format!(" Персонажи: {}.", self.characters.join(", ")));
        }
        if !self.props.is_empty() {
            prompt.push_str(&format!(" Реквизит: {}.", self.props.join(", ")));
        }
        prompt.trim().to_string()
    }

    pub fn effective_prompt(&self) -> String {
        match self.prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => p.to_string(),
            _ => self.default_prompt(),
        }
    }
}

/// Editable scene fields sent by add (`POST /scripts/{id}/scenes`) and
/// update (`PUT /scenes/{id}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDraft {
    pub title: String,
    pub location: String,
    pub characters: Vec<String>,
    pub props: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl SceneDraft {
    /// Splits a comma-separated form field, dropping empty entries.
    pub fn parse_list(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn from_scene(scene: &Scene) -> Self {
        Self {
            title: scene.title.clone(),
            location: scene.location.clone(),
            characters: scene.characters.clone(),
            props: scene.props.clone(),
            description: scene.description.clone(),
            prompt: scene.prompt.clone(),
            semantic_summary: scene.semantic_summary.clone(),
            tone: scene.tone.clone(),
            style: scene.style.clone(),
        }
    }

    /// Writes the draft onto a local copy of the scene, leaving frames alone.
    pub fn apply_to(&self, scene: &mut Scene) {
        scene.title = self.title.clone();
        scene.location = self.location.clone();
        scene.characters = self.characters.clone();
        scene.props = self.props.clone();
        scene.description = self.description.clone();
        if self.prompt.is_some() {
            scene.prompt = self.prompt.clone();
        }
        if self.semantic_summary.is_some() {
            scene.semantic_summary = self.semantic_summary.clone();
        }
        if self.tone.is_some() {
            scene.tone = self.tone.clone();
        }
        if self.style.is_some() {
            scene.style = self.style.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(id: &str, level: DetailLevel) -> Frame {
        Frame {
            id: id.into(),
            detail_level: Some(level),
            ..Frame::default()
        }
    }

    #[test]
    fn push_frame_appends_and_moves_current() {
        let mut scene = Scene {
            id: "scene-1".into(),
            ..Scene::default()
        };
        scene.push_frame(frame("a", DetailLevel::Sketch));
        scene.push_frame(frame("b", DetailLevel::Final));

        let ids: Vec<&str> = scene.generated_frames.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(scene.current_frame.as_ref().unwrap().id, "b");
        assert!(scene.has_sketch());
        assert_eq!(scene.frames_at(DetailLevel::Final).count(), 1);
    }

    #[test]
    fn select_frame_only_points_into_history() {
        let mut scene = Scene {
            id: "scene-1".into(),
            ..Scene::default()
        };
        scene.push_frame(frame("a", DetailLevel::Sketch));
        scene.push_frame(frame("b", DetailLevel::Mid));

        assert_eq!(scene.select_frame("a").unwrap().id, "a");
        assert_eq!(scene.generated_frames.len(), 2);

        let err = scene.select_frame("zzz").unwrap_err();
        assert_eq!(
            err,
            ModelError::FrameNotInHistory {
                scene_id: "scene-1".into(),
                frame_id: "zzz".into()
            }
        );
        assert_eq!(scene.current_frame.as_ref().unwrap().id, "a");
    }

    #[test]
    fn backend_scene_with_nulls_deserializes() {
        let scene: Scene = serde_json::from_value(json!({
            "id": "3f2a",
            "title": "Walk",
            "location": null,
            "characters": null,
            "status": "READY",
            "currentFrame": null,
            "generatedFrames": null,
            "originalJson": "{\"raw\":true}"
        }))
        .unwrap();

        assert_eq!(scene.location, "");
        assert!(scene.characters.is_empty());
        assert_eq!(scene.status, Some(SceneStatus::Ready));
        assert!(scene.scene_number.is_none());
        assert!(!scene.has_sketch());
    }

    #[test]
    fn default_prompt_is_built_from_metadata() {
        let scene = Scene {
            id: "s".into(),
            description: "Anna walks in.".into(),
            location: "Cafe".into(),
            characters: vec!["Anna".into(), "Boris".into()],
            props: vec!["Coffee".into()],
            ..Scene::default()
        };
        assert_eq!(
            scene.default_prompt(),
            "Anna walks in. Локация: Cafe. Персонажи: Anna, Boris. Реквизит: Coffee."
        );
        assert_eq!(scene.effective_prompt(), scene.default_prompt());

        let with_prompt = Scene {
            prompt: Some("custom".into()),
            ..scene
        };
        assert_eq!(with_prompt.effective_prompt(), "custom");
    }

    #[test]
    fn parse_list_drops_blanks() {
        assert_eq!(SceneDraft::parse_list(" a, b,,c , "), vec!["a", "b", "c"]);
        assert!(SceneDraft::parse_list("").is_empty());
    }

    #[test]
    fn draft_round_trips_onto_scene() {
        let mut scene = Scene {
            id: "s".into(),
            title: "Old".into(),
            prompt: Some("keep".into()),
            ..Scene::default()
        };
        scene.push_frame(frame("a", DetailLevel::Sketch));

        let mut draft = SceneDraft::from_scene(&scene);
        draft.title = "New".into();
        draft.prompt = None;
        draft.apply_to(&mut scene);

        assert_eq!(scene.title, "New");
        assert_eq!(scene.prompt.as_deref(), Some("keep"));
        assert_eq!(scene.generated_frames.len(), 1);
    }
}
