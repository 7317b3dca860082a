use chrono::Utc;
use scenes::{DetailLevel, Frame, GenerateRequest, GenerationPath, RegenerateRequest, Scene};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::source::DataSource;

pub const SKETCH_ADVISORY: &str =
    "Для этой сцены ещё нет эскиза: рекомендуется начать с уровня sketch";

/// Which endpoint and parameters a generate action uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// `detailLevel=direct_final`, `path=direct` on the plain endpoint.
    DirectFinal,
    /// Progressive endpoint resolving intermediate levels up to the target.
    Progressive(DetailLevel),
    /// Plain endpoint with `path=progressive`.
    Sketch,
}

impl GenerationMode {
    /// The direct-final toggle overrides the selected level.
    pub fn select(level: DetailLevel, direct_final: bool) -> Self {
        if direct_final {
            return GenerationMode::DirectFinal;
        }
        match level {
            DetailLevel::Sketch => GenerationMode::Sketch,
            DetailLevel::Mid | DetailLevel::Final => GenerationMode::Progressive(level),
            DetailLevel::DirectFinal => GenerationMode::DirectFinal,
        }
    }

    pub fn uses_progressive_endpoint(&self) -> bool {
        matches!(self, GenerationMode::Progressive(_))
    }

    pub fn request(&self, options: &GenerateOptions) -> GenerateRequest {
        let request = match self {
            GenerationMode::DirectFinal => GenerateRequest::new(DetailLevel::DirectFinal)
                .with_path(GenerationPath::Direct),
            GenerationMode::Progressive(target) => GenerateRequest::new(*target),
            GenerationMode::Sketch => {
                GenerateRequest::new(DetailLevel::Sketch).with_path(GenerationPath::Progressive)
            }
        };
        options.apply(request)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    pub prompt: Option<String>,
    pub seed: Option<i64>,
    pub model: Option<String>,
}

impl GenerateOptions {
    fn apply(&self, mut request: GenerateRequest) -> GenerateRequest {
        if let Some(prompt) = &self.prompt {
            request = request.with_prompt(prompt.clone());
        }
        if let Some(seed) = self.seed {
            request = request.with_seed(seed);
        }
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        request
    }
}

/// Non-blocking hint shown when jumping to mid/final before any sketch exists.
pub fn sketch_advisory(scene: &Scene, level: DetailLevel, direct_final: bool) -> Option<&'static str> {
    let jumps_ahead = matches!(level, DetailLevel::Mid | DetailLevel::Final);
    (!direct_final && jumps_ahead && !scene.has_sketch()).then_some(SKETCH_ADVISORY)
}

pub async fn generate(
    source: &dyn DataSource,
    scene_id: &str,
    mode: GenerationMode,
    options: &GenerateOptions,
) -> Result<Frame> {
    let request = mode.request(options);
    info!(target: "previz::generate", scene_id, ?mode, "requesting frame");
    if mode.uses_progressive_endpoint() {
        source.generate_progressive_frame(scene_id, &request).await
    } else {
        source.generate_frame(scene_id, &request).await
    }
}

/// Generates a frame and appends it to the scene's history as the new
/// current frame.
pub async fn generate_for_scene(
    source: &dyn DataSource,
    scene: &mut Scene,
    level: DetailLevel,
    direct_final: bool,
    options: &GenerateOptions,
) -> Result<Frame> {
    let mode = GenerationMode::select(level, direct_final);
    let frame = generate(source, &scene.id, mode, options).await?;
    scene.push_frame(frame.clone());
    Ok(frame)
}

/// Builds a regenerate body. The prompt is trimmed and must not be empty;
/// `direct_final` goes out on the direct path.
pub fn regenerate_request(prompt: &str, level: DetailLevel) -> Result<RegenerateRequest> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::InvalidInput("prompt must not be empty".into()));
    }
    Ok(RegenerateRequest {
        prompt: prompt.to_string(),
        detail_level: level,
        path: (level == DetailLevel::DirectFinal).then_some(GenerationPath::Direct),
    })
}

/// Regenerates a frame by id.
pub async fn regenerate_frame(
    source: &dyn DataSource,
    frame_id: &str,
    prompt: &str,
    level: DetailLevel,
) -> Result<Frame> {
    let request = regenerate_request(prompt, level)?;
    info!(target: "previz::generate", frame_id, ?level, "regenerating frame");
    source.regenerate_frame(frame_id, &request).await
}

/// Regenerates the scene's current frame with a new prompt. The returned
/// frame becomes current and the prompt is stored on the scene.
pub async fn regenerate(
    source: &dyn DataSource,
    scene: &mut Scene,
    prompt: &str,
    level: DetailLevel,
) -> Result<Frame> {
    let request = regenerate_request(prompt, level)?;
    let frame_id = scene
        .current_frame
        .as_ref()
        .map(|f| f.id.clone())
        .ok_or_else(|| ApiError::NotFound(format!("current frame of scene {}", scene.id)))?;

    let frame = source.regenerate_frame(&frame_id, &request).await?;
    scene.current_frame = Some(frame.clone());
    scene.prompt = Some(request.prompt);
    Ok(frame)
}

pub fn export_file_name() -> String {
    format!("storyboard-{}.pdf", Utc::now().timestamp_millis())
}

/// Downloads the storyboard PDF into `dir` and returns the written path.
pub async fn export_storyboard(source: &dyn DataSource, script_id: &str, dir: &Path) -> Result<PathBuf> {
    let bytes = source.export_storyboard(script_id).await?;
    let path = dir.join(export_file_name());
    tokio::fs::write(&path, &bytes).await?;
    info!(target: "previz::export", script_id, path = %path.display(), bytes = bytes.len(), "storyboard exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_selection() {
        assert_eq!(
            GenerationMode::select(DetailLevel::Sketch, false),
            GenerationMode::Sketch
        );
        assert_eq!(
            GenerationMode::select(DetailLevel::Mid, false),
            GenerationMode::Progressive(DetailLevel::Mid)
        );
        assert_eq!(
            GenerationMode::select(DetailLevel::Final, false),
            GenerationMode::Progressive(DetailLevel::Final)
        );
        assert_eq!(
            GenerationMode::select(DetailLevel::Sketch, true),
            GenerationMode::DirectFinal
        );
    }

    #[test]
    fn request_bodies_per_mode() {
        let none = GenerateOptions::default();
        let body = |mode: GenerationMode| serde_json::to_value(mode.request(&none)).unwrap();

        assert_eq!(
            body(GenerationMode::DirectFinal),
            json!({ "detailLevel": "direct_final", "path": "direct" })
        );
        assert_eq!(
            body(GenerationMode::Progressive(DetailLevel::Final)),
            json!({ "detailLevel": "final" })
        );
        assert_eq!(
            body(GenerationMode::Sketch),
            json!({ "detailLevel": "sketch", "path": "progressive" })
        );

        let options = GenerateOptions {
            prompt: Some("rain".into()),
            seed: Some(7),
            model: None,
        };
        let req = GenerationMode::Sketch.request(&options);
        assert_eq!(req.prompt.as_deref(), Some("rain"));
        assert_eq!(req.seed, Some(7));
    }

    #[test]
    fn advisory_only_when_skipping_sketch() {
        let mut scene = Scene {
            id: "s".into(),
            ..Scene::default()
        };
        assert_eq!(
            sketch_advisory(&scene, DetailLevel::Final, false),
            Some(SKETCH_ADVISORY)
        );
        assert_eq!(sketch_advisory(&scene, DetailLevel::Final, true), None);
        assert_eq!(sketch_advisory(&scene, DetailLevel::Sketch, false), None);

        scene.push_frame(Frame {
            id: "f".into(),
            detail_level: Some(DetailLevel::Sketch),
            ..Frame::default()
        });
        assert_eq!(sketch_advisory(&scene, DetailLevel::Mid, false), None);
    }

    #[test]
    fn regenerate_body_uses_direct_path_only_for_direct_final() {
        let body = |level| serde_json::to_value(regenerate_request(" ночь ", level).unwrap()).unwrap();

        assert_eq!(
            body(DetailLevel::DirectFinal),
            json!({ "prompt": "ночь", "detailLevel": "direct_final", "path": "direct" })
        );
        assert_eq!(
            body(DetailLevel::Final),
            json!({ "prompt": "ночь", "detailLevel": "final" })
        );
        assert!(matches!(
            regenerate_request("  ", DetailLevel::Final),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn regenerate_frame_by_id_sends_direct_path() {
        let source = crate::source::FixtureSource::instant();
        let frame = regenerate_frame(&source, "frame-1-1", "дождь", DetailLevel::DirectFinal)
            .await
            .unwrap();
        assert_eq!(frame.path, Some(GenerationPath::Direct));
        assert_eq!(frame.detail_level, Some(DetailLevel::DirectFinal));
        assert_eq!(frame.prompt.as_deref(), Some("дождь"));
    }

    #[test]
    fn export_name_shape() {
        let name = export_file_name();
        assert!(name.starts_with("storyboard-"));
        assert!(name.ends_with(".pdf"));
    }
}
