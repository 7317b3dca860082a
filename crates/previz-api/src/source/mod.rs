/// Data sources for the PreViz client.
///
/// Every backend endpoint is one method on [`DataSource`]:
/// - [`RemoteSource`]: the real REST API over HTTP
/// - [`FixtureSource`]: deterministic demo data, no network
/// - [`FallbackSource`]: a primary source that falls back to another on error
///
/// Which one is used is decided once at startup by [`SourceSelection`].
pub mod fallback;
pub mod fixture;
pub mod remote;

use async_trait::async_trait;
use prompt_slots::PromptSlots;
use scenes::{
    Frame, FrameCard, GenerateRequest, ParsingStatus, RegenerateRequest, Scene, SceneDraft,
    SceneVisual, UploadResponse,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use fallback::FallbackSource;
pub use fixture::FixtureSource;
pub use remote::RemoteSource;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::upload::ScriptFile;
use crate::workflow::{WorkflowKind, WorkflowUploadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Remote,
    Fixture,
    Fallback,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Fixture => write!(f, "fixture"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// `POST /scripts/upload`
    async fn upload_script(&self, file: &ScriptFile) -> Result<UploadResponse>;

    /// `GET /scripts/{id}/status`
    async fn script_status(&self, script_id: &str) -> Result<ParsingStatus>;

    /// `GET /scripts/{id}/scenes`
    async fn get_scenes(&self, script_id: &str) -> Result<Vec<Scene>>;

    /// `PUT /scenes/{id}`
    async fn update_scene(&self, scene_id: &str, draft: &SceneDraft) -> Result<Scene>;

    /// `DELETE /scenes/{id}`
    async fn delete_scene(&self, scene_id: &str) -> Result<()>;

    /// `POST /scripts/{id}/scenes`
    async fn add_scene(&self, script_id: &str, draft: &SceneDraft) -> Result<Scene>;

    /// `POST /scenes/{id}/refine` with a short free-text instruction
    async fn refine_scene(&self, scene_id: &str, instruction: &str) -> Result<Scene>;

    /// `POST /scenes/{id}/enrich`
    async fn enrich_scene(&self, scene_id: &str) -> Result<Value>;

    /// `POST /scenes/{id}/generate`
    async fn generate_frame(&self, scene_id: &str, request: &GenerateRequest) -> Result<Frame>;

    /// `POST /scenes/{id}/generate-progressive`
    async fn generate_progressive_frame(
        &self,
        scene_id: &str,
        request: &GenerateRequest,
    ) -> Result<Frame>;

    /// `POST /frames/{id}/regenerate`
    async fn regenerate_frame(&self, frame_id: &str, request: &RegenerateRequest) -> Result<Frame>;

    /// `GET /scenes/{id}/frames`
    async fn frame_history(&self, scene_id: &str) -> Result<Vec<Frame>>;

    /// `GET /scripts/{id}/export`, PDF bytes
    async fn export_storyboard(&self, script_id: &str) -> Result<Vec<u8>>;

    /// `GET /scripts/{id}/frames/cards`
    async fn frame_cards(&self, script_id: &str) -> Result<Vec<FrameCard>>;

    /// `GET /scenes/{id}/slots`; `None` when the source has no slots to offer
    async fn get_slots(&self, scene_id: &str) -> Result<Option<PromptSlots>>;

    /// `PUT /scenes/{id}/slots?updateScene=..`
    async fn update_slots(
        &self,
        scene_id: &str,
        slots: &PromptSlots,
        update_scene: bool,
    ) -> Result<Option<SceneVisual>>;

    /// `GET /visual/scenes/{id}`
    async fn scene_visual(&self, scene_id: &str) -> Result<SceneVisual>;

    /// `POST /workflows/upload`
    async fn upload_workflow(
        &self,
        kind: WorkflowKind,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<WorkflowUploadResult>;

    /// `GET /workflows/info`
    async fn workflows_info(&self) -> Result<Value>;
}

/// Data source strategy, fixed for the lifetime of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSelection {
    /// Real backend only; errors propagate.
    Remote,
    /// Real backend, fixture data when a call fails.
    RemoteWithFixtureFallback,
    /// Fixture data only.
    Offline,
}

impl SourceSelection {
    pub fn from_config(config: &ClientConfig, offline: bool) -> Self {
        if offline {
            SourceSelection::Offline
        } else if config.use_mocks {
            SourceSelection::RemoteWithFixtureFallback
        } else {
            SourceSelection::Remote
        }
    }
}

pub fn build_source(config: &ClientConfig, selection: SourceSelection) -> Result<Arc<dyn DataSource>> {
    tracing::debug!(target: "previz::api", ?selection, base_url = config.base_url(), "building data source");
    let source: Arc<dyn DataSource> = match selection {
        SourceSelection::Remote => Arc::new(RemoteSource::new(config)?),
        SourceSelection::RemoteWithFixtureFallback => Arc::new(FallbackSource::new(
            RemoteSource::new(config)?,
            FixtureSource::new(config.mock_latency()),
        )),
        SourceSelection::Offline => Arc::new(FixtureSource::new(config.mock_latency())),
    };
    Ok(source)
}
