//! Scriptable data sources for exercising the client without a backend.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use previz_api::source::fixture;
use previz_api::workflow::{WorkflowKind, WorkflowUploadResult};
use previz_api::{ApiError, DataSource, FixtureSource, Result, ScriptFile, SourceKind};
use prompt_slots::PromptSlots;
use scenes::{
    Frame, FrameCard, GenerateRequest, ParsingStatus, RegenerateRequest, Scene, SceneDraft,
    SceneVisual, ScriptStatus, UploadResponse,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SCRIPT_ID: &str = "script-42";

/// Answers status checks from a queue (the last entry repeats) and
/// delegates everything else to an instant fixture.
pub struct ScriptedSource {
    inner: FixtureSource,
    statuses: Mutex<VecDeque<ScriptStatus>>,
    total_scenes: u64,
    pub status_calls: AtomicUsize,
    pub scene_fetches: AtomicUsize,
    pub fail_visual: bool,
    /// `(scene_id, request, progressive_endpoint)` per generate call.
    pub generate_calls: Mutex<Vec<(String, GenerateRequest, bool)>>,
}

impl ScriptedSource {
    pub fn new(statuses: &[ScriptStatus], total_scenes: u64) -> Self {
        Self {
            inner: FixtureSource::instant(),
            statuses: Mutex::new(statuses.iter().copied().collect()),
            total_scenes,
            status_calls: AtomicUsize::new(0),
            scene_fetches: AtomicUsize::new(0),
            fail_visual: false,
            generate_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_failing_visual(mut self) -> Self {
        self.fail_visual = true;
        self
    }

    fn next_status(&self) -> ScriptStatus {
        let mut queue = self.statuses.lock();
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(ScriptStatus::Parsing)
        } else {
            queue.front().copied().unwrap_or(ScriptStatus::Parsing)
        }
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn upload_script(&self, file: &ScriptFile) -> Result<UploadResponse> {
        Ok(UploadResponse {
            script_id: SCRIPT_ID.into(),
            filename: file.file_name.clone(),
            status: ScriptStatus::Uploaded,
            scenes: Vec::new(),
            chunk_files: Vec::new(),
        })
    }

    async fn script_status(&self, script_id: &str) -> Result<ParsingStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ParsingStatus::new(script_id, self.next_status(), self.total_scenes))
    }

    async fn get_scenes(&self, script_id: &str) -> Result<Vec<Scene>> {
        self.scene_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.get_scenes(script_id).await
    }

    async fn update_scene(&self, scene_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.inner.update_scene(scene_id, draft).await
    }

    async fn delete_scene(&self, scene_id: &str) -> Result<()> {
        self.inner.delete_scene(scene_id).await
    }

    async fn add_scene(&self, script_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.inner.add_scene(script_id, draft).await
    }

    async fn refine_scene(&self, scene_id: &str, instruction: &str) -> Result<Scene> {
        let mut scenes = self.inner.get_scenes(SCRIPT_ID).await?;
        let index = scenes
            .iter()
            .position(|s| s.id == scene_id)
            .ok_or_else(|| ApiError::NotFound(scene_id.to_string()))?;
        let mut scene = scenes.swap_remove(index);
        scene.description = format!("{} {}", scene.description, instruction);
        Ok(scene)
    }

    async fn enrich_scene(&self, _scene_id: &str) -> Result<Value> {
        Ok(json!({ "status": "ENRICHED" }))
    }

    async fn generate_frame(&self, scene_id: &str, request: &GenerateRequest) -> Result<Frame> {
        self.generate_calls
            .lock()
            .push((scene_id.to_string(), request.clone(), false));
        self.inner.generate_frame(scene_id, request).await
    }

    async fn generate_progressive_frame(
        &self,
        scene_id: &str,
        request: &GenerateRequest,
    ) -> Result<Frame> {
        self.generate_calls
            .lock()
            .push((scene_id.to_string(), request.clone(), true));
        self.inner.generate_progressive_frame(scene_id, request).await
    }

    async fn regenerate_frame(&self, frame_id: &str, request: &RegenerateRequest) -> Result<Frame> {
        self.inner.regenerate_frame(frame_id, request).await
    }

    async fn frame_history(&self, scene_id: &str) -> Result<Vec<Frame>> {
        self.inner.frame_history(scene_id).await
    }

    async fn export_storyboard(&self, script_id: &str) -> Result<Vec<u8>> {
        self.inner.export_storyboard(script_id).await
    }

    async fn frame_cards(&self, script_id: &str) -> Result<Vec<FrameCard>> {
        self.inner.frame_cards(script_id).await
    }

    async fn get_slots(&self, scene_id: &str) -> Result<Option<PromptSlots>> {
        self.inner.get_slots(scene_id).await
    }

    async fn update_slots(
        &self,
        scene_id: &str,
        slots: &PromptSlots,
        update_scene: bool,
    ) -> Result<Option<SceneVisual>> {
        self.inner.update_slots(scene_id, slots, update_scene).await
    }

    async fn scene_visual(&self, scene_id: &str) -> Result<SceneVisual> {
        if self.fail_visual {
            return Err(ApiError::Status {
                status: 500,
                url: format!("/visual/scenes/{scene_id}"),
                method: "GET".into(),
                body: String::new(),
            });
        }
        Ok(SceneVisual {
            scene_id: Some(scene_id.to_string()),
            flux_prompt: Some("cinematic still".into()),
            ..SceneVisual::default()
        })
    }

    async fn upload_workflow(
        &self,
        kind: WorkflowKind,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<WorkflowUploadResult> {
        self.inner.upload_workflow(kind, file_name, content).await
    }

    async fn workflows_info(&self) -> Result<Value> {
        self.inner.workflows_info().await
    }
}

/// A backend that never answers.
pub struct DownSource;

fn down(path: &str) -> ApiError {
    ApiError::NoResponse {
        url: format!("http://localhost:8080/api{path}"),
        method: "GET".into(),
        reason: "connection refused".into(),
    }
}

#[async_trait]
impl DataSource for DownSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn upload_script(&self, _file: &ScriptFile) -> Result<UploadResponse> {
        Err(down("/scripts/upload"))
    }

    async fn script_status(&self, _script_id: &str) -> Result<ParsingStatus> {
        Err(down("/scripts/status"))
    }

    async fn get_scenes(&self, _script_id: &str) -> Result<Vec<Scene>> {
        Err(down("/scripts/scenes"))
    }

    async fn update_scene(&self, _scene_id: &str, _draft: &SceneDraft) -> Result<Scene> {
        Err(down("/scenes"))
    }

    async fn delete_scene(&self, _scene_id: &str) -> Result<()> {
        Err(down("/scenes"))
    }

    async fn add_scene(&self, _script_id: &str, _draft: &SceneDraft) -> Result<Scene> {
        Err(down("/scripts/scenes"))
    }

    async fn refine_scene(&self, _scene_id: &str, _instruction: &str) -> Result<Scene> {
        Err(down("/scenes/refine"))
    }

    async fn enrich_scene(&self, _scene_id: &str) -> Result<Value> {
        Err(down("/scenes/enrich"))
    }

    async fn generate_frame(&self, _scene_id: &str, _request: &GenerateRequest) -> Result<Frame> {
        Err(down("/scenes/generate"))
    }

    async fn generate_progressive_frame(
        &self,
        _scene_id: &str,
        _request: &GenerateRequest,
    ) -> Result<Frame> {
        Err(down("/scenes/generate-progressive"))
    }

    async fn regenerate_frame(&self, _frame_id: &str, _request: &RegenerateRequest) -> Result<Frame> {
        Err(down("/frames/regenerate"))
    }

    async fn frame_history(&self, _scene_id: &str) -> Result<Vec<Frame>> {
        Err(down("/scenes/frames"))
    }

    async fn export_storyboard(&self, _script_id: &str) -> Result<Vec<u8>> {
        Err(down("/scripts/export"))
    }

    async fn frame_cards(&self, _script_id: &str) -> Result<Vec<FrameCard>> {
        Err(down("/scripts/frames/cards"))
    }

    async fn get_slots(&self, _scene_id: &str) -> Result<Option<PromptSlots>> {
        Err(down("/scenes/slots"))
    }

    async fn update_slots(
        &self,
        _scene_id: &str,
        _slots: &PromptSlots,
        _update_scene: bool,
    ) -> Result<Option<SceneVisual>> {
        Err(down("/scenes/slots"))
    }

    async fn scene_visual(&self, _scene_id: &str) -> Result<SceneVisual> {
        Err(down("/visual/scenes"))
    }

    async fn upload_workflow(
        &self,
        _kind: WorkflowKind,
        _file_name: &str,
        _content: Vec<u8>,
    ) -> Result<WorkflowUploadResult> {
        Err(down("/workflows/upload"))
    }

    async fn workflows_info(&self) -> Result<Value> {
        Err(down("/workflows/info"))
    }
}

pub fn demo_scene_count() -> usize {
    fixture::demo_scenes().len()
}
