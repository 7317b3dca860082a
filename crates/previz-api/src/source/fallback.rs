use async_trait::async_trait;
use prompt_slots::PromptSlots;
use scenes::{
    Frame, FrameCard, GenerateRequest, ParsingStatus, RegenerateRequest, Scene, SceneDraft,
    SceneVisual, UploadResponse,
};
use serde_json::Value;
use std::future::Future;
use tracing::warn;

use super::{DataSource, SourceKind};
use crate::error::{ApiError, Result};
use crate::upload::ScriptFile;
use crate::workflow::{WorkflowKind, WorkflowUploadResult};

/// Tries `primary` first and answers from `fallback` when it fails.
///
/// If the fallback has nothing for that endpoint, the primary's error is
/// returned unchanged.
pub struct FallbackSource<P, F> {
    primary: P,
    fallback: F,
}

impl<P: DataSource, F: DataSource> FallbackSource<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    async fn attempt<'a, T, A, B>(
        &'a self,
        operation: &'static str,
        primary: A,
        fallback: impl FnOnce(&'a F) -> B + Send,
    ) -> Result<T>
    where
        A: Future<Output = Result<T>> + Send,
        B: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let err = match primary.await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        warn!(
            target: "previz::api",
            operation,
            error = %err,
            "falling back to fixture data"
        );
        match fallback(&self.fallback).await {
            Err(ApiError::Unsupported { .. }) => Err(err),
            other => other,
        }
    }
}

#[async_trait]
impl<P: DataSource, F: DataSource> DataSource for FallbackSource<P, F> {
    fn kind(&self) -> SourceKind {
        SourceKind::Fallback
    }

    async fn upload_script(&self, file: &ScriptFile) -> Result<UploadResponse> {
        self.attempt("upload_script", self.primary.upload_script(file), |f| {
            f.upload_script(file)
        })
        .await
    }

    async fn script_status(&self, script_id: &str) -> Result<ParsingStatus> {
        self.attempt("script_status", self.primary.script_status(script_id), |f| {
            f.script_status(script_id)
        })
        .await
    }

    async fn get_scenes(&self, script_id: &str) -> Result<Vec<Scene>> {
        self.attempt("get_scenes", self.primary.get_scenes(script_id), |f| {
            f.get_scenes(script_id)
        })
        .await
    }

    async fn update_scene(&self, scene_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.attempt(
            "update_scene",
            self.primary.update_scene(scene_id, draft),
            |f| f.update_scene(scene_id, draft),
        )
        .await
    }

    async fn delete_scene(&self, scene_id: &str) -> Result<()> {
        self.attempt("delete_scene", self.primary.delete_scene(scene_id), |f| {
            f.delete_scene(scene_id)
        })
        .await
    }

    async fn add_scene(&self, script_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.attempt("add_scene", self.primary.add_scene(script_id, draft), |f| {
            f.add_scene(script_id, draft)
        })
        .await
    }

    async fn refine_scene(&self, scene_id: &str, instruction: &str) -> Result<Scene> {
        self.attempt(
            "refine_scene",
            self.primary.refine_scene(scene_id, instruction),
            |f| f.refine_scene(scene_id, instruction),
        )
        .await
    }

    async fn enrich_scene(&self, scene_id: &str) -> Result<Value> {
        self.attempt("enrich_scene", self.primary.enrich_scene(scene_id), |f| {
            f.enrich_scene(scene_id)
        })
        .await
    }

    async fn generate_frame(&self, scene_id: &str, request: &GenerateRequest) -> Result<Frame> {
        self.attempt(
            "generate_frame",
            self.primary.generate_frame(scene_id, request),
            |f| f.generate_frame(scene_id, request),
        )
        .await
    }

    async fn generate_progressive_frame(
        &self,
        scene_id: &str,
        request: &GenerateRequest,
    ) -> Result<Frame> {
        self.attempt(
            "generate_progressive_frame",
            self.primary.generate_progressive_frame(scene_id, request),
            |f| f.generate_progressive_frame(scene_id, request),
        )
        .await
    }

    async fn regenerate_frame(&self, frame_id: &str, request: &RegenerateRequest) -> Result<Frame> {
        self.attempt(
            "regenerate_frame",
            self.primary.regenerate_frame(frame_id, request),
            |f| f.regenerate_frame(frame_id, request),
        )
        .await
    }

    async fn frame_history(&self, scene_id: &str) -> Result<Vec<Frame>> {
        self.attempt("frame_history", self.primary.frame_history(scene_id), |f| {
            f.frame_history(scene_id)
        })
        .await
    }

    async fn export_storyboard(&self, script_id: &str) -> Result<Vec<u8>> {
        self.attempt(
            "export_storyboard",
            self.primary.export_storyboard(script_id),
            |f| f.export_storyboard(script_id),
        )
        .await
    }

    async fn frame_cards(&self, script_id: &str) -> Result<Vec<FrameCard>> {
        self.attempt("frame_cards", self.primary.frame_cards(script_id), |f| {
            f.frame_cards(script_id)
        })
        .await
    }

    async fn get_slots(&self, scene_id: &str) -> Result<Option<PromptSlots>> {
        self.attempt("get_slots", self.primary.get_slots(scene_id), |f| {
            f.get_slots(scene_id)
        })
        .await
    }

    async fn update_slots(
        &self,
        scene_id: &str,
        slots: &PromptSlots,
        update_scene: bool,
    ) -> Result<Option<SceneVisual>> {
        self.attempt(
            "update_slots",
            self.primary.update_slots(scene_id, slots, update_scene),
            |f| f.update_slots(scene_id, slots, update_scene),
        )
        .await
    }

    async fn scene_visual(&self, scene_id: &str) -> Result<SceneVisual> {
        self.attempt("scene_visual", self.primary.scene_visual(scene_id), |f| {
            f.scene_visual(scene_id)
        })
        .await
    }

    async fn upload_workflow(
        &self,
        kind: WorkflowKind,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<WorkflowUploadResult> {
        let primary = self
            .primary
            .upload_workflow(kind, file_name, content.clone());
        self.attempt("upload_workflow", primary, |f| {
            f.upload_workflow(kind, file_name, content)
        })
        .await
    }

    async fn workflows_info(&self) -> Result<Value> {
        self.attempt("workflows_info", self.primary.workflows_info(), |f| {
            f.workflows_info()
        })
        .await
    }
}
