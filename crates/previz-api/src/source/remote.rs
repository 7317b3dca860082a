use async_trait::async_trait;
use prompt_slots::PromptSlots;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use scenes::{
    Frame, FrameCard, GenerateRequest, ParsingStatus, RegenerateRequest, Scene, SceneDraft,
    SceneVisual, UploadResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use super::{DataSource, SourceKind};
use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::upload::ScriptFile;
use crate::workflow::{WorkflowKind, WorkflowUploadResult};

/// HTTP client for the PreViz REST API.
pub struct RemoteSource {
    base_url: String,
    client: reqwest::Client,
    upload_timeout: Duration,
    export_timeout: Duration,
}

impl RemoteSource {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("WinkPreViz/0.1")
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            client,
            upload_timeout: config.upload_timeout(),
            export_timeout: config.export_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Multipart upload with the longer upload timeout.
    fn upload_request(&self, file: &ScriptFile) -> Result<RequestBuilder> {
        let part = Self::file_part(file.bytes.clone(), &file.file_name, file.mime())?;
        Ok(self
            .request(Method::POST, "/scripts/upload")
            .multipart(Form::new().part("file", part))
            .timeout(self.upload_timeout))
    }

    fn export_request(&self, script_id: &str) -> RequestBuilder {
        self.request(Method::GET, &format!("/scripts/{script_id}/export"))
            .timeout(self.export_timeout)
    }

    fn slots_request(&self, scene_id: &str, slots: &PromptSlots, update_scene: bool) -> RequestBuilder {
        self.request(Method::PUT, &format!("/scenes/{scene_id}/slots"))
            .query(&[("updateScene", update_scene)])
            .json(slots)
    }

    fn workflow_request(
        &self,
        kind: WorkflowKind,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<RequestBuilder> {
        let part = Self::file_part(content, file_name, "application/json")?;
        let form = Form::new()
            .part("file", part)
            .text("type", kind.as_str().to_string());
        Ok(self.request(Method::POST, "/workflows/upload").multipart(form))
    }

    /// Sends the request and turns transport failures and non-2xx answers
    /// into logged [`ApiError`]s.
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build().map_err(|e| {
            let err = ApiError::Setup(e.to_string());
            err.log();
            err
        })?;
        let method = request.method().clone();
        let url = request.url().to_string();
        debug!(target: "previz::api", %method, %url, "request");

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                let err = ApiError::from_reqwest(err, method.as_str(), &url);
                err.log();
                return Err(err);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::Status {
                status: status.as_u16(),
                url,
                method: method.to_string(),
                body,
            };
            err.log();
            return Err(err);
        }
        Ok(response)
    }

    /// Maps a failure while reading a response body and logs it.
    fn body_error(&self, err: reqwest::Error, method: &str, path: &str) -> ApiError {
        let err = ApiError::from_reqwest(err, method, &self.url(path));
        err.log();
        err
    }

    async fn read_json<T: DeserializeOwned>(&self, response: Response, path: &str) -> Result<T> {
        response.json::<T>().await.map_err(|err| {
            let err = ApiError::Decode(format!("{path}: {err}"));
            err.log();
            err
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        self.read_json(response, path).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(method, path).json(body)).await?;
        self.read_json(response, path).await
    }

    fn file_part(bytes: Vec<u8>, file_name: &str, mime: &str) -> Result<Part> {
        Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| ApiError::Setup(e.to_string()))
    }
}

/// Null bodies (e.g. a 200 with no content) read as `None`.
fn optional<T: DeserializeOwned>(value: Value) -> Result<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

#[async_trait]
impl DataSource for RemoteSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Remote
    }

    async fn upload_script(&self, file: &ScriptFile) -> Result<UploadResponse> {
        info!(
            target: "previz::api",
            file = %file.file_name,
            bytes = file.len(),
            "uploading script"
        );
        let response = self.send(self.upload_request(file)?).await?;
        self.read_json(response, "/scripts/upload").await
    }

    async fn script_status(&self, script_id: &str) -> Result<ParsingStatus> {
        self.get_json(&format!("/scripts/{script_id}/status")).await
    }

    async fn get_scenes(&self, script_id: &str) -> Result<Vec<Scene>> {
        self.get_json(&format!("/scripts/{script_id}/scenes")).await
    }

    async fn update_scene(&self, scene_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.send_json(Method::PUT, &format!("/scenes/{scene_id}"), draft)
            .await
    }

    async fn delete_scene(&self, scene_id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/scenes/{scene_id}")))
            .await?;
        Ok(())
    }

    async fn add_scene(&self, script_id: &str, draft: &SceneDraft) -> Result<Scene> {
        self.send_json(Method::POST, &format!("/scripts/{script_id}/scenes"), draft)
            .await
    }

    async fn refine_scene(&self, scene_id: &str, instruction: &str) -> Result<Scene> {
        self.send_json(
            Method::POST,
            &format!("/scenes/{scene_id}/refine"),
            &json!({ "instruction": instruction }),
        )
        .await
    }

    async fn enrich_scene(&self, scene_id: &str) -> Result<Value> {
        let path = format!("/scenes/{scene_id}/enrich");
        let response = self.send(self.request(Method::POST, &path)).await?;
        let text = response
            .text()
            .await
            .map_err(|e| self.body_error(e, "POST", &path))?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::Null))
    }

    async fn generate_frame(&self, scene_id: &str, request: &GenerateRequest) -> Result<Frame> {
        info!(
            target: "previz::api",
            scene_id,
            detail_level = %request.detail_level,
            path = ?request.path,
            "generate frame"
        );
        self.send_json(Method::POST, &format!("/scenes/{scene_id}/generate"), request)
            .await
    }

    async fn generate_progressive_frame(
        &self,
        scene_id: &str,
        request: &GenerateRequest,
    ) -> Result<Frame> {
        info!(
            target: "previz::api",
            scene_id,
            target_lod = %request.detail_level,
            "generate progressive frame"
        );
        self.send_json(
            Method::POST,
            &format!("/scenes/{scene_id}/generate-progressive"),
            request,
        )
        .await
    }

    async fn regenerate_frame(&self, frame_id: &str, request: &RegenerateRequest) -> Result<Frame> {
        self.send_json(Method::POST, &format!("/frames/{frame_id}/regenerate"), request)
            .await
    }

    async fn frame_history(&self, scene_id: &str) -> Result<Vec<Frame>> {
        self.get_json(&format!("/scenes/{scene_id}/frames")).await
    }

    async fn export_storyboard(&self, script_id: &str) -> Result<Vec<u8>> {
        let response = self.send(self.export_request(script_id)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.body_error(e, "GET", &format!("/scripts/{script_id}/export")))?;
        Ok(bytes.to_vec())
    }

    async fn frame_cards(&self, script_id: &str) -> Result<Vec<FrameCard>> {
        self.get_json(&format!("/scripts/{script_id}/frames/cards"))
            .await
    }

    async fn get_slots(&self, scene_id: &str) -> Result<Option<PromptSlots>> {
        let value: Value = self.get_json(&format!("/scenes/{scene_id}/slots")).await?;
        optional(value)
    }

    async fn update_slots(
        &self,
        scene_id: &str,
        slots: &PromptSlots,
        update_scene: bool,
    ) -> Result<Option<SceneVisual>> {
        let response = self
            .send(self.slots_request(scene_id, slots, update_scene))
            .await?;
        let value: Value = self
            .read_json(response, &format!("/scenes/{scene_id}/slots"))
            .await?;
        optional(value)
    }

    async fn scene_visual(&self, scene_id: &str) -> Result<SceneVisual> {
        self.get_json(&format!("/visual/scenes/{scene_id}")).await
    }

    async fn upload_workflow(
        &self,
        kind: WorkflowKind,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<WorkflowUploadResult> {
        let response = self
            .send(self.workflow_request(kind, file_name, content)?)
            .await?;
        self.read_json(response, "/workflows/upload").await
    }

    async fn workflows_info(&self) -> Result<Value> {
        self.get_json("/workflows/info").await
    }
}
