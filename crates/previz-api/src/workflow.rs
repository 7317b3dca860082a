//! ComfyUI workflow files: kind, shallow structural validation, and the
//! edit-then-revalidate cycle used before uploading a workflow to the backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowKind {
    Text2Img,
    Img2Img,
}

impl WorkflowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Text2Img => "text2img",
            WorkflowKind::Img2Img => "img2img",
        }
    }

    /// Node classes a workflow of this kind must contain, in checklist order.
    pub fn required_nodes(&self) -> &'static [&'static str] {
        match self {
            WorkflowKind::Text2Img => &[
                "CheckpointLoaderSimple",
                "KSampler",
                "CLIPTextEncode",
                "EmptyLatentImage",
                "VAEDecode",
                "SaveImage",
            ],
            WorkflowKind::Img2Img => &[
                "CheckpointLoaderSimple",
                "KSampler",
                "CLIPTextEncode",
                "LoadImage",
                "VAEEncode",
                "VAEDecode",
                "SaveImage",
            ],
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text2img" => Ok(WorkflowKind::Text2Img),
            "img2img" => Ok(WorkflowKind::Img2Img),
            other => Err(format!("unknown workflow type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowValidationError {
    #[error("Ошибка парсинга JSON: {0}")]
    Parse(String),
    #[error("Workflow должен быть объектом")]
    NotAnObject,
    #[error("Отсутствуют обязательные ноды: {}", .0.join(", "))]
    MissingNodes(Vec<String>),
    #[error("KSampler не найден")]
    NoSampler,
}

/// Shallow check of a ComfyUI graph: it must be an object whose node values
/// cover every required `class_type`. Edges and parameters are not inspected.
pub fn validate_workflow(
    workflow: &Value,
    kind: WorkflowKind,
) -> std::result::Result<(), WorkflowValidationError> {
    let nodes = workflow
        .as_object()
        .ok_or(WorkflowValidationError::NotAnObject)?;

    let present: HashSet<&str> = nodes
        .values()
        .filter_map(|node| node.get("class_type")?.as_str())
        .collect();

    let missing: Vec<String> = kind
        .required_nodes()
        .iter()
        .filter(|name| !present.contains(*name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(WorkflowValidationError::MissingNodes(missing));
    }

    if !present.contains("KSampler") {
        return Err(WorkflowValidationError::NoSampler);
    }
    Ok(())
}

/// A workflow loaded for review or upload. Content always holds a graph
/// that passed [`validate_workflow`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowFile {
    pub kind: WorkflowKind,
    pub file_name: String,
    content: Value,
}

impl WorkflowFile {
    pub fn parse(kind: WorkflowKind, file_name: impl Into<String>, raw: &str) -> Result<Self> {
        let content = parse_and_validate(raw, kind)?;
        Ok(Self {
            kind,
            file_name: file_name.into(),
            content,
        })
    }

    pub async fn load(path: &Path, kind: WorkflowKind) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{kind}.json"));
        Self::parse(kind, file_name, &raw)
    }

    pub fn content(&self) -> &Value {
        &self.content
    }

    pub fn node_count(&self) -> usize {
        self.content.as_object().map_or(0, |o| o.len())
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.content).unwrap_or_else(|_| self.content.to_string())
    }

    /// Accepts edited JSON only if it still parses and validates; on error
    /// the previous content is kept.
    pub fn replace_content(&mut self, raw: &str) -> Result<()> {
        self.content = parse_and_validate(raw, self.kind)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.content)?)
    }
}

fn parse_and_validate(raw: &str, kind: WorkflowKind) -> Result<Value> {
    let content: Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::InvalidWorkflow(WorkflowValidationError::Parse(e.to_string())))?;
    validate_workflow(&content, kind)?;
    Ok(content)
}

/// Response of `POST /workflows/upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowUploadResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkflowUploadResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// One-line outcome for display.
    pub fn summary(&self) -> String {
        if self.success {
            self.message
                .clone()
                .unwrap_or_else(|| "Workflow сохранён".to_string())
        } else {
            format!(
                "Ошибка сохранения: {}",
                self.error.as_deref().unwrap_or("Неизвестная ошибка")
            )
        }
    }
}
