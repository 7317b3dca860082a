use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{lenient, nullable, ModelError};

/// Level of detail of a generated frame.
///
/// `medium` is an older spelling of `mid` still produced by some fixtures; it
/// is accepted on input and never written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Sketch,
    #[serde(alias = "medium")]
    Mid,
    Final,
    #[serde(alias = "direct-final", alias = "directfinal")]
    DirectFinal,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 4] = [
        DetailLevel::Sketch,
        DetailLevel::Mid,
        DetailLevel::Final,
        DetailLevel::DirectFinal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Sketch => "sketch",
            DetailLevel::Mid => "mid",
            DetailLevel::Final => "final",
            DetailLevel::DirectFinal => "direct_final",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sketch" => Ok(DetailLevel::Sketch),
            "mid" | "medium" => Ok(DetailLevel::Mid),
            "final" => Ok(DetailLevel::Final),
            "direct_final" | "direct-final" | "directfinal" => Ok(DetailLevel::DirectFinal),
            _ => Err(ModelError::UnknownDetailLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPath {
    Progressive,
    Direct,
}

impl GenerationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPath::Progressive => "progressive",
            GenerationPath::Direct => "direct",
        }
    }
}

impl fmt::Display for GenerationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "progressive" => Ok(GenerationPath::Progressive),
            "direct" => Ok(GenerationPath::Direct),
            _ => Err(ModelError::UnknownPath(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMeta {
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub negatives: Vec<String>,
}

/// Technical parameters the backend recorded for a frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameTechMeta {
    pub seed: Option<i64>,
    pub steps: Option<u32>,
    pub cfg: Option<f64>,
    pub sampler: Option<String>,
    pub scheduler: Option<String>,
    pub resolution: Option<String>,
    pub vae: Option<String>,
    pub style: Option<StyleMeta>,
    pub lod: Option<String>,
    pub path: Option<String>,
    pub queue_ms: Option<u64>,
    pub run_ms: Option<u64>,
    pub vram_gb: Option<u32>,
}

/// One generated image. Frames are immutable once returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: String,
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: String,
    #[serde(default, deserialize_with = "lenient")]
    pub detail_level: Option<DetailLevel>,
    #[serde(default, deserialize_with = "lenient")]
    pub path: Option<GenerationPath>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub seed: Option<i64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub meta: Option<FrameTechMeta>,
}

impl Frame {
    /// Parsed creation time, when the backend sent an RFC 3339 timestamp.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn is_sketch(&self) -> bool {
        self.detail_level == Some(DetailLevel::Sketch)
    }
}

/// Body of `POST /scenes/{id}/generate` and `/generate-progressive`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub detail_level: DetailLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<GenerationPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn new(detail_level: DetailLevel) -> Self {
        Self {
            detail_level,
            path: None,
            prompt: None,
            seed: None,
            model: None,
        }
    }

    pub fn with_path(mut self, path: GenerationPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Blank prompts are left out of the request.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = (!model.trim().is_empty()).then_some(model);
        self
    }
}

/// Body of `POST /frames/{id}/regenerate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub prompt: String,
    pub detail_level: DetailLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<GenerationPath>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn medium_reads_as_mid_and_writes_as_mid() {
        let frame: Frame = serde_json::from_value(json!({
            "id": "frame-1-1",
            "imageUrl": "https://example.test/1.png",
            "detailLevel": "medium",
            "createdAt": "2025-11-02T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(frame.detail_level, Some(DetailLevel::Mid));
        let out = serde_json::to_value(&frame).unwrap();
        assert_eq!(out["detailLevel"], "mid");
        assert_eq!("medium".parse::<DetailLevel>().unwrap(), DetailLevel::Mid);
    }

    #[test]
    fn unknown_detail_level_is_dropped_not_fatal() {
        let frame: Frame =
            serde_json::from_value(json!({ "id": "f", "detailLevel": "ultra" })).unwrap();
        assert_eq!(frame.detail_level, None);
        assert!(matches!(
            "ultra".parse::<DetailLevel>(),
            Err(ModelError::UnknownDetailLevel(_))
        ));
    }

    #[test]
    fn created_at_parses_rfc3339() {
        let frame = Frame {
            id: "f".into(),
            created_at: Some("2025-11-02T10:30:00Z".into()),
            ..Frame::default()
        };
        let ts = frame.created_at_utc().unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-11-02T10:30:00+00:00");

        let bad = Frame {
            created_at: Some("yesterday".into()),
            ..frame
        };
        assert!(bad.created_at_utc().is_none());
    }

    #[test]
    fn generate_request_omits_absent_fields() {
        let body = serde_json::to_value(GenerateRequest::new(DetailLevel::Sketch)).unwrap();
        assert_eq!(body, json!({ "detailLevel": "sketch" }));

        let body = serde_json::to_value(
            GenerateRequest::new(DetailLevel::DirectFinal)
                .with_path(GenerationPath::Direct)
                .with_prompt("  ")
                .with_seed(0),
        )
        .unwrap();
        assert_eq!(
            body,
            json!({ "detailLevel": "direct_final", "path": "direct", "seed": 0 })
        );
    }

    #[test]
    fn tech_meta_reads_partial_payload() {
        let meta: FrameTechMeta = serde_json::from_value(json!({
            "seed": 42,
            "steps": 30,
            "style": { "preset": "noir", "negatives": null },
            "queueMs": 120
        }))
        .unwrap();
        assert_eq!(meta.seed, Some(42));
        assert_eq!(meta.style.unwrap().preset.as_deref(), Some("noir"));
        assert_eq!(meta.queue_ms, Some(120));
        assert!(meta.vae.is_none());
    }
}
