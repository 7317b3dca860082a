use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::nullable;
use crate::scene::Scene;

/// Lifecycle of an uploaded script: `UPLOADED -> PARSING -> PARSED | FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptStatus {
    Uploaded,
    Parsing,
    Parsed,
    Failed,
}

impl ScriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptStatus::Uploaded => "UPLOADED",
            ScriptStatus::Parsing => "PARSING",
            ScriptStatus::Parsed => "PARSED",
            ScriptStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScriptStatus::Parsed | ScriptStatus::Failed)
    }

    /// Anything unrecognised is treated as still in progress so a poller
    /// keeps going rather than stopping on a status it cannot interpret.
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "UPLOADED" => ScriptStatus::Uploaded,
            "PARSED" | "COMPLETED" => ScriptStatus::Parsed,
            "FAILED" => ScriptStatus::Failed,
            _ => ScriptStatus::Parsing,
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScriptStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ScriptStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or(ScriptStatus::Parsing, |s| ScriptStatus::from_wire(&s)))
    }
}

fn default_status() -> ScriptStatus {
    ScriptStatus::Parsing
}

/// Aggregated parse progress for one script (`GET /scripts/{id}/status`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingStatus {
    #[serde(default, deserialize_with = "nullable")]
    pub script_id: String,
    #[serde(default = "default_status")]
    pub script_status: ScriptStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub total_scenes: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub pending_scenes: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub processing_scenes: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub parsed_scenes: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub failed_scenes: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub completion_percent: f64,
}

impl ParsingStatus {
    pub fn new(script_id: impl Into<String>, status: ScriptStatus, total_scenes: u64) -> Self {
        let parsed = if status == ScriptStatus::Parsed { total_scenes } else { 0 };
        Self {
            script_id: script_id.into(),
            script_status: status,
            total_scenes,
            pending_scenes: total_scenes - parsed,
            processing_scenes: 0,
            parsed_scenes: parsed,
            failed_scenes: 0,
            completion_percent: if total_scenes == 0 {
                0.0
            } else {
                parsed as f64 * 100.0 / total_scenes as f64
            },
        }
    }

    pub fn progress_line(&self) -> String {
        format!(
            "{} {:.0}% (pending {}, processing {}, parsed {}, failed {} of {})",
            self.script_status,
            self.completion_percent,
            self.pending_scenes,
            self.processing_scenes,
            self.parsed_scenes,
            self.failed_scenes,
            self.total_scenes,
        )
    }
}

/// Descriptor returned by `POST /scripts/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub script_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub filename: String,
    #[serde(default = "default_status")]
    pub status: ScriptStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub scenes: Vec<Scene>,
    #[serde(default, deserialize_with = "nullable")]
    pub chunk_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_status_keeps_polling() {
        assert_eq!(ScriptStatus::from_wire("QUEUED"), ScriptStatus::Parsing);
        assert_eq!(ScriptStatus::from_wire("completed"), ScriptStatus::Parsed);
        assert_eq!(ScriptStatus::from_wire("failed"), ScriptStatus::Failed);
        assert!(!ScriptStatus::Uploaded.is_terminal());
    }

    #[test]
    fn parsing_status_reads_backend_payload() {
        let status: ParsingStatus = serde_json::from_value(json!({
            "scriptId": "s-1",
            "scriptStatus": "PARSING",
            "totalScenes": 5,
            "pendingScenes": 2,
            "processingScenes": 1,
            "parsedScenes": 2,
            "failedScenes": 0,
            "completionPercent": 40.0
        }))
        .unwrap();

        assert_eq!(status.script_status, ScriptStatus::Parsing);
        assert_eq!(
            status.progress_line(),
            "PARSING 40% (pending 2, processing 1, parsed 2, failed 0 of 5)"
        );
    }

    #[test]
    fn upload_response_tolerates_missing_lists() {
        let resp: UploadResponse = serde_json::from_value(json!({
            "scriptId": "abc",
            "filename": "draft.pdf",
            "status": "UPLOADED",
            "scenes": null
        }))
        .unwrap();
        assert_eq!(resp.status, ScriptStatus::Uploaded);
        assert!(resp.scenes.is_empty());
        assert!(resp.chunk_files.is_empty());
    }

    #[test]
    fn new_status_computes_percent() {
        let done = ParsingStatus::new("s", ScriptStatus::Parsed, 4);
        assert_eq!(done.parsed_scenes, 4);
        assert_eq!(done.completion_percent, 100.0);
        let empty = ParsingStatus::new("s", ScriptStatus::Parsing, 0);
        assert_eq!(empty.completion_percent, 0.0);
    }
}
