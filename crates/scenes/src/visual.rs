use prompt_slots::PromptSlots;
use serde::{Deserialize, Serialize};

use crate::frame::FrameTechMeta;
use crate::nullable;

/// Enrichment output for a scene (`GET /visual/scenes/{id}`): the enriched
/// JSON, the compiled prompt and the structured slots behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneVisual {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub enriched_json: Option<String>,
    #[serde(default)]
    pub flux_prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub slots: Option<PromptSlots>,
}

impl SceneVisual {
    /// Enriched JSON re-indented for display; falls back to the raw text
    /// when it does not parse.
    pub fn pretty_enriched_json(&self) -> Option<String> {
        let raw = self.enriched_json.as_deref()?;
        Some(
            serde_json::from_str::<serde_json::Value>(raw)
                .and_then(|v| serde_json::to_string_pretty(&v))
                .unwrap_or_else(|_| raw.to_string()),
        )
    }
}

/// Flattened frame + scene + slots record used by the gallery and exports
/// (`GET /scripts/{id}/frames/cards`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameCard {
    pub frame_id: String,
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub script_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub scene_title: String,
    #[serde(default, deserialize_with = "nullable")]
    pub scene_location: String,
    #[serde(default, deserialize_with = "nullable")]
    pub scene_characters: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub scene_props: Vec<String>,
    #[serde(default)]
    pub lod: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub best: bool,
    #[serde(default)]
    pub slots: Option<PromptSlots>,
    #[serde(default)]
    pub meta: Option<FrameTechMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn visual_with_slots_and_pretty_json() {
        let visual: SceneVisual = serde_json::from_value(json!({
            "id": 7,
            "sceneId": "0b6e",
            "enrichedJson": "{\"mood\":\"dark\"}",
            "fluxPrompt": "rainy street at night",
            "slots": { "location": { "raw": "Street" } }
        }))
        .unwrap();

        assert_eq!(visual.slots.as_ref().unwrap().location.raw, "Street");
        assert_eq!(
            visual.pretty_enriched_json().unwrap(),
            "{\n  \"mood\": \"dark\"\n}"
        );
    }

    #[test]
    fn unparseable_enriched_json_is_shown_raw() {
        let visual = SceneVisual {
            enriched_json: Some("not json".into()),
            ..SceneVisual::default()
        };
        assert_eq!(visual.pretty_enriched_json().as_deref(), Some("not json"));
        assert!(SceneVisual::default().pretty_enriched_json().is_none());
    }

    #[test]
    fn frame_card_reads_sparse_payload() {
        let card: FrameCard = serde_json::from_value(json!({
            "frameId": "f-1",
            "sceneTitle": "Finale",
            "best": null,
            "meta": { "steps": 20 }
        }))
        .unwrap();
        assert_eq!(card.scene_title, "Finale");
        assert!(!card.best);
        assert_eq!(card.meta.unwrap().steps, Some(20));
    }
}
