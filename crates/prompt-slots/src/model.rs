use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::SlotsError;

/// Treats an explicit JSON `null` the same as a missing key.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Interior or exterior, as written in a scene heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SceneType {
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "EXT")]
    Ext,
}

impl SceneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneType::Int => "INT",
            SceneType::Ext => "EXT",
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INT" | "INT." => Ok(SceneType::Int),
            "EXT" | "EXT." => Ok(SceneType::Ext),
            other => Err(format!("unknown scene type '{other}'")),
        }
    }
}

// Empty strings and unknown values come back from the form as "not set".
fn scene_type_opt<'de, D>(deserializer: D) -> Result<Option<SceneType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSlot {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub appearance: String,
    #[serde(default, deserialize_with = "nullable")]
    pub clothing: Arc<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub pose: String,
    #[serde(default, deserialize_with = "nullable")]
    pub action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub position_in_frame: String,
    #[serde(default, deserialize_with = "nullable")]
    pub emotion: String,
}

impl CharacterSlot {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(default, deserialize_with = "nullable")]
    pub raw: String,
    #[serde(default, deserialize_with = "nullable")]
    pub normalized: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSlot {
    #[serde(default, deserialize_with = "nullable")]
    pub raw: String,
    #[serde(default, deserialize_with = "nullable")]
    pub normalized: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable")]
    pub environment_details: Vec<String>,
    #[serde(default, deserialize_with = "scene_type_opt")]
    pub scene_type: Option<SceneType>,
    #[serde(default, deserialize_with = "nullable")]
    pub time: TimeSlot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropSlot {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub required: bool,
    #[serde(default)]
    pub owner: Option<String>,
}

impl PropSlot {
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            required,
            owner: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSlot {
    #[serde(default, deserialize_with = "nullable")]
    pub main_action: String,
    #[serde(default, deserialize_with = "nullable")]
    pub props: Vec<PropSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionSlot {
    #[serde(default, deserialize_with = "nullable")]
    pub shot_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub camera_angle: String,
    #[serde(default, deserialize_with = "nullable")]
    pub framing: String,
    #[serde(default, deserialize_with = "nullable")]
    pub motion: String,
    #[serde(default, deserialize_with = "nullable")]
    pub locational_cues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NegativeKind {
    Global,
    SceneSpecific,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegativeSlots {
    #[serde(default, deserialize_with = "nullable")]
    pub global: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub scene_specific: Vec<String>,
}

impl NegativeSlots {
    pub fn get(&self, kind: NegativeKind) -> &[String] {
        match kind {
            NegativeKind::Global => &self.global,
            NegativeKind::SceneSpecific => &self.scene_specific,
        }
    }

    pub(crate) fn get_mut(&mut self, kind: NegativeKind) -> &mut Vec<String> {
        match kind {
            NegativeKind::Global => &mut self.global,
            NegativeKind::SceneSpecific => &mut self.scene_specific,
        }
    }
}

/// Full slot tree for one scene.
///
/// Every field is optional on the wire; deserializing fills anything missing
/// (or `null`) with an empty default so the tree is always total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptSlots {
    /// Who is in the frame.
    #[serde(default, deserialize_with = "nullable")]
    pub characters: Arc<Vec<Arc<CharacterSlot>>>,
    /// Where it happens.
    #[serde(default, deserialize_with = "nullable")]
    pub location: Arc<LocationSlot>,
    /// What happens, with the props it needs.
    #[serde(default, deserialize_with = "nullable")]
    pub action: Arc<ActionSlot>,
    #[serde(default, deserialize_with = "nullable")]
    pub composition: Arc<CompositionSlot>,
    #[serde(default, deserialize_with = "nullable")]
    pub tone: Arc<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub style_hints: Arc<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub negatives: Arc<NegativeSlots>,
    /// Legacy free-text lighting hint.
    #[serde(default, deserialize_with = "nullable")]
    pub lighting: String,
    /// Legacy free-text technical hint.
    #[serde(default, deserialize_with = "nullable")]
    pub technical: String,
}

impl PromptSlots {
    /// Build a total slot tree from whatever partial JSON the backend sent.
    pub fn from_partial(initial: Option<Value>) -> Result<Self, SlotsError> {
        match initial {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_input_gives_empty_tree() {
        let slots = PromptSlots::from_partial(None).unwrap();
        assert!(slots.characters.is_empty());
        assert_eq!(slots.location.raw, "");
        assert!(slots.location.scene_type.is_none());
        assert!(slots.negatives.global.is_empty());
    }

    #[test]
    fn partial_json_is_filled_with_defaults() {
        let slots = PromptSlots::from_partial(Some(json!({
            "location": { "raw": "Kitchen", "sceneType": "INT" },
            "characters": [{ "name": "Anna", "clothing": null }],
            "action": null,
            "tone": ["tense"]
        })))
        .unwrap();

        assert_eq!(slots.location.raw, "Kitchen");
        assert_eq!(slots.location.scene_type, Some(SceneType::Int));
        assert_eq!(slots.location.time, TimeSlot::default());
        assert_eq!(slots.characters[0].name, "Anna");
        assert!(slots.characters[0].clothing.is_empty());
        assert_eq!(*slots.action, ActionSlot::default());
        assert_eq!(*slots.tone, vec!["tense".to_string()]);
        assert!(slots.style_hints.is_empty());
    }

    #[test]
    fn blank_scene_type_reads_as_unset() {
        let slots =
            PromptSlots::from_partial(Some(json!({ "location": { "sceneType": "" } }))).unwrap();
        assert!(slots.location.scene_type.is_none());
    }

    #[test]
    fn serializes_with_wire_names() {
        let mut slots = PromptSlots::default();
        Arc::make_mut(&mut slots.composition).shot_type = "wide shot".into();
        let value = serde_json::to_value(&slots).unwrap();
        assert_eq!(value["composition"]["shotType"], "wide shot");
        assert!(value["negatives"]["sceneSpecific"].is_array());
        assert!(value["location"]["environmentDetails"].is_array());
    }

    #[test]
    fn non_object_input_is_rejected() {
        assert!(PromptSlots::from_partial(Some(json!([1, 2]))).is_err());
    }
}
