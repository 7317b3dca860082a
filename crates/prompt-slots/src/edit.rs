//! Copy-on-write updates over the slot tree.
//!
//! Each operation clones the `PromptSlots` shell (a handful of `Arc` bumps),
//! then copies exactly the branches on the path to the edited field. Siblings
//! keep sharing their allocation with the previous version.

use std::sync::Arc;

use crate::model::{
    CharacterSlot, CompositionSlot, LocationSlot, NegativeKind, PromptSlots, PropSlot, SceneType,
};

/// Copies one level of the tree and applies `f` to the copy.
fn cow<T: Clone>(branch: &Arc<T>, f: impl FnOnce(&mut T)) -> Arc<T> {
    let mut next = Arc::clone(branch);
    f(Arc::make_mut(&mut next));
    next
}

fn push_trimmed(list: &mut Vec<String>, item: &str) {
    list.push(item.trim().to_string());
}

fn remove_at<T>(list: &mut Vec<T>, index: usize) {
    if index < list.len() {
        list.remove(index);
    }
}

/// Scalar text fields of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterField {
    Name,
    Appearance,
    Pose,
    Action,
    PositionInFrame,
    Emotion,
}

/// Scalar text fields of the composition slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionField {
    ShotType,
    CameraAngle,
    Framing,
    Motion,
}

impl PromptSlots {
    fn with_character(&self, index: usize, f: impl FnOnce(&mut CharacterSlot)) -> Self {
        if index >= self.characters.len() {
            return self.clone();
        }
        Self {
            characters: cow(&self.characters, |chars| {
                let updated = cow(&chars[index], f);
                chars[index] = updated;
            }),
            ..self.clone()
        }
    }

    fn with_location(&self, f: impl FnOnce(&mut LocationSlot)) -> Self {
        Self {
            location: cow(&self.location, f),
            ..self.clone()
        }
    }

    fn with_composition(&self, f: impl FnOnce(&mut CompositionSlot)) -> Self {
        Self {
            composition: cow(&self.composition, f),
            ..self.clone()
        }
    }

    // --- characters -------------------------------------------------------

    #[must_use]
    pub fn add_character(&self, character: CharacterSlot) -> Self {
        Self {
            characters: cow(&self.characters, |chars| chars.push(Arc::new(character))),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn remove_character(&self, index: usize) -> Self {
        if index >= self.characters.len() {
            return self.clone();
        }
        Self {
            characters: cow(&self.characters, |chars| remove_at(chars, index)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn update_character(&self, index: usize, field: CharacterField, value: &str) -> Self {
        let value = value.to_string();
        self.with_character(index, |ch| match field {
            CharacterField::Name => ch.name = value,
            CharacterField::Appearance => ch.appearance = value,
            CharacterField::Pose => ch.pose = value,
            CharacterField::Action => ch.action = value,
            CharacterField::PositionInFrame => ch.position_in_frame = value,
            CharacterField::Emotion => ch.emotion = value,
        })
    }

    #[must_use]
    pub fn add_clothing_item(&self, character: usize, item: &str) -> Self {
        if item.trim().is_empty() {
            return self.clone();
        }
        self.with_character(character, |ch| {
            let clothing = cow(&ch.clothing, |items| push_trimmed(items, item));
            ch.clothing = clothing;
        })
    }

    #[must_use]
    pub fn remove_clothing_item(&self, character: usize, index: usize) -> Self {
        match self.characters.get(character) {
            Some(ch) if index < ch.clothing.len() => self.with_character(character, |ch| {
                let clothing = cow(&ch.clothing, |items| remove_at(items, index));
                ch.clothing = clothing;
            }),
            _ => self.clone(),
        }
    }

    // --- location ---------------------------------------------------------

    #[must_use]
    pub fn set_location_raw(&self, raw: &str) -> Self {
        self.with_location(|loc| loc.raw = raw.to_string())
    }

    #[must_use]
    pub fn set_location_description(&self, description: &str) -> Self {
        self.with_location(|loc| loc.description = description.to_string())
    }

    #[must_use]
    pub fn set_scene_type(&self, scene_type: Option<SceneType>) -> Self {
        self.with_location(|loc| loc.scene_type = scene_type)
    }

    #[must_use]
    pub fn set_time_description(&self, description: &str) -> Self {
        self.with_location(|loc| loc.time.description = description.to_string())
    }

    #[must_use]
    pub fn add_environment_detail(&self, detail: &str) -> Self {
        if detail.trim().is_empty() {
            return self.clone();
        }
        self.with_location(|loc| push_trimmed(&mut loc.environment_details, detail))
    }

    #[must_use]
    pub fn remove_environment_detail(&self, index: usize) -> Self {
        if index >= self.location.environment_details.len() {
            return self.clone();
        }
        self.with_location(|loc| remove_at(&mut loc.environment_details, index))
    }

    // --- action -----------------------------------------------------------

    #[must_use]
    pub fn set_main_action(&self, action: &str) -> Self {
        Self {
            action: cow(&self.action, |a| a.main_action = action.to_string()),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add_prop(&self, prop: PropSlot) -> Self {
        Self {
            action: cow(&self.action, |a| a.props.push(prop)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn update_prop(&self, index: usize, prop: PropSlot) -> Self {
        if index >= self.action.props.len() {
            return self.clone();
        }
        Self {
            action: cow(&self.action, |a| a.props[index] = prop),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn remove_prop(&self, index: usize) -> Self {
        if index >= self.action.props.len() {
            return self.clone();
        }
        Self {
            action: cow(&self.action, |a| remove_at(&mut a.props, index)),
            ..self.clone()
        }
    }

    // --- composition ------------------------------------------------------

    #[must_use]
    pub fn set_composition(&self, field: CompositionField, value: &str) -> Self {
        let value = value.to_string();
        self.with_composition(|c| match field {
            CompositionField::ShotType => c.shot_type = value,
            CompositionField::CameraAngle => c.camera_angle = value,
            CompositionField::Framing => c.framing = value,
            CompositionField::Motion => c.motion = value,
        })
    }

    #[must_use]
    pub fn add_locational_cue(&self, cue: &str) -> Self {
        if cue.trim().is_empty() {
            return self.clone();
        }
        self.with_composition(|c| push_trimmed(&mut c.locational_cues, cue))
    }

    #[must_use]
    pub fn remove_locational_cue(&self, index: usize) -> Self {
        if index >= self.composition.locational_cues.len() {
            return self.clone();
        }
        self.with_composition(|c| remove_at(&mut c.locational_cues, index))
    }

    // --- tags -------------------------------------------------------------

    #[must_use]
    pub fn add_tone(&self, tone: &str) -> Self {
        if tone.trim().is_empty() {
            return self.clone();
        }
        Self {
            tone: cow(&self.tone, |t| push_trimmed(t, tone)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn remove_tone(&self, index: usize) -> Self {
        if index >= self.tone.len() {
            return self.clone();
        }
        Self {
            tone: cow(&self.tone, |t| remove_at(t, index)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add_style_hint(&self, hint: &str) -> Self {
        if hint.trim().is_empty() {
            return self.clone();
        }
        Self {
            style_hints: cow(&self.style_hints, |s| push_trimmed(s, hint)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn remove_style_hint(&self, index: usize) -> Self {
        if index >= self.style_hints.len() {
            return self.clone();
        }
        Self {
            style_hints: cow(&self.style_hints, |s| remove_at(s, index)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn add_negative(&self, kind: NegativeKind, negative: &str) -> Self {
        if negative.trim().is_empty() {
            return self.clone();
        }
        Self {
            negatives: cow(&self.negatives, |n| push_trimmed(n.get_mut(kind), negative)),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn remove_negative(&self, kind: NegativeKind, index: usize) -> Self {
        if index >= self.negatives.get(kind).len() {
            return self.clone();
        }
        Self {
            negatives: cow(&self.negatives, |n| remove_at(n.get_mut(kind), index)),
            ..self.clone()
        }
    }

    // --- legacy -----------------------------------------------------------

    #[must_use]
    pub fn set_lighting(&self, lighting: &str) -> Self {
        Self {
            lighting: lighting.to_string(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn set_technical(&self, technical: &str) -> Self {
        Self {
            technical: technical.to_string(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast() -> PromptSlots {
        PromptSlots::default()
            .add_character(CharacterSlot::named("Anna"))
            .add_character(CharacterSlot::named("Boris"))
            .add_character(CharacterSlot::named("Viktor"))
    }

    #[test]
    fn remove_character_keeps_order_and_siblings() {
        let before = cast();
        let after = before.remove_character(1);

        let names: Vec<_> = after.characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Anna", "Viktor"]);
        assert!(Arc::ptr_eq(&before.characters[0], &after.characters[0]));
        assert!(Arc::ptr_eq(&before.characters[2], &after.characters[1]));
        assert!(Arc::ptr_eq(&before.location, &after.location));
        assert!(Arc::ptr_eq(&before.negatives, &after.negatives));
        // The previous version is untouched.
        assert_eq!(before.characters.len(), 3);
    }

    #[test]
    fn clothing_edit_copies_only_its_character() {
        let before = cast().add_clothing_item(0, "  coat ");
        let after = before.add_clothing_item(0, "scarf").remove_clothing_item(0, 0);

        assert_eq!(*after.characters[0].clothing, vec!["scarf".to_string()]);
        assert_eq!(*before.characters[0].clothing, vec!["coat".to_string()]);
        assert!(Arc::ptr_eq(&before.characters[1], &after.characters[1]));
        assert!(Arc::ptr_eq(&before.characters[2], &after.characters[2]));
        assert!(!Arc::ptr_eq(&before.characters, &after.characters));
    }

    #[test]
    fn blank_additions_are_ignored() {
        let slots = PromptSlots::default()
            .add_tone("   ")
            .add_style_hint("")
            .add_negative(NegativeKind::Global, " ")
            .add_locational_cue("")
            .add_environment_detail("\t");
        assert_eq!(slots, PromptSlots::default());
    }

    #[test]
    fn out_of_range_removal_is_a_no_op() {
        let slots = cast().add_tone("warm");
        let same = slots.remove_tone(5).remove_character(9).remove_clothing_item(0, 3);
        assert_eq!(same, slots);
        assert!(Arc::ptr_eq(&same.characters, &slots.characters));
    }

    #[test]
    fn negatives_by_kind_are_independent() {
        let slots = PromptSlots::default()
            .add_negative(NegativeKind::Global, "blurry")
            .add_negative(NegativeKind::Global, "text")
            .add_negative(NegativeKind::SceneSpecific, "umbrella");
        let trimmed = slots.remove_negative(NegativeKind::Global, 0);

        assert_eq!(trimmed.negatives.global, vec!["text".to_string()]);
        assert_eq!(trimmed.negatives.scene_specific, vec!["umbrella".to_string()]);
    }

    #[test]
    fn prop_and_composition_edits() {
        let slots = PromptSlots::default()
            .add_prop(PropSlot::new("phone", true))
            .add_prop(PropSlot::new("coffee", false))
            .update_prop(1, PropSlot::new("tea", false))
            .set_composition(CompositionField::ShotType, "close-up")
            .add_locational_cue("by the window");

        assert_eq!(slots.action.props[1].name, "tea");
        assert_eq!(slots.composition.shot_type, "close-up");
        assert_eq!(slots.composition.locational_cues, vec!["by the window".to_string()]);

        let fewer = slots.remove_prop(0);
        assert_eq!(fewer.action.props.len(), 1);
        assert!(Arc::ptr_eq(&slots.composition, &fewer.composition));
    }

    #[test]
    fn update_character_field() {
        let slots = cast().update_character(2, CharacterField::Emotion, "angry");
        assert_eq!(slots.characters[2].emotion, "angry");
        assert_eq!(slots.characters[2].name, "Viktor");
    }
}
