use crate::model::{CharacterSlot, PromptSlots};

fn present(s: &str) -> bool {
    !s.trim().is_empty()
}

fn labelled(parts: &mut Vec<String>, label: &str, value: &str) {
    if present(value) {
        parts.push(format!("{label}: {value}"));
    }
}

fn join_present(items: &[String], sep: &str) -> Option<String> {
    let kept: Vec<&str> = items
        .iter()
        .map(String::as_str)
        .filter(|s| present(s))
        .collect();
    (!kept.is_empty()).then(|| kept.join(sep))
}

fn character_line(ch: &CharacterSlot) -> String {
    let mut parts = Vec::new();
    if present(&ch.name) {
        parts.push(ch.name.clone());
    }
    if present(&ch.appearance) {
        parts.push(ch.appearance.clone());
    }
    if let Some(clothing) = join_present(&ch.clothing, ", ") {
        parts.push(format!("одежда: {clothing}"));
    }
    labelled(&mut parts, "поза", &ch.pose);
    labelled(&mut parts, "действие", &ch.action);
    labelled(&mut parts, "позиция", &ch.position_in_frame);
    labelled(&mut parts, "эмоция", &ch.emotion);
    parts.join(", ")
}

/// Flattens the slot tree into the human-readable prompt preview.
///
/// Sections appear in a fixed order (characters, location, action,
/// composition, tone, style, lighting) and only when they have content.
pub fn preview(slots: &PromptSlots) -> String {
    let mut sections = Vec::new();

    let characters: Vec<String> = slots
        .characters
        .iter()
        .map(|ch| character_line(ch))
        .filter(|line| !line.is_empty())
        .collect();
    if !characters.is_empty() {
        sections.push(format!("Персонажи: {}", characters.join(" | ")));
    }

    let loc = &slots.location;
    let mut loc_parts = Vec::new();
    if let Some(scene_type) = loc.scene_type {
        loc_parts.push(scene_type.to_string());
    }
    if present(&loc.raw) {
        loc_parts.push(loc.raw.clone());
    }
    if present(&loc.description) {
        loc_parts.push(loc.description.clone());
    }
    if let Some(details) = join_present(&loc.environment_details, ", ") {
        loc_parts.push(details);
    }
    labelled(&mut loc_parts, "время", &loc.time.description);
    if !loc_parts.is_empty() {
        sections.push(format!("Локация: {}", loc_parts.join(", ")));
    }

    let mut action_parts = Vec::new();
    if present(&slots.action.main_action) {
        action_parts.push(slots.action.main_action.clone());
    }
    let props: Vec<String> = slots
        .action
        .props
        .iter()
        .filter(|p| present(&p.name))
        .map(|p| {
            if p.required {
                format!("{} (обязательно)", p.name)
            } else {
                p.name.clone()
            }
        })
        .collect();
    if !props.is_empty() {
        action_parts.push(format!("реквизит: {}", props.join(", ")));
    }
    if !action_parts.is_empty() {
        sections.push(format!("Действие: {}", action_parts.join(". ")));
    }

    let comp = &slots.composition;
    let mut comp_parts = Vec::new();
    if present(&comp.shot_type) {
        comp_parts.push(comp.shot_type.clone());
    }
    labelled(&mut comp_parts, "угол", &comp.camera_angle);
    labelled(&mut comp_parts, "композиция", &comp.framing);
    labelled(&mut comp_parts, "движение", &comp.motion);
    if let Some(cues) = join_present(&comp.locational_cues, ", ") {
        comp_parts.push(format!("подсказки: {cues}"));
    }
    if !comp_parts.is_empty() {
        sections.push(format!("Композиция: {}", comp_parts.join(", ")));
    }

    if let Some(tone) = join_present(&slots.tone, ", ") {
        sections.push(format!("Тон: {tone}"));
    }
    if let Some(style) = join_present(&slots.style_hints, ", ") {
        sections.push(format!("Стиль: {style}"));
    }
    labelled(&mut sections, "Освещение", &slots.lighting);

    sections.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropSlot, SceneType};
    use crate::CompositionField;

    #[test]
    fn empty_slots_preview_is_empty() {
        assert_eq!(preview(&PromptSlots::default()), "");
    }

    #[test]
    fn location_only() {
        let slots = PromptSlots::default().set_location_raw("Kitchen");
        assert_eq!(preview(&slots), "Локация: Kitchen");
    }

    #[test]
    fn preview_is_deterministic() {
        let slots = PromptSlots::default()
            .set_location_raw("Cafe")
            .add_tone("warm")
            .set_lighting("soft daylight");
        assert_eq!(preview(&slots), preview(&slots));
    }

    #[test]
    fn sections_follow_fixed_order() {
        let slots = PromptSlots::default()
            .set_lighting("neon")
            .add_style_hint("noir")
            .add_tone("tense")
            .set_composition(CompositionField::ShotType, "close-up")
            .set_composition(CompositionField::CameraAngle, "low angle")
            .add_prop(PropSlot::new("phone", true))
            .add_prop(PropSlot::new("coffee", false))
            .set_main_action("Anna hands over the phone")
            .set_scene_type(Some(SceneType::Ext))
            .set_location_raw("Embankment")
            .set_time_description("night")
            .add_character(crate::CharacterSlot::named("Anna"))
            .update_character(0, crate::CharacterField::Emotion, "calm")
            .add_clothing_item(0, "coat");

        assert_eq!(
            preview(&slots),
            "Персонажи: Anna, одежда: coat, эмоция: calm. \
             Локация: EXT, Embankment, время: night. \
             Действие: Anna hands over the phone. реквизит: phone (обязательно), coffee. \
             Композиция: close-up, угол: low angle. \
             Тон: tense. \
             Стиль: noir. \
             Освещение: neon"
        );
    }

    #[test]
    fn technical_and_negatives_stay_out_of_preview() {
        let slots = PromptSlots::default()
            .set_technical("8k")
            .add_negative(crate::NegativeKind::Global, "blurry");
        assert_eq!(preview(&slots), "");
    }
}
