use serde::Serialize;
use std::fmt;

use crate::model::PromptSlots;

/// Slot that failed a required-field check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotField {
    Location,
    Action,
    Composition,
}

impl SlotField {
    pub fn message(&self) -> &'static str {
        match self {
            SlotField::Location => "Локация обязательна",
            SlotField::Action => "Необходимо указать действие или реквизиты",
            SlotField::Composition => "Тип кадра обязателен",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: SlotField,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has(&self, field: SlotField) -> bool {
        self.issues.iter().any(|i| i.field == field)
    }

    pub fn fields(&self) -> Vec<SlotField> {
        self.issues.iter().map(|i| i.field).collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.issues.iter().map(|i| i.message).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Required-field checks gating a save: location text, an action or at
/// least one prop, and a shot type.
pub fn validate(slots: &PromptSlots) -> ValidationReport {
    let mut issues = Vec::new();
    let mut fail = |field: SlotField| {
        issues.push(ValidationIssue {
            field,
            message: field.message(),
        })
    };

    if slots.location.raw.trim().is_empty() {
        fail(SlotField::Location);
    }
    if slots.action.main_action.trim().is_empty() && slots.action.props.is_empty() {
        fail(SlotField::Action);
    }
    if slots.composition.shot_type.trim().is_empty() {
        fail(SlotField::Composition);
    }

    ValidationReport { issues }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CompositionField, PropSlot};

    #[test]
    fn empty_slots_fail_all_three_checks() {
        let report = validate(&PromptSlots::default());
        assert_eq!(report.len(), 3);
        assert_eq!(
            report.fields(),
            vec![SlotField::Location, SlotField::Action, SlotField::Composition]
        );
    }

    #[test]
    fn filling_one_field_clears_exactly_that_error() {
        let base = PromptSlots::default();

        let with_location = validate(&base.set_location_raw("Kitchen"));
        assert_eq!(with_location.fields(), vec![SlotField::Action, SlotField::Composition]);

        let with_shot = validate(&base.set_composition(CompositionField::ShotType, "wide"));
        assert_eq!(with_shot.fields(), vec![SlotField::Location, SlotField::Action]);

        let with_action = validate(&base.set_main_action("runs"));
        assert_eq!(with_action.fields(), vec![SlotField::Location, SlotField::Composition]);

        let with_prop = validate(&base.add_prop(PropSlot::new("umbrella", false)));
        assert!(!with_prop.has(SlotField::Action));
        assert_eq!(with_prop.len(), 2);
    }

    #[test]
    fn whitespace_counts_as_empty() {
        let report = validate(&PromptSlots::default().set_location_raw("   "));
        assert!(report.has(SlotField::Location));
    }

    #[test]
    fn complete_slots_pass() {
        let slots = PromptSlots::default()
            .set_location_raw("Office")
            .set_main_action("meeting")
            .set_composition(CompositionField::ShotType, "medium shot");
        assert!(validate(&slots).is_valid());
    }
}
