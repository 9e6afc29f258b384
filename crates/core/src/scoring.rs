//! Assistance-level scoring and milestone derivation.
//!
//! Pure functions only: the session orchestrator feeds a finished session's
//! step-level outcome vector through here to rate the whole run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ScenarioId;

/// How much help the child needed to complete one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssistanceLevel {
    /// The caregiver performed the step for the child.
    #[serde(rename = "F")]
    Full,
    /// The child performed the step after a prompt or cue.
    #[serde(rename = "P")]
    Partial,
    /// The child performed the step unprompted.
    #[serde(rename = "I")]
    Independent,
}

impl AssistanceLevel {
    /// One-letter persistence code (`F`/`P`/`I`).
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Full => 'F',
            Self::Partial => 'P',
            Self::Independent => 'I',
        }
    }

    /// Parses a one-letter persistence code.
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'F' => Some(Self::Full),
            'P' => Some(Self::Partial),
            'I' => Some(Self::Independent),
            _ => None,
        }
    }
}

impl fmt::Display for AssistanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Coarse two-tier capability summary derived from a session's overall
/// assistance level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Milestone {
    #[serde(rename = "level1")]
    Level1,
    #[serde(rename = "level2")]
    Level2,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Level1 => write!(f, "level1"),
            Self::Level2 => write!(f, "level2"),
        }
    }
}

/// Worst-case aggregation of a session's per-step levels: one fully
/// assisted step caps the whole scenario's rating. Empty input rates as
/// `Full` (nothing was demonstrated independently).
#[must_use]
pub fn overall_level(step_levels: &[AssistanceLevel]) -> AssistanceLevel {
    if step_levels.is_empty() {
        return AssistanceLevel::Full;
    }
    if step_levels.contains(&AssistanceLevel::Full) {
        return AssistanceLevel::Full;
    }
    if step_levels.contains(&AssistanceLevel::Partial) {
        return AssistanceLevel::Partial;
    }
    AssistanceLevel::Independent
}

/// Milestone tier for an overall level: independent runs reach tier 2,
/// anything assisted stays at tier 1.
#[must_use]
pub fn milestone_for(overall: AssistanceLevel) -> Milestone {
    match overall {
        AssistanceLevel::Independent => Milestone::Level2,
        AssistanceLevel::Full | AssistanceLevel::Partial => Milestone::Level1,
    }
}

/// Canned encouragement for a finished scenario at the given overall level.
///
/// Unknown scenario ids fall back to a generic three-tier message keyed
/// only by level.
#[must_use]
pub fn feedback_message(scenario_id: &ScenarioId, overall: AssistanceLevel) -> &'static str {
    use AssistanceLevel::{Full, Independent, Partial};
    match (scenario_id.as_str(), overall) {
        ("supermarket_queue", Full) => "We followed a helping hand and found our spot in line!",
        ("supermarket_queue", Partial) => "You saw the yellow line when we pointed — well lined up!",
        ("supermarket_queue", Independent) => "You queued up all by yourself, amazing!",
        ("brushing_teeth", Full) => "We brushed together, sparkly teeth all around!",
        ("brushing_teeth", Partial) => "One little reminder and you brushed beautifully!",
        ("brushing_teeth", Independent) => "You brushed your teeth all on your own, superstar!",
        ("crossing_road", Full) => "Hand in hand, we crossed safe and sound!",
        ("crossing_road", Partial) => "You watched the lights when we cued you — safely across!",
        ("crossing_road", Independent) => "You waited for the green light by yourself, brilliant!",
        ("garbage_sorting", Full) => "We sorted the recycling together, team effort!",
        ("garbage_sorting", Partial) => "With one hint you found the right bin, well done!",
        ("garbage_sorting", Independent) => "You sorted everything on your own, so capable!",
        ("bus_riding", Full) => "We rode the bus together and held on tight!",
        ("bus_riding", Partial) => "You remembered the handrail after a nudge, great ride!",
        ("bus_riding", Independent) => "You tapped on and rode like a pro, fantastic!",
        (_, Independent) => "You did it all by yourself — wonderful work!",
        (_, Partial) => "Great job — keep it up!",
        (_, Full) => "Let's keep practicing together!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssistanceLevel::{Full, Independent, Partial};

    #[test]
    fn overall_is_the_worst_level_present() {
        assert_eq!(overall_level(&[Independent, Partial, Full]), Full);
        assert_eq!(overall_level(&[Partial, Independent, Independent]), Partial);
        assert_eq!(overall_level(&[Independent, Independent]), Independent);
    }

    #[test]
    fn overall_is_order_independent() {
        assert_eq!(
            overall_level(&[Full, Partial, Independent]),
            overall_level(&[Independent, Partial, Full])
        );
        assert_eq!(
            overall_level(&[Independent, Partial]),
            overall_level(&[Partial, Independent])
        );
    }

    #[test]
    fn empty_input_defaults_to_full_assistance() {
        assert_eq!(overall_level(&[]), Full);
    }

    #[test]
    fn milestone_mapping_is_two_tier() {
        assert_eq!(milestone_for(Independent), Milestone::Level2);
        assert_eq!(milestone_for(Partial), Milestone::Level1);
        assert_eq!(milestone_for(Full), Milestone::Level1);
    }

    #[test]
    fn end_to_end_rating_vectors() {
        let all_full = [Full, Full, Full];
        assert_eq!(overall_level(&all_full), Full);
        assert_eq!(milestone_for(overall_level(&all_full)), Milestone::Level1);

        let mixed = [Partial, Independent, Independent];
        assert_eq!(overall_level(&mixed), Partial);
        assert_eq!(milestone_for(overall_level(&mixed)), Milestone::Level1);

        let all_independent = [Independent, Independent, Independent];
        assert_eq!(overall_level(&all_independent), Independent);
        assert_eq!(
            milestone_for(overall_level(&all_independent)),
            Milestone::Level2
        );
    }

    #[test]
    fn unknown_scenario_uses_generic_feedback() {
        let id = ScenarioId::new("made_up");
        assert_eq!(
            feedback_message(&id, Independent),
            "You did it all by yourself — wonderful work!"
        );
        assert_ne!(
            feedback_message(&ScenarioId::new("supermarket_queue"), Full),
            feedback_message(&id, Full)
        );
    }

    #[test]
    fn level_codes_round_trip() {
        for level in [Full, Partial, Independent] {
            assert_eq!(AssistanceLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(AssistanceLevel::from_code('X'), None);
    }
}
