//! Built-in scenario catalog and the settings option tables.
//!
//! These are the fixed social stories the app ships with; custom scenarios
//! are planned on demand from a free-text topic and join the store
//! alongside these.

use crate::model::{Scenario, ScenarioId, StepId, TrainingStep};

/// A narration voice the caregiver can pick in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceOption {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// A background-music choice; `url` is empty for silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MusicOption {
    pub id: &'static str,
    pub name: &'static str,
    pub url: &'static str,
}

pub const VOICE_OPTIONS: [VoiceOption; 4] = [
    VoiceOption {
        id: "Kore",
        name: "Gentle big sister",
        description: "Warm and patient",
    },
    VoiceOption {
        id: "Zephyr",
        name: "Sunny big brother",
        description: "Energetic and encouraging",
    },
    VoiceOption {
        id: "Puck",
        name: "Playful friend",
        description: "Close like a peer",
    },
    VoiceOption {
        id: "Charon",
        name: "Wise teacher",
        description: "Calm and clear",
    },
];

pub const MUSIC_OPTIONS: [MusicOption; 4] = [
    MusicOption {
        id: "none",
        name: "No background music",
        url: "",
    },
    MusicOption {
        id: "piano",
        name: "Soft piano",
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3",
    },
    MusicOption {
        id: "nature",
        name: "Quiet nature",
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-2.mp3",
    },
    MusicOption {
        id: "lullaby",
        name: "Cozy lullaby",
        url: "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-3.mp3",
    },
];

fn step(id: u32, instruction: &str, prompt: &str) -> TrainingStep {
    TrainingStep::new(StepId::new(id), id - 1, instruction, prompt, None)
        .expect("catalog step is valid")
}

fn scenario(
    id: &str,
    name: &str,
    icon: &str,
    description: &str,
    steps: Vec<TrainingStep>,
    next: &str,
) -> Scenario {
    Scenario::new(
        ScenarioId::new(id),
        name,
        icon,
        description,
        steps,
        ScenarioId::new(next),
    )
    .expect("catalog scenario is valid")
}

/// The five built-in scenarios, without cached images.
///
/// # Panics
///
/// Panics only if the catalog constants themselves are invalid.
#[must_use]
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        scenario(
            "supermarket_queue",
            "Supermarket queue",
            "🛒",
            "Practice waiting in line at the checkout",
            vec![
                step(1, "Stand behind the yellow line", "a child standing quietly behind a clear thick yellow line on the floor, back view, clear spatial markers"),
                step(2, "Keep a safe distance", "two children waiting in line with a 2-meter gap between them, simple floor footprints markings"),
                step(3, "Place your items on the counter", "a single hand placing a milk carton on a clean white checkout counter, high contrast"),
            ],
            "crossing_road",
        ),
        scenario(
            "brushing_teeth",
            "Brushing teeth",
            "🪥",
            "Build the daily morning cleaning habit",
            vec![
                step(1, "Squeeze the toothpaste", "a hand squeezing a pea-sized amount of blue toothpaste onto a toothbrush, close up"),
                step(2, "Brush your teeth", "a child with a happy expression brushing teeth, simplified bathroom mirror background"),
                step(3, "Rinse with the cup", "a child holding a simple light blue plastic cup to their mouth"),
            ],
            "garbage_sorting",
        ),
        scenario(
            "crossing_road",
            "Crossing the road",
            "🚦",
            "Traffic safety and signal recognition",
            vec![
                step(1, "Stop at the red light", "a large bright red traffic light symbol, high contrast, stop gesture"),
                step(2, "Go on green", "a large bright green traffic light symbol, walking person figure"),
                step(3, "Use the zebra crossing", "a child walking straight across thick white zebra crossing lines, blue sky"),
            ],
            "bus_riding",
        ),
        scenario(
            "garbage_sorting",
            "Garbage sorting",
            "♻️",
            "Recognize the bins and sort the recycling",
            vec![
                step(1, "Find the blue bin", "a large bright blue recycling bin, centered, white recycling logo"),
                step(2, "Flatten the cardboard box", "a flattened clean cardboard box on a white surface, clear edges"),
                step(3, "Drop the paper in", "a hand dropping a white paper into the blue bin opening"),
            ],
            "supermarket_queue",
        ),
        scenario(
            "bus_riding",
            "Riding the bus",
            "🚌",
            "Public-transport manners and safety",
            vec![
                step(1, "Tap your card to board", "a hand holding a yellow card to a simple black card reader machine"),
                step(2, "Hold the handrail", "a hand firmly holding a vertical yellow bus handle, focused view"),
                step(3, "Get off at your stop", "a bus door wide open, view of a safe grey sidewalk"),
            ],
            "brushing_teeth",
        ),
    ]
}

/// Looks up a built-in scenario by id.
#[must_use]
pub fn find_builtin(id: &ScenarioId) -> Option<Scenario> {
    builtin_scenarios().into_iter().find(|s| s.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_ids_are_unique_and_recommendations_resolve() {
        let scenarios = builtin_scenarios();
        let ids: HashSet<_> = scenarios.iter().map(|s| s.id().clone()).collect();
        assert_eq!(ids.len(), scenarios.len());

        for s in &scenarios {
            assert!(
                ids.contains(s.next_recommendation()),
                "{} recommends unknown scenario {}",
                s.id(),
                s.next_recommendation()
            );
        }
    }

    #[test]
    fn catalog_ships_without_cached_images() {
        for s in builtin_scenarios() {
            assert_eq!(s.missing_image_count(), s.steps().len());
        }
    }

    #[test]
    fn find_builtin_matches_by_id() {
        assert!(find_builtin(&ScenarioId::new("bus_riding")).is_some());
        assert!(find_builtin(&ScenarioId::new("unknown")).is_none());
    }
}
