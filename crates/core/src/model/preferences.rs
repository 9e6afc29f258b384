use serde::{Deserialize, Serialize};

/// Default narration voice (four ship in the catalog; this is the gentle
/// one).
pub const DEFAULT_VOICE: &str = "Kore";

/// Default background-music selection.
pub const DEFAULT_MUSIC: &str = "none";

/// Default name used to address the child before one is configured.
pub const DEFAULT_CHILD_NAME: &str = "Buddy";

/// Persisted per-child settings, merged with defaults on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    child_name: String,
    interest: String,
    voice: String,
    background_music: String,
}

/// Raw settings as read from the store or a settings form; unknown or
/// blank values fall back to defaults silently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesDraft {
    pub child_name: Option<String>,
    pub interest: Option<String>,
    pub voice: Option<String>,
    pub background_music: Option<String>,
}

impl PreferencesDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes the draft into usable preferences. Trims every field;
    /// missing or blank values take the defaults. Never fails — a damaged
    /// store degrades to defaults rather than blocking a session.
    #[must_use]
    pub fn normalize(self) -> UserPreferences {
        UserPreferences {
            child_name: normalize_or(self.child_name, DEFAULT_CHILD_NAME),
            interest: normalize_or(self.interest, ""),
            voice: normalize_or(self.voice, DEFAULT_VOICE),
            background_music: normalize_or(self.background_music, DEFAULT_MUSIC),
        }
    }
}

impl UserPreferences {
    #[must_use]
    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    /// Free-text interest used to personalize image prompts (e.g. "cars").
    #[must_use]
    pub fn interest(&self) -> &str {
        &self.interest
    }

    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    #[must_use]
    pub fn background_music(&self) -> &str {
        &self.background_music
    }
}

impl Default for UserPreferences {
    fn default() -> Self {
        PreferencesDraft::new().normalize()
    }
}

fn normalize_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
