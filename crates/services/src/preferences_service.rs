use std::collections::HashMap;
use std::sync::Arc;

use story_core::model::{PreferencesDraft, UserPreferences};
use storage::repository::{PreferencesRepository, StorageError};

const KEY_CHILD_NAME: &str = "child_name";
const KEY_INTEREST: &str = "interest";
const KEY_VOICE: &str = "voice";
const KEY_BACKGROUND_MUSIC: &str = "background_music";

/// Loads and saves per-child settings as flat key-value pairs.
pub struct PreferencesService {
    repository: Arc<dyn PreferencesRepository>,
}

impl PreferencesService {
    #[must_use]
    pub fn new(repository: Arc<dyn PreferencesRepository>) -> Self {
        Self { repository }
    }

    /// Current preferences merged with defaults. A failing or damaged
    /// store degrades to defaults rather than blocking a session.
    pub async fn load(&self) -> UserPreferences {
        let mut stored = match self.repository.load_all().await {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load preferences, using defaults");
                HashMap::new()
            }
        };
        PreferencesDraft {
            child_name: stored.remove(KEY_CHILD_NAME),
            interest: stored.remove(KEY_INTEREST),
            voice: stored.remove(KEY_VOICE),
            background_music: stored.remove(KEY_BACKGROUND_MUSIC),
        }
        .normalize()
    }

    /// Persist the given preferences.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store rejects the write.
    pub async fn save(&self, preferences: &UserPreferences) -> Result<(), StorageError> {
        let mut values = HashMap::new();
        values.insert(KEY_CHILD_NAME.to_string(), preferences.child_name().to_string());
        values.insert(KEY_INTEREST.to_string(), preferences.interest().to_string());
        values.insert(KEY_VOICE.to_string(), preferences.voice().to_string());
        values.insert(
            KEY_BACKGROUND_MUSIC.to_string(),
            preferences.background_music().to_string(),
        );
        self.repository.save_all(&values).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_core::model::{DEFAULT_CHILD_NAME, DEFAULT_VOICE};
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn load_merges_stored_values_with_defaults() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut partial = HashMap::new();
        partial.insert("interest".to_string(), "dinosaurs".to_string());
        repo.save_all(&partial).await.unwrap();

        let service = PreferencesService::new(repo);
        let prefs = service.load().await;
        assert_eq!(prefs.interest(), "dinosaurs");
        assert_eq!(prefs.child_name(), DEFAULT_CHILD_NAME);
        assert_eq!(prefs.voice(), DEFAULT_VOICE);
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let repo = Arc::new(InMemoryRepository::new());
        let service = PreferencesService::new(repo);

        let prefs = PreferencesDraft {
            child_name: Some("Mia".into()),
            interest: Some("trains".into()),
            voice: Some("Puck".into()),
            background_music: Some("piano".into()),
        }
        .normalize();
        service.save(&prefs).await.unwrap();

        assert_eq!(service.load().await, prefs);
    }
}
