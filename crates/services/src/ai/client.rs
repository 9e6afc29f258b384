use std::env;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use story_core::audio::AudioClip;
use story_core::model::{ImageRef, UserPreferences};

use super::{ImageGenerator, PlannedStep, ScenarioPlan, ScenarioPlanner, SpeechGenerator};
use crate::error::AiServiceError;

/// Shared style tail appended to every illustration prompt so a story's
/// images stay visually consistent.
const PROMPT_BASE_STYLE: &str = "flat vector illustration, minimalist, thick clean black outlines, \
    high contrast, pure white background, low saturation colors, pastel blue and green palette, \
    no clutter, no shadows, no gradients, educational visual support style";

const PROMPT_VISUAL_ANCHOR: &str = "one main subject centered, occupying 70% of frame, visual \
    anchor point focused, clear and distinct shapes, symbolic representation";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// BCP 47 tag sent with every synthesis request; all narration text and
/// scenario content ships in English.
const NARRATION_LANGUAGE: &str = "en-US";

#[derive(Clone, Debug)]
pub struct AiClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl AiClientConfig {
    /// Reads `STORY_AI_BASE_URL` and `STORY_AI_TIMEOUT_SECS`, falling back
    /// to the local backend and a 60 second request timeout.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url =
            env::var("STORY_AI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = env::var("STORY_AI_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS), Duration::from_secs);
        Self { base_url, timeout }
    }
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// REST client for the AI backend, implementing all three collaborator
/// traits. There is no retry; the planner's caller treats failure as
/// fatal and image failures degrade to placeholders upstream.
#[derive(Clone)]
pub struct AiApiClient {
    client: Client,
    config: AiClientConfig,
}

impl AiApiClient {
    #[must_use]
    pub fn new(config: AiClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AiClientConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Resolves a possibly relative media URL against the backend base.
    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            self.endpoint(url)
        } else {
            url.to_string()
        }
    }

    async fn post_envelope<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AiServiceError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .timeout(self.config.timeout)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AiServiceError::HttpStatus(response.status()));
        }

        let envelope: ApiEnvelope<T> = response.json().await?;
        if !envelope.success {
            return Err(AiServiceError::Backend(
                envelope.message.unwrap_or_else(|| "unknown failure".into()),
            ));
        }
        envelope.data.ok_or(AiServiceError::EmptyResponse)
    }
}

/// Full illustration prompt: a child descriptor personalized by interest,
/// the step fragment, then the shared style and anchor tails.
fn compose_image_prompt(prompt_suffix: &str, preferences: &UserPreferences) -> String {
    let descriptor = if preferences.interest().is_empty() {
        "A small child with a simple light-colored t-shirt".to_string()
    } else {
        format!("A small child with {}", preferences.interest())
    };
    format!(
        "{descriptor}, {prompt_suffix}, {PROMPT_BASE_STYLE}, {PROMPT_VISUAL_ANCHOR}, \
         single subject, clear focus, high contrast, clean white background."
    )
}

#[async_trait]
impl ScenarioPlanner for AiApiClient {
    async fn plan(
        &self,
        topic: &str,
        preferences: &UserPreferences,
    ) -> Result<ScenarioPlan, AiServiceError> {
        let body = PlanRequest {
            topic,
            preferences: PreferencesPayload {
                child_name: preferences.child_name(),
                interest: preferences.interest(),
                voice_name: preferences.voice(),
            },
        };
        let mut data: PlanData = self.post_envelope("/api/ai/plan-scenario", &body).await?;
        if data.steps.is_empty() {
            return Err(AiServiceError::EmptyResponse);
        }
        data.steps.sort_by_key(|s| s.step_order);
        Ok(ScenarioPlan {
            steps: data
                .steps
                .into_iter()
                .map(|s| PlannedStep {
                    instruction: s.instruction,
                    image_prompt: s.image_prompt.unwrap_or_default(),
                })
                .collect(),
        })
    }
}

#[async_trait]
impl ImageGenerator for AiApiClient {
    async fn generate(
        &self,
        prompt_suffix: &str,
        preferences: &UserPreferences,
    ) -> Result<ImageRef, AiServiceError> {
        let body = ImageRequest {
            prompt: compose_image_prompt(prompt_suffix, preferences),
        };
        let data: ImageData = self.post_envelope("/api/ai/generate-image", &body).await?;
        Ok(ImageRef::new(self.absolute_url(&data.image_url)))
    }
}

#[async_trait]
impl SpeechGenerator for AiApiClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioClip, AiServiceError> {
        let body = TtsRequest {
            text,
            voice_name: voice,
            language: NARRATION_LANGUAGE,
        };
        let data: TtsData = self.post_envelope("/api/ai/generate-tts", &body).await?;

        // the backend answers with inline base64 PCM or a URL to fetch
        if let Some(encoded) = data.audio_data {
            let bytes = BASE64.decode(encoded)?;
            return Ok(AudioClip::from_pcm16_le(&bytes)?);
        }
        if let Some(url) = data.audio_url {
            let response = self
                .client
                .get(self.absolute_url(&url))
                .timeout(self.config.timeout)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(AiServiceError::HttpStatus(response.status()));
            }
            let bytes = response.bytes().await?;
            return Ok(AudioClip::from_pcm16_le(&bytes)?);
        }
        Err(AiServiceError::EmptyResponse)
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct PlanRequest<'a> {
    topic: &'a str,
    preferences: PreferencesPayload<'a>,
}

#[derive(Debug, Serialize)]
struct PreferencesPayload<'a> {
    child_name: &'a str,
    interest: &'a str,
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct PlanData {
    steps: Vec<PlanStep>,
}

#[derive(Debug, Deserialize)]
struct PlanStep {
    step_order: u32,
    instruction: String,
    image_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    image_url: String,
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice_name: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct TtsData {
    audio_url: Option<String>,
    audio_data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_core::model::PreferencesDraft;

    #[test]
    fn image_prompt_carries_interest_and_style_tail() {
        let prefs = PreferencesDraft {
            interest: Some("a cat on the shoulder".into()),
            ..PreferencesDraft::new()
        }
        .normalize();
        let prompt = compose_image_prompt("a child waiting in line", &prefs);
        assert!(prompt.starts_with("A small child with a cat on the shoulder, a child waiting"));
        assert!(prompt.contains("flat vector illustration"));
        assert!(prompt.contains("visual anchor point focused"));
        assert!(prompt.ends_with("clean white background."));
    }

    #[test]
    fn image_prompt_defaults_descriptor_without_interest() {
        let prompt = compose_image_prompt("x", &UserPreferences::default());
        assert!(prompt.starts_with("A small child with a simple light-colored t-shirt,"));
    }

    #[test]
    fn plan_envelope_parses_the_backend_wire_shape() {
        let raw = r#"{
            "success": true,
            "data": {
                "steps": [
                    {"step_order": 2, "instruction": "Pay at the counter", "image_prompt": "paying"},
                    {"step_order": 1, "instruction": "Pick a snack", "image_prompt": null}
                ]
            },
            "message": null
        }"#;
        let envelope: ApiEnvelope<PlanData> = serde_json::from_str(raw).unwrap();
        assert!(envelope.success);
        let data = envelope.data.unwrap();
        assert_eq!(data.steps.len(), 2);
        assert_eq!(data.steps[0].step_order, 2);
        assert!(data.steps[1].image_prompt.is_none());
    }

    #[test]
    fn failure_envelope_keeps_the_backend_message() {
        let raw = r#"{"success": false, "data": null, "message": "model overloaded"}"#;
        let envelope: ApiEnvelope<PlanData> = serde_json::from_str(raw).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("model overloaded"));
    }

    #[test]
    fn tts_request_speaks_the_language_of_the_content() {
        let body = TtsRequest {
            text: "Wait for your turn",
            voice_name: "Kore",
            language: NARRATION_LANGUAGE,
        };
        let raw = serde_json::to_value(&body).unwrap();
        assert_eq!(raw["language"], "en-US");
        assert_eq!(raw["voice_name"], "Kore");
    }

    #[test]
    fn relative_media_urls_resolve_against_base() {
        let client = AiApiClient::new(AiClientConfig {
            base_url: "http://backend:9000/".into(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(
            client.absolute_url("/files/a.png"),
            "http://backend:9000/files/a.png"
        );
        assert_eq!(
            client.absolute_url("https://cdn.example/a.png"),
            "https://cdn.example/a.png"
        );
    }
}
