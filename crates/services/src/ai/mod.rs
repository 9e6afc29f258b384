//! AI collaborator contracts: scenario planning, illustration, speech.
//!
//! The session flow depends on these traits only; [`AiApiClient`] is the
//! production implementation backed by the companion REST service.

mod client;

pub use client::{AiApiClient, AiClientConfig};

use async_trait::async_trait;

use story_core::audio::AudioClip;
use story_core::model::{ImageRef, UserPreferences};

use crate::error::AiServiceError;

/// One planned step of an AI-built social story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    /// Instruction text shown (and narrated) to the child.
    pub instruction: String,
    /// English prompt fragment describing the step's core action.
    pub image_prompt: String,
}

/// Complete planner output for one topic. A plan is all-or-nothing;
/// there is no partial result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioPlan {
    pub steps: Vec<PlannedStep>,
}

/// Plans an ordered social story for a free-text topic.
#[async_trait]
pub trait ScenarioPlanner: Send + Sync {
    /// # Errors
    ///
    /// Returns `AiServiceError` if the plan cannot be produced; planning
    /// failures abort the session that requested them.
    async fn plan(
        &self,
        topic: &str,
        preferences: &UserPreferences,
    ) -> Result<ScenarioPlan, AiServiceError>;
}

/// Produces one illustration for a step prompt fragment.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `AiServiceError` on generation failure; the flow substitutes
    /// a placeholder and continues.
    async fn generate(
        &self,
        prompt_suffix: &str,
        preferences: &UserPreferences,
    ) -> Result<ImageRef, AiServiceError>;
}

/// Synthesizes narration audio for step instructions.
#[async_trait]
pub trait SpeechGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `AiServiceError` on synthesis failure; the narrator logs
    /// and swallows it.
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioClip, AiServiceError>;
}
