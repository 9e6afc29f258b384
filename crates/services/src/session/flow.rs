use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::sync::watch;

use story_core::Clock;
use story_core::model::{
    ImageRef, Scenario, ScenarioId, StepId, TrainingRecord, TrainingStep, UserPreferences,
};
use story_core::scoring::feedback_message;
use storage::repository::{ScenarioRepository, StorageError, TrainingHistoryRepository};

use super::guard::{FlowEpochs, FlowGuard};
use super::service::{AdvanceOutcome, TrainingSession};
use crate::ai::{ImageGenerator, ScenarioPlanner};
use crate::error::SessionError;
use crate::narration::Narrator;
use crate::preferences_service::PreferencesService;

/// Dynamic stories funnel the child back into the fixed catalog.
const DYNAMIC_NEXT_RECOMMENDATION: &str = "supermarket_queue";

//
// ─── FLOW TYPES ────────────────────────────────────────────────────────────────
//

/// Observable phase of the session flow. `Generating` carries overall
/// progress, advanced by `100 / images_needed` per finished image in
/// whatever order they land.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Idle,
    Planning,
    Generating { percent: f32 },
    Active,
}

/// What to run: a catalog scenario used verbatim, or a free-text topic
/// that goes through the planner first.
#[derive(Debug)]
pub enum SessionRequest {
    Catalog(Scenario),
    Dynamic { topic: String, icon: String },
}

/// Outcome of a start attempt.
#[derive(Debug)]
pub enum SessionStart {
    /// The session reached ACTIVE.
    Ready(TrainingSession),
    /// Every step already has a cached image; the caller must choose
    /// between reuse and regeneration before the session can activate.
    CachedImages(PendingCacheChoice),
    /// The same identity is already in flight; nothing was started.
    AlreadyRunning,
    /// A newer flow took over while this one was in progress.
    Superseded,
}

/// A flow parked at the cache choice point. Consumed by
/// [`SessionFlowService::use_cached_images`] or
/// [`SessionFlowService::regenerate`].
#[derive(Debug)]
pub struct PendingCacheChoice {
    scenario: Scenario,
    preferences: UserPreferences,
    guard: FlowGuard,
}

impl PendingCacheChoice {
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }
}

/// Outcome of an advance attempt.
#[derive(Debug)]
pub enum AdvanceResult {
    /// The current step is not completed; ask for an assistance level.
    NeedsAssistanceLevel,
    /// Moved to the step at `index`; it was narrated.
    Advanced { index: usize },
    /// The session finished; its record was derived and logged.
    Finished(FinishedSession),
}

/// Final outcome handed back when a session completes.
#[derive(Debug)]
pub struct FinishedSession {
    pub record: TrainingRecord,
    pub feedback: &'static str,
    pub next_recommendation: ScenarioId,
}

/// How freshly generated images reach storage.
enum PersistMode {
    /// Per-image write-through for an already stored scenario, plus a
    /// first-time insert for a newly planned dynamic one.
    WriteThrough,
    /// Replace the scenario's stored steps wholesale (regeneration).
    Replace,
}

//
// ─── FLOW SERVICE ──────────────────────────────────────────────────────────────
//

/// Orchestrates the PLANNING → GENERATING → ACTIVE session lifecycle.
///
/// One flow at a time: starting a new one (or cancelling) bumps the flow
/// epoch, and every resumption after an await re-checks its guard so a
/// superseded flow can never touch the new session's state.
pub struct SessionFlowService {
    clock: Clock,
    planner: Arc<dyn ScenarioPlanner>,
    images: Arc<dyn ImageGenerator>,
    narrator: Arc<Narrator>,
    scenarios: Arc<dyn ScenarioRepository>,
    history: Arc<dyn TrainingHistoryRepository>,
    preferences: Arc<PreferencesService>,
    epochs: FlowEpochs,
    running: Mutex<Option<ScenarioId>>,
    phase: watch::Sender<SessionPhase>,
}

fn lock_running(
    running: &Mutex<Option<ScenarioId>>,
) -> MutexGuard<'_, Option<ScenarioId>> {
    running.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionFlowService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Clock,
        planner: Arc<dyn ScenarioPlanner>,
        images: Arc<dyn ImageGenerator>,
        narrator: Arc<Narrator>,
        scenarios: Arc<dyn ScenarioRepository>,
        history: Arc<dyn TrainingHistoryRepository>,
        preferences: Arc<PreferencesService>,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            clock,
            planner,
            images,
            narrator,
            scenarios,
            history,
            preferences,
            epochs: FlowEpochs::new(),
            running: Mutex::new(None),
            phase,
        }
    }

    /// Subscribe to phase changes. The receiver always sees the latest
    /// phase; intermediate progress values may be skipped under load.
    #[must_use]
    pub fn phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Start a session.
    ///
    /// A start for the identity already in flight is a no-op
    /// (`AlreadyRunning`); a start for a different identity abandons the
    /// prior flow, whose late arrivals are discarded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Planning` if a dynamic topic cannot be
    /// planned; nothing is recorded in that case.
    pub async fn start(&self, request: SessionRequest) -> Result<SessionStart, SessionError> {
        let identity = match &request {
            SessionRequest::Catalog(scenario) => scenario.id().clone(),
            SessionRequest::Dynamic { .. } => ScenarioId::dynamic(),
        };
        {
            let mut running = lock_running(&self.running);
            if running.as_ref() == Some(&identity) {
                tracing::debug!(scenario = %identity, "duplicate start ignored");
                return Ok(SessionStart::AlreadyRunning);
            }
            *running = Some(identity.clone());
        }

        let guard = self.epochs.begin();
        self.set_phase(&guard, SessionPhase::Planning);
        let preferences = self.preferences.load().await;

        let scenario = match request {
            SessionRequest::Catalog(scenario) => scenario,
            SessionRequest::Dynamic { topic, icon } => {
                match self.plan_dynamic(identity, &topic, icon, &preferences).await {
                    Ok(scenario) => scenario,
                    Err(err) => {
                        self.abandon(&guard);
                        return Err(err);
                    }
                }
            }
        };
        if !guard.is_current() {
            return Ok(SessionStart::Superseded);
        }

        if scenario.all_images_cached() {
            // no generator calls; ACTIVE waits on the reuse choice
            return Ok(SessionStart::CachedImages(PendingCacheChoice {
                scenario,
                preferences,
                guard,
            }));
        }

        let Some(scenario) = self
            .run_generation(scenario, &preferences, &guard, PersistMode::WriteThrough)
            .await?
        else {
            return Ok(SessionStart::Superseded);
        };
        Ok(SessionStart::Ready(self.activate(scenario, &preferences, guard)))
    }

    /// Reuse branch of the cache choice: keep every cached image.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` only for domain validation failures; storage
    /// trouble is logged and the session proceeds.
    pub async fn use_cached_images(
        &self,
        pending: PendingCacheChoice,
    ) -> Result<SessionStart, SessionError> {
        let PendingCacheChoice {
            scenario,
            preferences,
            guard,
        } = pending;
        if !guard.is_current() {
            return Ok(SessionStart::Superseded);
        }
        if scenario.id().is_dynamic() {
            match self.scenarios.create_scenario(&scenario).await {
                Ok(()) | Err(StorageError::Conflict) => {}
                Err(err) => {
                    tracing::warn!(error = %err, scenario = %scenario.id(), "failed to persist scenario");
                }
            }
        }
        Ok(SessionStart::Ready(self.activate(scenario, &preferences, guard)))
    }

    /// Regenerate branch of the cache choice: discard the cache, re-plan,
    /// and regenerate every image.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Planning` if re-planning fails; the flow is
    /// abandoned and nothing is recorded.
    pub async fn regenerate(
        &self,
        pending: PendingCacheChoice,
    ) -> Result<SessionStart, SessionError> {
        let PendingCacheChoice {
            scenario,
            preferences,
            guard,
        } = pending;
        if !guard.is_current() {
            return Ok(SessionStart::Superseded);
        }
        self.regenerate_flow(
            scenario.id().clone(),
            scenario.name().to_owned(),
            scenario.icon().to_owned(),
            scenario.next_recommendation().clone(),
            preferences,
            guard,
        )
        .await
    }

    /// Regeneration requested mid-session: abandons the active session and
    /// rebuilds its scenario from a fresh plan.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Planning` if re-planning fails.
    pub async fn regenerate_active(
        &self,
        session: &TrainingSession,
    ) -> Result<SessionStart, SessionError> {
        let guard = self.epochs.begin();
        self.narrator.stop();
        *lock_running(&self.running) = Some(session.scenario_id().clone());
        let preferences = self.preferences.load().await;
        self.regenerate_flow(
            session.scenario_id().clone(),
            session.scenario_name().to_owned(),
            session.icon().to_owned(),
            session.next_recommendation().clone(),
            preferences,
            guard,
        )
        .await
    }

    /// Advance past the current step, narrating the new one; advancing
    /// past the last step finalizes the session into a training record.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Record` if the outcome vector cannot be
    /// turned into a record.
    pub async fn advance(
        &self,
        session: &mut TrainingSession,
    ) -> Result<AdvanceResult, SessionError> {
        match session.try_advance() {
            AdvanceOutcome::NeedsAssistanceLevel => Ok(AdvanceResult::NeedsAssistanceLevel),
            AdvanceOutcome::Advanced(index) => {
                self.narrator.narrate(
                    session.current_step().instruction().to_owned(),
                    session.voice().to_owned(),
                    session.guard().clone(),
                );
                Ok(AdvanceResult::Advanced { index })
            }
            AdvanceOutcome::Finished => self.finish(session).await.map(AdvanceResult::Finished),
        }
    }

    /// Abort whatever is happening: in-flight arrivals are discarded,
    /// narration stops, no record is written.
    pub fn cancel(&self) {
        self.epochs.invalidate();
        self.narrator.stop();
        *lock_running(&self.running) = None;
        let _ = self.phase.send_replace(SessionPhase::Idle);
    }

    /// Cancel and release the audio output for good.
    pub fn shutdown(&self) {
        self.cancel();
        self.narrator.shutdown();
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn set_phase(&self, guard: &FlowGuard, phase: SessionPhase) {
        if guard.is_current() {
            let _ = self.phase.send_replace(phase);
        }
    }

    /// Release this flow's claim, but only if it still owns the service.
    fn abandon(&self, guard: &FlowGuard) {
        if guard.is_current() {
            *lock_running(&self.running) = None;
            let _ = self.phase.send_replace(SessionPhase::Idle);
        }
    }

    fn activate(
        &self,
        scenario: Scenario,
        preferences: &UserPreferences,
        guard: FlowGuard,
    ) -> TrainingSession {
        let session = TrainingSession::new(
            scenario,
            preferences.voice().to_owned(),
            self.clock.now(),
            guard.clone(),
        );
        self.set_phase(&guard, SessionPhase::Active);
        self.narrator.narrate(
            session.current_step().instruction().to_owned(),
            session.voice().to_owned(),
            guard,
        );
        session
    }

    async fn plan_dynamic(
        &self,
        id: ScenarioId,
        topic: &str,
        icon: String,
        preferences: &UserPreferences,
    ) -> Result<Scenario, SessionError> {
        let plan = self
            .planner
            .plan(topic, preferences)
            .await
            .map_err(SessionError::Planning)?;
        Ok(Scenario::from_planned(
            id,
            topic,
            icon,
            plan.steps
                .into_iter()
                .map(|s| (s.instruction, s.image_prompt, None))
                .collect(),
            ScenarioId::new(DYNAMIC_NEXT_RECOMMENDATION),
        )?)
    }

    async fn regenerate_flow(
        &self,
        id: ScenarioId,
        name: String,
        icon: String,
        next_recommendation: ScenarioId,
        preferences: UserPreferences,
        guard: FlowGuard,
    ) -> Result<SessionStart, SessionError> {
        self.set_phase(&guard, SessionPhase::Planning);

        // the stored steps are discarded only once a fresh plan exists;
        // replace_steps clears them in the same transaction, so a failed
        // replan leaves the old scenario intact and loadable
        let plan = match self.planner.plan(&name, &preferences).await {
            Ok(plan) => plan,
            Err(err) => {
                self.abandon(&guard);
                return Err(SessionError::Planning(err));
            }
        };
        if !guard.is_current() {
            return Ok(SessionStart::Superseded);
        }

        let scenario = Scenario::from_planned(
            id,
            name,
            icon,
            plan.steps
                .into_iter()
                .map(|s| (s.instruction, s.image_prompt, None))
                .collect(),
            next_recommendation,
        )?;

        let Some(scenario) = self
            .run_generation(scenario, &preferences, &guard, PersistMode::Replace)
            .await?
        else {
            return Ok(SessionStart::Superseded);
        };
        Ok(SessionStart::Ready(self.activate(scenario, &preferences, guard)))
    }

    /// Concurrent, unordered fan-out over the steps that lack an image.
    /// Failures degrade to labeled placeholders; only real generator
    /// output is written back to storage. Returns `None` when a newer
    /// flow took over mid-generation.
    async fn run_generation(
        &self,
        scenario: Scenario,
        preferences: &UserPreferences,
        guard: &FlowGuard,
        mode: PersistMode,
    ) -> Result<Option<Scenario>, SessionError> {
        let id = scenario.id().clone();
        let name = scenario.name().to_owned();
        let icon = scenario.icon().to_owned();
        let description = scenario.description().to_owned();
        let next_recommendation = scenario.next_recommendation().clone();
        let mut steps = scenario.into_steps();

        let targets: Vec<(usize, StepId, String)> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| !step.has_image())
            .map(|(index, step)| (index, step.id(), step.image_prompt_suffix().to_owned()))
            .collect();
        let total = targets.len();
        self.set_phase(guard, SessionPhase::Generating { percent: 0.0 });

        let done = AtomicUsize::new(0);
        let this = self;
        let results = join_all(targets.into_iter().map(|(index, step_id, prompt)| {
            let done = &done;
            async move {
                let generated = this.images.generate(&prompt, preferences).await;
                let (image, fresh) = match generated {
                    Ok(image) => (image, true),
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            step = %step_id,
                            "image generation failed, substituting placeholder"
                        );
                        (ImageRef::placeholder(&prompt), false)
                    }
                };
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                #[allow(clippy::cast_precision_loss)]
                let percent = (finished as f32) * 100.0 / (total as f32);
                this.set_phase(guard, SessionPhase::Generating { percent });
                (index, step_id, image, fresh)
            }
        }))
        .await;

        if !guard.is_current() {
            return Ok(None);
        }

        let mut fresh_images: Vec<(StepId, ImageRef)> = Vec::new();
        for (index, step_id, image, fresh) in results {
            if fresh {
                fresh_images.push((step_id, image.clone()));
            }
            steps[index].set_image(image);
        }

        let scenario = Scenario::new(id, name, icon, description, steps, next_recommendation)?;
        self.persist_generated(&scenario, &fresh_images, mode).await;
        Ok(Some(scenario))
    }

    /// Best-effort storage write-back; the session runs fine without it.
    async fn persist_generated(
        &self,
        scenario: &Scenario,
        fresh_images: &[(StepId, ImageRef)],
        mode: PersistMode,
    ) {
        match mode {
            PersistMode::WriteThrough if scenario.id().is_dynamic() => {
                let stored = without_placeholders(scenario);
                if let Err(err) = self.scenarios.create_scenario(&stored).await {
                    tracing::warn!(error = %err, scenario = %scenario.id(), "failed to persist scenario");
                }
            }
            PersistMode::WriteThrough => {
                for (step_id, image) in fresh_images {
                    if let Err(err) = self
                        .scenarios
                        .update_step_image(scenario.id(), *step_id, image)
                        .await
                    {
                        tracing::warn!(
                            error = %err,
                            scenario = %scenario.id(),
                            step = %step_id,
                            "failed to cache generated image"
                        );
                    }
                }
            }
            PersistMode::Replace => {
                let stored = without_placeholders(scenario);
                let result = match self.scenarios.replace_steps(stored.id(), stored.steps()).await {
                    Err(StorageError::NotFound) => self.scenarios.create_scenario(&stored).await,
                    other => other,
                };
                if let Err(err) = result {
                    tracing::warn!(error = %err, scenario = %scenario.id(), "failed to store regenerated steps");
                }
            }
        }
    }

    async fn finish(&self, session: &TrainingSession) -> Result<FinishedSession, SessionError> {
        let record = TrainingRecord::from_step_levels(
            self.clock.now(),
            session.scenario_id().clone(),
            session.scenario_name(),
            session.step_levels(),
            u32::try_from(session.steps().len()).unwrap_or(u32::MAX),
        )?;

        // a cancelled (or superseded) session finishes in memory only;
        // nothing of it reaches the history log
        if session.guard().is_current() {
            if let Err(err) = self.history.append_record(&record).await {
                tracing::warn!(error = %err, "failed to append training record");
            }
            self.narrator.stop();
            *lock_running(&self.running) = None;
            let _ = self.phase.send_replace(SessionPhase::Idle);
            self.epochs.invalidate();
        }
        let feedback = feedback_message(session.scenario_id(), record.overall_level());
        Ok(FinishedSession {
            record,
            feedback,
            next_recommendation: session.next_recommendation().clone(),
        })
    }
}

/// Placeholders are a session-local crutch; storage only ever sees real
/// generator output.
fn without_placeholders(scenario: &Scenario) -> Scenario {
    let mut steps: Vec<TrainingStep> = scenario.steps().to_vec();
    for step in &mut steps {
        if step.image_ref().is_some_and(ImageRef::is_placeholder) {
            step.clear_image();
        }
    }
    Scenario::new(
        scenario.id().clone(),
        scenario.name(),
        scenario.icon(),
        scenario.description(),
        steps,
        scenario.next_recommendation().clone(),
    )
    .unwrap_or_else(|_| scenario.clone())
}
