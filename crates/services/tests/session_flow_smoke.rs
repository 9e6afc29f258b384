use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use services::ai::{ImageGenerator, PlannedStep, ScenarioPlan, ScenarioPlanner, SpeechGenerator};
use services::error::{AiServiceError, SessionError};
use services::narration::{Narrator, SilentOutput};
use services::preferences_service::PreferencesService;
use services::session::{
    AdvanceResult, SessionFlowService, SessionPhase, SessionRequest, SessionStart,
};
use story_core::audio::AudioClip;
use story_core::model::{
    ImageRef, Scenario, ScenarioId, StepId, TrainingStep, UserPreferences,
};
use story_core::scoring::AssistanceLevel;
use story_core::time::fixed_clock;
use storage::repository::{
    InMemoryRepository, ScenarioRepository, TrainingHistoryRepository,
};

const SLOW_GENERATION: Duration = Duration::from_millis(150);

//
// ─── FAKES ─────────────────────────────────────────────────────────────────────
//

struct FakePlanner {
    fail: bool,
    calls: AtomicUsize,
}

impl FakePlanner {
    fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScenarioPlanner for FakePlanner {
    async fn plan(
        &self,
        topic: &str,
        _preferences: &UserPreferences,
    ) -> Result<ScenarioPlan, AiServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AiServiceError::Backend(format!("cannot plan {topic}")));
        }
        Ok(ScenarioPlan {
            steps: (1..=3)
                .map(|i| PlannedStep {
                    instruction: format!("{topic} step {i}"),
                    image_prompt: format!("planned-{i}"),
                })
                .collect(),
        })
    }
}

struct FakeImages {
    calls: AtomicUsize,
    fail_all: bool,
    slow_prefix: Option<&'static str>,
}

impl FakeImages {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: false,
            slow_prefix: None,
        }
    }

    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: true,
            slow_prefix: None,
        }
    }

    fn slow_for(prefix: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: false,
            slow_prefix: Some(prefix),
        }
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(
        &self,
        prompt_suffix: &str,
        _preferences: &UserPreferences,
    ) -> Result<ImageRef, AiServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(prefix) = self.slow_prefix {
            if prompt_suffix.starts_with(prefix) {
                tokio::time::sleep(SLOW_GENERATION).await;
            }
        }
        if self.fail_all {
            return Err(AiServiceError::Backend("generator down".into()));
        }
        Ok(ImageRef::new(format!("https://img.test/{prompt_suffix}.png")))
    }
}

struct FakeSpeech;

#[async_trait]
impl SpeechGenerator for FakeSpeech {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<AudioClip, AiServiceError> {
        Ok(AudioClip::from_pcm16_le(&[1, 0]).unwrap())
    }
}

//
// ─── HARNESS ───────────────────────────────────────────────────────────────────
//

struct Harness {
    flow: Arc<SessionFlowService>,
    repo: InMemoryRepository,
    planner: Arc<FakePlanner>,
    images: Arc<FakeImages>,
}

fn harness(planner: FakePlanner, images: FakeImages) -> Harness {
    let repo = InMemoryRepository::new();
    let planner = Arc::new(planner);
    let images = Arc::new(images);
    let narrator = Arc::new(Narrator::new(Arc::new(FakeSpeech), Arc::new(SilentOutput)));
    let preferences = Arc::new(PreferencesService::new(Arc::new(repo.clone())));
    let flow = Arc::new(SessionFlowService::new(
        fixed_clock(),
        Arc::clone(&planner) as Arc<dyn ScenarioPlanner>,
        Arc::clone(&images) as Arc<dyn ImageGenerator>,
        narrator,
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        preferences,
    ));
    Harness {
        flow,
        repo,
        planner,
        images,
    }
}

fn scenario_with_cache(id: &str, cached: &[bool]) -> Scenario {
    let steps = cached
        .iter()
        .enumerate()
        .map(|(i, has_image)| {
            let index = u32::try_from(i).unwrap();
            let image = has_image.then(|| ImageRef::new(format!("https://cached.test/{id}/{i}.png")));
            TrainingStep::new(
                StepId::new(index + 1),
                index,
                format!("{id} step {}", index + 1),
                format!("{id}-prompt-{}", index + 1),
                image,
            )
            .unwrap()
        })
        .collect();
    Scenario::new(
        ScenarioId::new(id),
        format!("Scenario {id}"),
        "X",
        "",
        steps,
        ScenarioId::new("crossing_road"),
    )
    .unwrap()
}

fn ready(start: SessionStart) -> services::session::TrainingSession {
    match start {
        SessionStart::Ready(session) => session,
        SessionStart::CachedImages(_) => panic!("unexpected cache choice"),
        SessionStart::AlreadyRunning => panic!("unexpected AlreadyRunning"),
        SessionStart::Superseded => panic!("unexpected Superseded"),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn catalog_session_runs_to_a_recorded_finish() {
    let h = harness(FakePlanner::ok(), FakeImages::ok());
    let scenario = scenario_with_cache("supermarket_queue", &[false, false]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let mut session = ready(h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap());
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Active);
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 0);
    assert!(session.steps().iter().all(TrainingStep::has_image));

    // generated images were written through to the stored scenario
    let stored = h
        .repo
        .get_scenario(&ScenarioId::new("supermarket_queue"))
        .await
        .unwrap()
        .unwrap();
    assert!(stored.all_images_cached());

    // an incomplete step blocks advancement until a level is chosen
    assert!(matches!(
        h.flow.advance(&mut session).await.unwrap(),
        AdvanceResult::NeedsAssistanceLevel
    ));
    session.complete_current(AssistanceLevel::Partial).unwrap();
    assert!(matches!(
        h.flow.advance(&mut session).await.unwrap(),
        AdvanceResult::Advanced { index: 1 }
    ));
    session.complete_current(AssistanceLevel::Independent).unwrap();

    let finished = match h.flow.advance(&mut session).await.unwrap() {
        AdvanceResult::Finished(finished) => finished,
        _ => panic!("expected Finished"),
    };
    assert_eq!(finished.record.overall_level(), AssistanceLevel::Partial);
    assert_eq!(finished.record.completed_steps(), 2);
    assert_eq!(finished.next_recommendation, ScenarioId::new("crossing_road"));
    assert!(!finished.feedback.is_empty());
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Idle);

    let records = h.repo.recent_records(10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].scenario_name(), "Scenario supermarket_queue");
}

#[tokio::test]
async fn fully_cached_scenario_asks_before_calling_the_generator() {
    let h = harness(FakePlanner::ok(), FakeImages::ok());
    let scenario = scenario_with_cache("brushing_teeth", &[true, true, true]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let pending = match h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap() {
        SessionStart::CachedImages(pending) => pending,
        _ => panic!("expected the cache choice point"),
    };
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_ne!(*h.flow.phase().borrow(), SessionPhase::Active);
    assert_eq!(pending.scenario().missing_image_count(), 0);

    let session = ready(h.flow.use_cached_images(pending).await.unwrap());
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Active);
    assert_eq!(
        session.current_step().image_ref().map(ImageRef::as_str),
        Some("https://cached.test/brushing_teeth/0.png")
    );
}

#[tokio::test]
async fn partial_cache_generates_only_the_missing_images() {
    let h = harness(FakePlanner::ok(), FakeImages::ok());
    let scenario = scenario_with_cache("crossing_road", &[true, false, true, false]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let session = ready(h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap());
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 2);

    // cached references were left untouched
    assert_eq!(
        session.steps()[0].image_ref().map(ImageRef::as_str),
        Some("https://cached.test/crossing_road/0.png")
    );
    assert_eq!(
        session.steps()[1].image_ref().map(ImageRef::as_str),
        Some("https://img.test/crossing_road-prompt-2.png")
    );
}

#[tokio::test]
async fn image_failures_degrade_to_placeholders_and_stay_out_of_storage() {
    let h = harness(FakePlanner::ok(), FakeImages::failing());
    let scenario = scenario_with_cache("garbage_sorting", &[false, false]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let session = ready(h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap());
    assert!(
        session
            .steps()
            .iter()
            .all(|s| s.image_ref().is_some_and(ImageRef::is_placeholder))
    );
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Active);

    // placeholders are session-local; the store keeps the steps un-imaged
    let stored = h
        .repo
        .get_scenario(&ScenarioId::new("garbage_sorting"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.missing_image_count(), 2);
}

#[tokio::test]
async fn planning_failure_aborts_the_session_without_a_record() {
    let h = harness(FakePlanner::failing(), FakeImages::ok());

    let err = h
        .flow
        .start(SessionRequest::Dynamic {
            topic: "visiting the dentist".into(),
            icon: "sparkle".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Planning(_)));
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 0);
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Idle);
    assert!(h.repo.recent_records(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn dynamic_session_is_planned_generated_and_persisted() {
    let h = harness(FakePlanner::ok(), FakeImages::ok());

    let session = ready(
        h.flow
            .start(SessionRequest::Dynamic {
                topic: "visiting the dentist".into(),
                icon: "sparkle".into(),
            })
            .await
            .unwrap(),
    );
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 3);
    assert!(session.scenario_id().is_dynamic());
    assert_eq!(session.scenario_name(), "visiting the dentist");

    let stored = h
        .repo
        .get_scenario(session.scenario_id())
        .await
        .unwrap()
        .expect("dynamic scenario persisted after generation");
    assert_eq!(stored.steps().len(), 3);
    assert!(stored.all_images_cached());
}

#[tokio::test]
async fn a_faster_start_supersedes_a_slow_one() {
    let h = harness(FakePlanner::ok(), FakeImages::slow_for("slow_scenario"));
    let slow = scenario_with_cache("slow_scenario", &[false, false]);
    let fast = scenario_with_cache("fast_scenario", &[false]);
    h.repo.create_scenario(&slow).await.unwrap();
    h.repo.create_scenario(&fast).await.unwrap();

    let flow = Arc::clone(&h.flow);
    let slow_start =
        tokio::spawn(async move { flow.start(SessionRequest::Catalog(slow)).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    let session = ready(h.flow.start(SessionRequest::Catalog(fast)).await.unwrap());
    assert_eq!(session.scenario_id(), &ScenarioId::new("fast_scenario"));
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Active);

    assert!(matches!(
        slow_start.await.unwrap().unwrap(),
        SessionStart::Superseded
    ));

    // the abandoned flow's images never reached storage or the new session
    let stored = h
        .repo
        .get_scenario(&ScenarioId::new("slow_scenario"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.missing_image_count(), 2);
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Active);
}

#[tokio::test]
async fn starting_the_same_scenario_twice_is_a_no_op() {
    let h = harness(FakePlanner::ok(), FakeImages::slow_for("slow_scenario"));
    let scenario = scenario_with_cache("slow_scenario", &[false]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let flow = Arc::clone(&h.flow);
    let first = {
        let scenario = scenario.clone();
        tokio::spawn(async move { flow.start(SessionRequest::Catalog(scenario)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(matches!(
        h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap(),
        SessionStart::AlreadyRunning
    ));

    // the original flow was not disturbed by the duplicate
    ready(first.await.unwrap().unwrap());
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_discards_the_in_flight_session_without_a_record() {
    let h = harness(FakePlanner::ok(), FakeImages::slow_for("slow_scenario"));
    let scenario = scenario_with_cache("slow_scenario", &[false]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let flow = Arc::clone(&h.flow);
    let start =
        tokio::spawn(async move { flow.start(SessionRequest::Catalog(scenario)).await });
    tokio::time::sleep(Duration::from_millis(30)).await;

    h.flow.cancel();
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Idle);

    assert!(matches!(
        start.await.unwrap().unwrap(),
        SessionStart::Superseded
    ));
    assert!(h.repo.recent_records(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn a_session_finished_after_cancel_records_nothing() {
    let h = harness(FakePlanner::ok(), FakeImages::ok());
    let scenario = scenario_with_cache("supermarket_queue", &[false]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let mut session = ready(h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap());
    h.flow.cancel();

    session.complete_current(AssistanceLevel::Independent).unwrap();
    let finished = match h.flow.advance(&mut session).await.unwrap() {
        AdvanceResult::Finished(finished) => finished,
        other => panic!("expected Finished, got {other:?}"),
    };

    // the caller still sees the in-memory outcome, but nothing persists
    assert_eq!(finished.record.completed_steps(), 1);
    assert!(h.repo.recent_records(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn regeneration_replans_and_replaces_every_image() {
    let h = harness(FakePlanner::ok(), FakeImages::ok());
    let scenario = scenario_with_cache("bus_riding", &[true, true]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let pending = match h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap() {
        SessionStart::CachedImages(pending) => pending,
        _ => panic!("expected the cache choice point"),
    };

    let session = ready(h.flow.regenerate(pending).await.unwrap());
    assert_eq!(h.planner.calls.load(Ordering::SeqCst), 1);
    // the fake planner yields three steps, each regenerated unconditionally
    assert_eq!(h.images.calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.steps().len(), 3);
    assert!(session.steps().iter().all(TrainingStep::has_image));

    let stored = h
        .repo
        .get_scenario(&ScenarioId::new("bus_riding"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.steps().len(), 3);
    assert!(
        stored.steps()[0]
            .instruction()
            .starts_with("Scenario bus_riding step")
    );
}

#[tokio::test]
async fn failed_regeneration_keeps_the_stored_scenario_intact() {
    let h = harness(FakePlanner::failing(), FakeImages::ok());
    let scenario = scenario_with_cache("bus_riding", &[true, true]);
    h.repo.create_scenario(&scenario).await.unwrap();

    let pending = match h.flow.start(SessionRequest::Catalog(scenario)).await.unwrap() {
        SessionStart::CachedImages(pending) => pending,
        _ => panic!("expected the cache choice point"),
    };

    let err = h.flow.regenerate(pending).await.unwrap_err();
    assert!(matches!(err, SessionError::Planning(_)));
    assert_eq!(*h.flow.phase().borrow(), SessionPhase::Idle);

    // the old steps survive a failed replan and the catalog still lists them
    let stored = h
        .repo
        .get_scenario(&ScenarioId::new("bus_riding"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.steps().len(), 2);
    assert!(stored.all_images_cached());
    assert_eq!(h.repo.list_scenarios(10).await.unwrap().len(), 1);
}
