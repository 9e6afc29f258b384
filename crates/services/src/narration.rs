//! Single-slot narration playback.
//!
//! Narration is fire-and-forget: failures never interrupt a session, and
//! at most one clip plays at a time (starting a new one stops the old).

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use story_core::audio::AudioClip;

use crate::ai::SpeechGenerator;
use crate::error::NarrationError;
use crate::session::FlowGuard;

/// A clip currently playing on an output. Stopping is best-effort.
pub trait PlaybackHandle: Send {
    fn stop(&mut self);
}

/// Audio device seam. `close` releases the underlying resource; after it,
/// `play` may fail.
pub trait AudioOutput: Send + Sync {
    /// # Errors
    ///
    /// Returns `NarrationError` if the output cannot start playback.
    fn play(&self, clip: &AudioClip) -> Result<Box<dyn PlaybackHandle>, NarrationError>;

    fn close(&self);
}

/// No-op output for headless runs and tests.
pub struct SilentOutput;

struct SilentHandle;

impl PlaybackHandle for SilentHandle {
    fn stop(&mut self) {}
}

impl AudioOutput for SilentOutput {
    fn play(&self, _clip: &AudioClip) -> Result<Box<dyn PlaybackHandle>, NarrationError> {
        Ok(Box::new(SilentHandle))
    }

    fn close(&self) {}
}

/// Owns the single playback slot and the speech synthesizer.
pub struct Narrator {
    speech: Arc<dyn SpeechGenerator>,
    output: Arc<dyn AudioOutput>,
    current: Arc<Mutex<Option<Box<dyn PlaybackHandle>>>>,
    // ticket of the most recent narrate() call; older arrivals are dropped
    latest: Arc<AtomicU64>,
    shut_down: Arc<AtomicBool>,
}

fn lock_slot(
    slot: &Mutex<Option<Box<dyn PlaybackHandle>>>,
) -> std::sync::MutexGuard<'_, Option<Box<dyn PlaybackHandle>>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Narrator {
    #[must_use]
    pub fn new(speech: Arc<dyn SpeechGenerator>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            speech,
            output,
            current: Arc::new(Mutex::new(None)),
            latest: Arc::new(AtomicU64::new(0)),
            shut_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Speaks `text`, replacing whatever is currently playing.
    ///
    /// Fire-and-forget: synthesis runs on a spawned task. Failures are
    /// logged and swallowed. Audio that arrives for a stale flow epoch,
    /// after shutdown, or after a newer narrate call (a slow synthesis
    /// overtaken by the next step's) is dropped without playing.
    pub fn narrate(&self, text: String, voice: String, guard: FlowGuard) {
        let speech = Arc::clone(&self.speech);
        let output = Arc::clone(&self.output);
        let current = Arc::clone(&self.current);
        let latest = Arc::clone(&self.latest);
        let shut_down = Arc::clone(&self.shut_down);
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            let clip = match speech.synthesize(&text, &voice).await {
                Ok(clip) => clip,
                Err(err) => {
                    tracing::warn!(error = %err, "narration synthesis failed");
                    return;
                }
            };
            // the session may have moved on while we were synthesizing
            if !guard.is_current() || shut_down.load(Ordering::SeqCst) {
                return;
            }
            let mut slot = lock_slot(&current);
            // checked under the lock so a stale arrival can never stop a
            // newer clip that won the slot first
            if latest.load(Ordering::SeqCst) != ticket {
                return;
            }
            if let Some(mut previous) = slot.take() {
                previous.stop();
            }
            match output.play(&clip) {
                Ok(handle) => *slot = Some(handle),
                Err(err) => tracing::warn!(error = %err, "narration playback failed"),
            }
        });
    }

    /// Stops the current clip, if any.
    pub fn stop(&self) {
        if let Some(mut handle) = lock_slot(&self.current).take() {
            handle.stop();
        }
    }

    /// Stops playback and releases the audio output. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop();
        self.output.close();
    }
}

impl Drop for Narrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
