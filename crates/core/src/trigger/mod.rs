//! Turns the PSD of each sample into a clip trigger.
//!
//! The clip is chosen by the last character of the PSD's plain decimal
//! rendering: `42.7` plays clip `"7"`, `123.4` plays `"4"`. A trailing `0`
//! is deliberate silence. Rendering is Rust's shortest round-trip `Display`
//! for `f64`, which never uses exponent notation and is locale independent.

use std::time::{Duration, Instant};

use crate::{Admission, ClipId, EngineError, FeatureSample, InstanceHandle, RateLimiter, SoundPool};

/// What happened to one sample's trigger attempt. Nothing here is surfaced as
/// an error; the caller only logs or displays it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Paused, or the sample carries no finite PSD.
    Inactive,
    /// PSD ended in 0.
    Silent,
    Suppressed(ClipId),
    NotLoaded(ClipId),
    Played(InstanceHandle),
    /// The platform failed to start the instance.
    Failed(ClipId),
    /// The pool was torn down.
    Closed,
}

/// Clip selected by a PSD value, or `None` for silence.
///
/// The digit is the last character of the value's shortest decimal form.
/// That form never switches to exponent notation, so `1e-7` reads as
/// `0.0000001` and `2.5e21` ends in `0`.
pub fn derive_clip_id(psd: f64) -> Option<ClipId> {
    if !psd.is_finite() {
        return None;
    }
    let digit = psd.to_string().chars().last()?.to_digit(10)?;
    (1..=9)
        .contains(&digit)
        .then(|| ClipId::from(digit.to_string()))
}

#[derive(Debug, Clone)]
pub struct TriggerEngine {
    cooldown: Duration,
}

impl Default for TriggerEngine {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl TriggerEngine {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Derives a clip from `sample` and plays it if the limiter admits it.
    ///
    /// Unknown clips are rejected before the limiter is consulted, so they
    /// never consume a cooldown.
    pub fn on_sample(
        &self,
        sample: &FeatureSample,
        pool: &mut SoundPool,
        limiter: &mut RateLimiter,
        is_playing: bool,
        now: Instant,
    ) -> TriggerOutcome {
        if !is_playing {
            return TriggerOutcome::Inactive;
        }
        let Some(psd) = sample.finite_psd() else {
            return TriggerOutcome::Inactive;
        };
        let Some(clip) = derive_clip_id(psd) else {
            return TriggerOutcome::Silent;
        };
        if pool.is_closed() {
            return TriggerOutcome::Closed;
        }
        if !pool.is_loaded(&clip) {
            tracing::debug!(%clip, psd, "trigger for unloaded clip");
            return TriggerOutcome::NotLoaded(clip);
        }
        if limiter.try_acquire(&clip, now, self.cooldown) == Admission::Suppressed {
            tracing::debug!(%clip, psd, "trigger suppressed by cooldown");
            return TriggerOutcome::Suppressed(clip);
        }

        let played = pool
            .acquire_free_instance(&clip)
            .and_then(|handle| pool.play(&handle).map(|()| handle));
        match played {
            Ok(handle) => {
                tracing::debug!(%clip, instance = handle.index, psd, "clip triggered");
                TriggerOutcome::Played(handle)
            }
            Err(EngineError::NotLoaded(clip)) => TriggerOutcome::NotLoaded(clip),
            Err(EngineError::SessionClosed) => TriggerOutcome::Closed,
            Err(_) => TriggerOutcome::Failed(clip),
        }
    }
}
