//! One play session: the rules, the live sample and the audio resources that
//! belong to them.
//!
//! Every sample goes through the same steps: recompute the active set, diff
//! it against the previous one, log the sample, then let the trigger engine
//! decide on a sound. The pool and limiter are owned here and live exactly as
//! long as the session.

use std::time::Instant;

use crate::{
    ActivationStateTracker, ActivityLog, AudioBackend, ClipDefinition, Configuration, EngineConfig,
    FeatureSample, LoadReport, RangeMatcher, RangeRule, RateLimiter, Result, RuleSnapshot,
    RuleSource, SoundPool, Transitions, TriggerEngine, TriggerOutcome,
};

/// Everything a single sample caused.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleReport {
    pub transitions: Transitions,
    pub logged: bool,
    pub trigger: TriggerOutcome,
}

#[derive(Debug)]
pub struct PlaySession {
    config: EngineConfig,
    matcher: RangeMatcher,
    snapshot: RuleSnapshot,
    fetch_error: Option<String>,
    is_playing: bool,
    sample: Option<FeatureSample>,
    active: Vec<RangeRule>,
    tracker: ActivationStateTracker,
    log: ActivityLog,
    pool: SoundPool,
    limiter: RateLimiter,
    trigger: TriggerEngine,
}

impl PlaySession {
    pub fn new(config: EngineConfig, backend: Box<dyn AudioBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            matcher: RangeMatcher::new(),
            snapshot: RuleSnapshot::default(),
            fetch_error: None,
            is_playing: false,
            sample: None,
            active: Vec::new(),
            tracker: ActivationStateTracker::new(),
            log: ActivityLog::new(config.log.capacity),
            pool: SoundPool::new(backend).with_volume(config.audio.volume),
            limiter: RateLimiter::new(),
            trigger: TriggerEngine::new(config.audio.cooldown()),
            config,
        })
    }

    pub fn with_matcher(mut self, matcher: RangeMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn load_clips(&mut self, clips: &[ClipDefinition]) -> Result<LoadReport> {
        self.pool.load(clips, self.config.audio.instances_per_clip)
    }

    /// Replaces the rule collection from `source`. A failed fetch leaves the
    /// session with no rules and records the message in
    /// [`PlaySession::fetch_error`]; the next refresh starts clean.
    pub fn refresh_rules(&mut self, source: &dyn RuleSource, config_id: u64) -> Transitions {
        match source.fetch(config_id) {
            Ok(snapshot) => {
                tracing::info!(config_id, rules = snapshot.rules.len(), "rules refreshed");
                self.fetch_error = None;
                self.set_rules(snapshot)
            }
            Err(err) => {
                tracing::warn!(config_id, %err, "rule fetch failed");
                self.fetch_error = Some(err.to_string());
                self.set_rules(RuleSnapshot::default())
            }
        }
    }

    pub fn set_rules(&mut self, snapshot: RuleSnapshot) -> Transitions {
        self.snapshot = snapshot;
        self.recompute()
    }

    pub fn set_playing(&mut self, is_playing: bool) -> Transitions {
        if self.is_playing != is_playing {
            tracing::info!(is_playing, "playback toggled");
        }
        self.is_playing = is_playing;
        self.recompute()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn on_sample(&mut self, sample: FeatureSample) -> SampleReport {
        self.on_sample_at(sample, Instant::now())
    }

    /// Processes a sample as if it arrived at `now`.
    pub fn on_sample_at(&mut self, sample: FeatureSample, now: Instant) -> SampleReport {
        self.sample = Some(sample.clone());
        let transitions = self.recompute();
        let logged = self.log.record(&sample);
        let trigger = self.trigger.on_sample(
            &sample,
            &mut self.pool,
            &mut self.limiter,
            self.is_playing,
            now,
        );

        SampleReport {
            transitions,
            logged,
            trigger,
        }
    }

    fn recompute(&mut self) -> Transitions {
        self.active = self
            .matcher
            .compute_active(self.sample.as_ref(), &self.snapshot.rules, self.is_playing)
            .into_iter()
            .cloned()
            .collect();
        self.tracker.observe(&self.active)
    }

    /// Rules currently in range, in configured order.
    pub fn active_rules(&self) -> &[RangeRule] {
        &self.active
    }

    pub fn rules(&self) -> &[RangeRule] {
        &self.snapshot.rules
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.snapshot.configuration.as_ref()
    }

    pub fn fetch_error(&self) -> Option<&str> {
        self.fetch_error.as_deref()
    }

    pub fn current_sample(&self) -> Option<&FeatureSample> {
        self.sample.as_ref()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn pool(&self) -> &SoundPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut SoundPool {
        &mut self.pool
    }

    /// Returns to the initial paused, sample-less state. Loaded audio and
    /// rules are kept.
    pub fn reset(&mut self) {
        self.is_playing = false;
        self.sample = None;
        self.active.clear();
        self.tracker.reset();
        self.log.clear();
    }

    /// Stops all audio, forgets cooldowns and closes the pool for good.
    pub fn teardown(&mut self) {
        self.is_playing = false;
        self.pool.unload_all();
        self.limiter.clear();
        self.recompute();
        tracing::info!("play session closed");
    }
}
