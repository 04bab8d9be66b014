//! Core library for the Neuroscape installation.
//!
//! A stream of EEG band-power samples drives two outputs: lighting rules
//! whose ranges contain the current band values, and short overlapping audio
//! clips picked from the sample's PSD. Each module owns one piece of that
//! pipeline; [`PlaySession`] wires them together for a single performance.

pub mod activation;
pub mod audio;
pub mod config;
pub mod error;
pub mod limiter;
pub mod matcher;
pub mod rules;
pub mod sample;
pub mod session;
pub mod trigger;

pub use activation::{ActivationStateTracker, ActivityLog, Transitions};
#[cfg(feature = "rodio")]
pub use audio::DeviceBackend;
pub use audio::{
    clip_definitions, preset_clips, AudioBackend, AudioItem, AudioSelection, ClipAsset,
    ClipDefinition, ClipId, Completion, HeadlessBackend, InstanceHandle, InstanceState, LoadReport,
    SoundPool, Voice,
};
pub use config::{AudioConfig, EngineConfig, LogConfig};
pub use error::{EngineError, Result};
pub use limiter::{Admission, RateLimiter};
pub use matcher::RangeMatcher;
pub use rules::{
    Configuration, JsonRuleSource, Presentation, RangeRule, RuleDocument, RuleId, RuleSnapshot,
    RuleSource,
};
pub use sample::{Band, FeatureSample, Timestamp};
pub use session::{PlaySession, SampleReport};
pub use trigger::{derive_clip_id, TriggerEngine, TriggerOutcome};
