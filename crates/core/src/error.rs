use crate::audio::ClipId;

/// Result alias that carries the custom [`EngineError`] type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Common error type for the core crate.
///
/// None of these conditions halt sample processing. The session degrades to
/// "no sound" or "no activation" and keeps consuming samples.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A clip's asset could not be prepared. The clip stays unavailable for
    /// the rest of the session while other clips load normally.
    #[error("failed to load clip `{clip}`: {reason}")]
    Load { clip: ClipId, reason: String },
    /// The platform layer refused to start an instance. The instance has
    /// already been returned to idle when this is reported.
    #[error("playback of clip `{clip}` (instance {instance}) failed: {reason}")]
    Playback {
        clip: ClipId,
        instance: usize,
        reason: String,
    },
    /// Trigger requested for a clip that is unknown or failed to load.
    #[error("clip `{0}` is not loaded")]
    NotLoaded(ClipId),
    /// The pool has been torn down and accepts no further playback.
    #[error("sound pool has been closed")]
    SessionClosed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The rule source could not deliver a configuration.
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn load(clip: &ClipId, reason: impl ToString) -> Self {
        Self::Load {
            clip: clip.clone(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for EngineError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EngineError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
