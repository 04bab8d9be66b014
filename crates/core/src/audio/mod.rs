//! Audio clips and the playback seam.
//!
//! Clips are decoded once at load time and replicated into a fixed number of
//! independent [`Voice`]s so the same sound can overlap itself. Backends
//! report natural completion through a [`Completion`] that may fire on any
//! thread; the [`SoundPool`] applies it on its owner's thread the next time it
//! is used.

use std::{
    borrow::Borrow,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

#[cfg(feature = "rodio")]
pub mod device;
mod pool;
mod selection;

#[cfg(feature = "rodio")]
pub use device::DeviceBackend;
pub use pool::{InstanceHandle, InstanceState, LoadReport, SoundPool};
pub use selection::{
    clip_definitions, preset_clips, sort_items, uses_presets, validate_selection, AudioItem,
    AudioSelection, MAX_SELECTION, MIN_SELECTION, PRESET_CLIP_COUNT,
};

/// Identifier of a sound clip, `"1"` to `"9"` for the preset set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipId(String);

impl ClipId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClipId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ClipId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ClipId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Where a clip's audio comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipDefinition {
    pub id: ClipId,
    pub source: PathBuf,
}

impl ClipDefinition {
    pub fn new(id: impl Into<ClipId>, source: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

/// Encoded clip bytes shared by every voice of one clip.
#[derive(Debug, Clone)]
pub struct ClipAsset {
    bytes: Arc<[u8]>,
}

impl ClipAsset {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared(&self) -> Arc<[u8]> {
        self.bytes.clone()
    }
}

/// Identifies one start of one voice. A completion only counts if its
/// generation still matches the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompletionEvent {
    pub clip: ClipId,
    pub index: usize,
    pub generation: u64,
}

/// Handed to a voice on every start; call [`Completion::notify`] once the
/// clip has played to its end.
#[derive(Debug, Clone)]
pub struct Completion {
    tx: Sender<CompletionEvent>,
    event: CompletionEvent,
}

impl Completion {
    pub(crate) fn new(tx: Sender<CompletionEvent>, event: CompletionEvent) -> Self {
        Self { tx, event }
    }

    pub fn notify(&self) {
        // The pool may already be gone during teardown.
        let _ = self.tx.send(self.event.clone());
    }
}

/// One independently playable copy of a clip.
pub trait Voice {
    /// Restarts the clip from the beginning at `volume`.
    fn start(&mut self, volume: f32, done: Completion) -> Result<()>;

    /// Silences the voice. Must be safe to call when nothing is playing.
    fn stop(&mut self);
}

/// Platform audio layer behind the [`SoundPool`].
pub trait AudioBackend {
    /// Reads and validates a clip. The default only reads the file.
    fn decode(&mut self, clip: &ClipDefinition) -> Result<ClipAsset> {
        ClipAsset::read(&clip.source)
            .map_err(|err| EngineError::load(&clip.id, err))
    }

    /// Creates the `index`-th voice for a decoded clip.
    fn voice(
        &mut self,
        clip: &ClipDefinition,
        asset: &ClipAsset,
        index: usize,
    ) -> Result<Box<dyn Voice>>;
}

/// Backend for running without an output device. Voices finish as soon as
/// they start.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessBackend;

impl AudioBackend for HeadlessBackend {
    fn voice(
        &mut self,
        clip: &ClipDefinition,
        asset: &ClipAsset,
        index: usize,
    ) -> Result<Box<dyn Voice>> {
        Ok(Box::new(HeadlessVoice {
            clip: clip.id.clone(),
            index,
            bytes: asset.bytes().len(),
        }))
    }
}

struct HeadlessVoice {
    clip: ClipId,
    index: usize,
    bytes: usize,
}

impl Voice for HeadlessVoice {
    fn start(&mut self, volume: f32, done: Completion) -> Result<()> {
        tracing::info!(
            clip = %self.clip,
            instance = self.index,
            volume,
            bytes = self.bytes,
            "play"
        );
        done.notify();
        Ok(())
    }

    fn stop(&mut self) {}
}
