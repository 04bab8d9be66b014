use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::{AudioBackend, ClipDefinition, ClipId, Completion, CompletionEvent, Voice};
use crate::{EngineError, Result};

/// Lifecycle of a single playback instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceState {
    #[default]
    Idle,
    Playing,
    /// Released at teardown; never playable again.
    Closed,
}

/// Points at one instance of one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHandle {
    pub clip: ClipId,
    pub index: usize,
}

/// Outcome of [`SoundPool::load`]. Failed clips are simply absent from the
/// pool.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ClipId>,
    pub failed: Vec<EngineError>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Instance {
    voice: Option<Box<dyn Voice>>,
    state: InstanceState,
    generation: u64,
}

/// Owns every loaded clip and its fixed set of playback instances.
///
/// When all instances of a clip are busy, instance 0 is restarted, cutting
/// off whatever it was playing. Overlap beyond the pool size truncates rather
/// than drops.
pub struct SoundPool {
    backend: Box<dyn AudioBackend>,
    clips: HashMap<ClipId, Vec<Instance>>,
    completions_tx: Sender<CompletionEvent>,
    completions_rx: Receiver<CompletionEvent>,
    volume: f32,
    closed: bool,
}

impl SoundPool {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        let (completions_tx, completions_rx) = unbounded();
        Self {
            backend,
            clips: HashMap::new(),
            completions_tx,
            completions_rx,
            volume: 1.0,
            closed: false,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Prepares `instances_per_clip` idle instances for every definition.
    ///
    /// A clip that fails to decode is reported in [`LoadReport::failed`] and
    /// left out; the remaining clips still load.
    pub fn load(
        &mut self,
        definitions: &[ClipDefinition],
        instances_per_clip: usize,
    ) -> Result<LoadReport> {
        if self.closed {
            return Err(EngineError::SessionClosed);
        }
        if instances_per_clip == 0 {
            return Err(EngineError::InvalidConfig(
                "a clip needs at least one playback instance".to_string(),
            ));
        }

        let mut report = LoadReport::default();
        for definition in definitions {
            if self.clips.contains_key(&definition.id) {
                report
                    .failed
                    .push(EngineError::load(&definition.id, "clip id already loaded"));
                continue;
            }
            match self.prepare(definition, instances_per_clip) {
                Ok(instances) => {
                    self.clips.insert(definition.id.clone(), instances);
                    report.loaded.push(definition.id.clone());
                }
                Err(err) => {
                    tracing::warn!(
                        clip = %definition.id,
                        source = ?definition.source,
                        %err,
                        "clip unavailable"
                    );
                    report.failed.push(err);
                }
            }
        }

        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            instances_per_clip,
            "sound pool loaded"
        );
        Ok(report)
    }

    fn prepare(&mut self, definition: &ClipDefinition, count: usize) -> Result<Vec<Instance>> {
        let asset = self.backend.decode(definition)?;
        (0..count)
            .map(|index| -> Result<Instance> {
                let voice = self
                    .backend
                    .voice(definition, &asset, index)
                    .map_err(|err| EngineError::load(&definition.id, err))?;
                Ok(Instance {
                    voice: Some(voice),
                    state: InstanceState::Idle,
                    generation: 0,
                })
            })
            .collect()
    }

    pub fn is_loaded(&self, clip: &ClipId) -> bool {
        !self.closed && self.clips.contains_key(clip)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn clip_ids(&self) -> impl Iterator<Item = &ClipId> {
        self.clips.keys()
    }

    /// Instance states of a clip in index order, after applying any pending
    /// completions.
    pub fn instance_states(&mut self, clip: &ClipId) -> Option<Vec<InstanceState>> {
        self.poll_completions();
        self.clips
            .get(clip)
            .map(|instances| instances.iter().map(|instance| instance.state).collect())
    }

    /// First idle instance in index order, or instance 0 when all are busy.
    pub fn acquire_free_instance(&mut self, clip: &ClipId) -> Result<InstanceHandle> {
        if self.closed {
            return Err(EngineError::SessionClosed);
        }
        self.poll_completions();

        let instances = self
            .clips
            .get(clip)
            .ok_or_else(|| EngineError::NotLoaded(clip.clone()))?;
        let index = instances
            .iter()
            .position(|instance| instance.state == InstanceState::Idle)
            .unwrap_or(0);

        Ok(InstanceHandle {
            clip: clip.clone(),
            index,
        })
    }

    /// Restarts the instance from the beginning at the pool volume.
    ///
    /// On failure the instance is put back to idle and a
    /// [`EngineError::Playback`] is returned.
    pub fn play(&mut self, handle: &InstanceHandle) -> Result<()> {
        if self.closed {
            return Err(EngineError::SessionClosed);
        }

        let volume = self.volume;
        let tx = self.completions_tx.clone();
        let instance = self
            .clips
            .get_mut(&handle.clip)
            .and_then(|instances| instances.get_mut(handle.index))
            .ok_or_else(|| EngineError::NotLoaded(handle.clip.clone()))?;
        let voice = instance.voice.as_mut().ok_or(EngineError::SessionClosed)?;

        if instance.state == InstanceState::Playing {
            tracing::debug!(
                clip = %handle.clip,
                instance = handle.index,
                "restarting busy instance"
            );
            voice.stop();
        }

        instance.generation += 1;
        instance.state = InstanceState::Playing;
        let event = CompletionEvent {
            clip: handle.clip.clone(),
            index: handle.index,
            generation: instance.generation,
        };
        let done = Completion::new(tx, event);

        if let Err(err) = voice.start(volume, done) {
            // Invalidate the completion handed to the failed start.
            instance.generation += 1;
            instance.state = InstanceState::Idle;
            tracing::warn!(clip = %handle.clip, instance = handle.index, %err, "playback failed");
            return Err(EngineError::Playback {
                clip: handle.clip.clone(),
                instance: handle.index,
                reason: err.to_string(),
            });
        }
        Ok(())
    }

    /// Applies completions reported by the backend. Returns how many
    /// instances went back to idle.
    pub fn poll_completions(&mut self) -> usize {
        let mut released = 0;
        for event in self.completions_rx.try_iter() {
            let instance = self
                .clips
                .get_mut(&event.clip)
                .and_then(|instances| instances.get_mut(event.index));
            if let Some(instance) = instance {
                if instance.state == InstanceState::Playing
                    && instance.generation == event.generation
                {
                    instance.state = InstanceState::Idle;
                    released += 1;
                }
            }
        }
        released
    }

    /// Stops and releases every instance. Further playback is refused.
    pub fn unload_all(&mut self) {
        if self.closed {
            tracing::debug!("sound pool already closed");
            return;
        }
        self.closed = true;

        let mut released = 0;
        for instances in self.clips.values_mut() {
            for instance in instances.iter_mut() {
                if let Some(mut voice) = instance.voice.take() {
                    voice.stop();
                    released += 1;
                }
                instance.state = InstanceState::Closed;
                instance.generation += 1;
            }
        }
        // Drop anything reported while we were stopping.
        self.completions_rx.try_iter().for_each(drop);
        tracing::info!(released, "sound pool unloaded");
    }
}

impl Drop for SoundPool {
    fn drop(&mut self) {
        self.unload_all();
    }
}

impl std::fmt::Debug for SoundPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundPool")
            .field("clips", &self.clips.len())
            .field("volume", &self.volume)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::ScriptedBackend;
    use super::*;

    fn clips(ids: &[&str]) -> Vec<ClipDefinition> {
        ids.iter()
            .map(|id| ClipDefinition::new(*id, format!("{id}.wav")))
            .collect()
    }

    fn loaded_pool(backend: &ScriptedBackend, ids: &[&str]) -> SoundPool {
        let mut pool = SoundPool::new(Box::new(backend.clone()));
        let report = pool.load(&clips(ids), 3).unwrap();
        assert!(report.is_complete());
        pool
    }

    fn trigger(pool: &mut SoundPool, clip: &str) -> usize {
        let handle = pool.acquire_free_instance(&ClipId::from(clip)).unwrap();
        pool.play(&handle).unwrap();
        handle.index
    }

    #[test]
    fn loads_idle_instances() {
        let backend = ScriptedBackend::new();
        let mut pool = loaded_pool(&backend, &["1", "2"]);

        assert_eq!(
            pool.instance_states(&ClipId::from("2")),
            Some(vec![InstanceState::Idle; 3])
        );
    }

    #[test]
    fn failed_clips_do_not_abort_loading() {
        let backend = ScriptedBackend::failing_decode(&["5"]);
        let mut pool = SoundPool::new(Box::new(backend));
        let report = pool.load(&clips(&["4", "5", "6"]), 3).unwrap();

        assert_eq!(report.loaded, vec![ClipId::from("4"), ClipId::from("6")]);
        assert_eq!(report.failed.len(), 1);
        assert!(!pool.is_loaded(&ClipId::from("5")));
        assert!(matches!(
            pool.acquire_free_instance(&ClipId::from("5")),
            Err(EngineError::NotLoaded(_))
        ));
    }

    #[test]
    fn rejects_empty_pools() {
        let mut pool = SoundPool::new(Box::new(ScriptedBackend::new()));
        assert!(matches!(
            pool.load(&clips(&["1"]), 0),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let mut pool = SoundPool::new(Box::new(ScriptedBackend::new()));
        let report = pool.load(&clips(&["1", "1"]), 2).unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn overlapping_triggers_fall_back_to_first_instance() {
        // The fallback restarts instance 0 rather than rotating through the
        // pool; a round-robin policy would pick the oldest instead.
        let backend = ScriptedBackend::new();
        let mut pool = loaded_pool(&backend, &["3"]);

        let indices: Vec<_> = (0..4).map(|_| trigger(&mut pool, "3")).collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);

        let script = backend.script.borrow();
        assert_eq!(script.stops, vec![("3".to_string(), 0)]);
        assert_eq!(script.starts.len(), 4);
    }

    #[test]
    fn completion_returns_instance_to_idle() {
        let backend = ScriptedBackend::new();
        let mut pool = loaded_pool(&backend, &["2"]);

        assert_eq!(trigger(&mut pool, "2"), 0);
        assert_eq!(trigger(&mut pool, "2"), 1);
        backend.finish("2", 0);

        assert_eq!(trigger(&mut pool, "2"), 0);
        let playing = InstanceState::Playing;
        assert_eq!(
            pool.instance_states(&ClipId::from("2")),
            Some(vec![playing, playing, InstanceState::Idle])
        );
    }

    #[test]
    fn stale_completions_are_ignored() {
        let backend = ScriptedBackend::new();
        let mut pool = loaded_pool(&backend, &["1"]);
        for _ in 0..3 {
            trigger(&mut pool, "1");
        }

        // Capture the first start's completion, then restart instance 0.
        let stale = backend
            .script
            .borrow()
            .pending
            .get(&("1".to_string(), 0))
            .cloned()
            .unwrap();
        assert_eq!(trigger(&mut pool, "1"), 0);
        stale.notify();

        let states = pool.instance_states(&ClipId::from("1")).unwrap();
        assert_eq!(states[0], InstanceState::Playing);
    }

    #[test]
    fn playback_failure_leaves_instance_reusable() {
        let backend = ScriptedBackend::new();
        let mut pool = loaded_pool(&backend, &["9"]);
        backend
            .script
            .borrow_mut()
            .fail_start
            .insert(("9".to_string(), 0));

        let handle = pool.acquire_free_instance(&ClipId::from("9")).unwrap();
        let err = pool.play(&handle).unwrap_err();
        assert!(matches!(err, EngineError::Playback { instance: 0, .. }));
        assert_eq!(
            pool.instance_states(&ClipId::from("9")).unwrap()[0],
            InstanceState::Idle
        );
        let retry = pool.acquire_free_instance(&ClipId::from("9")).unwrap();
        assert_eq!(retry.index, 0);
    }

    #[test]
    fn plays_at_configured_volume() {
        let backend = ScriptedBackend::new();
        let mut pool = SoundPool::new(Box::new(backend.clone())).with_volume(0.5);
        pool.load(&clips(&["1"]), 1).unwrap();
        trigger(&mut pool, "1");
        assert_eq!(backend.script.borrow().volumes, vec![0.5]);
    }

    #[test]
    fn unload_all_is_idempotent_and_closes() {
        let backend = ScriptedBackend::new();
        let mut pool = loaded_pool(&backend, &["1", "2"]);
        trigger(&mut pool, "1");

        pool.unload_all();
        pool.unload_all();

        assert!(pool.is_closed());
        assert_eq!(
            pool.instance_states(&ClipId::from("1")),
            Some(vec![InstanceState::Closed; 3])
        );
        assert_eq!(backend.script.borrow().stops.len(), 6);
        assert!(matches!(
            pool.acquire_free_instance(&ClipId::from("1")),
            Err(EngineError::SessionClosed)
        ));
        let handle = InstanceHandle {
            clip: ClipId::from("2"),
            index: 0,
        };
        assert!(matches!(pool.play(&handle), Err(EngineError::SessionClosed)));
        assert!(matches!(
            pool.load(&clips(&["3"]), 3),
            Err(EngineError::SessionClosed)
        ));
    }
}
