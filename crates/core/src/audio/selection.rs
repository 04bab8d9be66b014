//! Which clips a configuration plays, and in what order.

use std::{cmp::Ordering, path::Path, path::PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use super::{ClipDefinition, ClipId};
use crate::{EngineError, Result};

pub const MIN_SELECTION: usize = 3;
pub const MAX_SELECTION: usize = 10;

/// Presets are triggered by PSD digits 1 to 9.
pub const PRESET_CLIP_COUNT: u32 = 9;

/// A clip chosen for a configuration, either a bundled preset or an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioItem {
    pub id: String,
    pub name: String,
    #[serde(alias = "uri")]
    pub source: PathBuf,
    #[serde(default)]
    pub is_preset: bool,
}

/// Stored audio settings of a configuration.
///
/// `audio_items` is read either as a JSON array or as a string holding the
/// JSON-encoded array, which is how the settings table stores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioSelection {
    #[serde(default)]
    pub use_preset: bool,
    #[serde(default, deserialize_with = "stored_items")]
    pub audio_items: Vec<AudioItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredItems {
    Inline(Vec<AudioItem>),
    Encoded(String),
    Missing(()),
}

fn stored_items<'de, D>(deserializer: D) -> std::result::Result<Vec<AudioItem>, D::Error>
where
    D: Deserializer<'de>,
{
    match StoredItems::deserialize(deserializer)? {
        StoredItems::Inline(items) => Ok(items),
        StoredItems::Encoded(text) if text.trim().is_empty() => Ok(Vec::new()),
        StoredItems::Encoded(text) => {
            serde_json::from_str(&text).map_err(serde::de::Error::custom)
        }
        StoredItems::Missing(()) => Ok(Vec::new()),
    }
}

impl AudioSelection {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

pub fn validate_selection(items: &[AudioItem]) -> Result<()> {
    if items.len() < MIN_SELECTION {
        return Err(EngineError::InvalidConfig(format!(
            "select at least {MIN_SELECTION} audio clips, got {}",
            items.len()
        )));
    }
    if items.len() > MAX_SELECTION {
        return Err(EngineError::InvalidConfig(format!(
            "select at most {MAX_SELECTION} audio clips, got {}",
            items.len()
        )));
    }
    Ok(())
}

pub fn uses_presets(items: &[AudioItem]) -> bool {
    items.iter().any(|item| item.is_preset)
}

/// Presets first ordered by numeric id, then uploads ordered by name.
pub fn sort_items(items: &[AudioItem]) -> Vec<AudioItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| match (a.is_preset, b.is_preset) {
        (true, true) => preset_rank(a)
            .cmp(&preset_rank(b))
            .then_with(|| a.id.cmp(&b.id)),
        (false, false) => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
    });
    sorted
}

fn preset_rank(item: &AudioItem) -> u64 {
    item.id.trim().parse().unwrap_or(u64::MAX)
}

/// Validates and sorts a selection, then numbers the clips `"1"`, `"2"`, ...
/// in sorted order. Only the first nine are reachable by PSD triggers.
pub fn clip_definitions(items: &[AudioItem]) -> Result<Vec<ClipDefinition>> {
    validate_selection(items)?;
    Ok(sort_items(items)
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            ClipDefinition::new(ClipId::from((position + 1).to_string()), item.source)
        })
        .collect())
}

/// The bundled clips `1.<ext>` to `9.<ext>` inside `dir`.
pub fn preset_clips(dir: impl AsRef<Path>, extension: &str) -> Vec<ClipDefinition> {
    let dir = dir.as_ref();
    (1..=PRESET_CLIP_COUNT)
        .map(|n| {
            ClipDefinition::new(
                ClipId::from(n.to_string()),
                dir.join(format!("{n}.{extension}")),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(id: &str) -> AudioItem {
        AudioItem {
            id: id.to_string(),
            name: format!("Preset {id}"),
            source: PathBuf::from(format!("presets/{id}.mp3")),
            is_preset: true,
        }
    }

    fn upload(name: &str) -> AudioItem {
        AudioItem {
            id: format!("upload-{name}"),
            name: name.to_string(),
            source: PathBuf::from(format!("uploads/{name}.wav")),
            is_preset: false,
        }
    }

    #[test]
    fn presets_sort_numerically_before_uploads() {
        let items = vec![upload("rain"), preset("10"), upload("Bells"), preset("2")];
        let names: Vec<_> = sort_items(&items)
            .into_iter()
            .map(|item| item.name)
            .collect();
        assert_eq!(names, vec!["Preset 2", "Preset 10", "Bells", "rain"]);
    }

    #[test]
    fn enforces_selection_size() {
        assert!(validate_selection(&[preset("1"), preset("2")]).is_err());
        let eleven: Vec<_> = (1..=11).map(|n| preset(&n.to_string())).collect();
        assert!(validate_selection(&eleven).is_err());
        assert!(validate_selection(&eleven[..3]).is_ok());
    }

    #[test]
    fn numbers_clips_in_sorted_order() {
        let items = vec![upload("wind"), preset("3"), preset("1")];
        let clips = clip_definitions(&items).unwrap();

        assert_eq!(clips[0], ClipDefinition::new("1", "presets/1.mp3"));
        assert_eq!(clips[1], ClipDefinition::new("2", "presets/3.mp3"));
        assert_eq!(clips[2], ClipDefinition::new("3", "uploads/wind.wav"));
    }

    #[test]
    fn builds_nine_presets() {
        let clips = preset_clips("assets/audio", "mp3");
        assert_eq!(clips.len(), 9);
        assert_eq!(clips[8], ClipDefinition::new("9", "assets/audio/9.mp3"));
    }

    #[test]
    fn parses_stored_selection() {
        let json = r#"{ "use_preset": true, "audio_items": [
            { "id": "1", "name": "Chime", "uri": "presets/1.mp3", "isPreset": true }
        ] }"#;
        let selection = AudioSelection::from_json_str(json).unwrap();
        assert!(selection.use_preset);
        assert!(uses_presets(&selection.audio_items));
        assert_eq!(
            selection.audio_items[0].source,
            PathBuf::from("presets/1.mp3")
        );
    }

    #[test]
    fn parses_json_encoded_items() {
        let items = r#"[
            {"id": "2", "name": "Bowl", "source": "presets/2.mp3", "isPreset": true},
            {"id": "u1", "name": "Rain", "uri": "uploads/rain.wav", "isPreset": false}
        ]"#;
        let json = serde_json::json!({
            "config_id": 4,
            "use_preset": true,
            "audio_items": items,
        });
        let selection = AudioSelection::from_json_str(&json.to_string()).unwrap();

        assert_eq!(selection.audio_items.len(), 2);
        assert_eq!(
            selection.audio_items[1].source,
            PathBuf::from("uploads/rain.wav")
        );
        assert!(!selection.audio_items[1].is_preset);
    }

    #[test]
    fn empty_or_null_items_mean_no_selection() {
        for json in [
            r#"{ "use_preset": false, "audio_items": "" }"#,
            r#"{ "use_preset": false, "audio_items": null }"#,
            r#"{ "use_preset": false }"#,
        ] {
            let selection = AudioSelection::from_json_str(json).unwrap();
            assert!(selection.audio_items.is_empty(), "{json}");
        }
    }

    #[test]
    fn malformed_encoded_items_are_rejected() {
        let json = r#"{ "use_preset": true, "audio_items": "[{\"id\": 1" }"#;
        assert!(matches!(
            AudioSelection::from_json_str(json),
            Err(EngineError::Json(_))
        ));
    }
}
