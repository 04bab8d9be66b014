//! Configured output rules and where they come from.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use crate::{EngineError, Result};

pub const SETTINGS_FETCH_ERROR: &str = "Could not fetch the config settings";
pub const CONFIG_FETCH_ERROR: &str = "Could not fetch the config data";

pub type RuleId = u64;

/// Attributes consumed by lighting renderers. The engine passes them through
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub brightness: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub selected_panels: Option<serde_json::Value>,
}

/// A configured range on one band. The band is inferred from `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    pub id: RuleId,
    #[serde(default)]
    pub config_id: Option<u64>,
    #[serde(rename = "setting_name")]
    pub name: String,
    #[serde(rename = "lower_range")]
    pub lower: f64,
    #[serde(rename = "upper_range")]
    pub upper: f64,
    #[serde(flatten)]
    pub presentation: Presentation,
}

impl RangeRule {
    pub fn new(id: RuleId, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            id,
            config_id: None,
            name: name.into(),
            lower,
            upper,
            presentation: Presentation::default(),
        }
    }

    /// Closed-interval test, inclusive at both ends.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// The sculpture a play session drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub panels_x: Option<u32>,
    #[serde(default)]
    pub panels_y: Option<u32>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// Immutable rule collection for one session. Replaced wholesale on refresh.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    pub configuration: Option<Configuration>,
    pub rules: Arc<[RangeRule]>,
}

impl RuleSnapshot {
    pub fn new(configuration: Option<Configuration>, rules: Vec<RangeRule>) -> Self {
        Self {
            configuration,
            rules: rules.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Delivers the rule collection for a configuration. Called once per session
/// focus; failures are reported, never retried here.
pub trait RuleSource {
    fn fetch(&self, config_id: u64) -> Result<RuleSnapshot>;
}

/// Serialized form of the hosted `configs` and `config_settings` tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    #[serde(default)]
    pub configs: Vec<Configuration>,
    #[serde(default)]
    pub config_settings: Vec<RangeRule>,
}

impl RuleDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl RuleSource for RuleDocument {
    fn fetch(&self, config_id: u64) -> Result<RuleSnapshot> {
        let configuration = self
            .configs
            .iter()
            .find(|config| config.id == config_id)
            .cloned()
            .ok_or_else(|| EngineError::Fetch(CONFIG_FETCH_ERROR.to_string()))?;

        let rules = self
            .config_settings
            .iter()
            .filter(|rule| rule.config_id == Some(config_id))
            .cloned()
            .collect();

        Ok(RuleSnapshot::new(Some(configuration), rules))
    }
}

/// Reads a [`RuleDocument`] from disk on every fetch.
#[derive(Debug, Clone)]
pub struct JsonRuleSource {
    path: PathBuf,
}

impl JsonRuleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for JsonRuleSource {
    fn fetch(&self, config_id: u64) -> Result<RuleSnapshot> {
        let document = std::fs::read_to_string(&self.path)
            .map_err(EngineError::from)
            .and_then(|text| RuleDocument::from_json_str(&text))
            .map_err(|err| {
                tracing::warn!(path = ?self.path, %err, "rule source query failed");
                EngineError::Fetch(SETTINGS_FETCH_ERROR.to_string())
            })?;
        document.fetch(config_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r##"{
        "configs": [
            { "id": 7, "name": "Atrium", "panels_x": 4, "panels_y": 3 }
        ],
        "config_settings": [
            { "id": 1, "config_id": 7, "setting_name": "Alpha calm",
              "lower_range": 5, "upper_range": 10,
              "color": "#47313E", "brightness": 80, "speed": 2,
              "direction": "left", "selected_panels": [0, 3] },
            { "id": 2, "config_id": 8, "setting_name": "Beta focus",
              "lower_range": 0, "upper_range": 4 },
            { "id": 3, "config_id": 7, "setting_name": "Gamma burst",
              "lower_range": 30, "upper_range": 90 }
        ]
    }"##;

    #[test]
    fn filters_settings_by_configuration() {
        let document = RuleDocument::from_json_str(DOCUMENT).unwrap();
        let snapshot = document.fetch(7).unwrap();

        let ids: Vec<_> = snapshot.rules.iter().map(|rule| rule.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(snapshot.configuration.unwrap().panels_x, Some(4));
    }

    #[test]
    fn passes_presentation_through() {
        let document = RuleDocument::from_json_str(DOCUMENT).unwrap();
        let snapshot = document.fetch(7).unwrap();
        let rule = &snapshot.rules[0];

        assert_eq!(rule.presentation.color.as_deref(), Some("#47313E"));
        assert_eq!(rule.presentation.direction.as_deref(), Some("left"));
        assert_eq!(
            rule.presentation.selected_panels,
            Some(serde_json::json!([0, 3]))
        );
    }

    #[test]
    fn missing_configuration_reports_config_error() {
        let document = RuleDocument::from_json_str(DOCUMENT).unwrap();
        let err = document.fetch(99).unwrap_err();
        assert_eq!(err.to_string(), CONFIG_FETCH_ERROR);
    }

    #[test]
    fn unreadable_file_reports_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonRuleSource::new(dir.path().join("missing.json"));
        let err = source.fetch(7).unwrap_err();
        assert_eq!(err.to_string(), SETTINGS_FETCH_ERROR);
    }

    #[test]
    fn reads_rules_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, DOCUMENT).unwrap();

        let snapshot = JsonRuleSource::new(&path).fetch(7).unwrap();
        assert_eq!(snapshot.rules.len(), 2);
    }

    #[test]
    fn ranges_are_closed_intervals() {
        let rule = RangeRule::new(1, "alpha", 5.0, 10.0);
        assert!(rule.contains(5.0));
        assert!(rule.contains(10.0));
        assert!(!rule.contains(4.999));
        assert!(!rule.contains(10.001));
    }
}
