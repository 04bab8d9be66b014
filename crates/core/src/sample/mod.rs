//! Feature samples delivered by the EEG bridge.
//!
//! Band powers arrive pre-computed. A new [`FeatureSample`] replaces the
//! previous one wholesale; nothing here keeps history.

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const DISPLAY_FORMAT: &str = "%b %-d, %-I:%M:%S %p";

/// The five EEG frequency bands the installation reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Alpha,
    Beta,
    Theta,
    Delta,
    Gamma,
}

impl Band {
    /// Bands in their canonical evaluation order.
    pub const ALL: [Band; 5] = [
        Band::Alpha,
        Band::Beta,
        Band::Theta,
        Band::Delta,
        Band::Gamma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Band::Alpha => "alpha",
            Band::Beta => "beta",
            Band::Theta => "theta",
            Band::Delta => "delta",
            Band::Gamma => "gamma",
        }
    }

    /// Case-insensitive exact lookup of a band label such as `"Alpha"`.
    pub fn from_label(label: &str) -> Option<Band> {
        let label = label.trim();
        Band::ALL
            .into_iter()
            .find(|band| band.name().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When a sample was produced: epoch seconds or a free-form string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Epoch(f64),
    Text(String),
}

impl Timestamp {
    /// Empty strings and a zero epoch count as "no timestamp".
    pub fn is_present(&self) -> bool {
        match self {
            Timestamp::Epoch(secs) => secs.is_finite() && *secs != 0.0,
            Timestamp::Text(text) => !text.trim().is_empty(),
        }
    }

    /// Renders the timestamp in the local time zone, e.g. `Nov 14, 10:13:20 PM`.
    pub fn format_local(&self) -> String {
        self.format_in(&Local)
    }

    /// Renders the timestamp in `tz`. Values that are neither epoch seconds nor
    /// RFC 3339 are returned verbatim.
    pub fn format_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self.to_utc() {
            Some(instant) => instant
                .with_timezone(tz)
                .format(DISPLAY_FORMAT)
                .to_string(),
            None => self.raw(),
        }
    }

    fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Epoch(secs) => epoch_to_utc(*secs),
            Timestamp::Text(text) => {
                let text = text.trim();
                text.parse::<f64>()
                    .ok()
                    .and_then(epoch_to_utc)
                    .or_else(|| {
                        DateTime::parse_from_rfc3339(text)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc))
                    })
            }
        }
    }

    fn raw(&self) -> String {
        match self {
            Timestamp::Epoch(secs) => secs.to_string(),
            Timestamp::Text(text) => text.clone(),
        }
    }
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}

/// One snapshot of derived signal features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSample {
    #[serde(rename = "alpha_band")]
    pub alpha: f64,
    #[serde(rename = "beta_band")]
    pub beta: f64,
    #[serde(rename = "theta_band")]
    pub theta: f64,
    #[serde(rename = "delta_band")]
    pub delta: f64,
    #[serde(rename = "gamma_band")]
    pub gamma: f64,
    /// Label of the strongest band as sent by the bridge.
    #[serde(default)]
    pub dominant_band: Option<String>,
    #[serde(default)]
    pub alpha_beta_ratio: f64,
    #[serde(default)]
    pub alpha_delta_ratio: f64,
    #[serde(default)]
    pub peak_alpha_freq: f64,
    #[serde(default)]
    pub psd: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl FeatureSample {
    /// Power of a single band.
    pub fn value(&self, band: Band) -> f64 {
        match band {
            Band::Alpha => self.alpha,
            Band::Beta => self.beta,
            Band::Theta => self.theta,
            Band::Delta => self.delta,
            Band::Gamma => self.gamma,
        }
    }

    pub fn dominant(&self) -> Option<Band> {
        self.dominant_band.as_deref().and_then(Band::from_label)
    }

    /// PSD if it is present and finite.
    pub fn finite_psd(&self) -> Option<f64> {
        self.psd.filter(|psd| psd.is_finite())
    }

    /// Builds a sample with all bands set, used by tests and demos.
    pub fn from_bands(alpha: f64, beta: f64, theta: f64, delta: f64, gamma: f64) -> Self {
        Self {
            alpha,
            beta,
            theta,
            delta,
            gamma,
            dominant_band: None,
            alpha_beta_ratio: if beta > 0.0 { alpha / beta } else { 0.0 },
            alpha_delta_ratio: if delta > 0.0 { alpha / delta } else { 0.0 },
            peak_alpha_freq: 0.0,
            psd: None,
            timestamp: None,
        }
    }
}
