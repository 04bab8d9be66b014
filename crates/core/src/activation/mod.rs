//! Tracks which rules switched on or off and keeps the bounded activity log.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use chrono::{Local, TimeZone};

use crate::{FeatureSample, RangeRule, RuleId};

/// Rules that changed state between two evaluations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transitions {
    pub turned_on: BTreeSet<RuleId>,
    pub turned_off: BTreeSet<RuleId>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.turned_on.is_empty() && self.turned_off.is_empty()
    }
}

/// Set differences between two active-id sets.
pub fn diff(previous: &BTreeSet<RuleId>, current: &BTreeSet<RuleId>) -> Transitions {
    Transitions {
        turned_on: current.difference(previous).copied().collect(),
        turned_off: previous.difference(current).copied().collect(),
    }
}

/// Remembers the last active set so each evaluation can be diffed against it.
#[derive(Debug, Clone, Default)]
pub struct ActivationStateTracker {
    previous: BTreeSet<RuleId>,
}

impl ActivationStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the new active set and returns what changed.
    pub fn observe<'a>(&mut self, active: impl IntoIterator<Item = &'a RangeRule>) -> Transitions {
        let current: BTreeSet<RuleId> = active.into_iter().map(|rule| rule.id).collect();
        let transitions = diff(&self.previous, &current);
        if !transitions.is_empty() {
            tracing::debug!(
                on = ?transitions.turned_on,
                off = ?transitions.turned_off,
                "active rules changed"
            );
        }
        self.previous = current;
        transitions
    }

    pub fn active_ids(&self) -> &BTreeSet<RuleId> {
        &self.previous
    }

    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

/// Prepends `entry` and keeps at most `capacity` entries, newest first.
pub fn append_log(mut entries: Vec<String>, entry: String, capacity: usize) -> Vec<String> {
    entries.insert(0, entry);
    entries.truncate(capacity);
    entries
}

/// Rendered in place of a sample's PSD when the headset sent none.
const MISSING_PSD: f64 = -1.0;

/// Log line for a sample in the local time zone.
///
/// Only samples carrying both a dominant band label and a timestamp produce
/// a line.
pub fn log_entry(sample: &FeatureSample) -> Option<String> {
    log_entry_in(sample, &Local)
}

pub fn log_entry_in<Tz>(sample: &FeatureSample, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let dominant = sample
        .dominant_band
        .as_deref()
        .filter(|label| !label.trim().is_empty())?;
    let timestamp = sample.timestamp.as_ref().filter(|ts| ts.is_present())?;

    Some(format!(
        "Dominant band: {dominant}, alpha: {:.2}, beta: {:.2}, theta: {:.2}, delta: {:.2}, gamma: {:.2}, peak alpha freq: {:.2}, psd: {:.2}, Time: {}",
        sample.alpha,
        sample.beta,
        sample.theta,
        sample.delta,
        sample.gamma,
        sample.peak_alpha_freq,
        sample.psd.unwrap_or(MISSING_PSD),
        timestamp.format_in(tz),
    ))
}

/// Bounded, newest-first activity log.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<String>,
    capacity: usize,
    last_logged: Option<FeatureSample>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            last_logged: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn push(&mut self, entry: String) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Appends a line for `sample` unless it is ineligible or identical to the
    /// sample logged last. Returns whether a line was added.
    pub fn record(&mut self, sample: &FeatureSample) -> bool {
        self.record_with(sample, log_entry)
    }

    pub(crate) fn record_with(
        &mut self,
        sample: &FeatureSample,
        render: impl FnOnce(&FeatureSample) -> Option<String>,
    ) -> bool {
        if self.last_logged.as_ref() == Some(sample) {
            return false;
        }
        match render(sample) {
            Some(entry) => {
                self.push(entry);
                self.last_logged = Some(sample.clone());
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_logged = None;
    }
}
