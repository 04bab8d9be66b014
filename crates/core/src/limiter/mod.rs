use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::ClipId;

/// Result of asking the limiter whether a clip may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Suppressed,
}

/// Per-clip cooldown gate.
///
/// Only accepted triggers move the clock forward, so a clip retried every few
/// milliseconds still fires once per interval.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_trigger: HashMap<ClipId, Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(
        &mut self,
        clip: &ClipId,
        now: Instant,
        min_interval: Duration,
    ) -> Admission {
        let allowed = match self.last_trigger.get(clip) {
            None => true,
            // The clock must move strictly forward past the last trigger.
            Some(last) => now
                .checked_duration_since(*last)
                .map(|elapsed| !elapsed.is_zero() && elapsed >= min_interval)
                .unwrap_or(false),
        };

        if allowed {
            self.last_trigger.insert(clip.clone(), now);
            Admission::Allowed
        } else {
            Admission::Suppressed
        }
    }

    pub fn last_trigger(&self, clip: &ClipId) -> Option<Instant> {
        self.last_trigger.get(clip).copied()
    }

    pub fn clear(&mut self) {
        self.last_trigger.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_millis(1500);

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn suppresses_within_cooldown() {
        let start = Instant::now();
        let clip = ClipId::from("3");
        let mut limiter = RateLimiter::new();
        let mut attempt = |ms| limiter.try_acquire(&clip, at(start, ms), COOLDOWN);

        assert_eq!(attempt(0), Admission::Allowed);
        assert_eq!(attempt(1000), Admission::Suppressed);
        assert_eq!(attempt(1500), Admission::Allowed);
    }

    #[test]
    fn suppressed_attempts_do_not_reset_the_clock() {
        let start = Instant::now();
        let clip = ClipId::from("3");
        let mut limiter = RateLimiter::new();

        limiter.try_acquire(&clip, at(start, 0), COOLDOWN);
        limiter.try_acquire(&clip, at(start, 1400), COOLDOWN);
        assert_eq!(limiter.last_trigger(&clip), Some(at(start, 0)));

        let late = limiter.try_acquire(&clip, at(start, 1600), COOLDOWN);
        assert_eq!(late, Admission::Allowed);
    }

    #[test]
    fn back_to_back_calls_allow_once() {
        let now = Instant::now();
        let clip = ClipId::from("8");
        let mut limiter = RateLimiter::new();

        let allowed = (0..10)
            .map(|_| limiter.try_acquire(&clip, now, COOLDOWN))
            .filter(|admission| *admission == Admission::Allowed)
            .count();
        assert_eq!(allowed, 1);
    }

    #[test]
    fn clips_cool_down_independently() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new();
        let mut attempt = |clip: &str| limiter.try_acquire(&clip.into(), now, COOLDOWN);

        assert_eq!(attempt("1"), Admission::Allowed);
        assert_eq!(attempt("2"), Admission::Allowed);
        assert_eq!(attempt("1"), Admission::Suppressed);
    }

    #[test]
    fn earlier_readings_are_suppressed() {
        let start = Instant::now();
        let clip = ClipId::from("5");
        let mut limiter = RateLimiter::new();

        limiter.try_acquire(&clip, at(start, 5000), COOLDOWN);
        let early = limiter.try_acquire(&clip, start, COOLDOWN);
        assert_eq!(early, Admission::Suppressed);
    }

    #[test]
    fn zero_interval_still_needs_time_to_pass() {
        let start = Instant::now();
        let clip = ClipId::from("6");
        let mut limiter = RateLimiter::new();
        let mut attempt = |ms| limiter.try_acquire(&clip, at(start, ms), Duration::ZERO);

        assert_eq!(attempt(0), Admission::Allowed);
        assert_eq!(attempt(0), Admission::Suppressed);
        assert_eq!(attempt(1), Admission::Allowed);
        assert_eq!(limiter.last_trigger(&clip), Some(at(start, 1)));
    }

    #[test]
    fn clear_forgets_history() {
        let now = Instant::now();
        let clip = ClipId::from("1");
        let mut limiter = RateLimiter::new();

        limiter.try_acquire(&clip, now, COOLDOWN);
        limiter.clear();
        let again = limiter.try_acquire(&clip, now, COOLDOWN);
        assert_eq!(again, Admission::Allowed);
    }
}
