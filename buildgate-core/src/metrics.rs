//! Population reductions shared by the QA and FEEL scorers.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::numbers::{u64_to_f64, usize_to_f64};
use crate::session::SessionRecord;

/// Value every raw aggregate takes when there are no sessions to reduce.
pub const NEUTRAL_METRIC: f64 = 0.5;

/// Raw statistics over one session population.
///
/// Rates are fractions of the population; `avg_session` is in seconds and
/// `restart_rate` in restarts per session, neither normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAggregates {
    pub sessions: usize,
    pub success_rate: f64,
    pub perfect_rate: f64,
    pub avg_session: f64,
    pub restart_rate: f64,
    pub avg_fail_point: f64,
    /// Population standard deviation of session durations, 0 below two sessions.
    pub session_std_dev: f64,
    pub avg_perfect_per_minute: f64,
}

impl SessionAggregates {
    #[must_use]
    pub fn from_records(records: &[SessionRecord]) -> Self {
        if records.is_empty() {
            log::warn!("empty session population; using neutral {NEUTRAL_METRIC} aggregates");
            return Self::neutral();
        }

        let mut durations = RunningStats::default();
        let mut successes = 0usize;
        let mut perfects = 0usize;
        let mut restarts = 0u64;
        let mut fail_point_sum = 0.0;
        let mut ppm_sum = 0.0;

        for record in records {
            durations.add(record.duration_seconds);
            if record.success {
                successes += 1;
            }
            if record.perfect {
                perfects += 1;
            }
            restarts = restarts.saturating_add(u64::from(record.restart_count));
            fail_point_sum += record.fail_point;
            ppm_sum += record.perfect_per_minute();
        }

        let n = usize_to_f64(records.len());
        Self {
            sessions: records.len(),
            success_rate: usize_to_f64(successes) / n,
            perfect_rate: usize_to_f64(perfects) / n,
            avg_session: durations.mean(),
            restart_rate: u64_to_f64(restarts) / n,
            avg_fail_point: fail_point_sum / n,
            session_std_dev: durations.std_dev(),
            avg_perfect_per_minute: ppm_sum / n,
        }
    }

    /// Midpoint stand-in for an empty population.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            sessions: 0,
            success_rate: NEUTRAL_METRIC,
            perfect_rate: NEUTRAL_METRIC,
            avg_session: NEUTRAL_METRIC,
            restart_rate: NEUTRAL_METRIC,
            avg_fail_point: NEUTRAL_METRIC,
            session_std_dev: NEUTRAL_METRIC,
            avg_perfect_per_minute: NEUTRAL_METRIC,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sessions == 0
    }
}

#[derive(Debug, Default, Clone)]
struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let count = u64_to_f64(self.count);
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / u64_to_f64(self.count)
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Named sub-metric values, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, f64>);

impl MetricSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One row of a weighted score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScore {
    pub name: String,
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
}

impl ComponentScore {
    #[must_use]
    pub fn new(name: impl Into<String>, score: f64, weight: f64) -> Self {
        Self {
            name: name.into(),
            score,
            weight,
            contribution: score * weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, success: bool, duration_seconds: f64, restart_count: u32) -> SessionRecord {
        SessionRecord {
            id,
            success,
            perfect: false,
            duration_seconds,
            restart_count,
            fail_point: if success { 1.0 } else { 0.5 },
            perfect_count: 0,
        }
    }

    #[test]
    fn empty_population_is_neutral() {
        let agg = SessionAggregates::from_records(&[]);
        assert!(agg.is_empty());
        for value in [
            agg.success_rate,
            agg.perfect_rate,
            agg.avg_session,
            agg.restart_rate,
            agg.avg_fail_point,
            agg.session_std_dev,
            agg.avg_perfect_per_minute,
        ] {
            assert!((value - NEUTRAL_METRIC).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn reduces_rates_and_means() {
        let mut perfect = record(1, true, 60.0, 0);
        perfect.perfect = true;
        perfect.perfect_count = 2;
        let records = vec![
            perfect,
            record(2, true, 120.0, 0),
            record(3, false, 90.0, 3),
            record(4, false, 90.0, 1),
        ];
        let agg = SessionAggregates::from_records(&records);
        assert_eq!(agg.sessions, 4);
        assert!((agg.success_rate - 0.5).abs() < 1e-12);
        assert!((agg.perfect_rate - 0.25).abs() < 1e-12);
        assert!((agg.avg_session - 90.0).abs() < 1e-12);
        assert!((agg.restart_rate - 1.0).abs() < 1e-12);
        assert!((agg.avg_fail_point - 0.75).abs() < 1e-12);
        // 2 perfects in one minute, the rest zero
        assert!((agg.avg_perfect_per_minute - 0.5).abs() < 1e-12);
        // population std of [60, 120, 90, 90]
        assert!((agg.session_std_dev - 450.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn single_session_has_no_spread() {
        let agg = SessionAggregates::from_records(&[record(1, true, 75.0, 0)]);
        assert!(agg.session_std_dev.abs() < f64::EPSILON);
        assert!((agg.avg_session - 75.0).abs() < 1e-12);
    }

    #[test]
    fn metric_set_merges_by_name() {
        let mut left = MetricSet::new();
        left.insert("engagement", 0.4);
        let mut right = MetricSet::new();
        right.insert("engagement", 0.6);
        right.insert("fps", 0.9);
        left.extend(right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.get("engagement"), Some(0.6));
        let names: Vec<&str> = left.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["engagement", "fps"]);
    }

    #[test]
    fn component_contribution_is_weighted() {
        let row = ComponentScore::new("Retention", 0.5, 0.2);
        assert!((row.contribution - 0.1).abs() < 1e-12);
    }
}
