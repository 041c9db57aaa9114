//! QA and FEEL scorers.
//!
//! Both read the same [`SessionAggregates`] but normalize differently, so
//! their sub-metrics stay in separate types.
use serde::{Deserialize, Serialize};

use crate::config::FeelConfig;
use crate::metrics::{ComponentScore, MetricSet, NEUTRAL_METRIC, SessionAggregates};
use crate::numbers::{cap_unit, clamp_unit};
use crate::recommend::{QaFinding, Recommendation, qa_findings, recommend};
use crate::session::SessionRecord;

const QA_SUCCESS_WEIGHT: f64 = 0.4;
const QA_PERFECT_WEIGHT: f64 = 0.3;
const QA_SESSION_WEIGHT: f64 = 0.2;
const QA_RESTART_WEIGHT: f64 = 0.1;

const FEEL_ENGAGEMENT_WEIGHT: f64 = 0.3;
const FEEL_RETENTION_WEIGHT: f64 = 0.2;
const FEEL_MASTERY_WEIGHT: f64 = 0.2;
const FEEL_FEEDBACK_WEIGHT: f64 = 0.2;
const FEEL_FPS_WEIGHT: f64 = 0.1;

/// Session length counted as fully engaged.
const TARGET_SESSION_SECS: f64 = 120.0;
/// Session length at which feedback density bottoms out.
const LONG_SESSION_SECS: f64 = 180.0;
/// Restarts per session at which the restart score reaches zero.
const RESTART_CEILING: f64 = 2.0;
/// Duration spread (seconds) at which session consistency reaches zero.
const SPREAD_CEILING_SECS: f64 = 60.0;
const TARGET_PERFECTS_PER_MINUTE: f64 = 2.0;

fn session_score(avg_session: f64) -> f64 {
    (avg_session / TARGET_SESSION_SECS).min(1.0)
}

fn restart_score(restart_rate: f64) -> f64 {
    (1.0 - restart_rate / RESTART_CEILING).max(0.0)
}

/// QA-side sub-metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaMetrics {
    pub success_rate: f64,
    pub perfect_rate: f64,
    pub avg_session: f64,
    pub restart_rate: f64,
    pub avg_fail_point: f64,
}

impl QaMetrics {
    #[must_use]
    pub const fn from_aggregates(agg: &SessionAggregates) -> Self {
        Self {
            success_rate: agg.success_rate,
            perfect_rate: agg.perfect_rate,
            avg_session: agg.avg_session,
            restart_rate: agg.restart_rate,
            avg_fail_point: agg.avg_fail_point,
        }
    }

    #[must_use]
    pub fn from_records(records: &[SessionRecord]) -> Self {
        Self::from_aggregates(&SessionAggregates::from_records(records))
    }

    /// Weighted QA score, never above 1.
    #[must_use]
    pub fn score(&self) -> f64 {
        let total = self.components().iter().map(|c| c.contribution).sum();
        clamp_unit(cap_unit(total))
    }

    #[must_use]
    pub fn components(&self) -> Vec<ComponentScore> {
        vec![
            ComponentScore::new("Success Rate", self.success_rate, QA_SUCCESS_WEIGHT),
            ComponentScore::new("Perfect Rate", self.perfect_rate, QA_PERFECT_WEIGHT),
            ComponentScore::new(
                "Session Length",
                session_score(self.avg_session),
                QA_SESSION_WEIGHT,
            ),
            ComponentScore::new(
                "Restarts",
                restart_score(self.restart_rate),
                QA_RESTART_WEIGHT,
            ),
        ]
    }

    /// Improvement notes for metrics outside their acceptable range.
    #[must_use]
    pub fn findings(&self) -> Vec<QaFinding> {
        qa_findings(self)
    }

    #[must_use]
    pub fn to_metric_set(&self) -> MetricSet {
        let mut set = MetricSet::new();
        set.insert("success_rate", self.success_rate);
        set.insert("perfect_rate", self.perfect_rate);
        set.insert("avg_session", self.avg_session);
        set.insert("restart_rate", self.restart_rate);
        set.insert("avg_fail_point", self.avg_fail_point);
        set
    }
}

/// FEEL-side sub-scores plus the two raw signals the tuning rules read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeelMetrics {
    pub engagement: f64,
    pub retention: f64,
    pub mastery: f64,
    pub feedback_density: f64,
    pub fps: f64,
    pub success_rate: f64,
    pub avg_session: f64,
}

impl FeelMetrics {
    #[must_use]
    pub fn from_aggregates(agg: &SessionAggregates, config: &FeelConfig) -> Self {
        if agg.is_empty() {
            return Self {
                engagement: NEUTRAL_METRIC,
                retention: NEUTRAL_METRIC,
                mastery: NEUTRAL_METRIC,
                feedback_density: NEUTRAL_METRIC,
                fps: config.fps,
                success_rate: agg.success_rate,
                avg_session: agg.avg_session,
            };
        }

        let engagement = cap_unit(
            0.4 * agg.success_rate + 0.3 * agg.perfect_rate + 0.3 * session_score(agg.avg_session),
        );
        let consistency = (1.0 - agg.session_std_dev / SPREAD_CEILING_SECS).max(0.0);
        let retention = cap_unit(0.6 * restart_score(agg.restart_rate) + 0.4 * consistency);
        let mastery = cap_unit(0.7 * (2.0 * agg.perfect_rate).min(1.0) + 0.3 * agg.avg_fail_point);
        let perfect_density = (agg.avg_perfect_per_minute / TARGET_PERFECTS_PER_MINUTE).min(1.0);
        let session_density = (1.0 - agg.avg_session / LONG_SESSION_SECS).max(0.0);
        let feedback_density = cap_unit(0.6 * perfect_density + 0.4 * session_density);

        Self {
            engagement,
            retention,
            mastery,
            feedback_density,
            fps: config.fps,
            success_rate: agg.success_rate,
            avg_session: agg.avg_session,
        }
    }

    #[must_use]
    pub fn from_records(records: &[SessionRecord], config: &FeelConfig) -> Self {
        Self::from_aggregates(&SessionAggregates::from_records(records), config)
    }

    #[must_use]
    pub fn score(&self) -> f64 {
        let total = self.components().iter().map(|c| c.contribution).sum();
        clamp_unit(total)
    }

    #[must_use]
    pub fn components(&self) -> Vec<ComponentScore> {
        vec![
            ComponentScore::new("Engagement", self.engagement, FEEL_ENGAGEMENT_WEIGHT),
            ComponentScore::new("Retention", self.retention, FEEL_RETENTION_WEIGHT),
            ComponentScore::new("Mastery", self.mastery, FEEL_MASTERY_WEIGHT),
            ComponentScore::new(
                "Feedback Density",
                self.feedback_density,
                FEEL_FEEDBACK_WEIGHT,
            ),
            ComponentScore::new("FPS", self.fps, FEEL_FPS_WEIGHT),
        ]
    }

    #[must_use]
    pub fn to_metric_set(&self) -> MetricSet {
        let mut set = MetricSet::new();
        set.insert("engagement", self.engagement);
        set.insert("retention", self.retention);
        set.insert("mastery", self.mastery);
        set.insert("feedback_density", self.feedback_density);
        set.insert("fps", self.fps);
        set
    }
}

/// Everything one scoring pass produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub qa_score: f64,
    pub feel_score: f64,
    pub sub_scores: MetricSet,
    pub recommendations: Vec<Recommendation>,
}

/// Score a population on both axes at once.
#[must_use]
pub fn score_population(records: &[SessionRecord], config: &FeelConfig) -> ScoreResult {
    let aggregates = SessionAggregates::from_records(records);
    let qa = QaMetrics::from_aggregates(&aggregates);
    let feel = FeelMetrics::from_aggregates(&aggregates, config);

    let mut sub_scores = qa.to_metric_set();
    sub_scores.extend(feel.to_metric_set());

    let result = ScoreResult {
        qa_score: qa.score(),
        feel_score: feel.score(),
        sub_scores,
        recommendations: recommend(&feel),
    };
    log::debug!(
        "scored {} sessions: QA {:.3} FEEL {:.3} ({} recommendations)",
        aggregates.sessions,
        result.qa_score,
        result.feel_score,
        result.recommendations.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregates() -> SessionAggregates {
        SessionAggregates {
            sessions: 30,
            success_rate: 0.7,
            perfect_rate: 0.1,
            avg_session: 105.0,
            restart_rate: 0.45,
            avg_fail_point: 0.87,
            session_std_dev: 43.0,
            avg_perfect_per_minute: 0.2,
        }
    }

    #[test]
    fn qa_score_follows_weights() {
        let qa = QaMetrics::from_aggregates(&aggregates());
        let expected = 0.4 * 0.7 + 0.3 * 0.1 + 0.2 * (105.0 / 120.0) + 0.1 * (1.0 - 0.45 / 2.0);
        assert!((qa.score() - expected).abs() < 1e-12);
    }

    #[test]
    fn qa_score_caps_long_sessions_and_floors_restarts() {
        let agg = SessionAggregates {
            avg_session: 400.0,
            restart_rate: 5.0,
            success_rate: 1.0,
            perfect_rate: 1.0,
            ..aggregates()
        };
        let qa = QaMetrics::from_aggregates(&agg);
        assert!((qa.score() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn feel_score_follows_weights() {
        let feel = FeelMetrics::from_aggregates(&aggregates(), &FeelConfig::default());
        let engagement = 0.4 * 0.7 + 0.3 * 0.1 + 0.3 * (105.0 / 120.0);
        let retention = 0.6 * (1.0 - 0.45 / 2.0) + 0.4 * (1.0 - 43.0 / 60.0);
        let mastery = 0.7 * 0.2 + 0.3 * 0.87;
        let feedback = 0.6 * 0.1 + 0.4 * (1.0 - 105.0 / 180.0);
        assert!((feel.engagement - engagement).abs() < 1e-12);
        assert!((feel.retention - retention).abs() < 1e-12);
        assert!((feel.mastery - mastery).abs() < 1e-12);
        assert!((feel.feedback_density - feedback).abs() < 1e-12);
        let expected =
            0.3 * engagement + 0.2 * retention + 0.2 * mastery + 0.2 * feedback + 0.1 * 0.9;
        assert!((feel.score() - expected).abs() < 1e-12);
    }

    #[test]
    fn mastery_saturates_on_high_perfect_rate() {
        let agg = SessionAggregates {
            perfect_rate: 0.8,
            avg_fail_point: 1.0,
            ..aggregates()
        };
        let feel = FeelMetrics::from_aggregates(&agg, &FeelConfig::default());
        assert!((feel.mastery - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_population_scores_are_fixed() {
        let result = score_population(&[], &FeelConfig::default());
        let expected_qa = 0.4 * 0.5 + 0.3 * 0.5 + 0.2 * (0.5 / 120.0) + 0.1 * (1.0 - 0.25);
        assert!((result.qa_score - expected_qa).abs() < 1e-12);
        assert!((result.feel_score - 0.54).abs() < 1e-12);
        for name in ["engagement", "retention", "mastery", "feedback_density"] {
            assert_eq!(result.sub_scores.get(name), Some(NEUTRAL_METRIC));
        }
        assert_eq!(result.sub_scores.get("avg_session"), Some(NEUTRAL_METRIC));
    }

    #[test]
    fn injected_fps_flows_into_feel() {
        let low = FeelMetrics::from_aggregates(&aggregates(), &FeelConfig { fps: 0.0 });
        let high = FeelMetrics::from_aggregates(&aggregates(), &FeelConfig { fps: 1.0 });
        assert!((high.score() - low.score() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn score_population_merges_both_metric_sets() {
        let result = score_population(&[], &FeelConfig::default());
        assert_eq!(result.sub_scores.len(), 10);
        assert_eq!(result.sub_scores.get("fps"), Some(0.9));
        assert!(result.sub_scores.get("success_rate").is_some());
    }

    #[test]
    fn components_sum_to_score() {
        let feel = FeelMetrics::from_aggregates(&aggregates(), &FeelConfig::default());
        let weights: f64 = feel.components().iter().map(|c| c.weight).sum();
        assert!((weights - 1.0).abs() < 1e-12);
        let qa = QaMetrics::from_aggregates(&aggregates());
        let sum: f64 = qa.components().iter().map(|c| c.contribution).sum();
        assert!((sum - qa.score()).abs() < 1e-12);
    }
}
