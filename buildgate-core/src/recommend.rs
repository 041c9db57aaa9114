//! Rule-driven tuning recommendations and QA findings.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scoring::{FeelMetrics, QaMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Engagement,
    Retention,
    Mastery,
    FeedbackDensity,
    /// Game is too easy.
    Difficulty,
    /// Long sessions with too little happening.
    Feedback,
    /// Game is overwhelming.
    Pace,
}

impl RecommendationCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Engagement => "engagement",
            Self::Retention => "retention",
            Self::Mastery => "mastery",
            Self::FeedbackDensity => "feedback_density",
            Self::Difficulty => "difficulty",
            Self::Feedback => "feedback",
            Self::Pace => "pace",
        }
    }
}

impl fmt::Display for RecommendationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub description: String,
    pub action: String,
    pub estimated_impact: String,
}

struct Rule {
    category: RecommendationCategory,
    priority: Priority,
    fires: fn(&FeelMetrics) -> bool,
    description: &'static str,
    action: &'static str,
    estimated_impact: &'static str,
}

const RULES: &[Rule] = &[
    Rule {
        category: RecommendationCategory::Engagement,
        priority: Priority::High,
        fires: |m| m.engagement < 0.6,
        description: "Increase engagement through better reward feedback",
        action: "Add more visual/audio feedback for successful cuts",
        estimated_impact: "+0.15 engagement",
    },
    Rule {
        category: RecommendationCategory::Retention,
        priority: Priority::High,
        fires: |m| m.retention < 0.5,
        description: "Improve retention through better difficulty curve",
        action: "Adjust spawn timing and block speed progression",
        estimated_impact: "+0.20 retention",
    },
    Rule {
        category: RecommendationCategory::Mastery,
        priority: Priority::Medium,
        fires: |m| m.mastery < 0.4,
        description: "Enhance mastery through skill-based mechanics",
        action: "Add perfect cut bonuses and skill-based scoring",
        estimated_impact: "+0.25 mastery",
    },
    Rule {
        category: RecommendationCategory::FeedbackDensity,
        priority: Priority::Medium,
        fires: |m| m.feedback_density < 0.5,
        description: "Increase feedback density for better feel",
        action: "Add more juice effects and screen shake",
        estimated_impact: "+0.20 feedback_density",
    },
    Rule {
        category: RecommendationCategory::Difficulty,
        priority: Priority::Medium,
        fires: |m| m.success_rate > 0.8,
        description: "Reduce tolerance for easier gameplay",
        action: "Reduce tolerance by 5%",
        estimated_impact: "Better challenge balance",
    },
    Rule {
        category: RecommendationCategory::Feedback,
        priority: Priority::Medium,
        fires: |m| m.avg_session > 120.0,
        description: "Increase effect intensity for more feedback",
        action: "Increase effect intensity by 15%",
        estimated_impact: "More engaging feedback",
    },
    Rule {
        category: RecommendationCategory::Pace,
        priority: Priority::High,
        fires: |m| m.success_rate < 0.4,
        description: "Reduce juice duration to prevent overwhelm",
        action: "Reduce juice duration by 20%",
        estimated_impact: "Less overwhelming experience",
    },
];

/// Evaluate every rule against `metrics`, in table order.
///
/// Rules are independent; any subset (including none) may fire.
#[must_use]
pub fn recommend(metrics: &FeelMetrics) -> Vec<Recommendation> {
    RULES
        .iter()
        .filter(|rule| (rule.fires)(metrics))
        .map(|rule| Recommendation {
            category: rule.category,
            priority: rule.priority,
            description: rule.description.to_string(),
            action: rule.action.to_string(),
            estimated_impact: rule.estimated_impact.to_string(),
        })
        .collect()
}

/// Stable split into (high, medium), each keeping evaluation order.
#[must_use]
pub fn by_priority(recommendations: &[Recommendation]) -> (Vec<&Recommendation>, Vec<&Recommendation>) {
    recommendations
        .iter()
        .partition(|rec| rec.priority == Priority::High)
}

/// QA metric a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaArea {
    SuccessRate,
    PerfectRate,
    SessionDuration,
    RestartRate,
}

impl QaArea {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::SuccessRate => "Success Rate",
            Self::PerfectRate => "Perfect Rate",
            Self::SessionDuration => "Session Duration",
            Self::RestartRate => "Restart Rate",
        }
    }
}

impl fmt::Display for QaArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Improvement note for a QA metric outside its acceptable range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaFinding {
    pub area: QaArea,
    pub note: String,
}

/// Shown when no QA rule fires.
pub const QA_ACCEPTABLE: &str = "QA metrics are within acceptable ranges.";

struct QaRule {
    area: QaArea,
    fires: fn(&QaMetrics) -> bool,
    note: &'static str,
}

const QA_RULES: &[QaRule] = &[
    QaRule {
        area: QaArea::SuccessRate,
        fires: |m| m.success_rate < 0.7,
        note: "Below target (70%). Consider adjusting difficulty curve.",
    },
    QaRule {
        area: QaArea::PerfectRate,
        fires: |m| m.perfect_rate < 0.1,
        note: "Below target (10%). Add more rewarding perfect cut mechanics.",
    },
    QaRule {
        area: QaArea::SessionDuration,
        fires: |m| m.avg_session < 60.0,
        note: "Short sessions. Consider adding progression elements.",
    },
    QaRule {
        area: QaArea::RestartRate,
        fires: |m| m.restart_rate > 1.0,
        note: "High restart rate. Improve tutorial and onboarding.",
    },
];

/// Evaluate the QA rules in table order. Empty when every metric is in range.
#[must_use]
pub fn qa_findings(metrics: &QaMetrics) -> Vec<QaFinding> {
    QA_RULES
        .iter()
        .filter(|rule| (rule.fires)(metrics))
        .map(|rule| QaFinding {
            area: rule.area,
            note: rule.note.to_string(),
        })
        .collect()
}
