//! Ship decision: weighted composite, classification and dispatch payloads.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::DecisionConfig;
use crate::error::PipelineError;
use crate::metrics::ComponentScore;

const FEEL_WEIGHT: f64 = 0.30;
const QA_WEIGHT: f64 = 0.25;
const PERFORMANCE_WEIGHT: f64 = 0.15;
const MARKET_WEIGHT: f64 = 0.15;
const MONETIZATION_WEIGHT: f64 = 0.10;
const COMPLIANCE_WEIGHT: f64 = 0.05;

/// FEEL below this asks for feedback work.
const FEEDBACK_FLOOR: f64 = 0.6;
/// FEEL below this also asks for UI work.
const UI_FLOOR: f64 = 0.5;
/// QA below this asks for difficulty work.
const DIFFICULTY_FLOOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    BuildExport,
    TuningRequired,
    ReturnToGdd,
}

impl Decision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuildExport => "BUILD_EXPORT",
            Self::TuningRequired => "TUNING_REQUIRED",
            Self::ReturnToGdd => "RETURN_TO_GDD",
        }
    }

    /// Human follow-up checklist for this outcome.
    #[must_use]
    pub const fn follow_up(self) -> &'static [&'static str] {
        match self {
            Self::BuildExport => &[
                "Proceed with build export",
                "Monitor build performance",
                "Prepare store submission",
            ],
            Self::TuningRequired => &[
                "Implement FEEL tuning recommendations",
                "Re-run QA autoplay",
                "Monitor score improvements",
            ],
            Self::ReturnToGdd => &[
                "Revisit game design fundamentals",
                "Apply tuning parameters",
                "Re-run QA and FEEL analysis",
            ],
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted decision. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(with = "crate::timestamps")]
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub weighted_score: f64,
    pub qa_score: f64,
    pub feel_score: f64,
    pub reasoning: String,
    pub next_action: String,
}

/// Weights, placeholder factors and thresholds of the ship decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionMatrix {
    performance: f64,
    market: f64,
    monetization: f64,
    compliance: f64,
    build_threshold: f64,
    tuning_floor: f64,
}

impl Default for DecisionMatrix {
    fn default() -> Self {
        Self::from_config(&DecisionConfig::default())
    }
}

impl DecisionMatrix {
    #[must_use]
    pub const fn from_config(config: &DecisionConfig) -> Self {
        Self {
            performance: config.performance,
            market: config.market,
            monetization: config.monetization,
            compliance: config.compliance,
            build_threshold: config.build_threshold,
            tuning_floor: config.tuning_floor,
        }
    }

    #[must_use]
    pub const fn build_threshold(&self) -> f64 {
        self.build_threshold
    }

    #[must_use]
    pub const fn tuning_floor(&self) -> f64 {
        self.tuning_floor
    }

    /// Per-factor breakdown of the composite.
    #[must_use]
    pub fn components(&self, qa_score: f64, feel_score: f64) -> Vec<ComponentScore> {
        vec![
            ComponentScore::new("FEEL", feel_score, FEEL_WEIGHT),
            ComponentScore::new("QA", qa_score, QA_WEIGHT),
            ComponentScore::new("Performance", self.performance, PERFORMANCE_WEIGHT),
            ComponentScore::new("Market", self.market, MARKET_WEIGHT),
            ComponentScore::new("Monetization", self.monetization, MONETIZATION_WEIGHT),
            ComponentScore::new("Compliance", self.compliance, COMPLIANCE_WEIGHT),
        ]
    }

    #[must_use]
    pub fn weighted_score(&self, qa_score: f64, feel_score: f64) -> f64 {
        self.components(qa_score, feel_score)
            .iter()
            .map(|c| c.contribution)
            .sum()
    }

    #[must_use]
    pub fn classify(&self, weighted_score: f64) -> Decision {
        if weighted_score >= self.build_threshold {
            Decision::BuildExport
        } else if weighted_score < self.tuning_floor {
            Decision::ReturnToGdd
        } else {
            Decision::TuningRequired
        }
    }

    /// Decide from the two headline scores, stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`DecisionMatrix::decide_at`].
    pub fn decide(&self, qa_score: f64, feel_score: f64) -> Result<DecisionRecord, PipelineError> {
        self.decide_at(qa_score, feel_score, Utc::now())
    }

    /// Decide with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] if either score is outside `[0, 1]`.
    pub fn decide_at(
        &self,
        qa_score: f64,
        feel_score: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<DecisionRecord, PipelineError> {
        unit_score("qa_score", qa_score)?;
        unit_score("feel_score", feel_score)?;

        let weighted_score = self.weighted_score(qa_score, feel_score);
        let decision = self.classify(weighted_score);
        let reasoning = match decision {
            Decision::BuildExport => format!(
                "Weighted score {weighted_score:.3} meets threshold {}",
                self.build_threshold
            ),
            Decision::ReturnToGdd => format!(
                "Weighted score {weighted_score:.3} below tuning threshold {}",
                self.tuning_floor
            ),
            Decision::TuningRequired => format!(
                "Weighted score {weighted_score:.3} requires tuning (between {} and {})",
                self.tuning_floor, self.build_threshold
            ),
        };

        Ok(DecisionRecord {
            timestamp,
            decision,
            weighted_score,
            qa_score,
            feel_score,
            reasoning,
            next_action: Collaborator::for_decision(decision).next_action().to_string(),
        })
    }
}

fn unit_score(field: &'static str, value: f64) -> Result<(), PipelineError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PipelineError::invalid(
            field,
            format!("{value} is outside [0, 1]"),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningAction {
    // feedback
    IncreaseJuiceEffects,
    AddScreenShake,
    EnhanceAudioFeedback,
    ImproveVisualPolish,
    // difficulty
    ReduceInitialDifficulty,
    ImproveTutorial,
    AdjustSpawnTiming,
    BalanceBlockSpeed,
    // ui
    ImproveHudClarity,
    AddProgressIndicators,
    EnhanceFailScreen,
    AddAchievementSystem,
    // performance
    OptimizeParticleSystems,
    ReduceDrawCalls,
    ImplementObjectPooling,
    OptimizeAudioProcessing,
}

impl TuningAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IncreaseJuiceEffects => "increase_juice_effects",
            Self::AddScreenShake => "add_screen_shake",
            Self::EnhanceAudioFeedback => "enhance_audio_feedback",
            Self::ImproveVisualPolish => "improve_visual_polish",
            Self::ReduceInitialDifficulty => "reduce_initial_difficulty",
            Self::ImproveTutorial => "improve_tutorial",
            Self::AdjustSpawnTiming => "adjust_spawn_timing",
            Self::BalanceBlockSpeed => "balance_block_speed",
            Self::ImproveHudClarity => "improve_hud_clarity",
            Self::AddProgressIndicators => "add_progress_indicators",
            Self::EnhanceFailScreen => "enhance_fail_screen",
            Self::AddAchievementSystem => "add_achievement_system",
            Self::OptimizeParticleSystems => "optimize_particle_systems",
            Self::ReduceDrawCalls => "reduce_draw_calls",
            Self::ImplementObjectPooling => "implement_object_pooling",
            Self::OptimizeAudioProcessing => "optimize_audio_processing",
        }
    }
}

/// Tuning work attached to a design revision.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TuningParameters {
    pub difficulty_adjustments: Vec<TuningAction>,
    pub feedback_improvements: Vec<TuningAction>,
    pub performance_optimizations: Vec<TuningAction>,
    pub ui_enhancements: Vec<TuningAction>,
}

impl TuningParameters {
    /// Derive tuning work from the scores that drove the decision.
    /// Performance work is always included.
    #[must_use]
    pub fn for_scores(qa_score: f64, feel_score: f64) -> Self {
        use TuningAction::{
            AddAchievementSystem, AddProgressIndicators, AddScreenShake, AdjustSpawnTiming,
            BalanceBlockSpeed, EnhanceAudioFeedback, EnhanceFailScreen, ImplementObjectPooling,
            ImproveHudClarity, ImproveTutorial, ImproveVisualPolish, IncreaseJuiceEffects,
            OptimizeAudioProcessing, OptimizeParticleSystems, ReduceDrawCalls,
            ReduceInitialDifficulty,
        };

        let mut params = Self {
            performance_optimizations: vec![
                OptimizeParticleSystems,
                ReduceDrawCalls,
                ImplementObjectPooling,
                OptimizeAudioProcessing,
            ],
            ..Self::default()
        };
        if feel_score < FEEDBACK_FLOOR {
            params.feedback_improvements = vec![
                IncreaseJuiceEffects,
                AddScreenShake,
                EnhanceAudioFeedback,
                ImproveVisualPolish,
            ];
        }
        if qa_score < DIFFICULTY_FLOOR {
            params.difficulty_adjustments = vec![
                ReduceInitialDifficulty,
                ImproveTutorial,
                AdjustSpawnTiming,
                BalanceBlockSpeed,
            ];
        }
        if feel_score < UI_FLOOR {
            params.ui_enhancements = vec![
                ImproveHudClarity,
                AddProgressIndicators,
                EnhanceFailScreen,
                AddAchievementSystem,
            ];
        }
        params
    }

    /// All actions, grouped as difficulty, feedback, performance, ui.
    pub fn actions(&self) -> impl Iterator<Item = TuningAction> + '_ {
        self.difficulty_adjustments
            .iter()
            .chain(&self.feedback_improvements)
            .chain(&self.performance_optimizations)
            .chain(&self.ui_enhancements)
            .copied()
    }
}

/// Downstream role an instruction is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collaborator {
    BuildMaster,
    GameDirector,
    GameplayEngineer,
}

impl Collaborator {
    #[must_use]
    pub const fn for_decision(decision: Decision) -> Self {
        match decision {
            Decision::BuildExport => Self::BuildMaster,
            Decision::ReturnToGdd => Self::GameDirector,
            Decision::TuningRequired => Self::GameplayEngineer,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuildMaster => "BuildMaster",
            Self::GameDirector => "GameDirector",
            Self::GameplayEngineer => "GameplayEngineer",
        }
    }

    const fn next_action(self) -> &'static str {
        match self {
            Self::BuildMaster => "Call build_export.runbook",
            Self::GameDirector => "Return to idea_to_gdd.runbook with tuning parameters",
            Self::GameplayEngineer => "Apply tuning recommendations and re-test",
        }
    }
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to a [`crate::Dispatcher`]. Describes the next step; never runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub target: Collaborator,
    pub directive: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning: Option<TuningParameters>,
    /// Build number to stamp if the export is later committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
}

impl Instruction {
    /// Build the dispatch payload for `record`, given the last committed build.
    #[must_use]
    pub fn for_record(record: &DecisionRecord, current_build: u64) -> Self {
        let target = Collaborator::for_decision(record.decision);
        match record.decision {
            Decision::BuildExport => {
                let next = current_build.saturating_add(1);
                Self {
                    target,
                    directive: format!("Export build {next} ({})", record.reasoning),
                    tuning: None,
                    build_number: Some(next),
                }
            }
            Decision::ReturnToGdd => Self {
                target,
                directive: format!("Revise game design ({})", record.reasoning),
                tuning: Some(TuningParameters::for_scores(
                    record.qa_score,
                    record.feel_score,
                )),
                build_number: None,
            },
            Decision::TuningRequired => Self {
                target,
                directive: format!("Apply FEEL tuning and re-test ({})", record.reasoning),
                tuning: None,
                build_number: None,
            },
        }
    }
}
