//! Injectable pipeline configuration.
//!
//! Scoring weights live in code next to their formulas. What is configurable
//! here are the simulation targets, the placeholder factors that stand in for
//! measurements the pipeline does not take, and the decision thresholds.
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration, deserializable from a partial JSON document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub feel: FeelConfig,
    #[serde(default)]
    pub decision: DecisionConfig,
    #[serde(default)]
    pub commit_gate: CommitGateConfig,
}

impl PipelineConfig {
    /// Check every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.feel.validate()?;
        self.decision.validate()?;
        self.commit_gate.validate()
    }
}

/// Target behavior distribution for simulated playtests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_sessions")]
    pub sessions: usize,
    #[serde(default = "SimulationConfig::default_success_rate")]
    pub base_success_rate: f64,
    #[serde(default = "SimulationConfig::default_perfect_rate")]
    pub base_perfect_rate: f64,
    #[serde(default = "SimulationConfig::default_jitter")]
    pub jitter_range: f64,
}

impl SimulationConfig {
    const fn default_sessions() -> usize {
        30
    }

    const fn default_success_rate() -> f64 {
        0.70
    }

    const fn default_perfect_rate() -> f64 {
        0.10
    }

    const fn default_jitter() -> f64 {
        0.08
    }

    #[must_use]
    pub const fn with_sessions(mut self, sessions: usize) -> Self {
        self.sessions = sessions;
        self
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sessions == 0 {
            return Err(ConfigError::MinViolation {
                field: "simulation.sessions",
                min: 1.0,
                value: 0.0,
            });
        }
        open_unit("simulation.base_success_rate", self.base_success_rate)?;
        open_unit("simulation.base_perfect_rate", self.base_perfect_rate)?;
        if !self.jitter_range.is_finite() || self.jitter_range < 0.0 {
            return Err(ConfigError::MinViolation {
                field: "simulation.jitter_range",
                min: 0.0,
                value: self.jitter_range,
            });
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sessions: Self::default_sessions(),
            base_success_rate: Self::default_success_rate(),
            base_perfect_rate: Self::default_perfect_rate(),
            jitter_range: Self::default_jitter(),
        }
    }
}

/// FEEL-side settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeelConfig {
    /// Frame-rate signal. Not measured; a fixed stand-in until a real probe exists.
    #[serde(default = "FeelConfig::default_fps")]
    pub fps: f64,
}

impl FeelConfig {
    const fn default_fps() -> f64 {
        0.9
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the fps signal is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        closed_unit("feel.fps", self.fps)
    }
}

impl Default for FeelConfig {
    fn default() -> Self {
        Self {
            fps: Self::default_fps(),
        }
    }
}

/// Placeholder factors and thresholds for the ship decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    #[serde(default = "DecisionConfig::default_baseline")]
    pub performance: f64,
    #[serde(default = "DecisionConfig::default_baseline")]
    pub market: f64,
    #[serde(default = "DecisionConfig::default_baseline")]
    pub monetization: f64,
    #[serde(default = "DecisionConfig::default_compliance")]
    pub compliance: f64,
    #[serde(default = "DecisionConfig::default_build_threshold")]
    pub build_threshold: f64,
    #[serde(default = "DecisionConfig::default_tuning_floor")]
    pub tuning_floor: f64,
}

impl DecisionConfig {
    const fn default_baseline() -> f64 {
        0.8
    }

    const fn default_compliance() -> f64 {
        0.9
    }

    const fn default_build_threshold() -> f64 {
        0.85
    }

    const fn default_tuning_floor() -> f64 {
        0.7
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a factor leaves `[0, 1]` or the
    /// thresholds are inverted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        closed_unit("decision.performance", self.performance)?;
        closed_unit("decision.market", self.market)?;
        closed_unit("decision.monetization", self.monetization)?;
        closed_unit("decision.compliance", self.compliance)?;
        closed_unit("decision.build_threshold", self.build_threshold)?;
        closed_unit("decision.tuning_floor", self.tuning_floor)?;
        if self.tuning_floor >= self.build_threshold {
            return Err(ConfigError::ThresholdOrder {
                floor: self.tuning_floor,
                threshold: self.build_threshold,
            });
        }
        Ok(())
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            performance: Self::default_baseline(),
            market: Self::default_baseline(),
            monetization: Self::default_baseline(),
            compliance: Self::default_compliance(),
            build_threshold: Self::default_build_threshold(),
            tuning_floor: Self::default_tuning_floor(),
        }
    }
}

/// Quality gate guarding automatic commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitGateConfig {
    #[serde(default = "CommitGateConfig::default_min_score")]
    pub min_qa: f64,
    #[serde(default = "CommitGateConfig::default_min_score")]
    pub min_feel: f64,
    #[serde(default = "CommitGateConfig::default_tag_every")]
    pub tag_every: u64,
}

impl CommitGateConfig {
    const fn default_min_score() -> f64 {
        0.85
    }

    const fn default_tag_every() -> u64 {
        10
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a minimum leaves `[0, 1]` or tags are
    /// requested every zero builds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        closed_unit("commit_gate.min_qa", self.min_qa)?;
        closed_unit("commit_gate.min_feel", self.min_feel)?;
        if self.tag_every == 0 {
            return Err(ConfigError::MinViolation {
                field: "commit_gate.tag_every",
                min: 1.0,
                value: 0.0,
            });
        }
        Ok(())
    }
}

impl Default for CommitGateConfig {
    fn default() -> Self {
        Self {
            min_qa: Self::default_min_score(),
            min_feel: Self::default_min_score(),
            tag_every: Self::default_tag_every(),
        }
    }
}

fn open_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}

fn closed_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min: 0.0,
            max: 1.0,
            value,
        })
    }
}
