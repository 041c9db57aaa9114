//! Quality gate for automatic build commits.
use crate::config::CommitGateConfig;

/// Name used in commit messages when no game is active.
pub const UNKNOWN_GAME: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq)]
pub struct CommitGate {
    min_qa: f64,
    min_feel: f64,
    tag_every: u64,
}

impl Default for CommitGate {
    fn default() -> Self {
        Self::from_config(&CommitGateConfig::default())
    }
}

impl CommitGate {
    #[must_use]
    pub const fn from_config(config: &CommitGateConfig) -> Self {
        Self {
            min_qa: config.min_qa,
            min_feel: config.min_feel,
            tag_every: config.tag_every,
        }
    }

    #[must_use]
    pub const fn min_qa(&self) -> f64 {
        self.min_qa
    }

    #[must_use]
    pub const fn min_feel(&self) -> f64 {
        self.min_feel
    }

    #[must_use]
    pub fn allows(&self, qa_score: f64, feel_score: f64) -> bool {
        qa_score >= self.min_qa && feel_score >= self.min_feel
    }

    #[must_use]
    pub fn message(game: Option<&str>, qa_score: f64, feel_score: f64, build: u64) -> String {
        format!(
            "[AUTO][{}] FEEL={feel_score:.2} QA={qa_score:.2} BUILD={build}",
            game.unwrap_or(UNKNOWN_GAME)
        )
    }

    /// Release tag for `build`, if it lands on the tagging interval.
    #[must_use]
    pub fn tag_for(&self, build: u64) -> Option<String> {
        (self.tag_every > 0 && build % self.tag_every == 0).then(|| format!("v{build}"))
    }
}
