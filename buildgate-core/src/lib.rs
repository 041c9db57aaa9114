//! Buildgate decision pipeline
//!
//! Platform-agnostic core: playtest simulation, QA/FEEL scoring, tuning
//! recommendations and the ship decision. Storage, dispatch and version
//! control are reached only through the traits defined here.

pub mod commit;
pub mod config;
pub mod decision;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod numbers;
pub mod recommend;
pub mod scoring;
pub mod session;
pub mod simulator;
mod timestamps;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub use commit::{CommitGate, UNKNOWN_GAME};
pub use config::{CommitGateConfig, DecisionConfig, FeelConfig, PipelineConfig, SimulationConfig};
pub use decision::{
    Collaborator, Decision, DecisionMatrix, DecisionRecord, Instruction, TuningAction,
    TuningParameters,
};
pub use error::{AdapterError, ConfigError, PipelineError};
pub use memory::{EntryStatus, MemoryState, MemoryStatus, PendingEntry, TaskEntry};
pub use metrics::{ComponentScore, MetricSet, NEUTRAL_METRIC, SessionAggregates};
pub use recommend::{
    Priority, QA_ACCEPTABLE, QaArea, QaFinding, Recommendation, RecommendationCategory,
    by_priority, qa_findings, recommend,
};
pub use scoring::{FeelMetrics, QaMetrics, ScoreResult, score_population};
pub use session::SessionRecord;
pub use simulator::{simulate_batch, simulate_seeded};

/// Trait for abstracting the persisted memory document.
/// Platform-specific implementations should provide this
pub trait MemoryStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the whole document, `None` if it has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing document cannot be read or parsed.
    fn load(&self) -> Result<Option<MemoryState>, Self::Error>;

    /// Replace the whole document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written. The previous
    /// document must then be left intact.
    fn save(&self, state: &MemoryState) -> Result<(), Self::Error>;
}

/// Receives decision instructions. Never executes them on the pipeline's behalf.
pub trait Dispatcher {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the collaborator rejects the instruction.
    fn dispatch(&self, instruction: &Instruction) -> Result<(), Self::Error>;
}

/// Source-control side of an automatic build commit.
pub trait VersionControl {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Stage everything and commit with `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if staging or committing fails.
    fn commit(&self, message: &str) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the tag cannot be created.
    fn tag(&self, name: &str) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    pub sessions: usize,
    pub score: f64,
    /// Commit gate minimum the score is held against.
    pub target: f64,
    pub passed: bool,
    pub metrics: QaMetrics,
    pub components: Vec<ComponentScore>,
    pub findings: Vec<QaFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeelReport {
    pub sessions: usize,
    pub score: f64,
    pub target: f64,
    pub passed: bool,
    pub metrics: FeelMetrics,
    pub components: Vec<ComponentScore>,
    pub recommendations: Vec<Recommendation>,
}

impl FeelReport {
    /// Points still needed to reach the target, 0 once it is met.
    #[must_use]
    pub fn shortfall(&self) -> f64 {
        (self.target - self.score).max(0.0)
    }
}

/// Result of the decision stage. The record is already persisted whether
/// or not dispatch succeeded.
#[derive(Debug)]
pub struct DecisionOutcome {
    pub record: DecisionRecord,
    pub instruction: Instruction,
    pub components: Vec<ComponentScore>,
    pub dispatch_error: Option<PipelineError>,
}

impl DecisionOutcome {
    #[must_use]
    pub const fn dispatched(&self) -> bool {
        self.dispatch_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    GateNotMet,
    Committed {
        build: u64,
        message: String,
        tag: Option<String>,
    },
}

/// Drives the pipeline stages against one memory store.
///
/// Every operation is a single load, mutate, save cycle over the whole
/// document. Runs against the same store are not synchronized here: callers
/// must ensure only one runs at a time.
pub struct Pipeline<S>
where
    S: MemoryStore,
{
    store: S,
    config: PipelineConfig,
    matrix: DecisionMatrix,
    gate: CommitGate,
}

impl<S> Pipeline<S>
where
    S: MemoryStore,
{
    /// Create a pipeline with default configuration
    pub fn new(store: S) -> Self {
        let config = PipelineConfig::default();
        Self {
            matrix: DecisionMatrix::from_config(&config.decision),
            gate: CommitGate::from_config(&config.commit_gate),
            store,
            config,
        }
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if `config` fails validation.
    pub fn with_config(store: S, config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            matrix: DecisionMatrix::from_config(&config.decision),
            gate: CommitGate::from_config(&config.commit_gate),
            store,
            config,
        })
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub const fn matrix(&self) -> &DecisionMatrix {
        &self.matrix
    }

    /// Current memory, or the documented default if nothing was persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Persistence`] if the store cannot be read.
    pub fn load_state(&self) -> Result<MemoryState, PipelineError> {
        match self.store.load().map_err(PipelineError::persistence)? {
            Some(state) => Ok(state),
            None => {
                log::info!("no persisted memory; starting from defaults");
                Ok(MemoryState::default())
            }
        }
    }

    fn update<T>(
        &self,
        mutate: impl FnOnce(&mut MemoryState) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let mut state = self.load_state()?;
        let out = mutate(&mut state)?;
        state.revision = state.revision.saturating_add(1);
        self.store.save(&state).map_err(PipelineError::persistence)?;
        log::info!("persisted memory revision {}", state.revision);
        Ok(out)
    }

    /// Simulate a batch using the configured distribution.
    ///
    /// # Errors
    ///
    /// See [`simulate_batch`].
    pub fn simulate<R: Rng>(&self, rng: &mut R) -> Result<Vec<SessionRecord>, PipelineError> {
        simulate_batch(rng, &self.config.simulation)
    }

    /// Score QA and overwrite the persisted QA score.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a record that breaks its
    /// invariants, or [`PipelineError::Persistence`] if the store fails.
    pub fn run_qa(&self, records: &[SessionRecord]) -> Result<QaReport, PipelineError> {
        validate_records(records)?;
        let metrics = QaMetrics::from_records(records);
        let score = metrics.score();
        let report = QaReport {
            sessions: records.len(),
            score,
            target: self.gate.min_qa(),
            passed: score >= self.gate.min_qa(),
            components: metrics.components(),
            findings: metrics.findings(),
            metrics,
        };
        log::debug!("QA score {:.3} over {} sessions", report.score, report.sessions);
        self.update(|state| {
            state.last_qa_score = report.score;
            Ok(())
        })?;
        Ok(report)
    }

    /// Score FEEL, derive recommendations and overwrite the persisted FEEL score.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::run_qa`].
    pub fn run_feel(&self, records: &[SessionRecord]) -> Result<FeelReport, PipelineError> {
        validate_records(records)?;
        let metrics = FeelMetrics::from_records(records, &self.config.feel);
        let score = metrics.score();
        let report = FeelReport {
            sessions: records.len(),
            score,
            target: self.gate.min_feel(),
            passed: score >= self.gate.min_feel(),
            components: metrics.components(),
            recommendations: recommend(&metrics),
            metrics,
        };
        log::debug!(
            "FEEL score {:.3} over {} sessions ({} recommendations)",
            report.score,
            report.sessions,
            report.recommendations.len()
        );
        self.update(|state| {
            state.last_feel_score = report.score;
            Ok(())
        })?;
        Ok(report)
    }

    /// Decide from the persisted scores, append the record, persist, then dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Persistence`] if the store fails, or
    /// [`PipelineError::InvalidArgument`] if the persisted scores are out of
    /// range. A dispatch failure is reported in the outcome instead.
    pub fn run_decision<D: Dispatcher>(
        &self,
        dispatcher: &D,
    ) -> Result<DecisionOutcome, PipelineError> {
        self.run_decision_at(dispatcher, Utc::now())
    }

    /// [`Pipeline::run_decision`] with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run_decision`].
    pub fn run_decision_at<D: Dispatcher>(
        &self,
        dispatcher: &D,
        at: DateTime<Utc>,
    ) -> Result<DecisionOutcome, PipelineError> {
        let (record, build) = self.update(|state| {
            let record =
                self.matrix
                    .decide_at(state.last_qa_score, state.last_feel_score, at)?;
            state.push_decision(record.clone());
            Ok((record, state.build_number))
        })?;
        log::info!("{}: {}", record.decision, record.reasoning);

        let instruction = Instruction::for_record(&record, build);
        let dispatch_error = match dispatcher.dispatch(&instruction) {
            Ok(()) => None,
            Err(err) => {
                log::warn!("dispatch to {} failed: {err}", instruction.target);
                Some(PipelineError::Dispatch {
                    target: instruction.target.to_string(),
                    reason: err.to_string(),
                })
            }
        };

        Ok(DecisionOutcome {
            components: self
                .matrix
                .components(record.qa_score, record.feel_score),
            record,
            instruction,
            dispatch_error,
        })
    }

    /// Commit the current build if the persisted scores clear the gate.
    ///
    /// The build number only advances after the commit (and tag, when due)
    /// succeed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Vcs`] if version control fails, or
    /// [`PipelineError::Persistence`] if the store fails.
    pub fn commit_build<V: VersionControl>(&self, vcs: &V) -> Result<CommitOutcome, PipelineError> {
        let state = self.load_state()?;
        if !self.gate.allows(state.last_qa_score, state.last_feel_score) {
            log::info!(
                "commit gate not met: QA={:.2} FEEL={:.2}",
                state.last_qa_score,
                state.last_feel_score
            );
            return Ok(CommitOutcome::GateNotMet);
        }

        let build = state.build_number.saturating_add(1);
        let message = CommitGate::message(
            state.active_game.as_deref(),
            state.last_qa_score,
            state.last_feel_score,
            build,
        );
        vcs.commit(&message).map_err(PipelineError::vcs)?;
        let tag = self.gate.tag_for(build);
        if let Some(name) = &tag {
            vcs.tag(name).map_err(PipelineError::vcs)?;
        }

        self.update(|state| {
            state.build_number = build;
            Ok(())
        })?;
        log::info!("committed build {build}");
        Ok(CommitOutcome::Committed {
            build,
            message,
            tag,
        })
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::Persistence`] if the store cannot be read.
    pub fn status(&self) -> Result<MemoryStatus, PipelineError> {
        Ok(self.load_state()?.status())
    }

    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a blank name, or
    /// [`PipelineError::Persistence`] if the store fails.
    pub fn set_active_game(&self, name: &str) -> Result<(), PipelineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PipelineError::invalid("active_game", "name is empty"));
        }
        self.update(|state| {
            state.active_game = Some(name.to_string());
            Ok(())
        })
    }

    /// Append a pending task and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidArgument`] for a blank task, or
    /// [`PipelineError::Persistence`] if the store fails.
    pub fn add_task(&self, task: &str) -> Result<usize, PipelineError> {
        let task = task.trim();
        if task.is_empty() {
            return Err(PipelineError::invalid("task", "task text is empty"));
        }
        let at = Utc::now();
        self.update(|state| Ok(state.push_task(task, at)))
    }

    /// # Errors
    ///
    /// See [`MemoryState::complete_task`]; also [`PipelineError::Persistence`].
    pub fn complete_task(&self, index: usize) -> Result<TaskEntry, PipelineError> {
        let at = Utc::now();
        self.update(|state| state.complete_task(index, at).cloned())
    }
}

fn validate_records(records: &[SessionRecord]) -> Result<(), PipelineError> {
    records.iter().try_for_each(SessionRecord::validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryCell {
        state: Rc<RefCell<Option<MemoryState>>>,
    }

    impl MemoryStore for MemoryCell {
        type Error = Infallible;

        fn load(&self) -> Result<Option<MemoryState>, Self::Error> {
            Ok(self.state.borrow().clone())
        }

        fn save(&self, state: &MemoryState) -> Result<(), Self::Error> {
            *self.state.borrow_mut() = Some(state.clone());
            Ok(())
        }
    }

    struct Silent;

    impl Dispatcher for Silent {
        type Error = Infallible;

        fn dispatch(&self, _instruction: &Instruction) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn fresh_store_decides_return_to_design() {
        let pipeline = Pipeline::new(MemoryCell::default());
        let outcome = pipeline.run_decision(&Silent).unwrap();
        assert_eq!(outcome.record.decision, Decision::ReturnToGdd);
        assert!(outcome.dispatched());
        assert_eq!(outcome.components.len(), 6);

        let state = pipeline.load_state().unwrap();
        assert_eq!(state.decisions().count(), 1);
        assert_eq!(state.revision, 1);
    }

    #[test]
    fn scoring_stages_overwrite_scores() {
        let store = MemoryCell::default();
        let pipeline = Pipeline::new(store.clone());
        let records = simulate_seeded(&SimulationConfig::default(), 11).unwrap();

        let qa = pipeline.run_qa(&records).unwrap();
        let feel = pipeline.run_feel(&records).unwrap();
        let state = store.load().unwrap().expect("saved");
        assert!((state.last_qa_score - qa.score).abs() < f64::EPSILON);
        assert!((state.last_feel_score - feel.score).abs() < f64::EPSILON);
        assert_eq!(state.revision, 2);
        assert!(state.pending_entries.is_empty());
    }

    #[test]
    fn reports_carry_the_configured_gate() {
        let config = PipelineConfig {
            commit_gate: CommitGateConfig {
                min_qa: 0.2,
                min_feel: 0.99,
                ..CommitGateConfig::default()
            },
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::with_config(MemoryCell::default(), config).unwrap();
        let records = simulate_seeded(&SimulationConfig::default(), 11).unwrap();

        let qa = pipeline.run_qa(&records).unwrap();
        assert!((qa.target - 0.2).abs() < f64::EPSILON);
        assert!(qa.passed);
        assert_eq!(qa.findings, qa.metrics.findings());

        let feel = pipeline.run_feel(&records).unwrap();
        assert!(!feel.passed);
        assert!((feel.shortfall() - (0.99 - feel.score)).abs() < 1e-12);
    }

    #[test]
    fn invalid_records_leave_state_untouched() {
        let store = MemoryCell::default();
        let pipeline = Pipeline::new(store.clone());
        let bad = SessionRecord {
            id: 1,
            success: false,
            perfect: true,
            duration_seconds: 40.0,
            restart_count: 0,
            fail_point: 0.4,
            perfect_count: 1,
        };
        assert!(matches!(
            pipeline.run_qa(&[bad]),
            Err(PipelineError::InvalidArgument { .. })
        ));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn rejects_invalid_config() {
        let config = PipelineConfig {
            decision: DecisionConfig {
                tuning_floor: 0.95,
                ..DecisionConfig::default()
            },
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::with_config(MemoryCell::default(), config),
            Err(PipelineError::Config(ConfigError::ThresholdOrder { .. }))
        ));
    }

    #[test]
    fn task_lifecycle_through_pipeline() {
        let pipeline = Pipeline::new(MemoryCell::default());
        pipeline.set_active_game("slicer").unwrap();
        let index = pipeline.add_task("tighten hitboxes").unwrap();
        assert_eq!(pipeline.status().unwrap().pending_tasks, 1);

        let task = pipeline.complete_task(index).unwrap();
        assert_eq!(task.status, EntryStatus::Completed);
        let status = pipeline.status().unwrap();
        assert_eq!(status.active_game.as_deref(), Some("slicer"));
        assert_eq!(status.pending_tasks, 0);
        assert_eq!(status.pending_entries, 1);

        assert!(pipeline.add_task("   ").is_err());
        assert!(matches!(
            pipeline.complete_task(9),
            Err(PipelineError::EntryNotFound { index: 9 })
        ));
    }
}
