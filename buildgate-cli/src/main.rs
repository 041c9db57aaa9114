mod capture;
mod dispatch;
mod reports;
mod store;
mod vcs;

use anyhow::{Context, Result, bail};
use buildgate_core::{
    CommitOutcome, DecisionOutcome, Pipeline, PipelineConfig, SessionRecord, simulate_seeded,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stderr, stdout};
use std::path::{Path, PathBuf};

use capture::{read_capture, write_capture};
use dispatch::ConsoleDispatcher;
use reports::{
    ReportFormat, ReportOptions, write_decision_report, write_feel_report, write_qa_report, write_run_report,
    write_status_report,
};
use store::JsonFileStore;
use vcs::GitCli;

#[derive(Debug, Parser)]
#[command(name = "buildgate", version)]
#[command(about = "Simulated playtest QA, FEEL scoring and ship/no-ship decisions for game builds")]
struct Args {
    /// Memory document shared between runs
    #[arg(long, global = true, default_value = "docs/MEMORY.json")]
    state: PathBuf,

    /// JSON configuration overriding the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Include raw metrics in reports
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Simulate playtests and record the QA score
    Qa {
        /// Seed for a reproducible population
        #[arg(long)]
        seed: Option<u64>,
        /// Override the configured session count
        #[arg(long)]
        sessions: Option<usize>,
        /// Also write the simulated sessions to this CSV file
        #[arg(long)]
        capture: Option<PathBuf>,
    },
    /// Score FEEL and suggest tuning, from a capture file or a fresh simulation
    Feel {
        /// Read sessions from this CSV file instead of simulating
        #[arg(long)]
        capture: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Decide from the recorded scores and dispatch the next step
    Decide,
    /// QA, FEEL and decision over one simulated population
    Run {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        sessions: Option<usize>,
        /// Also write the simulated sessions to this CSV file
        #[arg(long)]
        capture: Option<PathBuf>,
    },
    /// Commit the working tree if the recorded scores clear the quality gate
    Commit {
        /// Repository to commit in
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },
    /// Inspect or edit the memory document
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum MemoryCommand {
    /// Show the current memory summary
    Status,
    /// Set the active game
    SetGame { name: String },
    /// Append a pending task
    AddTask { task: String },
    /// Mark the pending entry at INDEX completed
    CompleteTask { index: usize },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.output.is_some() {
        colored::control::set_override(false);
    }
    if run(&args)? {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// Execute one command. `Ok(false)` means it ran but did not reach its goal.
fn run(args: &Args) -> Result<bool> {
    let mut config = load_config(args.config.as_deref())?;
    if let Command::Qa {
        sessions: Some(sessions),
        ..
    }
    | Command::Run {
        sessions: Some(sessions),
        ..
    } = &args.command
    {
        config.simulation.sessions = *sessions;
    }
    let pipeline = Pipeline::with_config(JsonFileStore::new(&args.state), config)
        .context("invalid pipeline configuration")?;
    let mut output_target = OutputTarget::new(args.output.clone())?;
    let options = ReportOptions::new(args.verbose, pipeline.matrix());

    let reached = match &args.command {
        Command::Qa { seed, capture, .. } => {
            announce_banner(args);
            let records = simulate(&pipeline, *seed)?;
            save_capture(&pipeline, capture.as_deref(), &records)?;
            let report = pipeline.run_qa(&records)?;
            write_qa_report(&mut output_target, args.report, &report, &options)?;
            true
        }
        Command::Feel { capture, seed } => {
            announce_banner(args);
            let records = match capture {
                Some(path) => read_capture(path)
                    .with_context(|| format!("failed to read capture {}", path.display()))?,
                None => simulate(&pipeline, *seed)?,
            };
            let report = pipeline.run_feel(&records)?;
            write_feel_report(&mut output_target, args.report, &report, &options)?;
            true
        }
        Command::Decide => {
            announce_banner(args);
            let outcome = decide(args, &pipeline)?;
            write_decision_report(&mut output_target, args.report, &outcome, &options)?;
            ensure_dispatched(&outcome, &mut output_target)?
        }
        Command::Run { seed, capture, .. } => {
            announce_banner(args);
            let records = simulate(&pipeline, *seed)?;
            save_capture(&pipeline, capture.as_deref(), &records)?;
            let qa = pipeline.run_qa(&records)?;
            let feel = pipeline.run_feel(&records)?;
            let outcome = decide(args, &pipeline)?;
            write_run_report(
                &mut output_target,
                args.report,
                &qa,
                &feel,
                &outcome,
                &options,
            )?;
            ensure_dispatched(&outcome, &mut output_target)?
        }
        Command::Commit { repo } => {
            announce_banner(args);
            match pipeline.commit_build(&GitCli::new(repo))? {
                CommitOutcome::GateNotMet => {
                    let status = pipeline.status()?;
                    writeln!(
                        output_target,
                        "⚠️  Quality gates not met: QA={:.2}, FEEL={:.2}",
                        status.last_qa, status.last_feel
                    )?;
                    false
                }
                CommitOutcome::Committed { message, tag, .. } => {
                    writeln!(output_target, "✅ Commit successful: {message}")?;
                    if let Some(tag) = tag {
                        writeln!(output_target, "🏷️  Created tag: {tag}")?;
                    }
                    true
                }
            }
        }
        Command::Memory { action } => {
            match action {
                MemoryCommand::Status => {}
                MemoryCommand::SetGame { name } => pipeline.set_active_game(name)?,
                MemoryCommand::AddTask { task } => {
                    let index = pipeline.add_task(task)?;
                    log::info!("added task {index}");
                }
                MemoryCommand::CompleteTask { index } => {
                    pipeline.complete_task(*index)?;
                }
            }
            write_status_report(&mut output_target, args.report, &pipeline.status()?)?;
            true
        }
    };

    output_target.flush_inner()?;
    Ok(reached)
}

fn announce_banner(args: &Args) {
    // keep stdout clean for machine-readable output
    if args.report == ReportFormat::Json && args.output.is_none() {
        return;
    }
    println!("{}", "🏗️  Buildgate".bright_cyan().bold());
    println!("{}", "============".cyan());
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

fn simulate(pipeline: &Pipeline<JsonFileStore>, seed: Option<u64>) -> Result<Vec<SessionRecord>> {
    let records = match seed {
        Some(seed) => simulate_seeded(&pipeline.config().simulation, seed)?,
        None => pipeline.simulate(&mut rand::thread_rng())?,
    };
    Ok(records)
}

fn save_capture(
    pipeline: &Pipeline<JsonFileStore>,
    path: Option<&Path>,
    records: &[SessionRecord],
) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let game = pipeline.load_state()?.active_game;
    write_capture(path, records, game.as_deref(), chrono::Utc::now())
        .with_context(|| format!("failed to write capture {}", path.display()))?;
    log::info!("wrote {} sessions to {}", records.len(), path.display());
    Ok(())
}

fn decide(args: &Args, pipeline: &Pipeline<JsonFileStore>) -> Result<DecisionOutcome> {
    // instructions go to stderr when stdout carries JSON
    let sink: Box<dyn Write> = if args.report == ReportFormat::Json && args.output.is_none() {
        Box::new(stderr())
    } else {
        Box::new(stdout())
    };
    Ok(pipeline.run_decision(&ConsoleDispatcher::new(sink))?)
}

fn ensure_dispatched(outcome: &DecisionOutcome, output_target: &mut OutputTarget) -> Result<bool> {
    if let Some(err) = &outcome.dispatch_error {
        output_target.flush_inner()?;
        bail!("decision {} recorded but {err}", outcome.record.decision);
    }
    Ok(true)
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildgate_core::{MemoryState, MemoryStore};

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "buildgate-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    fn base_args(label: &str, command: Command) -> Args {
        let dir = temp_path(label);
        Args {
            state: dir.join("MEMORY.json"),
            config: None,
            report: ReportFormat::Json,
            output: Some(dir.join("report.json")),
            verbose: false,
            command,
        }
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "buildgate",
            "qa",
            "--seed",
            "7",
            "--report",
            "markdown",
            "--state",
            "tmp/MEMORY.json",
        ])
        .unwrap();
        assert_eq!(args.report, ReportFormat::Markdown);
        assert_eq!(args.state, PathBuf::from("tmp/MEMORY.json"));
        assert!(matches!(args.command, Command::Qa { seed: Some(7), .. }));
    }

    #[test]
    fn parses_memory_subcommands() {
        let args = Args::try_parse_from(["buildgate", "memory", "complete-task", "2"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Memory {
                action: MemoryCommand::CompleteTask { index: 2 }
            }
        ));
        assert_eq!(args.state, PathBuf::from("docs/MEMORY.json"));
    }

    #[test]
    fn missing_config_path_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
        assert!(load_config(Some(temp_path("absent-config").as_path())).is_err());
    }

    #[test]
    fn partial_config_file_overrides_named_fields() {
        let path = temp_path("config");
        std::fs::write(&path, r#"{"feel": {"fps": 0.6}}"#).unwrap();
        let config = load_config(Some(path.as_path())).unwrap();
        assert!((config.feel.fps - 0.6).abs() < f64::EPSILON);
        assert_eq!(config.simulation.sessions, 30);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn qa_command_persists_score() {
        let args = base_args(
            "qa",
            Command::Qa {
                seed: Some(5),
                sessions: Some(40),
                capture: None,
            },
        );
        std::fs::create_dir_all(args.state.parent().unwrap()).unwrap();
        assert!(run(&args).unwrap());

        let state = JsonFileStore::new(&args.state).load().unwrap().unwrap();
        assert!(state.last_qa_score > 0.0);
        let report = std::fs::read_to_string(args.output.as_ref().unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["sessions"], 40);
    }

    #[test]
    fn commit_reports_unmet_gate() {
        let args = base_args(
            "commit",
            Command::Commit {
                repo: PathBuf::from("."),
            },
        );
        std::fs::create_dir_all(args.state.parent().unwrap()).unwrap();
        JsonFileStore::new(&args.state)
            .save(&MemoryState::default())
            .unwrap();
        assert!(!run(&args).unwrap());
        let report = std::fs::read_to_string(args.output.as_ref().unwrap()).unwrap();
        assert!(report.contains("Quality gates not met: QA=0.00, FEEL=0.00"));
    }
}
