use anyhow::Result;
use buildgate_core::{
    ComponentScore, Decision, DecisionMatrix, DecisionOutcome, DecisionRecord, FeelReport,
    Instruction, MemoryStatus, MetricSet, QA_ACCEPTABLE, QaFinding, QaReport, Recommendation,
    by_priority,
};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Colored summary for a terminal
    Console,
    /// Markdown document
    Markdown,
    /// Pretty-printed JSON
    Json,
}

/// Detail level and the configured decision bands used for coloring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub verbose: bool,
    pub build_threshold: f64,
    pub tuning_floor: f64,
}

impl ReportOptions {
    pub const fn new(verbose: bool, matrix: &DecisionMatrix) -> Self {
        Self {
            verbose,
            build_threshold: matrix.build_threshold(),
            tuning_floor: matrix.tuning_floor(),
        }
    }
}

pub fn write_qa_report<W: Write + ?Sized>(
    out: &mut W,
    format: ReportFormat,
    report: &QaReport,
    options: &ReportOptions,
) -> Result<()> {
    match format {
        ReportFormat::Json => write_json(out, report),
        ReportFormat::Markdown => {
            writeln!(out, "# QA Report\n")?;
            writeln!(out, "- **Sessions**: {}", report.sessions)?;
            writeln!(out, "- **QA score**: {:.3}", report.score)?;
            writeln!(
                out,
                "- **Status**: {} (target {:.2})\n",
                pass_fail(report.passed),
                report.target
            )?;
            writeln!(out, "## Components\n")?;
            markdown_components(out, &report.components)?;
            writeln!(out, "\n## Recommendations\n")?;
            markdown_findings(out, &report.findings)?;
            if options.verbose {
                writeln!(out, "\n## Raw metrics\n")?;
                markdown_metrics(out, &report.metrics.to_metric_set())?;
            }
            Ok(())
        }
        ReportFormat::Console => {
            writeln!(out, "{}", "🧪 QA Report".bright_cyan().bold())?;
            writeln!(out, "{}", "============".cyan())?;
            writeln!(out, "Sessions: {}", report.sessions)?;
            writeln!(
                out,
                "QA score: {}",
                score_label(report.score, report.target, options.tuning_floor)
            )?;
            writeln!(out, "Status: {}", status_label(report.passed, report.target))?;
            writeln!(out)?;
            console_components(out, &report.components)?;
            writeln!(out)?;
            console_findings(out, &report.findings)?;
            if options.verbose {
                writeln!(out)?;
                console_metrics(out, &report.metrics.to_metric_set())?;
            }
            Ok(())
        }
    }
}

pub fn write_feel_report<W: Write + ?Sized>(
    out: &mut W,
    format: ReportFormat,
    report: &FeelReport,
    options: &ReportOptions,
) -> Result<()> {
    match format {
        ReportFormat::Json => write_json(out, report),
        ReportFormat::Markdown => {
            writeln!(out, "# FEEL Report\n")?;
            writeln!(out, "- **Sessions**: {}", report.sessions)?;
            writeln!(out, "- **FEEL score**: {:.3}", report.score)?;
            writeln!(
                out,
                "- **Status**: {} (target {:.2})\n",
                pass_fail(report.passed),
                report.target
            )?;
            writeln!(out, "## Components\n")?;
            markdown_components(out, &report.components)?;
            if options.verbose {
                writeln!(out, "\n## Raw metrics\n")?;
                markdown_metrics(out, &report.metrics.to_metric_set())?;
            }
            writeln!(out, "\n## Recommendations\n")?;
            markdown_recommendations(out, &report.recommendations)?;
            writeln!(out, "\n## Expected outcome\n")?;
            writeln!(out, "- **Target FEEL score**: {:.2}", report.target)?;
            writeln!(
                out,
                "- **Estimated improvement**: +{:.3} points needed",
                report.shortfall()
            )?;
            Ok(())
        }
        ReportFormat::Console => {
            writeln!(out, "{}", "🎯 FEEL Report".bright_cyan().bold())?;
            writeln!(out, "{}", "==============".cyan())?;
            writeln!(out, "Sessions: {}", report.sessions)?;
            writeln!(
                out,
                "FEEL score: {}",
                score_label(report.score, report.target, options.tuning_floor)
            )?;
            writeln!(out, "Status: {}", status_label(report.passed, report.target))?;
            if !report.passed {
                writeln!(out, "Improvement needed: +{:.3}", report.shortfall())?;
            }
            writeln!(out)?;
            console_components(out, &report.components)?;
            if options.verbose {
                writeln!(out)?;
                console_metrics(out, &report.metrics.to_metric_set())?;
            }
            writeln!(out)?;
            console_recommendations(out, &report.recommendations)
        }
    }
}

#[derive(Serialize)]
struct DecisionView<'a> {
    record: &'a DecisionRecord,
    instruction: &'a Instruction,
    components: &'a [ComponentScore],
    follow_up: &'a [&'static str],
    dispatched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatch_error: Option<String>,
}

impl<'a> DecisionView<'a> {
    fn new(outcome: &'a DecisionOutcome) -> Self {
        Self {
            record: &outcome.record,
            instruction: &outcome.instruction,
            components: &outcome.components,
            follow_up: outcome.record.decision.follow_up(),
            dispatched: outcome.dispatched(),
            dispatch_error: outcome.dispatch_error.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Serialize)]
struct RunView<'a> {
    qa: &'a QaReport,
    feel: &'a FeelReport,
    decision: DecisionView<'a>,
}

/// QA, FEEL and decision for one population. JSON output is a single document.
pub fn write_run_report<W: Write + ?Sized>(
    out: &mut W,
    format: ReportFormat,
    qa: &QaReport,
    feel: &FeelReport,
    outcome: &DecisionOutcome,
    options: &ReportOptions,
) -> Result<()> {
    if format == ReportFormat::Json {
        return write_json(
            out,
            &RunView {
                qa,
                feel,
                decision: DecisionView::new(outcome),
            },
        );
    }
    write_qa_report(out, format, qa, options)?;
    writeln!(out)?;
    write_feel_report(out, format, feel, options)?;
    writeln!(out)?;
    write_decision_report(out, format, outcome, options)
}

pub fn write_decision_report<W: Write + ?Sized>(
    out: &mut W,
    format: ReportFormat,
    outcome: &DecisionOutcome,
    options: &ReportOptions,
) -> Result<()> {
    let record = &outcome.record;
    let follow_up = record.decision.follow_up();
    match format {
        ReportFormat::Json => write_json(out, &DecisionView::new(outcome)),
        ReportFormat::Markdown => {
            writeln!(out, "# Build Decision\n")?;
            writeln!(out, "- **Decision**: {}", record.decision)?;
            writeln!(out, "- **Weighted score**: {:.3}", record.weighted_score)?;
            writeln!(
                out,
                "- **Thresholds**: export ≥ {:.2}, tuning ≥ {:.2}",
                options.build_threshold, options.tuning_floor
            )?;
            writeln!(out, "- **Reasoning**: {}", record.reasoning)?;
            writeln!(out, "- **Next action**: {}", record.next_action)?;
            writeln!(out, "- **Timestamp**: {}\n", record.timestamp.to_rfc3339())?;
            writeln!(out, "## Components\n")?;
            markdown_components(out, &outcome.components)?;
            writeln!(out, "\n## Follow-up\n")?;
            for step in follow_up {
                writeln!(out, "- {step}")?;
            }
            if let Some(err) = &outcome.dispatch_error {
                writeln!(out, "\n> Dispatch failed: {err}")?;
            }
            Ok(())
        }
        ReportFormat::Console => {
            writeln!(out, "{}", "🚦 Build Decision".bright_cyan().bold())?;
            writeln!(out, "{}", "=================".cyan())?;
            let label = match record.decision {
                Decision::BuildExport => record.decision.as_str().green().bold(),
                Decision::TuningRequired => record.decision.as_str().yellow().bold(),
                Decision::ReturnToGdd => record.decision.as_str().red().bold(),
            };
            writeln!(out, "Decision: {label}")?;
            writeln!(
                out,
                "Weighted score: {} (export ≥ {:.2}, tuning ≥ {:.2})",
                score_label(
                    record.weighted_score,
                    options.build_threshold,
                    options.tuning_floor
                ),
                options.build_threshold,
                options.tuning_floor
            )?;
            writeln!(out, "Reasoning: {}", record.reasoning)?;
            writeln!(out, "Next action: {}", record.next_action)?;
            writeln!(out)?;
            console_components(out, &outcome.components)?;
            writeln!(out)?;
            writeln!(out, "Follow-up:")?;
            for step in follow_up {
                writeln!(out, "  • {step}")?;
            }
            if let Some(err) = &outcome.dispatch_error {
                writeln!(out, "{} {err}", "❌ Dispatch failed:".red())?;
            }
            Ok(())
        }
    }
}

pub fn write_status_report<W: Write + ?Sized>(
    out: &mut W,
    format: ReportFormat,
    status: &MemoryStatus,
) -> Result<()> {
    let game = status.active_game.as_deref().unwrap_or("none");
    match format {
        ReportFormat::Json => write_json(out, status),
        ReportFormat::Markdown => {
            writeln!(out, "# Memory Status\n")?;
            writeln!(out, "- **Active game**: {game}")?;
            writeln!(out, "- **Build**: {}", status.build)?;
            writeln!(out, "- **Last QA**: {:.3}", status.last_qa)?;
            writeln!(out, "- **Last FEEL**: {:.3}", status.last_feel)?;
            writeln!(
                out,
                "- **Pending tasks**: {} ({} entries logged)",
                status.pending_tasks, status.pending_entries
            )?;
            Ok(())
        }
        ReportFormat::Console => {
            writeln!(out, "{}", "🧠 Memory Status".bright_cyan().bold())?;
            writeln!(out, "{}", "================".cyan())?;
            writeln!(out, "Active game: {game}")?;
            writeln!(out, "Build: {}", status.build)?;
            writeln!(out, "Last QA: {:.3}", status.last_qa)?;
            writeln!(out, "Last FEEL: {:.3}", status.last_feel)?;
            writeln!(
                out,
                "Pending tasks: {} ({} entries logged)",
                status.pending_tasks, status.pending_entries
            )?;
            Ok(())
        }
    }
}

fn write_json<W: Write + ?Sized, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    let json_output = serde_json::to_string_pretty(value)?;
    writeln!(out, "{json_output}")?;
    Ok(())
}

fn score_label(score: f64, pass: f64, floor: f64) -> colored::ColoredString {
    let text = format!("{score:.3}");
    if score >= pass {
        text.green().bold()
    } else if score >= floor {
        text.yellow().bold()
    } else {
        text.red().bold()
    }
}

const fn pass_fail(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn status_label(passed: bool, target: f64) -> colored::ColoredString {
    let text = format!("{} (target {target:.2})", pass_fail(passed));
    if passed {
        text.green().bold()
    } else {
        text.red().bold()
    }
}

fn markdown_findings<W: Write + ?Sized>(out: &mut W, findings: &[QaFinding]) -> Result<()> {
    if findings.is_empty() {
        writeln!(out, "- **Overall**: {QA_ACCEPTABLE}")?;
    }
    for finding in findings {
        writeln!(out, "- **{}**: {}", finding.area, finding.note)?;
    }
    Ok(())
}

fn console_findings<W: Write + ?Sized>(out: &mut W, findings: &[QaFinding]) -> Result<()> {
    if findings.is_empty() {
        writeln!(out, "✅ {QA_ACCEPTABLE}")?;
        return Ok(());
    }
    writeln!(out, "{}", "🔧 QA Recommendations".bright_yellow().bold())?;
    for finding in findings {
        writeln!(out, "  • {}: {}", finding.area, finding.note)?;
    }
    Ok(())
}

fn markdown_components<W: Write + ?Sized>(out: &mut W, rows: &[ComponentScore]) -> Result<()> {
    writeln!(out, "| Component | Score | Weight | Contribution |")?;
    writeln!(out, "|---|---|---|---|")?;
    for row in rows {
        writeln!(
            out,
            "| {} | {:.3} | {:.2} | {:.3} |",
            row.name, row.score, row.weight, row.contribution
        )?;
    }
    Ok(())
}

fn console_components<W: Write + ?Sized>(out: &mut W, rows: &[ComponentScore]) -> Result<()> {
    writeln!(
        out,
        "{:<18} {:>7} {:>7} {:>13}",
        "Component", "Score", "Weight", "Contribution"
    )?;
    writeln!(out, "{}", "-".repeat(48))?;
    for row in rows {
        writeln!(
            out,
            "{:<18} {:>7.3} {:>7.2} {:>13.3}",
            row.name, row.score, row.weight, row.contribution
        )?;
    }
    Ok(())
}

fn markdown_metrics<W: Write + ?Sized>(out: &mut W, metrics: &MetricSet) -> Result<()> {
    for (name, value) in metrics.iter() {
        writeln!(out, "- `{name}`: {value:.3}")?;
    }
    Ok(())
}

fn console_metrics<W: Write + ?Sized>(out: &mut W, metrics: &MetricSet) -> Result<()> {
    writeln!(out, "Raw metrics:")?;
    for (name, value) in metrics.iter() {
        writeln!(out, "  {name:<18} {value:.3}")?;
    }
    Ok(())
}

fn markdown_recommendations<W: Write + ?Sized>(
    out: &mut W,
    recommendations: &[Recommendation],
) -> Result<()> {
    if recommendations.is_empty() {
        writeln!(out, "_No tuning needed._")?;
        return Ok(());
    }
    let (high, medium) = by_priority(recommendations);
    for (heading, group) in [("High priority", high), ("Medium priority", medium)] {
        if group.is_empty() {
            continue;
        }
        writeln!(out, "### {heading}\n")?;
        for rec in group {
            writeln!(
                out,
                "- **{}**: {} ({}; expected {})",
                rec.category, rec.description, rec.action, rec.estimated_impact
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn console_recommendations<W: Write + ?Sized>(
    out: &mut W,
    recommendations: &[Recommendation],
) -> Result<()> {
    if recommendations.is_empty() {
        writeln!(out, "✅ No tuning needed")?;
        return Ok(());
    }
    writeln!(out, "{}", "🔧 Tuning Recommendations".bright_yellow().bold())?;
    let (high, medium) = by_priority(recommendations);
    for rec in high {
        writeln!(out, "{} [{}] {}", "HIGH".red().bold(), rec.category, rec.description)?;
        writeln!(out, "     → {} ({})", rec.action, rec.estimated_impact)?;
    }
    for rec in medium {
        writeln!(out, "{} [{}] {}", "MED ".yellow(), rec.category, rec.description)?;
        writeln!(out, "     → {} ({})", rec.action, rec.estimated_impact)?;
    }
    Ok(())
}
