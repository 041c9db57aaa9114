//! Tabular session capture.
//!
//! Flags are stored as the literal strings `True` / `False`; anything else is
//! rejected rather than guessed at.
use buildgate_core::{PipelineError, SessionRecord, UNKNOWN_GAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("row {row}: {column} must be \"True\" or \"False\" (got {value:?})")]
    Flag {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("row {row}: {source}")]
    Invalid {
        row: usize,
        #[source]
        source: PipelineError,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct CaptureRow {
    session_duration: f64,
    success: String,
    perfect: String,
    restart_count: u32,
    fail_point: f64,
    perfect_count: u32,
    // Derived from the other columns; recomputed on read.
    #[serde(default)]
    perfect_per_min: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    game_id: Option<String>,
}

fn parse_flag(row: usize, column: &'static str, value: &str) -> Result<bool, CaptureError> {
    match value {
        "True" => Ok(true),
        "False" => Ok(false),
        other => Err(CaptureError::Flag {
            row,
            column,
            value: other.to_string(),
        }),
    }
}

const fn flag(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Read a capture file. Ids follow row order starting at 1.
pub fn read_capture(path: &Path) -> Result<Vec<SessionRecord>, CaptureError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for (index, row) in reader.deserialize::<CaptureRow>().enumerate() {
        let row_number = index + 1;
        let row = row?;
        let record = SessionRecord {
            id: u64::try_from(row_number).unwrap_or(u64::MAX),
            success: parse_flag(row_number, "success", &row.success)?,
            perfect: parse_flag(row_number, "perfect", &row.perfect)?,
            duration_seconds: row.session_duration,
            restart_count: row.restart_count,
            fail_point: row.fail_point,
            perfect_count: row.perfect_count,
        };
        record.validate().map_err(|source| CaptureError::Invalid {
            row: row_number,
            source,
        })?;
        records.push(record);
    }
    log::debug!("read {} sessions from {}", records.len(), path.display());
    Ok(records)
}

pub fn write_capture(
    path: &Path,
    records: &[SessionRecord],
    game_id: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), CaptureError> {
    let mut writer = csv::Writer::from_path(path)?;
    let timestamp = at.to_rfc3339();
    let game_id = game_id.unwrap_or(UNKNOWN_GAME);
    for record in records {
        writer.serialize(CaptureRow {
            session_duration: record.duration_seconds,
            success: flag(record.success).to_string(),
            perfect: flag(record.perfect).to_string(),
            restart_count: record.restart_count,
            fail_point: record.fail_point,
            perfect_count: record.perfect_count,
            perfect_per_min: Some(record.perfect_per_minute()),
            timestamp: Some(timestamp.clone()),
            game_id: Some(game_id.to_string()),
        })?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
