use crate::error::{Result, SalonError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Checkin,
    Checkout,
    Adjust,
    Duty,
    Rate,
    Book,
    Cancel,
    Complete,
    Sweep,
    Snapshot,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Checkin => "checkin",
            Self::Checkout => "checkout",
            Self::Adjust => "adjust",
            Self::Duty => "duty",
            Self::Rate => "rate",
            Self::Book => "book",
            Self::Cancel => "cancel",
            Self::Complete => "complete",
            Self::Sweep => "sweep",
            Self::Snapshot => "snapshot",
        })
    }
}

/// One row of a command script. Which columns matter depends on `op`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Command {
    pub op: Op,
    /// Authenticated user id; empty means anonymous.
    pub actor: Option<String>,
    pub salon: Option<String>,
    /// Script alias, stylist id or review text.
    pub target: Option<String>,
    pub value: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// Service ids separated by `;`.
    pub services: Option<String>,
    /// Moves the script clock before the command runs.
    pub at: Option<DateTime<Utc>>,
}

/// A command with the script line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: u64,
    pub command: Command,
}

/// Reads commands from a CSV source.
///
/// This reader wraps `csv::Reader`, trimming whitespace and accepting rows
/// that omit trailing columns.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and deserializes the commands, one item per data row.
    /// A row that does not parse yields an error and the rest still follow.
    pub fn commands(mut self) -> Result<impl Iterator<Item = Result<ScriptLine>>> {
        let headers = self.reader.headers()?.clone();
        Ok(self.reader.into_records().map(move |record| -> Result<ScriptLine> {
            let record = record?;
            let line = record.position().map_or(0, |pos| pos.line());
            let command = record.deserialize(Some(&headers)).map_err(SalonError::from)?;
            Ok(ScriptLine { line, command })
        }))
    }
}
