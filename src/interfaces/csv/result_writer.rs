use super::command_reader::Op;
use crate::error::{ErrorCategory, Result, SalonError};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    /// The core refused the request; state is unchanged.
    Rejected,
    /// Infrastructure trouble; the command may be retried.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub line: u64,
    pub op: Op,
    pub status: Status,
    pub code: String,
    pub detail: String,
}

impl CommandOutcome {
    pub fn ok(line: u64, op: Op, detail: impl Into<String>) -> Self {
        Self {
            line,
            op,
            status: Status::Ok,
            code: String::new(),
            detail: detail.into(),
        }
    }

    pub fn failed(line: u64, op: Op, err: &SalonError) -> Self {
        let status = match err.category() {
            ErrorCategory::Aborted | ErrorCategory::Unavailable | ErrorCategory::Internal => {
                Status::Error
            }
            _ => Status::Rejected,
        };
        Self {
            line,
            op,
            status,
            code: err.code().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Writes one CSV row per executed command.
pub struct ResultWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, outcome: &CommandOutcome) -> Result<()> {
        self.writer.serialize(outcome)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
