//! Confirmed-count journal - appends each confirmation to a local file
//!
//! Records are written in JSONL format (one JSON object per line) to the
//! file named in config, giving the team an offline copy of every
//! confirmed attendance figure.

use crate::domain::headcount::{ConfirmedCount, ServiceId};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// One journal line
#[derive(Serialize)]
struct JournalRecord<'a> {
    service: &'a ServiceId,
    total: u64,
    #[serde(flatten)]
    count: &'a ConfirmedCount,
}

/// Append-only JSONL writer for confirmed counts
#[derive(Debug, Clone)]
pub struct Journal {
    file_path: PathBuf,
}

impl Journal {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), "journal_initialized");
        Self { file_path }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Write a confirmed count to the journal
    /// Returns true if successful, false otherwise
    pub fn write_confirmed(&self, service: &ServiceId, count: &ConfirmedCount) -> bool {
        let record = JournalRecord { service, total: count.total(), count };
        let result = serde_json::to_string(&record)
            .map_err(std::io::Error::from)
            .and_then(|json| self.append_line(&json));

        match result {
            Ok(()) => {
                info!(
                    service = %service,
                    date = %count.date,
                    total = %count.total(),
                    "confirmed_count_journaled"
                );
                true
            }
            Err(e) => {
                error!(
                    service = %service,
                    date = %count.date,
                    error = %e,
                    "confirmed_count_journal_failed"
                );
                false
            }
        }
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = self.file_path.as_path();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %path.display(), bytes = %line.len(), "journal_written");

        Ok(())
    }
}
