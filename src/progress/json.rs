use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use miette::{Context, IntoDiagnostic, Result};
use tracing::{debug, warn};

use super::{ProgressRecord, ProgressStore};
use crate::io::write_atomic;

/// Progress saved as a pretty-printed JSON document
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&self) -> Result<ProgressRecord> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No progress file at {}, starting fresh", self.path.display());
                return Ok(ProgressRecord::default());
            }
            Err(err) => {
                return Err(err).into_diagnostic().wrap_err_with(|| {
                    format!("Could not read progress file {}", self.path.display())
                })
            }
        };

        match serde_json::from_slice(&data) {
            Ok(record) => Ok(record),
            Err(err) => {
                warn!(
                    "Progress file {} is malformed: {err}. Starting fresh",
                    self.path.display()
                );
                Ok(ProgressRecord::default())
            }
        }
    }

    fn save(&self, record: &ProgressRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)
            .into_diagnostic()
            .wrap_err("Could not serialize the progress")?;

        write_atomic(&self.path, &data)
            .wrap_err_with(|| format!("Could not write progress file {}", self.path.display()))?;

        debug!(
            "Progress saved: cursor={}, completed={}",
            record.cursor,
            record.completed_ids.len()
        );
        Ok(())
    }
}
