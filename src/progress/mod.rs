mod json;

use std::collections::BTreeSet;

use miette::Result;
use serde::{Deserialize, Serialize};

pub use json::JsonFileStore;

/// Durable state of the transfers: how far in the oldest-first listing the
/// pipeline got, and which videos have been published.
///
/// The field names are those of the progress files written by earlier
/// versions of the tool, so they can be picked up as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    /// Index of the next video to process in the current listing
    #[serde(rename = "current_index")]
    pub cursor: usize,

    /// IDs of the videos that have been published
    #[serde(rename = "uploaded_ids")]
    pub completed_ids: BTreeSet<String>,
}

impl ProgressRecord {
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed_ids.contains(id)
    }

    /// Record that the video at `index` has been published.
    ///
    /// Return whether the record changed.
    pub fn mark_completed(&mut self, id: &str, index: usize) -> bool {
        let inserted = self.completed_ids.insert(id.to_owned());
        self.advance_past(index) || inserted
    }

    /// Move the cursor after `index` if it points at it.
    ///
    /// The cursor never goes back and never jumps over a video that is
    /// neither done nor skipped. Return whether it moved.
    pub fn advance_past(&mut self, index: usize) -> bool {
        if self.cursor == index {
            self.cursor = index + 1;
            true
        } else {
            false
        }
    }
}

/// A place where the progress survives between executions.
///
/// Only one pipeline is expected to use a store at a time.
pub trait ProgressStore {
    /// Read the saved progress.
    ///
    /// A missing or malformed record is a fresh start and **must** give
    /// the zero record. A record that exists but cannot be read **must**
    /// be an error: starting over would upload everything again.
    fn load(&self) -> Result<ProgressRecord>;

    /// Replace the saved progress with `record`.
    ///
    /// A reader **must** never observe a partially written record.
    fn save(&self, record: &ProgressRecord) -> Result<()>;
}
