use crate::backup::naming::BackupFile;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use validator::Validate;

pub const DEFAULT_MAX_BACKUPS: usize = 12;

/// Keeps at most `max_backups` backups per target.
#[derive(Clone, Copy, Validate, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Retention {
    #[validate(range(min = 1))]
    pub max_backups: usize,
}

impl Default for Retention {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKUPS)
    }
}

impl Retention {
    pub fn new(max_backups: usize) -> Self {
        Self { max_backups }
    }

    /// The backup to delete after a new one was added to `existing`.
    ///
    /// `existing` is the set before the new backup, oldest first. Only the
    /// single oldest entry is ever selected.
    pub fn get_delete<'a, T>(&self, existing: &'a [T]) -> Option<&'a T> {
        if existing.len() >= self.max_backups {
            existing.first()
        } else {
            None
        }
    }

    /// Deletes the oldest of `existing` when retention requires it.
    pub fn prune_oldest(&self, existing: &[BackupFile]) -> Result<Option<PathBuf>> {
        let Some(oldest) = self.get_delete(existing) else {
            return Ok(None);
        };

        std::fs::remove_file(oldest.path())
            .map_err(Error::from)
            .with_msg(format!("error deleting {:?}", oldest.path()))?;
        info!("Deleted [{}]", oldest.path().display());
        Ok(Some(oldest.path().clone()))
    }
}
