//! Per-target rotation: list the existing backups, compare against the most
//! recent one, copy or skip, then prune.

use crate::backup::compare::CompareMode;
use crate::backup::function_path;
use crate::backup::naming::{list_backups, BackupFile};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::retention::Retention;
use crate::backup::writer::write_backup;
use bon::Builder;
use chrono::{DateTime, Local};
use function_name::named;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Terminal state of one rotation pass over a target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RotationOutcome {
    /// There was nothing to compare against.
    FirstBackupCreated { backup: PathBuf },
    /// Content matches the most recent backup.
    Unchanged { latest: PathBuf },
    BackupCreated {
        backup: PathBuf,
        pruned: Option<PathBuf>,
    },
}

impl RotationOutcome {
    pub fn created(&self) -> Option<&Path> {
        match self {
            RotationOutcome::FirstBackupCreated { backup }
            | RotationOutcome::BackupCreated { backup, .. } => Some(backup.as_path()),
            RotationOutcome::Unchanged { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, Builder)]
pub struct Rotator {
    #[builder(default)]
    retention: Retention,
    #[builder(default)]
    compare: CompareMode,
}

impl Rotator {
    pub fn rotate<P: AsRef<Path>>(&self, target: P) -> Result<RotationOutcome> {
        self.rotate_at(target, Local::now())
    }

    #[named]
    pub fn rotate_at<P: AsRef<Path>>(&self, target: P, now: DateTime<Local>) -> Result<RotationOutcome> {
        let target = target.as_ref();
        self.rotate_inner(target, &now)
            .with_debug_object_and_fn_name(target.to_path_buf(), function_path!())
    }

    fn rotate_inner(&self, target: &Path, now: &DateTime<Local>) -> Result<RotationOutcome> {
        let backups = list_backups(target)?;

        let Some(latest) = backups.last() else {
            let backup = self.backup(target, now)?;
            return Ok(RotationOutcome::FirstBackupCreated { backup });
        };

        if self.is_unchanged(target, latest)? {
            debug!("[{}] unchanged since [{}]", target.display(), latest.path().display());
            return Ok(RotationOutcome::Unchanged {
                latest: latest.path().clone(),
            });
        }

        let backup = self.backup(target, now)?;
        let pruned = self.retention.prune_oldest(&backups)?;
        Ok(RotationOutcome::BackupCreated { backup, pruned })
    }

    fn is_unchanged(&self, target: &Path, latest: &BackupFile) -> Result<bool> {
        self.compare
            .compare_equal(target, latest.path())
            .with_msg(format!("error comparing files ({})", self.compare))
    }

    fn backup(&self, target: &Path, now: &DateTime<Local>) -> Result<PathBuf> {
        let dst = write_backup(target, now).with_msg(format!("error backing up {:?}", target))?;
        info!("Copied [{}] to [{}]", target.display(), dst.display());
        Ok(dst)
    }
}
