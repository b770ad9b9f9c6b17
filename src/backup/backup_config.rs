use crate::backup::compare::CompareMode;
use crate::backup::log_sink::LogSinks;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::WithMsg;
use crate::backup::retention::{Retention, DEFAULT_MAX_BACKUPS};
use crate::backup::rotation::{RotationOutcome, Rotator};
use crate::backup::targets::resolve_targets;
use bon::Builder;
use chrono::{DateTime, Local};
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use validator::Validate;

/// Settings of one invocation, from a YAML file, the command line, or both.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct BackupConfig {
    /// Path or glob pattern of the files to back up
    #[serde(default)]
    #[validate(length(min = 1, message = "a file or glob pattern is required"))]
    #[builder(into)]
    file: String,
    /// Number of rotating backups kept per file
    #[serde(default = "default_num")]
    #[validate(range(min = 1, message = "num must be greater than 0"))]
    #[builder(default = DEFAULT_MAX_BACKUPS)]
    num: usize,
    /// Fixed log file; defaults to `bkup.log` next to each file
    #[builder(into)]
    log_file: Option<PathBuf>,
    #[serde(default)]
    #[builder(default)]
    compare: CompareMode,
}

fn default_num() -> usize {
    DEFAULT_MAX_BACKUPS
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self::builder().file("").build()
    }
}

/// Values given on the command line, each replacing the configured one.
#[derive(Clone, Debug, Default, Builder)]
pub struct Overrides {
    #[builder(into)]
    pub file: Option<String>,
    pub num: Option<usize>,
    #[builder(into)]
    pub log_file: Option<PathBuf>,
    pub compare: Option<CompareMode>,
}

impl BackupConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, BackupConfig>(f).map_err(Error::from))
            .with_msg(format!("Parse YAML config failed: {:?}", path))
    }

    /// Config file (if any) overlaid with `overrides`, then validated.
    pub fn load(config: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let base = match config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let bc = base.with_overrides(overrides);
        bc.validate()
            .map_err(Error::from)
            .with_msg("Config validation failed")?;
        Ok(bc)
    }

    pub fn with_overrides(self, overrides: Overrides) -> Self {
        Self {
            file: overrides.file.unwrap_or(self.file),
            num: overrides.num.unwrap_or(self.num),
            log_file: overrides.log_file.or(self.log_file),
            compare: overrides.compare.unwrap_or(self.compare),
        }
    }

    pub fn rotator(&self) -> Rotator {
        Rotator::builder()
            .retention(Retention::new(self.num))
            .compare(self.compare)
            .build()
    }

    pub fn run(&self) -> Result<Vec<(PathBuf, RotationOutcome)>> {
        self.run_at(Local::now())
    }

    /// Rotates every target in order, stamping new backups with `now`.
    ///
    /// A failing target is logged and skipped; the remaining targets are still
    /// processed and all failures are returned together.
    pub fn run_at(&self, now: DateTime<Local>) -> Result<Vec<(PathBuf, RotationOutcome)>> {
        self.validate()
            .map_err(Error::from)
            .with_msg("Config validation failed")?;
        let targets = resolve_targets(&self.file)?;
        info!("Rotating {} file(s) matching {:?}", targets.len(), self.file);

        let rotator = self.rotator();
        let mut sinks = LogSinks::new(self.log_file.clone());
        let mut outcomes = Vec::with_capacity(targets.len());
        let mut errors = Vec::new();

        for target in targets {
            let sink = match sinks.for_target(&target) {
                Ok(sink) => sink,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let res = sink.in_scope(|| {
                let res = rotator.rotate_at(&target, now);
                if let Err(e) = &res {
                    error!("{e}");
                }
                res
            });
            match res {
                Ok(outcome) => outcomes.push((target, outcome)),
                Err(e) => errors.push(e),
            }
        }

        convert_error_vec(errors)?;
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::log_sink::LOG_FILE_NAME;
    use crate::backup::naming::list_backups;
    use chrono::{Duration, NaiveDate};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_defaults() {
        let bc: BackupConfig = serde_yml::from_str("file: notes.txt").unwrap();

        assert_eq!(bc.file(), "notes.txt");
        assert_eq!(*bc.num(), 12);
        assert_eq!(bc.log_file(), &None);
        assert_eq!(bc.compare(), &CompareMode::Chunked);
    }

    #[test]
    fn test_yaml_full() {
        let yaml = "file: '*.db'\nnum: 3\nlog_file: /var/log/bkup.log\ncompare: sha256\n";
        let bc: BackupConfig = serde_yml::from_str(yaml).unwrap();

        assert_eq!(
            bc,
            BackupConfig::builder()
                .file("*.db")
                .num(3)
                .log_file("/var/log/bkup.log")
                .compare(CompareMode::Sha256)
                .build()
        );
    }

    #[test]
    fn test_yaml_rejects_unknown_fields() {
        assert!(serde_yml::from_str::<BackupConfig>("file: a\nretention: 3\n").is_err());
    }

    #[test]
    fn test_validation() {
        assert!(BackupConfig::builder().file("a").build().validate().is_ok());
        assert!(BackupConfig::builder().file("a").num(0).build().validate().is_err());
        assert!(BackupConfig::default().validate().is_err());
    }

    #[test]
    fn test_overrides_replace_configured_values() {
        let base = BackupConfig::builder().file("a").num(3).log_file("x.log").build();
        let bc = base.with_overrides(Overrides::builder().file("b").num(5).build());

        assert_eq!(bc.file(), "b");
        assert_eq!(*bc.num(), 5);
        assert_eq!(bc.log_file(), &Some(PathBuf::from("x.log")));
    }

    #[test]
    fn test_load_from_file_with_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config = temp_dir.path().join("bkup.yml");
        fs::write(&config, "file: notes.txt\nnum: 4\n").unwrap();

        let bc = BackupConfig::load(Some(config.as_path()), Overrides::builder().num(2).build()).unwrap();
        assert_eq!(bc.file(), "notes.txt");
        assert_eq!(*bc.num(), 2);

        let err = BackupConfig::load(Some(config.as_path()), Overrides::builder().num(0).build());
        assert!(matches!(err.unwrap_err().root(), Error::ValidationError(_)));
    }

    #[test]
    fn test_load_requires_file() {
        let err = BackupConfig::load(None, Overrides::default()).unwrap_err();
        assert!(matches!(err.root(), Error::ValidationError(_)));
    }

    #[test]
    fn test_run_over_glob_logs_next_to_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.txt"), "a").unwrap();
        fs::write(dir.join("b.txt"), "b").unwrap();
        let pattern = dir.join("*.txt").to_string_lossy().into_owned();
        let bc = BackupConfig::builder().file(pattern).num(2).build();

        let outcomes = bc.run().unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|(_, o)| matches!(o, RotationOutcome::FirstBackupCreated { .. })));
        assert_eq!(list_backups(dir.join("a.txt")).unwrap().len(), 1);

        let log = fs::read_to_string(dir.join(LOG_FILE_NAME)).unwrap();
        assert!(log.contains("Copied ["));
        assert_eq!(log.matches("Copied [").count(), 2);

        let again = bc.run().unwrap();
        assert!(again
            .iter()
            .all(|(_, o)| matches!(o, RotationOutcome::Unchanged { .. })));
        assert_eq!(list_backups(dir.join("b.txt")).unwrap().len(), 1);
    }

    fn t0() -> DateTime<Local> {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap()
    }

    #[test]
    fn test_run_logs_pruned_backup() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let target = dir.join("notes.txt");
        let bc = BackupConfig::builder()
            .file(target.to_string_lossy())
            .num(1)
            .build();

        fs::write(&target, "v1").unwrap();
        bc.run_at(t0()).unwrap();
        fs::write(&target, "v2").unwrap();
        bc.run_at(t0() + Duration::seconds(1)).unwrap();

        let log = fs::read_to_string(dir.join(LOG_FILE_NAME)).unwrap();
        let pruned = dir.join("notes.txt.20240310120000");
        assert!(log.contains(&format!("Deleted [{}]", pruned.display())));
        assert!(!pruned.exists());
        assert_eq!(list_backups(&target).unwrap().len(), 1);
    }

    #[test]
    fn test_run_logs_target_failure_in_its_log() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let target = dir.join("notes.txt");
        let bc = BackupConfig::builder().file(target.to_string_lossy()).build();

        fs::write(&target, "v1").unwrap();
        bc.run_at(t0()).unwrap();
        fs::write(&target, "v2").unwrap();
        match bc.run_at(t0()).unwrap_err() {
            Error::LotsOfError(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0].root(), Error::AlreadyExists(_)));
            }
            e => panic!("Expected LotsOfError, got {e}"),
        }

        let log = fs::read_to_string(dir.join(LOG_FILE_NAME)).unwrap();
        assert!(log.contains("ERROR"));
        assert!(log.contains("already exists"));
    }

    #[test]
    fn test_run_continues_after_failing_target() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.txt"), "a").unwrap();
        fs::write(dir.join("b.txt"), "b").unwrap();
        let bc = BackupConfig::builder()
            .file(dir.join("*.txt").to_string_lossy())
            .log_file(dir.join("missing").join("bkup.log"))
            .build();

        match bc.run().unwrap_err() {
            Error::LotsOfError(errors) => assert_eq!(errors.len(), 2),
            e => panic!("Expected LotsOfError, got {e}"),
        }
    }

    #[test]
    fn test_run_without_matches_is_a_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let bc = BackupConfig::builder()
            .file(temp_dir.path().join("*.none").to_string_lossy())
            .build();

        assert!(matches!(bc.run().unwrap_err(), Error::NoFilesMatched(_)));
        assert!(!temp_dir.path().join(LOG_FILE_NAME).exists());
    }
}
