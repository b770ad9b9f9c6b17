//! # bkup
//!
//! A rotating backup utility. Each run copies a file to a timestamped sibling
//! only when its content changed since the most recent backup, and keeps a
//! bounded number of backups per file.
//!
//! ## Features
//!
//! - **Change Detection**: Chunked byte comparison or SHA-256 digests
//! - **Timestamped Backups**: `<file>.<YYYYMMDDHHMMSS>` next to the original
//! - **Retention**: The oldest backup is removed once the configured count is reached
//! - **Glob Patterns**: One invocation can rotate every file matching a pattern
//! - **Log File**: Created and deleted backups are appended to `bkup.log`
//!
//! ## Quick Start
//!
//! ```no_run
//! use bkup::backup::backup_config::BackupConfig;
//!
//! let config = BackupConfig::builder().file("notes/*.md").num(5).build();
//! for (target, outcome) in config.run()? {
//!     println!("{target:?}: {outcome:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
