//! Backup file naming.
//!
//! A backup of `T` is the sibling file `T.<YYYYMMDDHHMMSS>` stamped with local
//! time. The suffix is fixed width and zero padded, so lexical order of the
//! stamp is chronological order.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, TimeZone};
use getset::Getters;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub static TIME_FORMAT: &str = "%Y%m%d%H%M%S";
pub const STAMP_LEN: usize = 14;

/// An existing backup of some target, ordered by its stamp.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Getters)]
#[getset(get = "pub")]
pub struct BackupFile {
    stamp: Arc<str>,
    path: PathBuf,
}

impl BackupFile {
    pub fn new<S: Into<Arc<str>>, P: Into<PathBuf>>(stamp: S, path: P) -> Self {
        Self {
            stamp: stamp.into(),
            path: path.into(),
        }
    }
}

pub fn format_stamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    dt.format(TIME_FORMAT).to_string()
}

pub fn is_stamp(s: &str) -> bool {
    is_stamp_bytes(s.as_bytes())
}

fn is_stamp_bytes(b: &[u8]) -> bool {
    b.len() == STAMP_LEN && b.iter().all(u8::is_ascii_digit)
}

/// `target` with `.<stamp>` appended to its final component.
pub fn backup_path_with_stamp<P: AsRef<Path>>(target: P, stamp: &str) -> PathBuf {
    let mut s = OsString::from(target.as_ref().as_os_str());
    s.push(".");
    s.push(stamp);
    PathBuf::from(s)
}

/// Destination for a backup of `target` taken at `now`.
///
/// Fails with [`Error::AlreadyExists`] if something already occupies that
/// path, which only happens for two backups of one target within a second.
pub fn next_backup_path<P: AsRef<Path>, Tz: TimeZone>(target: P, now: &DateTime<Tz>) -> Result<PathBuf>
where
    Tz::Offset: Display,
{
    let dst = backup_path_with_stamp(&target, &format_stamp(now));
    if dst
        .try_exists()
        .map_err(Error::from)
        .with_msg(format!("Checking {:?} failed", &dst))?
    {
        return Err(Error::AlreadyExists(dst));
    }
    Ok(dst)
}

/// Returns the stamp of `candidate` if it names a backup of `target`.
///
/// Only `<target name>.<14 digits>` qualifies; `T.txt` or `T.2024` do not.
/// Names are compared as raw bytes, so they need not be valid UTF-8.
pub fn backup_stamp<'a, P: AsRef<Path>>(target: P, candidate: &'a Path) -> Option<&'a str> {
    let target_name = target.as_ref().file_name()?.as_encoded_bytes();
    let file_name = candidate.file_name()?.as_encoded_bytes();
    let stamp = file_name.strip_prefix(target_name)?.strip_prefix(b".")?;
    if !is_stamp_bytes(stamp) {
        return None;
    }
    std::str::from_utf8(stamp).ok()
}

/// True when the file name carries a backup stamp suffix of any target.
pub fn looks_like_backup<P: AsRef<Path>>(path: P) -> bool {
    let Some(name) = path.as_ref().file_name() else {
        return false;
    };
    let name = name.as_encoded_bytes();
    match name.iter().rposition(|&b| b == b'.') {
        Some(dot) => dot > 0 && is_stamp_bytes(&name[dot + 1..]),
        None => false,
    }
}

pub fn target_dir<P: AsRef<Path>>(target: P) -> PathBuf {
    match target.as_ref().parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Existing backups of `target`, sorted oldest first.
pub fn list_backups<P: AsRef<Path>>(target: P) -> Result<Vec<BackupFile>> {
    let target = target.as_ref();
    let dir = target_dir(target);
    let mut backups = Vec::new();

    let entries = read_dir(&dir)
        .map_err(Error::from)
        .with_msg(format!("Listing backups in {:?} failed", &dir))?;
    for entry in entries {
        let entry = entry
            .map_err(Error::from)
            .with_msg(format!("Listing backups in {:?} failed", &dir))?;
        let candidate = entry.path();
        let Some(stamp) = backup_stamp(target, &candidate) else {
            continue;
        };
        if !candidate.is_file() {
            tracing::trace!("Skipping {:?}, not a file", candidate);
            continue;
        }
        let path = backup_path_with_stamp(target, stamp);
        backups.push(BackupFile::new(stamp, path));
    }

    backups.sort();
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate};
    use tempfile::TempDir;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap()
    }

    #[test]
    fn test_format_stamp_is_zero_padded() {
        assert_eq!(format_stamp(&at(2024, 1, 2, 3, 4, 5)), "20240102030405");
    }

    #[test]
    fn test_next_backup_path_appends_stamp() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("notes.txt");

        let dst = next_backup_path(&target, &at(2024, 12, 31, 23, 59, 58)).unwrap();
        assert_eq!(dst, temp_dir.path().join("notes.txt.20241231235958"));
    }

    #[test]
    fn test_next_backup_path_collision() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("notes.txt");
        let now = at(2024, 6, 1, 12, 0, 0);
        std::fs::write(temp_dir.path().join("notes.txt.20240601120000"), "old").unwrap();

        match next_backup_path(&target, &now) {
            Err(Error::AlreadyExists(p)) => {
                assert_eq!(p, temp_dir.path().join("notes.txt.20240601120000"))
            }
            other => panic!("Expected AlreadyExists, got {:?}", other),
        }
    }

    #[test]
    fn test_backup_stamp_filter() {
        let target = Path::new("dir/F");
        assert_eq!(
            backup_stamp(target, Path::new("dir/F.20240102030405")),
            Some("20240102030405")
        );
        assert_eq!(backup_stamp(target, Path::new("dir/F.txt")), None);
        assert_eq!(backup_stamp(target, Path::new("dir/F.2024")), None);
        assert_eq!(backup_stamp(target, Path::new("dir/F.202401020304051")), None);
        assert_eq!(backup_stamp(target, Path::new("dir/FF.20240102030405")), None);
        assert_eq!(backup_stamp(target, Path::new("dir/F.txt.20240102030405")), None);
    }

    #[test]
    fn test_looks_like_backup() {
        assert!(looks_like_backup("a/notes.txt.20240102030405"));
        assert!(!looks_like_backup("a/notes.txt"));
        assert!(!looks_like_backup("a/.20240102030405"));
        assert!(!looks_like_backup("a/notes.2024"));
    }

    #[test]
    fn test_target_dir_of_bare_name() {
        assert_eq!(target_dir("notes.txt"), PathBuf::from("."));
        assert_eq!(target_dir("a/b/notes.txt"), PathBuf::from("a/b"));
    }

    #[test]
    fn test_list_backups_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let target = dir.join("F");
        std::fs::write(&target, "current").unwrap();
        std::fs::write(dir.join("F.20240301000000"), "c").unwrap();
        std::fs::write(dir.join("F.20240101000000"), "a").unwrap();
        std::fs::write(dir.join("F.20240201000000"), "b").unwrap();
        std::fs::write(dir.join("F.txt"), "unrelated").unwrap();
        std::fs::write(dir.join("F.2024"), "unrelated").unwrap();
        std::fs::write(dir.join("G.20240101000000"), "other target").unwrap();
        std::fs::create_dir(dir.join("F.20240401000000")).unwrap();

        let backups = list_backups(&target).unwrap();
        let stamps: Vec<_> = backups.iter().map(|b| b.stamp().as_ref()).collect();
        assert_eq!(
            stamps,
            vec!["20240101000000", "20240201000000", "20240301000000"]
        );
        assert_eq!(backups[0].path(), &dir.join("F.20240101000000"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_target_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join(OsStr::from_bytes(b"caf\xE9.txt"));
        std::fs::write(&target, "current").unwrap();
        let backup = backup_path_with_stamp(&target, "20240101000000");
        std::fs::write(&backup, "old").unwrap();
        std::fs::write(temp_dir.path().join(OsStr::from_bytes(b"caf\xE9.txt.old")), "x").unwrap();

        assert_eq!(backup_stamp(&target, &backup), Some("20240101000000"));
        assert!(looks_like_backup(&backup));
        let backups = list_backups(&target).unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].path(), &backup);
    }

    #[test]
    fn test_list_backups_none() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("F");
        std::fs::write(&target, "current").unwrap();

        assert!(list_backups(&target).unwrap().is_empty());
    }
}
