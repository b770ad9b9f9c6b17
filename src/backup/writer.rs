use crate::backup::naming::next_backup_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, IntoInnerError, Read};
use std::path::{Path, PathBuf};

/// Copies `target` to a new backup stamped with `now`, returning its path.
///
/// The destination is created with create-new semantics, so an existing file
/// is never overwritten. A partially written backup is removed again.
pub fn write_backup<P: AsRef<Path>, Tz: TimeZone>(target: P, now: &DateTime<Tz>) -> Result<PathBuf>
where
    Tz::Offset: Display,
{
    let target = target.as_ref();
    let dst = next_backup_path(target, now)?;

    let mut src = File::open(target)
        .map_err(Error::from)
        .with_msg(format!("Open {:?} for reading failed", target))?;

    let out = File::create_new(&dst).map_err(|e| match e.kind() {
        std::io::ErrorKind::AlreadyExists => Error::AlreadyExists(dst.clone()),
        _ => Error::from(e).with_msg(format!("Create {:?} failed", &dst)),
    })?;

    copy_and_close(&mut src, out).map_err(|mut e| {
        if let Err(e2) = std::fs::remove_file(&dst) {
            e = e.chain(Error::from(e2).with_msg(format!("Delete partial {:?} failed", &dst)));
        }
        e.with_msg(format!("Writing backup {:?} failed", &dst))
    })?;

    Ok(dst)
}

fn copy_and_close<R: Read>(src: &mut R, out: File) -> Result<()> {
    let mut writer = BufWriter::new(out);
    std::io::copy(src, &mut writer)?;
    let out = writer.into_inner().map_err(IntoInnerError::into_error)?;
    out.sync_all()?;
    Ok(())
}
