//! File content comparison.
//!
//! Either strategy opens both files and treats any open or read failure as an
//! error of the comparison, never as "not equal".

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

pub const BUF_SIZE: usize = 1024 * 1024;

#[derive(
    Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CompareMode {
    /// Compare 1 MiB chunks, stopping at the first difference
    #[default]
    #[display("chunked")]
    Chunked,
    /// Compare finalized SHA-256 digests of both files
    #[display("sha256")]
    Sha256,
}

impl CompareMode {
    pub fn compare_equal<P1: AsRef<Path>, P2: AsRef<Path>>(&self, a: P1, b: P2) -> Result<bool> {
        match self {
            CompareMode::Chunked => compare_equal(a, b),
            CompareMode::Sha256 => compare_digest(a, b),
        }
    }
}

fn open<P: AsRef<Path>>(path: P) -> Result<File> {
    File::open(path.as_ref())
        .map_err(Error::from)
        .with_msg(format!("Open {:?} for comparison failed", path.as_ref()))
}

/// Fills `buf` as far as the reader allows, returning the byte count.
///
/// A short count means end of input.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Whether two readers yield the same bytes, using `buf_size` chunks (at least one byte).
pub(crate) fn readers_equal<R1: Read, R2: Read>(a: &mut R1, b: &mut R2, buf_size: usize) -> std::io::Result<bool> {
    let buf_size = buf_size.max(1);
    let mut buf_a = vec![0u8; buf_size];
    let mut buf_b = vec![0u8; buf_size];

    loop {
        let n_a = read_chunk(a, &mut buf_a)?;
        let n_b = read_chunk(b, &mut buf_b)?;

        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a < buf_size {
            return Ok(true);
        }
    }
}

/// Chunked byte comparison of two files.
pub fn compare_equal<P1: AsRef<Path>, P2: AsRef<Path>>(a: P1, b: P2) -> Result<bool> {
    let (a, b) = (a.as_ref(), b.as_ref());
    let mut file_a = open(a)?;
    let mut file_b = open(b)?;

    readers_equal(&mut file_a, &mut file_b, BUF_SIZE)
        .map_err(Error::from)
        .with_msg(format!("Comparing {:?} with {:?} failed", a, b))
}

fn digest<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let mut file = open(&path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(Error::from)
        .with_msg(format!("Hashing {:?} failed", path.as_ref()))?;
    Ok(hasher.finalize().to_vec())
}

/// Digest comparison of two files; each file is read exactly once.
pub fn compare_digest<P1: AsRef<Path>, P2: AsRef<Path>>(a: P1, b: P2) -> Result<bool> {
    Ok(digest(a)? == digest(b)?)
}
