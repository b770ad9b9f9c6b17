//! Log sinks passed explicitly through a run.
//!
//! Each sink owns a `tracing` dispatcher appending timestamped lines to a log
//! file. Events are routed to a sink only while
//! code runs inside [`LogSink::in_scope`]; nothing is redirected globally.

use crate::backup::naming::target_dir;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use getset::Getters;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;

pub static LOG_FILE_NAME: &str = "bkup.log";

#[derive(Getters)]
pub struct LogSink {
    #[getset(get = "pub")]
    path: PathBuf,
    dispatch: Dispatch,
}

impl LogSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::from)
            .with_msg(format!("error opening log file {:?}", &path))?;

        let subscriber = tracing_subscriber::registry().with(LevelFilter::INFO).with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        );

        Ok(Self {
            path,
            dispatch: Dispatch::new(subscriber),
        })
    }

    pub fn in_scope<T, F: FnOnce() -> T>(&self, f: F) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

/// Sinks for a run, one per distinct log file, closed when dropped.
#[derive(Default)]
pub struct LogSinks {
    fixed: Option<PathBuf>,
    open: HashMap<PathBuf, LogSink>,
}

impl LogSinks {
    /// With `fixed` set every target logs there, else next to the target.
    pub fn new(fixed: Option<PathBuf>) -> Self {
        Self {
            fixed,
            open: HashMap::new(),
        }
    }

    pub fn log_path_for<P: AsRef<Path>>(&self, target: P) -> Result<PathBuf> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }
        let dir = target_dir(target);
        std::path::absolute(&dir)
            .map(|d| d.join(LOG_FILE_NAME))
            .map_err(Error::from)
            .with_msg(format!("error determining path of {:?}", dir))
    }

    pub fn for_target<P: AsRef<Path>>(&mut self, target: P) -> Result<&LogSink> {
        let path = self.log_path_for(target)?;
        match self.open.entry(path) {
            Entry::Occupied(e) => Ok(&*e.into_mut()),
            Entry::Vacant(e) => {
                let sink = LogSink::open(e.key())?;
                Ok(&*e.insert(sink))
            }
        }
    }
}
