use bkup::backup::backup_config::{BackupConfig, Overrides};
use bkup::backup::compare::CompareMode;
use clap::Parser;
use std::path::PathBuf;
use std::process::exit;
use tracing::{error, info};

/// Rotating backup file utility. Only creates a backup on files that changed
/// since the last backup.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File or glob pattern of files to be backed up
    file: Option<String>,

    /// Number of rotating backup files [default: 12]
    #[arg(short, long)]
    num: Option<usize>,

    /// Log file to append to instead of bkup.log next to each file
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// How file content is compared with the latest backup [default: chunked]
    #[arg(long, value_enum)]
    compare: Option<CompareMode>,

    /// Location of YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();

    let overrides = Overrides {
        file: args.file,
        num: args.num,
        log_file: args.log_file,
        compare: args.compare,
    };

    let res = BackupConfig::load(args.config.as_deref(), overrides).and_then(|bc| bc.run());

    match res {
        Ok(outcomes) => info!("Processed {} file(s)", outcomes.len()),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
