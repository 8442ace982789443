use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] storesync_core::Error),
    #[error(transparent)]
    Config(#[from] storesync_core::ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Could not read job file {path}: {source}")]
    JobFile { path: PathBuf, source: io::Error },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{failed} of {total} sync job(s) did not succeed")]
    JobsFailed { failed: usize, total: usize },
}
