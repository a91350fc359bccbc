use std::path::PathBuf;

use cal_parser::OptionsError;
use thiserror::Error;

/// Failures that stop the CLI before a report can be produced.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid parser options in {}: {source}", path.display())]
    Options {
        path: PathBuf,
        #[source]
        source: OptionsError,
    },
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}
