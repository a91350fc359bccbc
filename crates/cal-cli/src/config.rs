//! `cal.toml` loading.
//!
//! ```toml
//! [parser]
//! declarable_keywords = ["BREAK"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use cal_parser::ParserOptions;
use serde::Deserialize;
use tracing::debug;

use crate::error::CliError;

pub const DEFAULT_CONFIG: &str = "cal.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CalConfig {
    parser: ParserOptions,
}

/// Loads parser options from `explicit`, else `cal.toml` in the working
/// directory, else the defaults.
pub fn load_options(explicit: Option<&Path>) -> Result<ParserOptions, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG);
            if !fallback.is_file() {
                debug!("no {DEFAULT_CONFIG}, using default parser options");
                return Ok(ParserOptions::default());
            }
            fallback
        }
    };
    let text = fs::read_to_string(&path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;
    let options = parse_options(&text).map_err(|source| CliError::Config {
        path: path.clone(),
        source,
    })?;
    options.validate().map_err(|source| CliError::Options { path: path.clone(), source })?;
    debug!(path = %path.display(), keywords = ?options.declarable_keywords, "loaded parser options");
    Ok(options)
}

fn parse_options(text: &str) -> Result<ParserOptions, toml::de::Error> {
    toml::from_str::<CalConfig>(text).map(|config| config.parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse_options("").unwrap(), ParserOptions::default());
    }

    #[test]
    fn parser_table_overrides_keywords() {
        let options = parse_options("[parser]\ndeclarable_keywords = [\"BREAK\", \"EXIT\"]\n").unwrap();
        assert_eq!(options.declarable_keywords, ["BREAK", "EXIT"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse_options("[parser]\nkeywords = []\n").is_err());
        assert!(parse_options("[lexer]\n").is_err());
    }
}
