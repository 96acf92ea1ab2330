use std::path::PathBuf;

use thiserror::Error;

/// Failure while turning one heat log into a [`crate::heat::HeatRecord`].
#[derive(Error, Debug)]
pub enum HeatError {
    #[error("line {line}: malformed {tag} record: {reason}")]
    MalformedRecord {
        line: usize,
        tag: &'static str,
        reason: String,
    },

    #[error("line {line}: unresolved craft identifier {token:?}")]
    UnresolvedIdentifier { line: usize, token: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeatError {
    pub fn malformed(line: usize, tag: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            tag,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum TournamentError {
    #[error("no valid log files found in {}", path.display())]
    EmptyTournament { path: PathBuf },

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("score weight #{index} is not a number: {value:?}")]
    InvalidWeight { index: usize, value: String },
}
