use std::path::PathBuf;
use thiserror::Error;

/// Errors raised inside the pipeline stages.
///
/// The detector and processor never let these escape their entry points;
/// they are folded into the JSON reports instead. Training and registration
/// propagate them to the binary, which exits non-zero.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("missing workspace configuration: {0}")]
    Config(String),

    #[error("`{program}` failed: {message}")]
    Command { program: String, message: String },

    #[error("unexpected output from `{program}`: {message}")]
    CommandOutput { program: String, message: String },

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.into(),
            source,
        }
    }
}
