use thiserror::Error;

pub type GobzlResult<T> = Result<T, GobzlError>;

#[derive(Debug, Error)]
pub enum GobzlError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid ignore pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("watch setup failed: {0}")]
    Watch(String),

    #[error("external command failed: {0}")]
    Exec(String),

    #[error("FUSE error: {0}")]
    Fuse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
