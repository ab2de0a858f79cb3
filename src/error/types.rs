use thiserror::Error;

use crate::config::ConfigError;
use crate::rules::RuleError;
use crate::style::StyleError;

/// Unified result type for the minimux crate.
pub type Result<T> = std::result::Result<T, MuxError>;

/// Errors surfaced by the dashboard core.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("style error: {0}")]
    Style(#[from] StyleError),
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
