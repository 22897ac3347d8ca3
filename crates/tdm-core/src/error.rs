//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]`.

use thiserror::Error;

/// Errors raised by `tdm-core` parsing and validation.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Shorthand result type for `tdm-core`.
pub type CoreResult<T> = Result<T, CoreError>;
