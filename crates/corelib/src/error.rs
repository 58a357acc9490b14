//! Core shared errors (renderer-agnostic).

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("cannot compute bounds of an empty point set")]
    EmptyBounds,
}

pub type CoreResult<T> = Result<T, CoreError>;
