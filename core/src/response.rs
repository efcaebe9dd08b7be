//! Status-tagged response envelope for callers that speak JSON.
//!
//! Success payloads are flattened next to `"status": "success"`;
//! failures carry the error's stable kind and its message.

use crate::error::{LedgerError, LedgerResult};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success(T),
    Error { kind: String, message: String },
}

impl<T> Response<T> {
    pub fn error(err: &LedgerError) -> Self {
        Self::Error { kind: err.kind().to_string(), message: err.to_string() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<T> From<LedgerResult<T>> for Response<T> {
    fn from(result: LedgerResult<T>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(err) => {
                log::warn!("request failed: {err}");
                Self::error(&err)
            }
        }
    }
}
