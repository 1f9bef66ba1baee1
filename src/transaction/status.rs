//! Status code classification.
//!
//! # Design Decisions
//! - Only 307/308 are redirects: 301/302/303 allow the method to change and
//!   every request here is a POST
//! - Anything that is not explicitly success or redirect is fatal

use std::fmt;

/// Outcome of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Redirect,
    Fatal(FatalStatus),
}

/// A status the controller will not retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalStatus {
    NotFound,
    InternalServerError,
    Unexpected(u16),
}

impl fmt::Display for FatalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FatalStatus::NotFound => f.write_str("endpoint not found"),
            FatalStatus::InternalServerError => f.write_str("internal server error"),
            FatalStatus::Unexpected(code) => write!(f, "unexpected status {code}"),
        }
    }
}

/// Map a numeric status code to its outcome.
pub fn classify(code: u16) -> StatusClass {
    match code {
        200 | 204 => StatusClass::Success,
        307 | 308 => StatusClass::Redirect,
        404 => StatusClass::Fatal(FatalStatus::NotFound),
        500 => StatusClass::Fatal(FatalStatus::InternalServerError),
        other => StatusClass::Fatal(FatalStatus::Unexpected(other)),
    }
}
