//! Aggregate outcome value reported by group submission.
//!
//! A `Status` carries a numeric code, a message and the source location it
//! was created at. Code `0` is success, negative codes are errors. Merging
//! keeps the first error: once a status has failed, later results cannot
//! overwrite it, and a success never hides a failure.

use crate::error::{Error, Result};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::panic::Location;

pub const STATUS_OK: i32 = 0;
pub const STATUS_ERR: i32 = -1;
pub const STATUS_TIMEOUT: i32 = -2;
pub const STATUS_CRASH: i32 = -996;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    code: i32,
    message: String,
    location: String,
}

impl Status {
    pub fn ok() -> Self {
        Self::default()
    }

    #[track_caller]
    pub fn with_code<S: Into<String>>(code: i32, message: S) -> Self {
        let caller = Location::caller();
        Self {
            code,
            message: message.into(),
            location: format!("{}:{}", caller.file(), caller.line()),
        }
    }

    #[track_caller]
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::with_code(STATUS_ERR, message)
    }

    #[track_caller]
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::with_code(STATUS_TIMEOUT, message)
    }

    #[track_caller]
    pub fn crash<S: Into<String>>(message: S) -> Self {
        Self::with_code(STATUS_CRASH, message)
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// `file:line` where the status was raised, empty for success.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_ok(&self) -> bool {
        self.code == STATUS_OK
    }

    pub fn is_err(&self) -> bool {
        self.code < STATUS_OK
    }

    pub fn is_timeout(&self) -> bool {
        self.code == STATUS_TIMEOUT
    }

    pub fn is_crash(&self) -> bool {
        self.code == STATUS_CRASH
    }

    pub fn into_result(self) -> Result<()> {
        match self.code {
            c if c >= STATUS_OK => Ok(()),
            STATUS_TIMEOUT => Err(Error::Timeout(self.message)),
            _ => Err(Error::TaskFailed(self)),
        }
    }
}

impl From<&Error> for Status {
    #[track_caller]
    fn from(err: &Error) -> Self {
        Status::with_code(err.code(), err.to_string())
    }
}

impl From<Error> for Status {
    #[track_caller]
    fn from(err: Error) -> Self {
        Status::from(&err)
    }
}

impl AddAssign for Status {
    fn add_assign(&mut self, rhs: Status) {
        if !self.is_err() && rhs.is_err() {
            *self = rhs;
        }
    }
}

impl Add for Status {
    type Output = Status;

    fn add(mut self, rhs: Status) -> Status {
        self += rhs;
        self
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return f.write_str("ok");
        }
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.location.is_empty() {
            write!(f, " ({})", self.location)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ok() {
        let status = Status::default();
        assert!(status.is_ok());
        assert!(!status.is_err());
        assert_eq!(status.code(), STATUS_OK);
        assert_eq!(status.to_string(), "ok");
    }

    #[test]
    fn test_ok_merge_takes_error() {
        let mut status = Status::ok();
        status += Status::error("first");
        assert!(status.is_err());
        assert_eq!(status.message(), "first");
        assert!(status.location().contains("status.rs"));
    }

    #[test]
    fn test_first_error_wins() {
        let mut status = Status::timeout("deadline");
        status += Status::crash("boom");
        status += Status::ok();
        assert!(status.is_timeout());
        assert_eq!(status.message(), "deadline");
    }

    #[test]
    fn test_add_operator() {
        let merged = Status::ok() + Status::ok();
        assert!(merged.is_ok());

        let merged = Status::ok() + Status::crash("dead");
        assert!(merged.is_crash());
    }

    #[test]
    fn test_from_error() {
        let status = Status::from(Error::PrimaryWorkerMissing { index: 2 });
        assert!(status.is_crash());
        assert!(status.message().contains("primary worker 2"));

        let status = Status::from(Error::timeout("pop"));
        assert!(status.is_timeout());
    }

    #[test]
    fn test_into_result() {
        assert!(Status::ok().into_result().is_ok());
        assert!(matches!(
            Status::timeout("late").into_result(),
            Err(Error::Timeout(_))
        ));
        assert!(matches!(
            Status::error("bad").into_result(),
            Err(Error::TaskFailed(_))
        ));
    }
}
