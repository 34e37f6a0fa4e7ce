//! Read-only introspection of a semaphore.
//!
//! None of these reads take the bootstrap lock or change the set.

use super::BIGCOUNT;
use super::executor;
use super::types::{Counter, SemId};
use crate::error::{Result, SemError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What to read, by one-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCode {
    /// `v`: current value.
    Value,
    /// `p`: pid of the last process to operate on the value.
    Pid,
    /// `n`: processes waiting for the value to increase.
    WaitingIncrease,
    /// `z`: processes waiting for the value to reach zero.
    WaitingZero,
    /// `o`: time of the last operation, seconds since the epoch.
    LastOperation,
    /// `c`: time of the last control change, seconds since the epoch.
    LastChange,
    /// `r`: registered openers.
    Openers,
}

impl QueryCode {
    pub const ALL: [QueryCode; 7] = [
        QueryCode::Value,
        QueryCode::Pid,
        QueryCode::WaitingIncrease,
        QueryCode::WaitingZero,
        QueryCode::LastOperation,
        QueryCode::LastChange,
        QueryCode::Openers,
    ];

    pub fn code(self) -> char {
        match self {
            QueryCode::Value => 'v',
            QueryCode::Pid => 'p',
            QueryCode::WaitingIncrease => 'n',
            QueryCode::WaitingZero => 'z',
            QueryCode::LastOperation => 'o',
            QueryCode::LastChange => 'c',
            QueryCode::Openers => 'r',
        }
    }
}

impl FromStr for QueryCode {
    type Err = SemError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.chars().next();
        QueryCode::ALL
            .into_iter()
            .find(|q| Some(q.code()) == code)
            .ok_or_else(|| SemError::InvalidQuery(s.to_string()))
    }
}

impl fmt::Display for QueryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Read a single attribute of the set.
pub fn query(id: SemId, code: QueryCode) -> Result<i64> {
    let value = match code {
        QueryCode::Value => executor::get_value(id, Counter::Value)?,
        QueryCode::Pid => executor::last_pid(id, Counter::Value)?,
        QueryCode::WaitingIncrease => executor::waiting_increase(id, Counter::Value)?,
        QueryCode::WaitingZero => executor::waiting_zero(id, Counter::Value)?,
        QueryCode::LastOperation => return executor::stat_times(id).map(|(otime, _)| otime),
        QueryCode::LastChange => return executor::stat_times(id).map(|(_, ctime)| ctime),
        QueryCode::Openers => BIGCOUNT - executor::get_value(id, Counter::OpenCount)?,
    };
    Ok(i64::from(value))
}

/// Snapshot of everything [`query`] can report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemStatus {
    pub id: SemId,
    pub value: i32,
    pub pid: i32,
    pub waiting_increase: i32,
    pub waiting_zero: i32,
    pub openers: i32,
    /// `None` until the first operation.
    pub last_operation: Option<DateTime<Utc>>,
    pub last_change: Option<DateTime<Utc>>,
}

/// Read every attribute. The reads are not atomic with respect to each other.
pub fn status(id: SemId) -> Result<SemStatus> {
    let (otime, ctime) = executor::stat_times(id)?;
    Ok(SemStatus {
        id,
        value: executor::get_value(id, Counter::Value)?,
        pid: executor::last_pid(id, Counter::Value)?,
        waiting_increase: executor::waiting_increase(id, Counter::Value)?,
        waiting_zero: executor::waiting_zero(id, Counter::Value)?,
        openers: BIGCOUNT - executor::get_value(id, Counter::OpenCount)?,
        last_operation: timestamp(otime),
        last_change: timestamp(ctime),
    })
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sem::lifecycle::{Options, create, remove};
    use crate::test_support::BackingFile;

    #[test]
    fn query_codes_parse_from_first_character() {
        assert_eq!("v".parse::<QueryCode>().unwrap(), QueryCode::Value);
        assert_eq!("value".parse::<QueryCode>().unwrap(), QueryCode::Value);
        assert_eq!("n".parse::<QueryCode>().unwrap(), QueryCode::WaitingIncrease);
        assert_eq!("r".parse::<QueryCode>().unwrap(), QueryCode::Openers);
    }

    #[test]
    fn unknown_query_code_is_rejected() {
        assert!(matches!(
            "x".parse::<QueryCode>(),
            Err(SemError::InvalidQuery(code)) if code == "x"
        ));
        assert!("".parse::<QueryCode>().is_err());
    }

    #[test]
    fn status_reports_fresh_semaphore() {
        let backing = BackingFile::new();
        let id = create(backing.path(), backing.tag(), 4, &Options::default()).unwrap();
        let _cleanup = backing.cleanup(id);

        let status = status(id).unwrap();
        assert_eq!(status.value, 4);
        assert_eq!(status.openers, 1);
        assert_eq!(status.waiting_increase, 0);
        assert_eq!(status.waiting_zero, 0);
        assert!(status.last_change.is_some());
        assert!(status.last_operation.is_some());
        assert_eq!(query(id, QueryCode::Pid).unwrap(), i64::from(std::process::id()));
    }

    #[test]
    fn status_serializes_to_json() {
        let backing = BackingFile::new();
        let id = create(backing.path(), backing.tag(), 2, &Options::default()).unwrap();
        let _cleanup = backing.cleanup(id);

        let json = serde_json::to_value(status(id).unwrap()).unwrap();
        assert_eq!(json["value"], 2);
        assert_eq!(json["openers"], 1);
    }

    #[test]
    fn queries_on_removed_semaphore_fail() {
        let backing = BackingFile::new();
        let id = create(backing.path(), backing.tag(), 1, &Options::default()).unwrap();
        remove(id).unwrap();

        for code in QueryCode::ALL {
            match query(id, code).unwrap_err() {
                SemError::Kernel { source, .. } => assert!(source.is_gone(), "{code}"),
                other => panic!("unexpected error for {code}: {other}"),
            }
        }
    }
}
