//! Time source for the NTLMv2 timestamp.

use std::fmt::Debug;

use time::OffsetDateTime;

use crate::{Error, ErrorKind, Result};

/// Number of 100-nanosecond intervals between 1601-01-01 and 1970-01-01.
const FILE_TIME_UNIX_EPOCH: i128 = 116_444_736_000_000_000;

/// Source of the current time expressed as a Windows FILETIME (100ns units since 1601-01-01 UTC).
pub trait Clock: Debug + Send + Sync {
    fn file_time_now(&self) -> Result<u64>;
}

/// Reads the operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn file_time_now(&self) -> Result<u64> {
        file_time(OffsetDateTime::now_utc())
    }
}

/// Always returns the same FILETIME.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn file_time_now(&self) -> Result<u64> {
        Ok(self.0)
    }
}

/// Converts a date into a FILETIME.
pub fn file_time(date: OffsetDateTime) -> Result<u64> {
    let file_time = date.unix_timestamp_nanos() / 100 + FILE_TIME_UNIX_EPOCH;

    u64::try_from(file_time).map_err(|_| {
        Error::new(
            ErrorKind::InternalError,
            format!("failed to convert {} to file time: the date is before 1601", date),
        )
    })
}
