//! Time source for generated names.

use chrono::{DateTime, TimeZone, Utc};

/// Timestamp format embedded in generated names.
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of the current time for generated names.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// `yyyyMMddHHmmss` in UTC.
    fn name_timestamp(&self) -> String {
        self.now().format(NAME_TIMESTAMP_FORMAT).to_string()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Frozen at the given UTC calendar time; `None` if it is not a valid date.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
