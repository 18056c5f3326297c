use chrono::{DateTime, TimeDelta, Utc};
use cmdq_core::{CmdqError, CmdqResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed recurrence interval written as `days:hours:minutes:seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalSpec {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl IntervalSpec {
    pub const DEFAULT: IntervalSpec = IntervalSpec {
        days: 0,
        hours: 1,
        minutes: 0,
        seconds: 0,
    };

    pub fn parse(expr: &str) -> CmdqResult<Self> {
        let invalid = || CmdqError::InvalidInterval(expr.to_string());

        let parts = expr
            .trim()
            .split(':')
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                p.parse::<u32>().map_err(|_| invalid())
            })
            .collect::<CmdqResult<Vec<u32>>>()?;

        let &[days, hours, minutes, seconds] = parts.as_slice() else {
            return Err(invalid());
        };
        if hours > 23 || minutes > 59 || seconds > 59 {
            return Err(invalid());
        }

        let spec = Self {
            days,
            hours,
            minutes,
            seconds,
        };
        if spec.total_seconds() == 0 {
            return Err(invalid());
        }
        Ok(spec)
    }

    /// Parses `expr`, logging and falling back to one hour when malformed.
    pub fn parse_or_default(expr: &str) -> Self {
        match Self::parse(expr) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!("{}; using default interval {}", e, Self::DEFAULT);
                Self::DEFAULT
            }
        }
    }

    pub fn total_seconds(&self) -> i64 {
        i64::from(self.days) * 86_400
            + i64::from(self.hours) * 3_600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds)
    }

    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.total_seconds())
    }
}

impl fmt::Display for IntervalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

impl FromStr for IntervalSpec {
    type Err = CmdqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A trigger that never ran is due; otherwise it is due once `interval`
/// has elapsed since `last_run`.
pub fn is_due(last_run: Option<DateTime<Utc>>, interval: &IntervalSpec, now: DateTime<Utc>) -> bool {
    match last_run {
        None => true,
        Some(last) => last
            .checked_add_signed(interval.as_delta())
            .is_some_and(|next| now >= next),
    }
}
