//! # Next-fire functions.
//!
//! A [`Schedule`] maps the instant a job fired to the instant it fires next, or
//! `None` when the job is done. Provided schedules:
//!
//! | Schedule | Next fire after `t` |
//! |----------|---------------------|
//! | [`Every`] | `t + period` |
//! | [`Once`] | never |
//! | [`CronExpr`] | next instant matching the expression (UTC) |
//! | `Fn(SystemTime) -> Option<SystemTime>` | whatever the closure returns |
//!
//! Cron expressions use the seconds-resolution format
//! `sec min hour day-of-month month day-of-week [year]`, plus the named forms
//! `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`, `@midnight`, `@hourly`, `@minutely`.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::error::CronError;

/// Next-fire function of a job.
pub trait Schedule: Send + Sync + 'static {
    /// Next fire instant after a firing at `base`; `None` unschedules the job.
    fn next_after(&self, base: SystemTime) -> Option<SystemTime>;
}

impl<F> Schedule for F
where
    F: Fn(SystemTime) -> Option<SystemTime> + Send + Sync + 'static,
{
    fn next_after(&self, base: SystemTime) -> Option<SystemTime> {
        self(base)
    }
}

/// Fixed period measured from each firing. A zero period fires once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Every(pub Duration);

impl Schedule for Every {
    fn next_after(&self, base: SystemTime) -> Option<SystemTime> {
        if self.0.is_zero() {
            return None;
        }
        base.checked_add(self.0)
    }
}

/// One-shot: fires at its first instant only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Once;

impl Schedule for Once {
    fn next_after(&self, _base: SystemTime) -> Option<SystemTime> {
        None
    }
}

/// Parsed cron expression, evaluated in UTC.
///
/// # Example
/// ```
/// use std::time::{Duration, SystemTime};
/// use flowkit::{CronExpr, Schedule};
///
/// let every_minute = CronExpr::parse("@minutely").unwrap();
/// let next = every_minute.next_after(SystemTime::UNIX_EPOCH).unwrap();
/// assert_eq!(next, SystemTime::UNIX_EPOCH + Duration::from_secs(60));
///
/// assert!(CronExpr::parse("not a cron").is_err());
/// ```
#[derive(Clone)]
pub struct CronExpr {
    expr: String,
    schedule: cron::Schedule,
}

impl CronExpr {
    /// Parses `expr`; fails with [`CronError::InvalidExpression`].
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(invalid(expr, "expression is empty"));
        }

        let source = if trimmed.starts_with('@') {
            named(trimmed).ok_or_else(|| invalid(expr, "unknown named schedule"))?
        } else {
            trimmed
        };

        let schedule =
            cron::Schedule::from_str(source).map_err(|e| invalid(expr, &e.to_string()))?;
        Ok(Self {
            expr: trimmed.to_owned(),
            schedule,
        })
    }

    /// Expression as written by the caller (trimmed).
    pub fn as_str(&self) -> &str {
        &self.expr
    }
}

impl FromStr for CronExpr {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Schedule for CronExpr {
    fn next_after(&self, base: SystemTime) -> Option<SystemTime> {
        let base: DateTime<Utc> = base.into();
        self.schedule.after(&base).next().map(SystemTime::from)
    }
}

impl fmt::Debug for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronExpr").field(&self.expr).finish()
    }
}

/// Seven-field equivalent of a named schedule.
fn named(name: &str) -> Option<&'static str> {
    let expr = match name.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => "0 0 0 1 1 * *",
        "@monthly" => "0 0 0 1 * * *",
        "@weekly" => "0 0 0 * * SUN *",
        "@daily" | "@midnight" => "0 0 0 * * * *",
        "@hourly" => "0 0 * * * * *",
        "@minutely" => "0 * * * * * *",
        _ => return None,
    };
    Some(expr)
}

fn invalid(expr: &str, reason: &str) -> CronError {
    CronError::InvalidExpression {
        expr: expr.to_owned(),
        reason: reason.to_owned(),
    }
}
