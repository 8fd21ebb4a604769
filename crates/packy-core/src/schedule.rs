//! Cron trigger for the polling cycle.
//!
//! Accepts the classic five-field form (`*/30 * * * *`) as well as the
//! seconds-precision six/seven-field form understood by the `cron` crate.
//! Five-field expressions use crontab weekday numbers (0 or 7 is Sunday),
//! and are rewritten to day names before they reach the `cron` crate, which
//! counts Sunday as 1.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::{PackyError, Result};

pub const DEFAULT_CRON: &str = "*/30 * * * *";

#[derive(Debug, Clone)]
pub struct CronSchedule {
    expr: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let normalized = match fields.as_slice() {
            [minute, hour, dom, month, dow] => {
                let days = crontab_weekdays(dow).ok_or_else(|| PackyError::InvalidCron {
                    expr: expr.to_string(),
                    reason: format!("invalid day of week '{dow}'"),
                })?;
                format!("0 {minute} {hour} {dom} {month} {days}")
            }
            _ => trimmed.to_string(),
        };
        let schedule = Schedule::from_str(&normalized).map_err(|e| PackyError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expr: trimmed.to_string(),
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First trigger strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Next trigger for a loop that last fired at `fired`. Never returns
    /// `fired` again, even when the wall clock reads slightly earlier than
    /// the trigger the sleep just ended on.
    pub fn next_trigger(
        &self,
        fired: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let from = fired.map_or(now, |f| f.max(now));
        self.next_after(from)
    }
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Rewrite a crontab day-of-week field as a list of day names.
fn crontab_weekdays(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }
    let days = expand_weekdays(field)?;
    Some(
        days.into_iter()
            .map(|d| WEEKDAYS[d])
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn expand_weekdays(field: &str) -> Option<BTreeSet<usize>> {
    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, step.parse::<usize>().ok().filter(|&s| s > 0)?),
            None => (item, 1),
        };
        let (lo, hi) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((lo, hi)) => (weekday(lo)?, weekday(hi)?),
            None if step > 1 => (weekday(range)?, 6),
            None => (weekday(range)?, weekday(range)?),
        };
        if lo > hi {
            return None;
        }
        days.extend((lo..=hi).step_by(step).map(|d| d % 7));
    }
    Some(days)
}

/// Crontab day number (0-7) or three-letter name.
fn weekday(token: &str) -> Option<usize> {
    match token.parse::<usize>() {
        Ok(n) => (n <= 7).then_some(n),
        Err(_) => WEEKDAYS.iter().position(|w| w.eq_ignore_ascii_case(token)),
    }
}
