//! Parsing of user-entered "when" expressions.
//!
//! Accepted forms, relative to a local `now`:
//! - `17:00`, `9:05`, `17.00`: today at that local clock time
//! - `30s`, `15m`, `2h`, `1d`, `1w` and combinations like `1h30m`,
//!   optionally prefixed with `in ` or `+`
//! - a bare integer: that many minutes
//! - an RFC 3339 timestamp
//!
//! The result must lie strictly in the future.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Resolve `input` to an absolute due time.
pub fn parse_time_expression<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> AppResult<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("time is empty"));
    }

    let now_utc = now.with_timezone(&Utc);
    let due = if let Ok(at) = DateTime::parse_from_rfc3339(trimmed) {
        at.with_timezone(&Utc)
    } else {
        let lowered = trimmed.to_lowercase();
        if let Some((hour, minute)) = parse_clock(&lowered) {
            clock_time_today(now, hour, minute)?
        } else {
            let seconds = parse_relative_seconds(&lowered)
                .ok_or_else(|| AppError::validation(format!("unrecognised time '{}'", trimmed)))?;
            Duration::try_seconds(seconds)
                .and_then(|offset| now_utc.checked_add_signed(offset))
                .ok_or_else(|| AppError::validation(format!("time '{}' is too far away", trimmed)))?
        }
    };

    if due <= now_utc {
        return Err(AppError::validation(format!(
            "time '{}' is not in the future",
            trimmed
        )));
    }
    Ok(due)
}

/// `HH:MM` or `HH.MM` with a 24-hour clock
fn parse_clock(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':').or_else(|| s.split_once('.'))?;
    let valid = |part: &str| !part.is_empty() && part.len() <= 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !valid(h) || !valid(m) || m.len() != 2 {
        return None;
    }
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn clock_time_today<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> AppResult<DateTime<Utc>> {
    let naive = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| AppError::validation(format!("invalid clock time {:02}:{:02}", hour, minute)))?;
    now.timezone()
        .from_local_datetime(&naive)
        .single()
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| {
            AppError::validation(format!(
                "{:02}:{:02} does not exist unambiguously today",
                hour, minute
            ))
        })
}

/// Relative offset in seconds, or `None` when the input is not a duration
fn parse_relative_seconds(s: &str) -> Option<i64> {
    let s = s
        .strip_prefix("in ")
        .or_else(|| s.strip_prefix('+'))
        .unwrap_or(s)
        .trim();

    // Bare number means minutes
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok()?.checked_mul(60);
    }

    let mut total_seconds: i64 = 0;
    let mut current_number = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_number.push(c);
        } else if c.is_whitespace() {
            continue;
        } else {
            if current_number.is_empty() {
                return None;
            }
            let value: i64 = current_number.parse().ok()?;
            current_number.clear();

            let unit = match c {
                's' => 1,
                'm' => 60,
                'h' => 60 * 60,
                'd' => 60 * 60 * 24,
                'w' => 60 * 60 * 24 * 7,
                _ => return None,
            };
            total_seconds = total_seconds.checked_add(value.checked_mul(unit)?)?;
        }
    }

    // A dangling number without a unit is ambiguous
    if !current_number.is_empty() || total_seconds == 0 {
        return None;
    }
    Some(total_seconds)
}
