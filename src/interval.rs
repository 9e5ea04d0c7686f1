//! Calendar intervals: months, days, microseconds.
//!
//! Month arithmetic is calendar-aware (adding one month to January 31
//! saturates to the end of February); day and microsecond arithmetic is
//! exact. An interval is usable as a numeric period only when its month
//! component is zero.

use crate::engine::{self, IntervalStyle};
use crate::error::{Result, TemporalError};
use chrono::{DateTime, Days, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MICROS_PER_SEC: i64 = 1_000_000;
pub const MICROS_PER_MIN: i64 = 60 * MICROS_PER_SEC;
pub const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MIN;
pub const MICROS_PER_DAY: i64 = 24 * MICROS_PER_HOUR;

/// A calendar interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub micros: i64,
}

impl Interval {
    pub fn new(months: i32, days: i32, micros: i64) -> Self {
        Self {
            months,
            days,
            micros,
        }
    }

    /// Interval holding an exact duration, no calendar components.
    pub fn from_delta(delta: TimeDelta) -> Result<Self> {
        let micros = delta.num_microseconds().ok_or_else(|| {
            TemporalError::NumericOverflow("interval from duration".to_string())
        })?;
        Ok(Self::new(0, 0, micros))
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.micros == 0
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.months, -self.days, -self.micros)
    }

    /// Convert to an exact duration.
    ///
    /// Fails with `InvalidDuration` when the interval carries months, whose
    /// length depends on the calendar position.
    pub fn to_delta(&self) -> Result<TimeDelta> {
        if self.months != 0 {
            return Err(TemporalError::InvalidDuration(format!(
                "interval with {} month(s) cannot be used as a numeric period",
                self.months
            )));
        }
        let day_micros = (self.days as i64).checked_mul(MICROS_PER_DAY).ok_or_else(
            || TemporalError::NumericOverflow("interval day component".to_string()),
        )?;
        let micros = day_micros.checked_add(self.micros).ok_or_else(|| {
            TemporalError::NumericOverflow("interval microseconds".to_string())
        })?;
        Ok(TimeDelta::microseconds(micros))
    }

    /// Add this interval to a timestamp, months first, then days, then
    /// microseconds.
    pub fn add_to(&self, t: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let overflow = || TemporalError::NumericOverflow("timestamp + interval".to_string());

        let with_months = if self.months >= 0 {
            t.checked_add_months(Months::new(self.months as u32))
        } else {
            t.checked_sub_months(Months::new((-self.months) as u32))
        }
        .ok_or_else(overflow)?;

        let with_days = if self.days >= 0 {
            with_months.checked_add_days(Days::new(self.days as u64))
        } else {
            with_months.checked_sub_days(Days::new((-self.days) as u64))
        }
        .ok_or_else(overflow)?;

        with_days
            .checked_add_signed(TimeDelta::microseconds(self.micros))
            .ok_or_else(overflow)
    }

    /// Subtract this interval from a timestamp.
    pub fn subtract_from(&self, t: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.negated().add_to(t)
    }

    /// Format with an explicit style, ignoring the global configuration.
    pub fn format_with(&self, style: IntervalStyle) -> String {
        let years = self.months / 12;
        let months = self.months % 12;
        let (hours, rem) = (self.micros / MICROS_PER_HOUR, self.micros % MICROS_PER_HOUR);
        let (mins, rem) = (rem / MICROS_PER_MIN, rem % MICROS_PER_MIN);
        let (secs, frac) = (rem / MICROS_PER_SEC, rem % MICROS_PER_SEC);

        let frac_str = |frac: i64| {
            if frac == 0 {
                String::new()
            } else {
                let s = format!("{:06}", frac.abs());
                format!(".{}", s.trim_end_matches('0'))
            }
        };

        match style {
            IntervalStyle::Postgres => {
                let mut parts = Vec::new();
                if years != 0 {
                    parts.push(format!("{} year{}", years, plural(years)));
                }
                if months != 0 {
                    parts.push(format!("{} mon{}", months, plural(months)));
                }
                if self.days != 0 {
                    parts.push(format!("{} day{}", self.days, plural(self.days)));
                }
                if self.micros != 0 || parts.is_empty() {
                    let sign = if self.micros < 0 { "-" } else { "" };
                    parts.push(format!(
                        "{}{:02}:{:02}:{:02}{}",
                        sign,
                        hours.abs(),
                        mins.abs(),
                        secs.abs(),
                        frac_str(frac)
                    ));
                }
                parts.join(" ")
            }
            IntervalStyle::PostgresVerbose => {
                let mut parts = vec!["@".to_string()];
                if years != 0 {
                    parts.push(format!("{} year{}", years, plural(years)));
                }
                if months != 0 {
                    parts.push(format!("{} mon{}", months, plural(months)));
                }
                if self.days != 0 {
                    parts.push(format!("{} day{}", self.days, plural(self.days)));
                }
                if hours != 0 {
                    parts.push(format!("{} hour{}", hours, plural(hours as i32)));
                }
                if mins != 0 {
                    parts.push(format!("{} min{}", mins, plural(mins as i32)));
                }
                if secs != 0 || frac != 0 {
                    parts.push(format!("{}{} secs", secs, frac_str(frac)));
                }
                if parts.len() == 1 {
                    parts.push("0".to_string());
                }
                parts.join(" ")
            }
            IntervalStyle::SqlStandard => {
                format!(
                    "{}-{} {} {}:{:02}:{:02}{}",
                    years,
                    months.abs(),
                    self.days,
                    hours,
                    mins.abs(),
                    secs.abs(),
                    frac_str(frac)
                )
            }
            IntervalStyle::Iso8601 => {
                if self.is_zero() {
                    return "PT0S".to_string();
                }
                let mut out = String::from("P");
                if years != 0 {
                    out.push_str(&format!("{}Y", years));
                }
                if months != 0 {
                    out.push_str(&format!("{}M", months));
                }
                if self.days != 0 {
                    out.push_str(&format!("{}D", self.days));
                }
                if self.micros != 0 {
                    out.push('T');
                    if hours != 0 {
                        out.push_str(&format!("{}H", hours));
                    }
                    if mins != 0 {
                        out.push_str(&format!("{}M", mins));
                    }
                    if secs != 0 || frac != 0 {
                        out.push_str(&format!("{}{}S", secs, frac_str(frac)));
                    }
                }
                out
            }
        }
    }
}

fn plural(n: i32) -> &'static str {
    if n.abs() == 1 { "" } else { "s" }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = engine::global().config().interval_style;
        f.write_str(&self.format_with(style))
    }
}

impl std::str::FromStr for Interval {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TemporalError::InvalidInput(
                "empty interval literal".to_string(),
            ));
        }
        if s.starts_with('P') {
            return parse_iso8601(s);
        }
        parse_postgres(s)
    }
}

/// Parse `P[n]Y[n]M[n]DT[n]H[n]M[n]S`.
fn parse_iso8601(s: &str) -> Result<Interval> {
    let body = &s[1..];
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) => (d, t),
        None => (body, ""),
    };

    let mut iv = Interval::default();
    let bad = || TemporalError::InvalidInput(format!("invalid ISO 8601 interval: {}", s));

    let mut scan = |part: &str, time: bool| -> Result<()> {
        let mut num = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' {
                num.push(c);
            } else {
                let n: f64 = num.parse().map_err(|_| bad())?;
                num.clear();
                match (c, time) {
                    ('Y', false) => iv.months += (n as i32) * 12,
                    ('M', false) => iv.months += n as i32,
                    ('W', false) => iv.days += (n as i32) * 7,
                    ('D', false) => iv.days += n as i32,
                    ('H', true) => iv.micros += (n * MICROS_PER_HOUR as f64) as i64,
                    ('M', true) => iv.micros += (n * MICROS_PER_MIN as f64) as i64,
                    ('S', true) => iv.micros += (n * MICROS_PER_SEC as f64) as i64,
                    _ => return Err(bad()),
                }
            }
        }
        if !num.is_empty() {
            return Err(bad());
        }
        Ok(())
    };

    scan(date_part, false)?;
    scan(time_part, true)?;
    Ok(iv)
}

/// Parse the Postgres style: `[@] [N unit]... [HH:MM:SS[.f]] [ago]`.
fn parse_postgres(s: &str) -> Result<Interval> {
    let mut iv = Interval::default();
    let bad = |tok: &str| TemporalError::InvalidInput(format!("invalid interval token: {}", tok));

    let mut tokens = s.split_whitespace().peekable();
    let mut ago = false;

    while let Some(tok) = tokens.next() {
        if tok == "@" {
            continue;
        }
        if tok.eq_ignore_ascii_case("ago") {
            ago = true;
            continue;
        }
        if tok.contains(':') {
            let neg = tok.starts_with('-');
            let t = tok.trim_start_matches(['-', '+']);
            let fields: Vec<&str> = t.split(':').collect();
            if fields.len() > 3 {
                return Err(bad(tok));
            }
            let mut micros: i64 = 0;
            let hours: i64 = fields[0].parse().map_err(|_| bad(tok))?;
            micros += hours * MICROS_PER_HOUR;
            if fields.len() > 1 {
                let mins: i64 = fields[1].parse().map_err(|_| bad(tok))?;
                micros += mins * MICROS_PER_MIN;
            }
            if fields.len() > 2 {
                let secs: f64 = fields[2].parse().map_err(|_| bad(tok))?;
                micros += (secs * MICROS_PER_SEC as f64).round() as i64;
            }
            iv.micros += if neg { -micros } else { micros };
            continue;
        }

        let n: f64 = tok.parse().map_err(|_| bad(tok))?;
        let unit = tokens.next().ok_or_else(|| {
            TemporalError::InvalidInput(format!("interval number {} without a unit", tok))
        })?;
        let unit = unit.trim_end_matches('s').to_ascii_lowercase();
        match unit.as_str() {
            "year" | "yr" | "y" => iv.months += (n as i32) * 12,
            "month" | "mon" => iv.months += n as i32,
            "week" | "w" => iv.days += (n as i32) * 7,
            "day" | "d" => iv.days += n as i32,
            "hour" | "hr" | "h" => iv.micros += (n * MICROS_PER_HOUR as f64) as i64,
            "minute" | "min" | "m" => iv.micros += (n * MICROS_PER_MIN as f64) as i64,
            "second" | "sec" => iv.micros += (n * MICROS_PER_SEC as f64).round() as i64,
            "millisecond" | "ms" => iv.micros += (n * 1_000.0).round() as i64,
            "microsecond" | "us" => iv.micros += n.round() as i64,
            _ => return Err(bad(&unit)),
        }
    }

    if ago {
        iv = iv.negated();
    }
    Ok(iv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, mo: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_to_delta_rejects_months() {
        let iv = Interval::new(1, 0, 0);
        assert!(matches!(
            iv.to_delta(),
            Err(TemporalError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_to_delta_exact_days() {
        let iv = Interval::new(0, 2, 30 * MICROS_PER_MIN);
        let delta = iv.to_delta().unwrap();
        assert_eq!(delta, TimeDelta::hours(48) + TimeDelta::minutes(30));
    }

    #[test]
    fn test_calendar_month_addition() {
        let iv = Interval::new(1, 0, 0);
        assert_eq!(iv.add_to(ts(2000, 1, 31)).unwrap(), ts(2000, 2, 29));
        assert_eq!(iv.add_to(ts(2001, 1, 31)).unwrap(), ts(2001, 2, 28));
    }

    #[test]
    fn test_parse_postgres() {
        let iv: Interval = "1 day 02:30:00".parse().unwrap();
        assert_eq!(iv, Interval::new(0, 1, 2 * MICROS_PER_HOUR + 30 * MICROS_PER_MIN));

        let iv: Interval = "2 years 3 mons".parse().unwrap();
        assert_eq!(iv, Interval::new(27, 0, 0));

        let iv: Interval = "@ 1 hour ago".parse().unwrap();
        assert_eq!(iv, Interval::new(0, 0, -MICROS_PER_HOUR));
    }

    #[test]
    fn test_parse_iso8601() {
        let iv: Interval = "P1Y2M3DT4H5M6S".parse().unwrap();
        assert_eq!(iv.months, 14);
        assert_eq!(iv.days, 3);
        assert_eq!(
            iv.micros,
            4 * MICROS_PER_HOUR + 5 * MICROS_PER_MIN + 6 * MICROS_PER_SEC
        );
    }

    #[test]
    fn test_format_roundtrip() {
        let iv = Interval::new(14, 3, 4 * MICROS_PER_HOUR + 30 * MICROS_PER_MIN);
        let text = iv.format_with(IntervalStyle::Iso8601);
        assert_eq!(text, "P1Y2M3DT4H30M");
        let back: Interval = text.parse().unwrap();
        assert_eq!(back, iv);

        let text = iv.format_with(IntervalStyle::Postgres);
        assert_eq!(text, "1 year 2 mons 3 days 04:30:00");
        let back: Interval = text.parse().unwrap();
        assert_eq!(back, iv);
    }
}
