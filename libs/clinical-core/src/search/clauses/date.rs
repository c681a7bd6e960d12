use chrono::{
    DateTime, Days, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};

use crate::Result;

use super::super::bind::push_text;
use super::super::{BindValue, ResolvedParam, SearchPrefix};
use super::{invalid_value, join_or};

/// Date columns hold a single instant; a search value covers the half-open range
/// `[start, end)` implied by its precision (`2024` is the whole year).
pub(super) fn build_date_clause(
    resolved: &ResolvedParam<'_>,
    bind_params: &mut Vec<BindValue>,
) -> Result<Option<String>> {
    let col = &resolved.descriptor.column;
    let mut parts = Vec::new();
    for v in &resolved.values {
        let (prefix, rest) = SearchPrefix::parse_prefix(&v.raw);
        let prefix = prefix.unwrap_or(SearchPrefix::Eq);
        let invalid = || invalid_value(resolved, &v.raw, "a FHIR date or dateTime");
        let range = DateRange::parse(rest).ok_or_else(invalid)?;

        let clause = match prefix {
            SearchPrefix::Eq => range.within(col, bind_params),
            SearchPrefix::Ne => {
                let s_idx = push_text(bind_params, range.start.to_rfc3339());
                let e_idx = push_text(bind_params, range.end.to_rfc3339());
                format!(
                    "({c} < ${}::timestamptz OR {c} >= ${}::timestamptz)",
                    s_idx,
                    e_idx,
                    c = col
                )
            }
            // gt / sa: strictly after the whole search range
            SearchPrefix::Gt | SearchPrefix::Sa => {
                let e_idx = push_text(bind_params, range.end.to_rfc3339());
                format!("{} >= ${}::timestamptz", col, e_idx)
            }
            SearchPrefix::Ge => {
                let s_idx = push_text(bind_params, range.start.to_rfc3339());
                format!("{} >= ${}::timestamptz", col, s_idx)
            }
            // lt / eb: strictly before the whole search range
            SearchPrefix::Lt | SearchPrefix::Eb => {
                let s_idx = push_text(bind_params, range.start.to_rfc3339());
                format!("{} < ${}::timestamptz", col, s_idx)
            }
            SearchPrefix::Le => {
                let e_idx = push_text(bind_params, range.end.to_rfc3339());
                format!("{} < ${}::timestamptz", col, e_idx)
            }
            SearchPrefix::Ap => range
                .approximate()
                .ok_or_else(invalid)?
                .within(col, bind_params),
        };

        parts.push(clause);
    }

    Ok(join_or(parts))
}

/// Half-open instant range covered by a date search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and
    /// `YYYY-MM-DDThh:mm[:ss[.fffffffff]][Z|±hh:mm]`. Years are exactly four digits;
    /// a dateTime without a zone is read as UTC.
    fn parse(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if !s.is_ascii() {
            return None;
        }
        match s.split_once('T') {
            Some((date, time)) => Self::parse_date_time(date, time),
            None => Self::parse_partial_date(s),
        }
    }

    fn parse_partial_date(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        let year = digits(parts[0], 4)? as i32;
        let (start, end) = match &parts[1..] {
            [] => (
                NaiveDate::from_ymd_opt(year, 1, 1)?,
                NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            ),
            [month] => {
                let start = NaiveDate::from_ymd_opt(year, digits(month, 2)?, 1)?;
                (start, start.checked_add_months(Months::new(1))?)
            }
            [_, _] => {
                let start = full_date(s)?;
                (start, start.checked_add_days(Days::new(1))?)
            }
            _ => return None,
        };
        Some(Self {
            start: midnight_utc(start)?,
            end: midnight_utc(end)?,
        })
    }

    fn parse_date_time(date: &str, time: &str) -> Option<Self> {
        let date = full_date(date)?;
        let (clock, offset) = split_offset(time)?;
        let (time, unit) = clock_with_precision(clock)?;
        let start = offset
            .from_local_datetime(&NaiveDateTime::new(date, time))
            .single()?
            .with_timezone(&Utc);
        Some(Self {
            start,
            end: start.checked_add_signed(unit)?,
        })
    }

    /// `ap`: widen both ends by a tenth of the range, at least one day.
    fn approximate(self) -> Option<Self> {
        let delta = ((self.end - self.start) / 10).max(Duration::days(1));
        Some(Self {
            start: self.start.checked_sub_signed(delta)?,
            end: self.end.checked_add_signed(delta)?,
        })
    }

    fn within(&self, col: &str, bind_params: &mut Vec<BindValue>) -> String {
        let s_idx = push_text(bind_params, self.start.to_rfc3339());
        let e_idx = push_text(bind_params, self.end.to_rfc3339());
        format!(
            "({c} >= ${}::timestamptz AND {c} < ${}::timestamptz)",
            s_idx,
            e_idx,
            c = col
        )
    }
}

/// Exactly `width` ASCII digits.
fn digits(s: &str, width: usize) -> Option<u32> {
    if s.len() != width || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn full_date(s: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month, day] => NaiveDate::from_ymd_opt(
            digits(year, 4)? as i32,
            digits(month, 2)?,
            digits(day, 2)?,
        ),
        _ => None,
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// Split the zone designator off the time part. Offsets must be `±hh:mm` within a day.
fn split_offset(time: &str) -> Option<(&str, FixedOffset)> {
    if let Some(clock) = time.strip_suffix('Z') {
        return Some((clock, FixedOffset::east_opt(0)?));
    }
    let Some(pos) = time.rfind(['+', '-']) else {
        return Some((time, FixedOffset::east_opt(0)?));
    };

    let (clock, zone) = time.split_at(pos);
    let (hours, minutes) = zone[1..].split_once(':')?;
    let (hours, minutes) = (digits(hours, 2)?, digits(minutes, 2)?);
    if hours > 23 || minutes > 59 {
        return None;
    }
    let seconds = (hours * 3600 + minutes * 60) as i32;
    let seconds = if zone.starts_with('-') { -seconds } else { seconds };
    Some((clock, FixedOffset::east_opt(seconds)?))
}

/// Parse `hh:mm`, `hh:mm:ss` or `hh:mm:ss.f` (1 to 9 fraction digits) together with
/// the span its last digit covers.
fn clock_with_precision(clock: &str) -> Option<(NaiveTime, Duration)> {
    let (hms, fraction) = match clock.split_once('.') {
        Some((hms, fraction)) => (hms, Some(fraction)),
        None => (clock, None),
    };
    let parts: Vec<&str> = hms.split(':').collect();
    let (hour, minute, second) = match parts.as_slice() {
        [h, m] if fraction.is_none() => (digits(h, 2)?, digits(m, 2)?, None),
        [h, m, s] => (digits(h, 2)?, digits(m, 2)?, Some(digits(s, 2)?)),
        _ => return None,
    };

    let (nanos, unit) = match (second, fraction) {
        (None, _) => (0, Duration::minutes(1)),
        (Some(_), None) => (0, Duration::seconds(1)),
        (Some(_), Some(fraction)) => {
            let len = fraction.len();
            if !(1..=9).contains(&len) {
                return None;
            }
            let scale = 10u32.pow(9 - len as u32);
            let value = digits(fraction, len)?;
            (value * scale, Duration::nanoseconds(i64::from(scale)))
        }
    };

    let time = NaiveTime::from_hms_nano_opt(hour, minute, second.unwrap_or(0), nanos)?;
    Some((time, unit))
}
