use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

/// Window length used when the caller gives none, or a non-positive one.
pub const DEFAULT_DAYS: u32 = 7;

/// Longest window a report may cover.
pub const MAX_DAYS: u32 = 366;

const MS_PER_DAY: i64 = 86_400_000;

/// Why a `days` parameter was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaysError {
    NotAnInteger(String),
    TooLarge(i64),
}

impl std::fmt::Display for DaysError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnInteger(raw) => write!(f, "days must be an integer, got '{raw}'"),
            Self::TooLarge(n) => write!(f, "days must be at most {MAX_DAYS}, got {n}"),
        }
    }
}

impl std::error::Error for DaysError {}

/// Resolve the `days` query parameter.
///
/// Absent, zero and negative values fall back to [`DEFAULT_DAYS`]; anything
/// that is not an integer is rejected rather than coerced.
pub fn parse_days(raw: Option<&str>) -> Result<u32, DaysError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_DAYS);
    };
    let n: i64 = raw
        .parse()
        .map_err(|_| DaysError::NotAnInteger(raw.to_string()))?;
    if n <= 0 {
        return Ok(DEFAULT_DAYS);
    }
    u32::try_from(n)
        .ok()
        .filter(|d| *d <= MAX_DAYS)
        .ok_or(DaysError::TooLarge(n))
}

/// A trailing window of `days` ending at `now`, paired with the equally long
/// window immediately before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub now: DateTime<Utc>,
    pub days: u32,
    pub current_start: DateTime<Utc>,
    pub previous_start: DateTime<Utc>,
    /// Local day keys of the current window, oldest first, ending today.
    pub labels_curr: Vec<String>,
    /// Local day keys of the previous window, oldest first.
    pub labels_prev: Vec<String>,
}

impl Window {
    /// Compute window boundaries and per-day labels in `tz`'s calendar.
    ///
    /// Boundaries are exact multiples of 24h before `now`; labels step whole
    /// calendar days back from `now`'s local date.
    pub fn build<Tz: TimeZone>(now: DateTime<Utc>, days: u32, tz: &Tz) -> Self {
        let span = chrono::Duration::milliseconds(i64::from(days) * MS_PER_DAY);
        let current_start = now - span;
        let previous_start = current_start - span;

        let today = local_date(now, tz);
        let mut labels_curr = Vec::with_capacity(days as usize);
        let mut labels_prev = Vec::with_capacity(days as usize);
        for i in (0..u64::from(days)).rev() {
            labels_curr.push(date_key(today - Days::new(i)));
            labels_prev.push(date_key(today - Days::new(i + u64::from(days))));
        }

        Self {
            now,
            days,
            current_start,
            previous_start,
            labels_curr,
            labels_prev,
        }
    }

    /// Whether `ts` belongs to the current period. Everything at or after
    /// `current_start` counts, including timestamps slightly past `now`.
    pub fn is_current(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.current_start
    }
}

/// The `YYYY-MM-DD` key of `ts` in `tz`'s calendar.
pub fn day_key<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> String {
    date_key(local_date(ts, tz))
}

fn local_date<Tz: TimeZone>(ts: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
