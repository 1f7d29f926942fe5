//! Time bucket calculation in the clinic's business timezone.
//!
//! Converts an anchor date and a [`Granularity`] into the absolute instant
//! window covered by a trend and the ordered list of [`Bucket`]s inside it.
//! All boundaries are local midnights (or local hour starts) resolved through
//! the timezone database, so days with a daylight-saving transition are 23 or
//! 25 hours long instead of being shifted by a fixed offset.

use crate::config::Settings;
use crate::errors::{Error, Result};
use chrono::{
    DateTime, Datelike, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeDelta, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Calendar granularity of a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One bucket per business hour of a single day
    Day,
    /// Seven daily buckets, Monday through Sunday
    Week,
    /// One bucket per calendar day of a month
    Month,
    /// Twelve monthly buckets
    Year,
}

impl Granularity {
    /// Lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(Error::InvalidGranularity {
                input: s.to_string(),
            }),
        }
    }
}

/// Parses a `YYYY-MM-DD` business-local date.
pub fn parse_anchor_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidDateInput {
        input: input.to_string(),
    })
}

/// Identity of a bucket within its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum BucketKey {
    /// Local hour of the anchor day (0-23)
    Hour(u32),
    /// Local calendar day
    Day(NaiveDate),
    /// Calendar month of the anchor year (1-12)
    Month(u32),
}

/// A half-open slice `[range_start, range_end)` of absolute time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    /// Identity of the bucket
    pub key: BucketKey,
    /// First instant inside the bucket
    pub range_start: DateTime<Utc>,
    /// First instant after the bucket
    pub range_end: DateTime<Utc>,
    /// Display label
    pub label: String,
    /// Whether the label belongs to the reduced axis label set
    pub show_label: bool,
}

impl Bucket {
    /// Whether `instant` falls inside the bucket.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.range_start <= instant && instant < self.range_end
    }
}

/// The whole absolute range covered by a trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    /// Granularity the window was computed for
    pub granularity: Granularity,
    /// Date the window was anchored on
    pub anchor: NaiveDate,
    /// First local day of the window
    pub first_day: NaiveDate,
    /// Last local day of the window
    pub last_day: NaiveDate,
    /// Local midnight of `first_day`
    pub start: DateTime<Utc>,
    /// Local midnight of the day after `last_day`, minus one millisecond
    pub end_inclusive: DateTime<Utc>,
}

impl TimeWindow {
    /// Whether `instant` falls inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end_inclusive
    }

    /// Whether the local `date` falls inside the window.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.first_day <= date && date <= self.last_day
    }
}

/// Day boundaries and business hours of a clinic.
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    timezone: Tz,
    opening_hour: u32,
    closing_hour: u32,
}

/// Sample days that always carry a label on a month axis
const MONTH_LABEL_DAYS: [u32; 6] = [1, 5, 10, 15, 20, 25];

fn out_of_range(date: NaiveDate) -> Error {
    Error::InvalidDateInput {
        input: date.to_string(),
    }
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.succ_opt().ok_or_else(|| out_of_range(date))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| Error::InvalidDateInput {
        input: format!("{year:04}-{month:02}-01"),
    })
}

/// Last calendar day of the month containing `date`.
pub fn last_day_of_month(date: NaiveDate) -> Result<NaiveDate> {
    let first = first_of_month(date.year(), date.month())?;
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(|| out_of_range(date))
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> Result<u32> {
    Ok(last_day_of_month(date)?.day())
}

impl BusinessCalendar {
    /// Creates a calendar for a timezone and inclusive business hour range.
    #[must_use]
    pub const fn new(timezone: Tz, opening_hour: u32, closing_hour: u32) -> Self {
        Self {
            timezone,
            opening_hour,
            closing_hour,
        }
    }

    /// Creates a calendar from the application settings.
    #[must_use]
    pub const fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.business_timezone,
            settings.opening_hour,
            settings.closing_hour,
        )
    }

    /// The business timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// First business hour.
    #[must_use]
    pub const fn opening_hour(&self) -> u32 {
        self.opening_hour
    }

    /// Resolves a local wall-clock time to an absolute instant.
    ///
    /// Ambiguous times (clocks turned back) resolve to the earlier instant.
    /// Skipped times (clocks turned forward) are read with the offset in force
    /// before the jump, which lands on the equivalent instant after it.
    #[must_use]
    pub fn resolve_local(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
            LocalResult::None => {
                let before = local - TimeDelta::days(1);
                let offset = self.timezone.offset_from_utc_datetime(&before).fix();
                let utc = local - TimeDelta::seconds(i64::from(offset.local_minus_utc()));
                Utc.from_utc_datetime(&utc)
            }
        }
    }

    /// Absolute instant of local midnight starting `date`.
    #[must_use]
    pub fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        self.resolve_local(date.and_time(NaiveTime::MIN))
    }

    /// Absolute instant at which local `hour` of `date` starts.
    pub fn local_hour_start(&self, date: NaiveDate, hour: u32) -> Result<DateTime<Utc>> {
        if hour >= 24 {
            return self.local_midnight_after(date);
        }
        let time = NaiveTime::from_hms_opt(hour, 0, 0).ok_or_else(|| out_of_range(date))?;
        Ok(self.resolve_local(date.and_time(time)))
    }

    fn local_midnight_after(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        Ok(self.local_midnight(next_day(date)?))
    }

    /// Business-local date of an absolute instant.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// Business-local hour (0-23) of an absolute instant.
    #[must_use]
    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.timezone).hour()
    }

    /// Instant a record with only a local date is assumed to have happened:
    /// the opening hour of that business day.
    pub fn fallback_instant(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        self.local_hour_start(date, self.opening_hour)
    }

    /// First and last local day covered by `granularity` around `anchor`.
    pub fn day_span(
        &self,
        anchor: NaiveDate,
        granularity: Granularity,
    ) -> Result<(NaiveDate, NaiveDate)> {
        match granularity {
            Granularity::Day => Ok((anchor, anchor)),
            Granularity::Week => {
                let offset = i64::from(anchor.weekday().num_days_from_monday());
                let monday = anchor
                    .checked_sub_signed(TimeDelta::days(offset))
                    .ok_or_else(|| out_of_range(anchor))?;
                let sunday = monday
                    .checked_add_signed(TimeDelta::days(6))
                    .ok_or_else(|| out_of_range(anchor))?;
                Ok((monday, sunday))
            }
            Granularity::Month => Ok((
                first_of_month(anchor.year(), anchor.month())?,
                last_day_of_month(anchor)?,
            )),
            Granularity::Year => Ok((
                first_of_month(anchor.year(), 1)?,
                last_day_of_month(first_of_month(anchor.year(), 12)?)?,
            )),
        }
    }

    /// Absolute window covered by `granularity` around `anchor`.
    pub fn window(&self, anchor: NaiveDate, granularity: Granularity) -> Result<TimeWindow> {
        let (first_day, last_day) = self.day_span(anchor, granularity)?;
        let start = self.local_midnight(first_day);
        let end_inclusive = self.local_midnight_after(last_day)? - TimeDelta::milliseconds(1);
        Ok(TimeWindow {
            granularity,
            anchor,
            first_day,
            last_day,
            start,
            end_inclusive,
        })
    }

    /// Ordered buckets covering the window of `granularity` around `anchor`.
    ///
    /// For [`Granularity::Day`], `active_hours` lists local hours that hold at
    /// least one record; they get a bucket even outside business hours.
    pub fn buckets(
        &self,
        anchor: NaiveDate,
        granularity: Granularity,
        active_hours: &BTreeSet<u32>,
    ) -> Result<Vec<Bucket>> {
        match granularity {
            Granularity::Day => self.hour_buckets(anchor, active_hours),
            Granularity::Week => self.week_buckets(anchor),
            Granularity::Month => self.month_buckets(anchor),
            Granularity::Year => self.year_buckets(anchor),
        }
    }

    fn hour_buckets(&self, date: NaiveDate, active_hours: &BTreeSet<u32>) -> Result<Vec<Bucket>> {
        let hours: BTreeSet<u32> = (self.opening_hour..=self.closing_hour)
            .chain(active_hours.iter().copied().filter(|hour| *hour < 24))
            .collect();

        let mut buckets = Vec::with_capacity(hours.len());
        for hour in hours {
            let range_start = self.local_hour_start(date, hour)?;
            let range_end = self.local_hour_start(date, hour + 1)?;
            // An hour skipped by a spring-forward jump covers no time
            if range_start == range_end {
                continue;
            }
            buckets.push(Bucket {
                key: BucketKey::Hour(hour),
                range_start,
                range_end,
                label: format!("{hour:02}:00"),
                show_label: true,
            });
        }
        Ok(buckets)
    }

    fn day_bucket(&self, day: NaiveDate, label: String, show_label: bool) -> Result<Bucket> {
        Ok(Bucket {
            key: BucketKey::Day(day),
            range_start: self.local_midnight(day),
            range_end: self.local_midnight_after(day)?,
            label,
            show_label,
        })
    }

    fn week_buckets(&self, anchor: NaiveDate) -> Result<Vec<Bucket>> {
        let (monday, _) = self.day_span(anchor, Granularity::Week)?;
        monday
            .iter_days()
            .take(7)
            .map(|day| self.day_bucket(day, day.weekday().to_string(), true))
            .collect()
    }

    fn month_buckets(&self, anchor: NaiveDate) -> Result<Vec<Bucket>> {
        let (first, last) = self.day_span(anchor, Granularity::Month)?;
        first
            .iter_days()
            .take_while(|day| *day <= last)
            .map(|day| {
                let show_label = MONTH_LABEL_DAYS.contains(&day.day())
                    || day == last
                    || day == anchor;
                self.day_bucket(day, day.day().to_string(), show_label)
            })
            .collect()
    }

    fn year_buckets(&self, anchor: NaiveDate) -> Result<Vec<Bucket>> {
        (1..=12)
            .map(|month| -> Result<Bucket> {
                let first = first_of_month(anchor.year(), month)?;
                let last = last_day_of_month(first)?;
                Ok(Bucket {
                    key: BucketKey::Month(month),
                    range_start: self.local_midnight(first),
                    range_end: self.local_midnight_after(last)?,
                    label: first.format("%b").to_string(),
                    show_label: true,
                })
            })
            .collect()
    }
}
