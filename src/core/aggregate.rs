//! Revenue aggregation into trend buckets.
//!
//! Produced revenue (financial records) and collected revenue (payment
//! records) are assigned to buckets independently, summed per bucket, then
//! turned into running totals in bucket order. Totals stay in exact decimals;
//! the exact window totals are summed from the raw record amounts, never from
//! per-bucket values.

use crate::core::calendar::{Bucket, BusinessCalendar, TimeWindow};
use crate::core::money::from_cents;
use crate::entities::{financial_record, payment_record};
use crate::errors::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::debug;

/// When a revenue event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTime {
    /// Absolute instant
    Instant(DateTime<Utc>),
    /// Business-local date only
    LocalDate(NaiveDate),
}

/// A single produced or collected amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevenueEvent {
    /// Amount of the event
    pub amount: Decimal,
    /// When it happened
    pub time: EventTime,
}

impl RevenueEvent {
    /// Absolute instant used for bucket assignment.
    pub fn resolve(&self, calendar: &BusinessCalendar) -> Result<DateTime<Utc>> {
        match self.time {
            EventTime::Instant(instant) => Ok(instant),
            EventTime::LocalDate(date) => calendar.fallback_instant(date),
        }
    }
}

impl From<&financial_record::Model> for RevenueEvent {
    fn from(record: &financial_record::Model) -> Self {
        let time = record
            .issued_at
            .map_or(EventTime::LocalDate(record.issued_date), EventTime::Instant);
        Self {
            amount: from_cents(record.amount_cents),
            time,
        }
    }
}

impl From<&payment_record::Model> for RevenueEvent {
    fn from(record: &payment_record::Model) -> Self {
        Self {
            amount: from_cents(record.amount_cents),
            time: EventTime::Instant(record.transaction_at),
        }
    }
}

/// Per-bucket sums and running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketAggregate {
    /// Produced revenue inside this bucket
    pub produced_delta: Decimal,
    /// Collected revenue inside this bucket
    pub collected_delta: Decimal,
    /// Produced revenue from the first bucket through this one
    pub produced_cumulative: Decimal,
    /// Collected revenue from the first bucket through this one
    pub collected_cumulative: Decimal,
    /// Number of produced records inside this bucket
    pub produced_count: u32,
    /// Number of collected records inside this bucket
    pub collected_count: u32,
}

impl BucketAggregate {
    /// Whether at least one produced record landed in this bucket.
    #[must_use]
    pub const fn has_produced_event(&self) -> bool {
        self.produced_count > 0
    }

    /// Whether at least one collected record landed in this bucket.
    #[must_use]
    pub const fn has_collected_event(&self) -> bool {
        self.collected_count > 0
    }
}

/// Result of aggregating a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// One entry per bucket, in bucket order
    pub buckets: Vec<BucketAggregate>,
    /// Sum of the raw amounts of all produced records inside the buckets
    pub exact_produced_total: Decimal,
    /// Sum of the raw amounts of all collected records inside the buckets
    pub exact_collected_total: Decimal,
    /// Records that fell outside every bucket
    pub unassigned: usize,
}

/// Index of the bucket containing `instant`, if any.
///
/// Buckets must be sorted by `range_start` and must not overlap; gaps are allowed.
#[must_use]
pub fn assign_bucket(buckets: &[Bucket], instant: DateTime<Utc>) -> Option<usize> {
    let after = buckets.partition_point(|bucket| bucket.range_start <= instant);
    let index = after.checked_sub(1)?;
    buckets[index].contains(instant).then_some(index)
}

/// Local hours of the window's day that hold at least one event.
pub fn active_hours<'a, I>(
    calendar: &BusinessCalendar,
    window: &TimeWindow,
    events: I,
) -> Result<BTreeSet<u32>>
where
    I: IntoIterator<Item = &'a RevenueEvent>,
{
    let mut hours = BTreeSet::new();
    for event in events {
        let instant = event.resolve(calendar)?;
        if window.contains(instant) {
            hours.insert(calendar.local_hour(instant));
        }
    }
    Ok(hours)
}

/// Assigns produced and collected events to `buckets` and computes running totals.
pub fn aggregate(
    calendar: &BusinessCalendar,
    buckets: &[Bucket],
    produced: &[RevenueEvent],
    collected: &[RevenueEvent],
) -> Result<Aggregation> {
    let mut totals = vec![BucketAggregate::default(); buckets.len()];
    let mut exact_produced_total = Decimal::ZERO;
    let mut exact_collected_total = Decimal::ZERO;
    let mut unassigned = 0;

    for event in produced {
        match assign_bucket(buckets, event.resolve(calendar)?) {
            Some(index) => {
                totals[index].produced_delta += event.amount;
                totals[index].produced_count += 1;
                exact_produced_total += event.amount;
            }
            None => unassigned += 1,
        }
    }

    for event in collected {
        match assign_bucket(buckets, event.resolve(calendar)?) {
            Some(index) => {
                totals[index].collected_delta += event.amount;
                totals[index].collected_count += 1;
                exact_collected_total += event.amount;
            }
            None => unassigned += 1,
        }
    }

    if unassigned > 0 {
        debug!("{} records fell outside every bucket and were ignored", unassigned);
    }

    // Running sums strictly in bucket order
    let mut produced_running = Decimal::ZERO;
    let mut collected_running = Decimal::ZERO;
    for bucket in &mut totals {
        produced_running += bucket.produced_delta;
        collected_running += bucket.collected_delta;
        bucket.produced_cumulative = produced_running;
        bucket.collected_cumulative = collected_running;
    }

    Ok(Aggregation {
        buckets: totals,
        exact_produced_total,
        exact_collected_total,
        unassigned,
    })
}
