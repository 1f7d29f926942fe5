//! Trend series construction.
//!
//! Combines the buckets of a window, the aggregated running totals and the
//! resolved target into a [`TrendResponse`]. When the current instant falls
//! inside the window, buckets after the current one carry no cumulative value
//! so the series never suggests revenue that has not happened yet.

use crate::{
    config::Settings,
    core::{
        aggregate::{Aggregation, RevenueEvent, active_hours, aggregate},
        calendar::{Bucket, BusinessCalendar, Granularity, TimeWindow, parse_anchor_date},
        records::{fetch_financial_records, fetch_payment_records},
        target::{fetch_goals, resolve_target},
    },
    entities::{financial_record, monthly_goal, payment_record},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use tracing::info;

/// One bucket of a trend series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// Display label
    pub label: String,
    /// Whether the label is part of the reduced axis label set
    pub show_label: bool,
    /// First instant of the bucket
    pub bucket_start: DateTime<Utc>,
    /// First instant after the bucket
    pub bucket_end: DateTime<Utc>,
    /// Produced revenue inside the bucket
    pub produced_delta: Decimal,
    /// Collected revenue inside the bucket
    pub collected_delta: Decimal,
    /// Running produced total; `None` for buckets still in the future
    pub produced_cumulative: Option<Decimal>,
    /// Running collected total; `None` for buckets still in the future
    pub collected_cumulative: Option<Decimal>,
    /// Produced records inside the bucket
    pub produced_count: u32,
    /// Collected records inside the bucket
    pub collected_count: u32,
    /// Whether any produced record landed in the bucket
    pub has_produced_event: bool,
    /// Whether any collected record landed in the bucket
    pub has_collected_event: bool,
}

/// A complete trend for one clinic, anchor date and granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendResponse {
    /// Granularity of the series
    pub granularity: Granularity,
    /// Date the window is anchored on
    pub anchor_date: NaiveDate,
    /// Points in chronological order
    pub points: Vec<TrendPoint>,
    /// Revenue target for the whole window
    pub target: Decimal,
    /// Exact produced total of the window
    pub exact_total: Decimal,
    /// Exact collected total of the window
    pub exact_collected_total: Decimal,
    /// Bucket to emphasize as "current"
    pub highlight_index: usize,
    /// Absolute window covered
    pub window: TimeWindow,
}

impl TrendResponse {
    /// Whether the series stops before its last bucket.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.points
            .last()
            .is_some_and(|point| point.produced_cumulative.is_none())
    }

    /// Last known running produced total.
    #[must_use]
    pub fn produced_so_far(&self) -> Decimal {
        self.points
            .iter()
            .filter_map(|point| point.produced_cumulative)
            .last()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Index of the bucket to emphasize.
///
/// Inside the window this is the bucket holding `now`, or the latest bucket
/// already started when `now` falls between buckets, or the first bucket when
/// none has started. Outside the window it is the last bucket.
#[must_use]
pub fn highlight_index(window: &TimeWindow, buckets: &[Bucket], now: DateTime<Utc>) -> usize {
    let last = buckets.len().saturating_sub(1);
    if !window.contains(now) {
        return last;
    }
    started_buckets(buckets, now).saturating_sub(1).min(last)
}

/// Number of leading buckets that have started at `now`.
fn started_buckets(buckets: &[Bucket], now: DateTime<Utc>) -> usize {
    buckets.partition_point(|bucket| bucket.range_start <= now)
}

/// Builds a trend from already fetched records and goals.
pub fn build_trend(
    settings: &Settings,
    anchor: NaiveDate,
    granularity: Granularity,
    financial: &[financial_record::Model],
    payments: &[payment_record::Model],
    goals: &[monthly_goal::Model],
    now: DateTime<Utc>,
) -> Result<TrendResponse> {
    let calendar = BusinessCalendar::from_settings(settings);
    let window = calendar.window(anchor, granularity)?;

    let produced: Vec<RevenueEvent> = financial.iter().map(RevenueEvent::from).collect();
    let collected: Vec<RevenueEvent> = payments.iter().map(RevenueEvent::from).collect();

    let hours = match granularity {
        Granularity::Day => {
            active_hours(&calendar, &window, produced.iter().chain(collected.iter()))?
        }
        _ => Default::default(),
    };
    let buckets = calendar.buckets(anchor, granularity, &hours)?;
    let Aggregation {
        buckets: totals,
        exact_produced_total,
        exact_collected_total,
        ..
    } = aggregate(&calendar, &buckets, &produced, &collected)?;

    let highlight = highlight_index(&window, &buckets, now);
    // Buckets from this index on have not started yet
    let known_until = if window.contains(now) {
        started_buckets(&buckets, now)
    } else {
        buckets.len()
    };

    let points = buckets
        .iter()
        .zip(totals)
        .enumerate()
        .map(|(index, (bucket, total))| {
            let known = index < known_until;
            TrendPoint {
                label: bucket.label.clone(),
                show_label: bucket.show_label,
                bucket_start: bucket.range_start,
                bucket_end: bucket.range_end,
                produced_delta: total.produced_delta,
                collected_delta: total.collected_delta,
                produced_cumulative: known.then_some(total.produced_cumulative),
                collected_cumulative: known.then_some(total.collected_cumulative),
                produced_count: total.produced_count,
                collected_count: total.collected_count,
                has_produced_event: total.has_produced_event(),
                has_collected_event: total.has_collected_event(),
            }
        })
        .collect();

    Ok(TrendResponse {
        granularity,
        anchor_date: anchor,
        points,
        target: resolve_target(granularity, anchor, goals, settings)?,
        exact_total: exact_produced_total,
        exact_collected_total,
        highlight_index: highlight,
        window,
    })
}

/// Computes the trend of a clinic as of the current instant.
pub async fn get_trend<C>(
    db: &C,
    settings: &Settings,
    clinic_id: i64,
    anchor_date: &str,
    granularity: Granularity,
) -> Result<TrendResponse>
where
    C: ConnectionTrait,
{
    get_trend_at(db, settings, clinic_id, anchor_date, granularity, Utc::now()).await
}

/// Computes the trend of a clinic as seen at `now`.
///
/// Financial records, payment records and goals are read concurrently.
pub async fn get_trend_at<C>(
    db: &C,
    settings: &Settings,
    clinic_id: i64,
    anchor_date: &str,
    granularity: Granularity,
    now: DateTime<Utc>,
) -> Result<TrendResponse>
where
    C: ConnectionTrait,
{
    let anchor = parse_anchor_date(anchor_date)?;
    let window = BusinessCalendar::from_settings(settings).window(anchor, granularity)?;

    let (financial, payments, goals) = tokio::try_join!(
        fetch_financial_records(db, clinic_id, &window),
        fetch_payment_records(db, clinic_id, &window),
        fetch_goals(db, clinic_id, anchor, granularity),
    )?;

    let trend = build_trend(
        settings,
        anchor,
        granularity,
        &financial,
        &payments,
        &goals,
        now,
    )?;
    info!(
        "Trend for clinic {} ({} {}): {} buckets, produced {}, collected {}, target {}",
        clinic_id,
        granularity,
        anchor,
        trend.points.len(),
        trend.exact_total,
        trend.exact_collected_total,
        trend.target
    );
    Ok(trend)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        core::money::from_cents,
        errors::Error,
        test_utils::{
            create_test_dated_invoice, create_test_goal, create_test_invoice, create_test_payment,
            madrid_instant, setup_test_db,
        },
    };
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assert_non_decreasing(trend: &TrendResponse) {
        let known: Vec<Decimal> = trend
            .points
            .iter()
            .filter_map(|point| point.produced_cumulative)
            .collect();
        assert!(known.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[tokio::test]
    async fn test_week_on_saturday_highlights_saturday() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_invoice(&db, 1, dec!(100.00), madrid_instant(2024, 6, 10, 10)).await?;
        create_test_invoice(&db, 1, dec!(50.25), madrid_instant(2024, 6, 15, 11)).await?;

        let now = madrid_instant(2024, 6, 15, 12);
        let trend = get_trend_at(&db, &Settings::default(), 1, "2024-06-15", Granularity::Week, now)
            .await?;

        assert_eq!(trend.points.len(), 7);
        assert_eq!(trend.window.first_day, date(2024, 6, 10));
        assert_eq!(trend.window.last_day, date(2024, 6, 16));
        assert_eq!(trend.points[0].label, "Mon");
        assert_eq!(trend.points[6].label, "Sun");
        assert_eq!(trend.highlight_index, 5);
        assert_eq!(trend.exact_total, dec!(150.25));
        assert_eq!(trend.points[5].produced_cumulative, Some(dec!(150.25)));
        // Sunday has not happened yet
        assert_eq!(trend.points[6].produced_cumulative, None);
        assert!(trend.is_truncated());
        Ok(())
    }

    #[tokio::test]
    async fn test_past_window_highlights_last_bucket_without_truncation() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_invoice(&db, 1, dec!(10.00), madrid_instant(2024, 3, 5, 10)).await?;

        let now = madrid_instant(2024, 6, 15, 12);
        let trend =
            get_trend_at(&db, &Settings::default(), 1, "2024-03-20", Granularity::Month, now)
                .await?;

        assert_eq!(trend.points.len(), 31);
        assert_eq!(trend.highlight_index, 30);
        assert!(!trend.is_truncated());
        assert_eq!(trend.points[30].produced_cumulative, Some(dec!(10.00)));
        assert!(trend.points[19].show_label);
        assert!(trend.points[30].show_label);
        assert!(!trend.points[1].show_label);
        Ok(())
    }

    #[tokio::test]
    async fn test_totals_match_raw_sums() -> Result<()> {
        let db = setup_test_db().await?;
        let amounts = [dec!(0.10), dec!(0.20), dec!(33.33), dec!(66.67), dec!(1234.56)];
        for (day, amount) in (1..).zip(amounts) {
            create_test_invoice(&db, 1, amount, madrid_instant(2024, 6, day, 10)).await?;
            create_test_payment(&db, 1, amount, madrid_instant(2024, 6, day, 11), "cash").await?;
        }

        let now = madrid_instant(2025, 1, 1, 12);
        let trend =
            get_trend_at(&db, &Settings::default(), 1, "2024-06-01", Granularity::Month, now)
                .await?;

        let raw: Decimal = amounts.iter().sum();
        let deltas: Decimal = trend.points.iter().map(|point| point.produced_delta).sum();
        assert_eq!(trend.exact_total, raw);
        assert_eq!(trend.exact_collected_total, raw);
        assert_eq!(deltas, raw);
        assert_eq!(trend.points.last().unwrap().produced_cumulative, Some(raw));
        assert_non_decreasing(&trend);
        Ok(())
    }

    #[tokio::test]
    async fn test_day_trend_uses_business_hours_and_dated_records() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_invoice(&db, 1, dec!(40.00), madrid_instant(2024, 6, 14, 13)).await?;
        // No instant: lands in the opening hour
        create_test_dated_invoice(&db, 1, dec!(60.00), date(2024, 6, 14)).await?;
        // Outside business hours: still gets its own bucket
        create_test_payment(&db, 1, dec!(5.00), madrid_instant(2024, 6, 14, 20), "cash").await?;

        let now = madrid_instant(2024, 6, 14, 12);
        let trend =
            get_trend_at(&db, &Settings::default(), 1, "2024-06-14", Granularity::Day, now)
                .await?;

        let labels: Vec<&str> = trend.points.iter().map(|point| point.label.as_str()).collect();
        assert_eq!(
            labels,
            [
                "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "20:00"
            ]
        );
        assert_eq!(trend.points[0].produced_delta, dec!(60.00));
        assert!(trend.points[0].has_produced_event);
        assert_eq!(trend.highlight_index, 3);
        assert_eq!(trend.points[3].produced_cumulative, Some(dec!(60.00)));
        assert_eq!(trend.points[4].produced_cumulative, None);
        assert_eq!(trend.exact_total, dec!(100.00));
        assert_eq!(trend.exact_collected_total, dec!(5.00));
        Ok(())
    }

    #[test]
    fn test_day_trend_before_opening_has_no_running_totals() {
        let trend = build_trend(
            &Settings::default(),
            date(2024, 6, 14),
            Granularity::Day,
            &[],
            &[],
            &[],
            madrid_instant(2024, 6, 14, 7),
        )
        .unwrap();

        assert_eq!(trend.points[0].label, "09:00");
        assert_eq!(trend.highlight_index, 0);
        assert!(
            trend
                .points
                .iter()
                .all(|point| point.produced_cumulative.is_none()
                    && point.collected_cumulative.is_none())
        );
        assert_eq!(trend.produced_so_far(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_trend_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_invoice(&db, 1, dec!(12.34), madrid_instant(2024, 6, 3, 9)).await?;
        create_test_payment(&db, 1, dec!(12.34), madrid_instant(2024, 6, 3, 10), "tpv").await?;
        let settings = Settings::default();
        let now = madrid_instant(2024, 6, 15, 12);

        let first = get_trend_at(&db, &settings, 1, "2024-06-15", Granularity::Year, now).await?;
        let second = get_trend_at(&db, &settings, 1, "2024-06-15", Granularity::Year, now).await?;
        assert_eq!(first, second);
        assert_eq!(first.highlight_index, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_goal_falls_back_to_default() -> Result<()> {
        let db = setup_test_db().await?;
        let now = madrid_instant(2024, 6, 15, 12);

        let trend =
            get_trend_at(&db, &Settings::default(), 1, "2024-06-15", Granularity::Day, now)
                .await?;
        // 10000 over 30 days
        assert_eq!(trend.target, dec!(333.33));

        create_test_goal(&db, 1, 2024, 6, dec!(6000.00)).await?;
        let trend =
            get_trend_at(&db, &Settings::default(), 1, "2024-06-15", Granularity::Day, now)
                .await?;
        assert_eq!(trend.target, from_cents(20_000));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_clinics_are_ignored() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_invoice(&db, 2, dec!(99.00), madrid_instant(2024, 6, 14, 10)).await?;

        let trend = get_trend_at(
            &db,
            &Settings::default(),
            1,
            "2024-06-14",
            Granularity::Week,
            madrid_instant(2024, 7, 1, 10),
        )
        .await?;
        assert_eq!(trend.exact_total, Decimal::ZERO);
        assert_non_decreasing(&trend);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_anchor_date() -> Result<()> {
        let db = setup_test_db().await?;
        let result = get_trend(&db, &Settings::default(), 1, "2024-13-40", Granularity::Day).await;
        assert!(matches!(result, Err(Error::InvalidDateInput { .. })));
        Ok(())
    }

    #[test]
    fn test_highlight_outside_window_is_last() {
        let calendar = BusinessCalendar::from_settings(&Settings::default());
        let anchor = date(2024, 6, 15);
        let window = calendar.window(anchor, Granularity::Week).unwrap();
        let buckets = calendar
            .buckets(anchor, Granularity::Week, &Default::default())
            .unwrap();

        assert_eq!(
            highlight_index(&window, &buckets, madrid_instant(2024, 6, 20, 10)),
            6
        );
        assert_eq!(
            highlight_index(&window, &buckets, madrid_instant(2024, 6, 10, 0)),
            0
        );
    }
}
