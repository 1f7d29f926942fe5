//! Revenue target resolution.
//!
//! Derives the target for a displayed window from the stored monthly goals.
//! Months without a goal use the configured default goal.

use crate::{
    config::Settings,
    core::{
        calendar::{Granularity, days_in_month},
        goals::{fetch_monthly_goal, fetch_monthly_goals_for_year},
        money::{CURRENCY_SCALE, from_cents},
    },
    entities::monthly_goal,
    errors::Result,
};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::ConnectionTrait;

/// Computes the target for `granularity` around `anchor`.
///
/// `goals` holds the goal rows available for the anchor's year (or month).
/// Rows for other periods are ignored.
///
/// * Day: monthly goal divided by the number of days in the month
/// * Week: monthly goal divided by `weeks_per_month`
/// * Month: the monthly goal
/// * Year: sum of the year's monthly goals, or twelve default goals when the
///   year has none
pub fn resolve_target(
    granularity: Granularity,
    anchor: NaiveDate,
    goals: &[monthly_goal::Model],
    settings: &Settings,
) -> Result<Decimal> {
    let goal_for_month = || {
        goals
            .iter()
            .find(|goal| goal.year == anchor.year() && goal.month == anchor.month())
            .map_or(settings.default_monthly_goal, |goal| {
                from_cents(goal.revenue_goal_cents)
            })
    };

    let target = match granularity {
        Granularity::Day => goal_for_month() / Decimal::from(days_in_month(anchor)?),
        Granularity::Week => goal_for_month() / settings.weeks_per_month,
        Granularity::Month => goal_for_month(),
        Granularity::Year => {
            let year_goals: Vec<Decimal> = goals
                .iter()
                .filter(|goal| goal.year == anchor.year())
                .map(|goal| from_cents(goal.revenue_goal_cents))
                .collect();
            if year_goals.is_empty() {
                settings.default_monthly_goal * Decimal::from(12)
            } else {
                year_goals.into_iter().sum()
            }
        }
    };

    Ok(target.round_dp(CURRENCY_SCALE))
}

/// Loads the goal rows [`resolve_target`] needs for `granularity` around `anchor`.
///
/// A year needs every goal of the year; other granularities only the
/// anchor's month.
pub async fn fetch_goals<C>(
    db: &C,
    clinic_id: i64,
    anchor: NaiveDate,
    granularity: Granularity,
) -> Result<Vec<monthly_goal::Model>>
where
    C: ConnectionTrait,
{
    match granularity {
        Granularity::Year => fetch_monthly_goals_for_year(db, clinic_id, anchor.year()).await,
        _ => Ok(fetch_monthly_goal(db, clinic_id, anchor.year(), anchor.month())
            .await?
            .into_iter()
            .collect()),
    }
}

/// Loads the relevant goals and resolves the target for a clinic.
pub async fn fetch_target<C>(
    db: &C,
    settings: &Settings,
    clinic_id: i64,
    anchor: NaiveDate,
    granularity: Granularity,
) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let goals = fetch_goals(db, clinic_id, anchor, granularity).await?;
    resolve_target(granularity, anchor, &goals, settings)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::goals::set_monthly_goal;
    use crate::test_utils::setup_test_db;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn goal(year: i32, month: u32, amount: Decimal) -> monthly_goal::Model {
        monthly_goal::Model {
            id: i64::from(month),
            clinic_id: 1,
            year,
            month,
            revenue_goal_cents: crate::core::money::to_cents(amount).unwrap(),
            updated_at: NaiveDateTime::default(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_day_target_divides_by_days_in_month() {
        let settings = Settings::default();
        let goals = vec![goal(2024, 6, dec!(30000))];
        let target = resolve_target(Granularity::Day, date(2024, 6, 15), &goals, &settings);
        assert_eq!(target.unwrap(), dec!(1000));

        let goals = vec![goal(2024, 2, dec!(2900))];
        let target = resolve_target(Granularity::Day, date(2024, 2, 1), &goals, &settings);
        assert_eq!(target.unwrap(), dec!(100));
    }

    #[test]
    fn test_day_target_falls_back_to_default() {
        let settings = Settings {
            default_monthly_goal: dec!(3100),
            ..Settings::default()
        };
        let target = resolve_target(Granularity::Day, date(2024, 7, 15), &[], &settings);
        assert_eq!(target.unwrap(), dec!(100));
    }

    #[test]
    fn test_week_target_uses_weeks_per_month() {
        let settings = Settings::default();
        let goals = vec![goal(2024, 6, dec!(4330))];
        let target = resolve_target(Granularity::Week, date(2024, 6, 15), &goals, &settings);
        assert_eq!(target.unwrap(), dec!(1000));
    }

    #[test]
    fn test_month_target_is_goal() {
        let settings = Settings::default();
        let goals = vec![goal(2024, 5, dec!(1)), goal(2024, 6, dec!(25000.50))];
        let target = resolve_target(Granularity::Month, date(2024, 6, 15), &goals, &settings);
        assert_eq!(target.unwrap(), dec!(25000.50));
    }

    #[test]
    fn test_year_target_sums_goals() {
        let settings = Settings::default();
        let goals = vec![goal(2024, 1, dec!(1000)), goal(2024, 7, dec!(2500))];
        let target = resolve_target(Granularity::Year, date(2024, 3, 1), &goals, &settings);
        assert_eq!(target.unwrap(), dec!(3500));
    }

    #[test]
    fn test_year_target_default_when_no_goals() {
        let settings = Settings {
            default_monthly_goal: dec!(1000),
            ..Settings::default()
        };
        let target = resolve_target(Granularity::Year, date(2024, 3, 1), &[], &settings);
        assert_eq!(target.unwrap(), dec!(12000));
    }

    #[tokio::test]
    async fn test_fetch_target_from_store() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = Settings::default();
        set_monthly_goal(&db, 1, 2024, 6, dec!(6000)).await?;
        set_monthly_goal(&db, 1, 2024, 7, dec!(4000)).await?;

        let day = fetch_target(&db, &settings, 1, date(2024, 6, 3), Granularity::Day).await?;
        assert_eq!(day, dec!(200));
        let year = fetch_target(&db, &settings, 1, date(2024, 6, 3), Granularity::Year).await?;
        assert_eq!(year, dec!(10000));
        let other_clinic =
            fetch_target(&db, &settings, 2, date(2024, 6, 3), Granularity::Month).await?;
        assert_eq!(other_clinic, settings.default_monthly_goal);
        Ok(())
    }
}
