//! Monthly revenue goal storage.
//!
//! Goals are stored per clinic and calendar month. Setting a goal for a month
//! that already has one replaces it, so at most one row exists per key.

use crate::{
    core::money::non_negative_cents,
    entities::{MonthlyGoal, monthly_goal},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::info;

fn validate_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(Error::Validation {
            field: "month",
            message: format!("month must be 1-12, got {month}"),
        })
    }
}

/// Retrieves the goal of one clinic for one month, if set.
pub async fn fetch_monthly_goal<C>(
    db: &C,
    clinic_id: i64,
    year: i32,
    month: u32,
) -> Result<Option<monthly_goal::Model>>
where
    C: ConnectionTrait,
{
    validate_month(month)?;
    MonthlyGoal::find()
        .filter(monthly_goal::Column::ClinicId.eq(clinic_id))
        .filter(monthly_goal::Column::Year.eq(year))
        .filter(monthly_goal::Column::Month.eq(month))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves every goal set for a clinic in a year, ordered by month.
pub async fn fetch_monthly_goals_for_year<C>(
    db: &C,
    clinic_id: i64,
    year: i32,
) -> Result<Vec<monthly_goal::Model>>
where
    C: ConnectionTrait,
{
    MonthlyGoal::find()
        .filter(monthly_goal::Column::ClinicId.eq(clinic_id))
        .filter(monthly_goal::Column::Year.eq(year))
        .order_by_asc(monthly_goal::Column::Month)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sets the revenue goal of a clinic for a month, replacing any existing goal.
///
/// # Arguments
/// * `db` - Database connection
/// * `clinic_id` - Clinic the goal applies to
/// * `year` - Calendar year
/// * `month` - Calendar month (1-12)
/// * `revenue_goal` - Goal amount, must not be negative
pub async fn set_monthly_goal<C>(
    db: &C,
    clinic_id: i64,
    year: i32,
    month: u32,
    revenue_goal: Decimal,
) -> Result<monthly_goal::Model>
where
    C: ConnectionTrait,
{
    validate_month(month)?;
    let revenue_goal_cents = non_negative_cents(revenue_goal)?;
    let now = Utc::now().naive_utc();

    let existing = fetch_monthly_goal(db, clinic_id, year, month).await?;

    let saved = if let Some(goal) = existing {
        let mut active_model: monthly_goal::ActiveModel = goal.into();
        active_model.revenue_goal_cents = Set(revenue_goal_cents);
        active_model.updated_at = Set(now);
        active_model.update(db).await?
    } else {
        let new_goal = monthly_goal::ActiveModel {
            clinic_id: Set(clinic_id),
            year: Set(year),
            month: Set(month),
            revenue_goal_cents: Set(revenue_goal_cents),
            updated_at: Set(now),
            ..Default::default()
        };
        new_goal.insert(db).await?
    };

    info!(
        "Set monthly goal for clinic {} {:04}-{:02}: {}",
        clinic_id, year, month, revenue_goal
    );
    Ok(saved)
}
