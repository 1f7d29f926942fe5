//! Shared test utilities for the cash-flow engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating records with sensible defaults.

use crate::{
    core::{goals, records},
    entities,
    errors::Result,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// The UTC instant of a whole local hour in Europe/Madrid.
///
/// # Panics
/// Panics on a date or hour that does not exist locally.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn madrid_instant(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    chrono_tz::Europe::Madrid
        .with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap()
        .with_timezone(&Utc)
}

/// Creates an invoice with an absolute issue instant.
///
/// The issue date is the Madrid-local date of `issued_at`.
pub async fn create_test_invoice(
    db: &DatabaseConnection,
    clinic_id: i64,
    amount: Decimal,
    issued_at: DateTime<Utc>,
) -> Result<entities::financial_record::Model> {
    let issued_date = issued_at
        .with_timezone(&chrono_tz::Europe::Madrid)
        .date_naive();
    records::record_invoice(db, clinic_id, amount, Some(issued_at), issued_date).await
}

/// Creates an invoice known only by its business-local date.
pub async fn create_test_dated_invoice(
    db: &DatabaseConnection,
    clinic_id: i64,
    amount: Decimal,
    issued_date: NaiveDate,
) -> Result<entities::financial_record::Model> {
    records::record_invoice(db, clinic_id, amount, None, issued_date).await
}

/// Creates a payment with the given free-text method.
pub async fn create_test_payment(
    db: &DatabaseConnection,
    clinic_id: i64,
    amount: Decimal,
    transaction_at: DateTime<Utc>,
    method: &str,
) -> Result<entities::payment_record::Model> {
    records::record_payment(db, clinic_id, amount, transaction_at, method).await
}

/// Sets a monthly goal.
pub async fn create_test_goal(
    db: &DatabaseConnection,
    clinic_id: i64,
    year: i32,
    month: u32,
    amount: Decimal,
) -> Result<entities::monthly_goal::Model> {
    goals::set_monthly_goal(db, clinic_id, year, month, amount).await
}
