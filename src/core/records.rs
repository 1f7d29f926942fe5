//! Produced and collected revenue records.
//!
//! Provides the read side used by trends and closings (records of one clinic
//! inside a [`TimeWindow`]) and the write side used by billing to register
//! issued invoices and received payments.

use crate::{
    core::{calendar::TimeWindow, money::non_negative_cents},
    entities::{FinancialRecord, PaymentRecord, financial_record, payment_record},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use tracing::{debug, info};

/// Retrieves the financial records of a clinic issued inside `window`.
///
/// Records with an absolute issue instant match on that instant. Records
/// without one match when their business-local issue date lies inside the
/// window's days.
pub async fn fetch_financial_records<C>(
    db: &C,
    clinic_id: i64,
    window: &TimeWindow,
) -> Result<Vec<financial_record::Model>>
where
    C: ConnectionTrait,
{
    let records = FinancialRecord::find()
        .filter(financial_record::Column::ClinicId.eq(clinic_id))
        .filter(
            Condition::any()
                .add(financial_record::Column::IssuedAt.between(window.start, window.end_inclusive))
                .add(
                    Condition::all()
                        .add(financial_record::Column::IssuedAt.is_null())
                        .add(
                            financial_record::Column::IssuedDate
                                .between(window.first_day, window.last_day),
                        ),
                ),
        )
        .order_by_asc(financial_record::Column::Id)
        .all(db)
        .await?;

    debug!(
        "Fetched {} financial records for clinic {} between {} and {}",
        records.len(),
        clinic_id,
        window.first_day,
        window.last_day
    );
    Ok(records)
}

/// Retrieves the payment records of a clinic received inside `window`.
pub async fn fetch_payment_records<C>(
    db: &C,
    clinic_id: i64,
    window: &TimeWindow,
) -> Result<Vec<payment_record::Model>>
where
    C: ConnectionTrait,
{
    let records = PaymentRecord::find()
        .filter(payment_record::Column::ClinicId.eq(clinic_id))
        .filter(payment_record::Column::TransactionAt.between(window.start, window.end_inclusive))
        .order_by_asc(payment_record::Column::Id)
        .all(db)
        .await?;

    debug!(
        "Fetched {} payment records for clinic {} between {} and {}",
        records.len(),
        clinic_id,
        window.first_day,
        window.last_day
    );
    Ok(records)
}

/// Registers an issued invoice.
///
/// # Arguments
/// * `db` - Database connection
/// * `clinic_id` - Issuing clinic
/// * `amount` - Invoiced amount, must not be negative
/// * `issued_at` - Absolute issue instant, if known
/// * `issued_date` - Business-local issue date
pub async fn record_invoice<C>(
    db: &C,
    clinic_id: i64,
    amount: Decimal,
    issued_at: Option<DateTime<Utc>>,
    issued_date: NaiveDate,
) -> Result<financial_record::Model>
where
    C: ConnectionTrait,
{
    let record = financial_record::ActiveModel {
        clinic_id: Set(clinic_id),
        amount_cents: Set(non_negative_cents(amount)?),
        issued_at: Set(issued_at),
        issued_date: Set(issued_date),
        ..Default::default()
    };

    let saved = record.insert(db).await?;
    info!(
        "Recorded invoice {} for clinic {}: {}",
        saved.id, clinic_id, amount
    );
    Ok(saved)
}

/// Registers a received payment.
///
/// `method` is stored as entered; it is classified into a payment channel
/// only during reconciliation.
pub async fn record_payment<C>(
    db: &C,
    clinic_id: i64,
    amount: Decimal,
    transaction_at: DateTime<Utc>,
    method: &str,
) -> Result<payment_record::Model>
where
    C: ConnectionTrait,
{
    let record = payment_record::ActiveModel {
        clinic_id: Set(clinic_id),
        amount_cents: Set(non_negative_cents(amount)?),
        transaction_at: Set(transaction_at),
        method: Set(method.trim().to_string()),
        ..Default::default()
    };

    let saved = record.insert(db).await?;
    info!(
        "Recorded payment {} for clinic {}: {} via '{}'",
        saved.id, clinic_id, amount, saved.method
    );
    Ok(saved)
}
