//! Persistence of cash closings.
//!
//! Rows are keyed by `(clinic_id, date, staff_id)`. A first commit inserts the
//! row with version 1; later commits of the same key update it only when the
//! stored version is still the one the session read, and bump it by one. The
//! closing row and its discrepancies are always written in one transaction.

use super::model::{ClosingDraft, Discrepancy};
use crate::{
    core::{money::to_cents, payment_method::PaymentChannel},
    entities::{CashClosing, ClosingDiscrepancy, cash_closing, closing_discrepancy},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    DatabaseConnection, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*,
};
use tracing::{info, warn};

/// Retrieves the closing of one staff member for one day, if committed.
pub async fn find_closing<C>(
    db: &C,
    clinic_id: i64,
    staff_id: &str,
    date: NaiveDate,
) -> Result<Option<cash_closing::Model>>
where
    C: ConnectionTrait,
{
    CashClosing::find()
        .filter(cash_closing::Column::ClinicId.eq(clinic_id))
        .filter(cash_closing::Column::StaffId.eq(staff_id))
        .filter(cash_closing::Column::Date.eq(date))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the most recent closing of a clinic strictly before `date`.
///
/// Any staff member's closing counts: the drawer is shared, so the latest
/// committed balance is what the next day starts with.
pub async fn fetch_prior_closing<C>(
    db: &C,
    clinic_id: i64,
    date: NaiveDate,
) -> Result<Option<cash_closing::Model>>
where
    C: ConnectionTrait,
{
    CashClosing::find()
        .filter(cash_closing::Column::ClinicId.eq(clinic_id))
        .filter(cash_closing::Column::Date.lt(date))
        .order_by_desc(cash_closing::Column::Date)
        .order_by_desc(cash_closing::Column::UpdatedAt)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the closings of a clinic between two dates, inclusive.
pub async fn list_closings<C>(
    db: &C,
    clinic_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<cash_closing::Model>>
where
    C: ConnectionTrait,
{
    CashClosing::find()
        .filter(cash_closing::Column::ClinicId.eq(clinic_id))
        .filter(cash_closing::Column::Date.between(from, to))
        .order_by_asc(cash_closing::Column::Date)
        .order_by_asc(cash_closing::Column::StaffId)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the discrepancies acknowledged on a closing.
pub async fn fetch_closing_discrepancies<C>(
    db: &C,
    closing_id: i64,
) -> Result<Vec<closing_discrepancy::Model>>
where
    C: ConnectionTrait,
{
    ClosingDiscrepancy::find()
        .filter(closing_discrepancy::Column::ClosingId.eq(closing_id))
        .order_by_asc(closing_discrepancy::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn conflict(draft: &ClosingDraft) -> Error {
    Error::ClosingConflict {
        clinic_id: draft.clinic_id,
        date: draft.date,
        staff_id: draft.staff_id.clone(),
    }
}

fn amounts_model(draft: &ClosingDraft) -> Result<cash_closing::ActiveModel> {
    Ok(cash_closing::ActiveModel {
        clinic_id: Set(draft.clinic_id),
        staff_id: Set(draft.staff_id.clone()),
        date: Set(draft.date),
        starter_box_cents: Set(to_cents(draft.starter_box)?),
        daily_box_cents: Set(to_cents(draft.daily_box)?),
        cash_withdrawals_cents: Set(to_cents(draft.cash_withdrawals)?),
        cash_balance_cents: Set(to_cents(draft.cash_balance)?),
        expected_cash_cents: Set(to_cents(draft.expected.cash)?),
        expected_card_cents: Set(to_cents(draft.expected.card)?),
        expected_transfer_cents: Set(to_cents(draft.expected.transfer)?),
        expected_check_cents: Set(to_cents(draft.expected.check)?),
        counted_cash_cents: Set(to_cents(draft.counted.cash)?),
        counted_card_cents: Set(to_cents(draft.counted.card)?),
        counted_transfer_cents: Set(to_cents(draft.counted.transfer)?),
        counted_check_cents: Set(to_cents(draft.counted.check)?),
        ..Default::default()
    })
}

async fn replace_discrepancies<C>(
    db: &C,
    closing_id: i64,
    discrepancies: &[Discrepancy],
) -> Result<()>
where
    C: ConnectionTrait,
{
    ClosingDiscrepancy::delete_many()
        .filter(closing_discrepancy::Column::ClosingId.eq(closing_id))
        .exec(db)
        .await?;

    for discrepancy in discrepancies {
        closing_discrepancy::ActiveModel {
            closing_id: Set(closing_id),
            channel: Set(discrepancy.channel.as_str().to_string()),
            expected_cents: Set(to_cents(discrepancy.expected)?),
            counted_cents: Set(to_cents(discrepancy.counted)?),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

/// Writes a finalized closing.
///
/// Without `expected_version` the key must not exist yet; with it, the stored
/// row must still carry that version. Either way a lost race surfaces as
/// [`Error::ClosingConflict`] and nothing is written.
pub async fn upsert_closing(
    db: &DatabaseConnection,
    draft: &ClosingDraft,
) -> Result<cash_closing::Model> {
    let txn = db.begin().await?;
    let now = Utc::now();
    let mut model = amounts_model(draft)?;

    let saved = match draft.expected_version {
        None => {
            model.version = Set(1);
            model.created_at = Set(now);
            model.updated_at = Set(now);
            match model.insert(&txn).await {
                Ok(saved) => saved,
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    warn!(
                        "Closing for clinic {} on {} by {} already exists",
                        draft.clinic_id, draft.date, draft.staff_id
                    );
                    return Err(conflict(draft));
                }
                Err(err) => return Err(err.into()),
            }
        }
        Some(version) => {
            model.version = Set(version + 1);
            model.updated_at = Set(now);
            let result = CashClosing::update_many()
                .set(model)
                .filter(cash_closing::Column::ClinicId.eq(draft.clinic_id))
                .filter(cash_closing::Column::StaffId.eq(draft.staff_id.as_str()))
                .filter(cash_closing::Column::Date.eq(draft.date))
                .filter(cash_closing::Column::Version.eq(version))
                .exec(&txn)
                .await?;
            if result.rows_affected != 1 {
                warn!(
                    "Closing for clinic {} on {} by {} changed since version {}",
                    draft.clinic_id, draft.date, draft.staff_id, version
                );
                return Err(conflict(draft));
            }
            find_closing(&txn, draft.clinic_id, &draft.staff_id, draft.date)
                .await?
                .ok_or_else(|| conflict(draft))?
        }
    };

    replace_discrepancies(&txn, saved.id, &draft.discrepancies).await?;
    txn.commit().await?;

    info!(
        "Committed closing {} (version {}) for clinic {} on {} by {} with {} discrepancies",
        saved.id,
        saved.version,
        saved.clinic_id,
        saved.date,
        saved.staff_id,
        draft.discrepancies.len()
    );
    Ok(saved)
}

/// Parses the channel stored on a discrepancy row.
#[must_use]
pub fn discrepancy_channel(model: &closing_discrepancy::Model) -> Option<PaymentChannel> {
    PaymentChannel::ALL
        .into_iter()
        .find(|channel| channel.as_str() == model.channel)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{core::closing::model::ChannelAmounts, test_utils::setup_test_db};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn draft(staff_id: &str, date: NaiveDate) -> ClosingDraft {
        let expected = ChannelAmounts {
            cash: dec!(120.00),
            card: dec!(300.00),
            transfer: Decimal::ZERO,
            check: Decimal::ZERO,
        };
        ClosingDraft {
            clinic_id: 1,
            staff_id: staff_id.to_string(),
            date,
            starter_box: dec!(200.00),
            daily_box: dec!(420.00),
            cash_withdrawals: dec!(20.00),
            cash_balance: dec!(600.00),
            expected,
            counted: expected,
            discrepancies: Vec::new(),
            expected_version: None,
        }
    }

    #[tokio::test]
    async fn test_insert_new_closing() -> Result<()> {
        let db = setup_test_db().await?;
        let saved = upsert_closing(&db, &draft("ana", day(14))).await?;

        assert_eq!(saved.version, 1);
        assert_eq!(saved.cash_balance_cents, 60_000);
        assert_eq!(saved.expected_card_cents, 30_000);

        let found = find_closing(&db, 1, "ana", day(14)).await?.unwrap();
        assert_eq!(found.id, saved.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_insert_of_same_key_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        upsert_closing(&db, &draft("ana", day(14))).await?;

        let result = upsert_closing(&db, &draft("ana", day(14))).await;
        assert!(matches!(result, Err(Error::ClosingConflict { .. })));

        // A different staff member can close the same day
        upsert_closing(&db, &draft("luis", day(14))).await?;
        assert_eq!(list_closings(&db, 1, day(14), day(14)).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_replaces_discrepancies() -> Result<()> {
        let db = setup_test_db().await?;
        let mut first = draft("ana", day(14));
        first.counted.card = dec!(250.00);
        first.discrepancies = vec![Discrepancy {
            channel: PaymentChannel::Card,
            expected: dec!(300.00),
            counted: dec!(250.00),
        }];
        let saved = upsert_closing(&db, &first).await?;
        let stored = fetch_closing_discrepancies(&db, saved.id).await?;
        assert_eq!(stored.len(), 1);
        assert_eq!(discrepancy_channel(&stored[0]), Some(PaymentChannel::Card));
        assert_eq!(stored[0].counted_cents, 25_000);

        let mut second = draft("ana", day(14));
        second.expected_version = Some(saved.version);
        let updated = upsert_closing(&db, &second).await?;

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.version, 2);
        assert_eq!(updated.counted_card_cents, 30_000);
        assert!(fetch_closing_discrepancies(&db, saved.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() -> Result<()> {
        let db = setup_test_db().await?;
        let saved = upsert_closing(&db, &draft("ana", day(14))).await?;

        let mut winner = draft("ana", day(14));
        winner.expected_version = Some(saved.version);
        upsert_closing(&db, &winner).await?;

        let mut loser = draft("ana", day(14));
        loser.expected_version = Some(saved.version);
        loser.cash_withdrawals = dec!(0.00);
        let result = upsert_closing(&db, &loser).await;
        assert!(matches!(result, Err(Error::ClosingConflict { .. })));

        let stored = find_closing(&db, 1, "ana", day(14)).await?.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.cash_withdrawals_cents, 2_000);
        Ok(())
    }

    #[tokio::test]
    async fn test_prior_closing_is_latest_strictly_before() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(fetch_prior_closing(&db, 1, day(14)).await?.is_none());

        upsert_closing(&db, &draft("ana", day(10))).await?;
        upsert_closing(&db, &draft("luis", day(12))).await?;
        upsert_closing(&db, &draft("ana", day(14))).await?;

        let prior = fetch_prior_closing(&db, 1, day(14)).await?.unwrap();
        assert_eq!(prior.date, day(12));
        assert_eq!(prior.staff_id, "luis");

        assert!(fetch_prior_closing(&db, 2, day(14)).await?.is_none());
        Ok(())
    }
}
