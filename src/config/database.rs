//! Database configuration module for the cash-flow engine.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! models. Composite uniqueness (one goal per clinic and month, one closing per
//! clinic, date and staff member) is added with explicit index statements.

use crate::entities::{
    CashClosing, ClosingDiscrepancy, FinancialRecord, MonthlyGoal, PaymentRecord, cash_closing,
    monthly_goal,
};
use crate::errors::Result;
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::{debug, info};

/// Database used when `DATABASE_URL` is not set
const DEFAULT_DATABASE_URL: &str = "sqlite://data/clinic_cashflow.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Safe to call on every start-up.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut financial_record_table = schema.create_table_from_entity(FinancialRecord);
    let mut payment_record_table = schema.create_table_from_entity(PaymentRecord);
    let mut monthly_goal_table = schema.create_table_from_entity(MonthlyGoal);
    let mut cash_closing_table = schema.create_table_from_entity(CashClosing);
    let mut discrepancy_table = schema.create_table_from_entity(ClosingDiscrepancy);

    for table in [
        &mut financial_record_table,
        &mut payment_record_table,
        &mut monthly_goal_table,
        &mut cash_closing_table,
        &mut discrepancy_table,
    ] {
        db.execute(builder.build(&*table.if_not_exists())).await?;
    }

    let mut indexes = Vec::new();
    indexes.extend(schema.create_index_from_entity(FinancialRecord));
    indexes.extend(schema.create_index_from_entity(PaymentRecord));
    indexes.push(
        Index::create()
            .name("idx_unique_monthly_goal")
            .table(MonthlyGoal)
            .col(monthly_goal::Column::ClinicId)
            .col(monthly_goal::Column::Year)
            .col(monthly_goal::Column::Month)
            .unique()
            .to_owned(),
    );
    indexes.push(
        Index::create()
            .name("idx_unique_cash_closing")
            .table(CashClosing)
            .col(cash_closing::Column::ClinicId)
            .col(cash_closing::Column::Date)
            .col(cash_closing::Column::StaffId)
            .unique()
            .to_owned(),
    );

    for mut index in indexes {
        let index: &IndexCreateStatement = index.if_not_exists();
        db.execute(builder.build(index)).await?;
    }

    info!("Database tables and indexes ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{
        CashClosingModel, ClosingDiscrepancyModel, FinancialRecordModel, MonthlyGoalModel,
        PaymentRecordModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<FinancialRecordModel> = FinancialRecord::find().limit(1).all(&db).await?;
        let _: Vec<PaymentRecordModel> = PaymentRecord::find().limit(1).all(&db).await?;
        let _: Vec<MonthlyGoalModel> = MonthlyGoal::find().limit(1).all(&db).await?;
        let _: Vec<CashClosingModel> = CashClosing::find().limit(1).all(&db).await?;
        let _: Vec<ClosingDiscrepancyModel> = ClosingDiscrepancy::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
