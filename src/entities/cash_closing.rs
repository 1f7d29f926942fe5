//! Cash closing entity - The persisted result of a daily reconciliation.
//!
//! One row exists per `(clinic_id, date, staff_id)`. Editing a closing re-opens
//! the same row; `version` is incremented on every update and checked on write
//! so that two sessions reconciling the same key cannot silently overwrite
//! each other.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cash closing database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cash_closings")]
pub struct Model {
    /// Unique identifier for the closing
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Clinic being closed
    pub clinic_id: i64,
    /// Staff member who performed the closing
    pub staff_id: String,
    /// Business-local date being closed
    pub date: Date,
    /// Cash in the drawer at the start of the day
    pub starter_box_cents: i64,
    /// Revenue produced during the day
    pub daily_box_cents: i64,
    /// Cash taken out of the drawer during the day
    pub cash_withdrawals_cents: i64,
    /// `starter_box + daily_box - cash_withdrawals`
    pub cash_balance_cents: i64,
    /// Expected cash according to payment records
    pub expected_cash_cents: i64,
    /// Expected card/TPV total according to payment records
    pub expected_card_cents: i64,
    /// Expected bank transfer total according to payment records
    pub expected_transfer_cents: i64,
    /// Expected check total according to payment records
    pub expected_check_cents: i64,
    /// Physically counted cash
    pub counted_cash_cents: i64,
    /// Counted card/TPV total
    pub counted_card_cents: i64,
    /// Counted bank transfer total
    pub counted_transfer_cents: i64,
    /// Counted check total
    pub counted_check_cents: i64,
    /// Optimistic concurrency token, starts at 1
    pub version: i32,
    /// When the closing was first committed
    pub created_at: DateTimeUtc,
    /// When the closing was last committed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `CashClosing` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One closing has many acknowledged discrepancies
    #[sea_orm(has_many = "super::closing_discrepancy::Entity")]
    Discrepancies,
}

impl Related<super::closing_discrepancy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Discrepancies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
