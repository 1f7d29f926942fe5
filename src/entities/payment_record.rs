//! Payment record entity - Represents collected revenue.
//!
//! Each payment always has an absolute transaction instant. The `method` column
//! is free text entered at the front desk and is classified into a payment
//! channel only when a closing is reconciled.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_records")]
pub struct Model {
    /// Unique identifier for the payment
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Clinic that received the payment
    #[sea_orm(indexed)]
    pub clinic_id: i64,
    /// Collected amount in minor currency units (never negative)
    pub amount_cents: i64,
    /// When the money was received
    pub transaction_at: DateTimeUtc,
    /// Free-text payment method, e.g. `"Efectivo"` or `"TPV Visa"`
    pub method: String,
}

/// `PaymentRecord` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
