//! Financial record entity - Represents produced revenue (an issued invoice).
//!
//! Records are created by the billing side when an invoice is issued. The
//! absolute issue instant may be missing on older rows, in which case the
//! business-local `issued_date` is authoritative.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_records")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Clinic that issued the invoice
    #[sea_orm(indexed)]
    pub clinic_id: i64,
    /// Invoiced amount in minor currency units (never negative)
    pub amount_cents: i64,
    /// Absolute instant the invoice was issued, when known
    pub issued_at: Option<DateTimeUtc>,
    /// Business-local issue date, used when `issued_at` is absent
    pub issued_date: Date,
}

/// `FinancialRecord` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
