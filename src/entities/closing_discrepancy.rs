//! Closing discrepancy entity - A non-cash mismatch acknowledged at closing time.
//!
//! Discrepancies are kept for later review. They are replaced whenever the
//! owning closing is committed again.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Closing discrepancy database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "closing_discrepancies")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// ID of the closing this discrepancy belongs to
    pub closing_id: i64,
    /// Payment channel: `"card"`, `"transfer"` or `"check"`
    pub channel: String,
    /// Expected amount in minor units
    pub expected_cents: i64,
    /// Counted amount in minor units
    pub counted_cents: i64,
}

/// Defines relationships between `ClosingDiscrepancy` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each discrepancy belongs to one closing
    #[sea_orm(
        belongs_to = "super::cash_closing::Entity",
        from = "Column::ClosingId",
        to = "super::cash_closing::Column::Id"
    )]
    CashClosing,
}

impl Related<super::cash_closing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CashClosing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
