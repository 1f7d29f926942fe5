//! Monthly goal entity - Revenue goal per clinic and calendar month.
//!
//! At most one row exists per `(clinic_id, year, month)`; a unique index
//! enforces this at table creation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly goal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_goals")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Clinic the goal belongs to
    pub clinic_id: i64,
    /// Calendar year
    pub year: i32,
    /// Calendar month (1-12)
    pub month: u32,
    /// Revenue goal in minor currency units
    pub revenue_goal_cents: i64,
    /// When the goal was last modified
    pub updated_at: DateTime,
}

/// `MonthlyGoal` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
