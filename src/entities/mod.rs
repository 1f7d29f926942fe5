//! Entity module - Contains all SeaORM entity definitions for the collaborator store.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod cash_closing;
pub mod closing_discrepancy;
pub mod financial_record;
pub mod monthly_goal;
pub mod payment_record;

// Re-export specific types to avoid conflicts
pub use cash_closing::{
    Column as CashClosingColumn, Entity as CashClosing, Model as CashClosingModel,
};
pub use closing_discrepancy::{
    Column as ClosingDiscrepancyColumn, Entity as ClosingDiscrepancy,
    Model as ClosingDiscrepancyModel,
};
pub use financial_record::{
    Column as FinancialRecordColumn, Entity as FinancialRecord, Model as FinancialRecordModel,
};
pub use monthly_goal::{
    Column as MonthlyGoalColumn, Entity as MonthlyGoal, Model as MonthlyGoalModel,
};
pub use payment_record::{
    Column as PaymentRecordColumn, Entity as PaymentRecord, Model as PaymentRecordModel,
};
