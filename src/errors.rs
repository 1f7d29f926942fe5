//! Unified error type for the cash-flow engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants carry the
//! values needed to explain the failure to an operator, in particular the
//! expected and counted amounts of a blocked cash reconciliation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::core::closing::Discrepancy;

/// All errors produced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings could not be read, parsed, or validated
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// An anchor or closing date could not be parsed
    #[error("Invalid date input: '{input}' (expected YYYY-MM-DD)")]
    InvalidDateInput {
        /// The rejected input
        input: String,
    },

    /// A granularity string was not one of day, week, month, year
    #[error("Invalid granularity: '{input}' (expected day, week, month or year)")]
    InvalidGranularity {
        /// The rejected input
        input: String,
    },

    /// A money amount was negative or out of range
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// A required field was missing or malformed
    #[error("Validation error on '{field}': {message}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        message: String,
    },

    /// Counted cash does not match the expected cash; blocks the closing
    #[error(
        "Cash mismatch: expected {expected:.2}, counted {counted:.2} (difference {difference:.2})"
    )]
    CashMismatch {
        /// Cash expected from the payment records
        expected: Decimal,
        /// Cash physically counted
        counted: Decimal,
        /// `counted - expected`
        difference: Decimal,
    },

    /// Non-cash discrepancies exist and the operator has not acknowledged them
    #[error("{} payment method discrepancies require acknowledgement", discrepancies.len())]
    UnacknowledgedDiscrepancies {
        /// The discrepancies awaiting acknowledgement
        discrepancies: Vec<Discrepancy>,
    },

    /// The requested action is not valid in the current workflow state
    #[error("Cannot {action} while in the {state} step")]
    InvalidTransition {
        /// Name of the current state
        state: &'static str,
        /// Name of the attempted action
        action: &'static str,
    },

    /// Persisting the closing failed; the workflow stays in the recount step
    #[error("Persistence error: {message}")]
    Persistence {
        /// Description of the failure
        message: String,
    },

    /// Another session modified the same closing concurrently
    #[error("Closing for clinic {clinic_id} on {date} by {staff_id} was modified concurrently")]
    ClosingConflict {
        /// Clinic of the contended closing
        clinic_id: i64,
        /// Date of the contended closing
        date: NaiveDate,
        /// Staff member of the contended closing
        staff_id: String,
    },

    /// I/O failure, e.g. while reading the settings file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
