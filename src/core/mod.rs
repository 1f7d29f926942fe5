//! Core business logic - framework-agnostic trend and reconciliation operations.
//!
//! Nothing in here knows about the command line. Store access goes through
//! async functions generic over `ConnectionTrait`; bucketing, aggregation and
//! target arithmetic are synchronous and deterministic.

pub mod aggregate;
pub mod calendar;
pub mod closing;
pub mod goals;
pub mod money;
pub mod payment_method;
pub mod records;
pub mod report;
pub mod target;
pub mod trend;
