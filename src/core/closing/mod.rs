//! Closing Reconciliation Engine.
//!
//! A daily cash closing walks through four steps: select the staff member and
//! date, review the computed box amounts, recount every payment channel, and
//! confirm. Cash must reconcile within tolerance; other channels may differ
//! once the operator acknowledges it, and those differences are stored.

pub mod model;
pub mod session;
pub mod state;
pub mod store;

pub use model::{
    ChannelAmounts, ClosingDraft, DayLedger, Discrepancy, ExistingClosing, StarterBoxSource,
    counted_amounts, expected_amounts,
};
pub use session::{ClosingSession, load_day_ledger};
pub use state::{
    ClosingInput, ClosingState, RecountReview, RecountSheet, SelectForm, Selection, SummarySheet,
    transition,
};
pub use store::{
    discrepancy_channel, fetch_closing_discrepancies, fetch_prior_closing, find_closing,
    list_closings, upsert_closing,
};
