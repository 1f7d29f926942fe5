//! Reconciliation state machine.
//!
//! A closing moves strictly forward through
//! `Select -> Summary -> Recount -> Confirmation`. Every step is a pure
//! function of the current state and one [`ClosingInput`]: [`transition`]
//! never mutates its input, so a rejected input leaves the caller with the
//! state it had. Any state except `Confirmation` can be restarted.

use super::model::{
    ChannelAmounts, ClosingDraft, DayLedger, Discrepancy, ExistingClosing, StarterBoxSource,
    check_cash, find_discrepancies,
};
use crate::{
    core::{money::to_cents, payment_method::PaymentChannel},
    entities::cash_closing,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// First step: who is closing which day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectForm {
    /// Clinic being closed
    pub clinic_id: i64,
    /// Staff member, required
    pub staff_id: Option<String>,
    /// Date to close, required
    pub date: Option<NaiveDate>,
}

/// A complete selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Clinic being closed
    pub clinic_id: i64,
    /// Staff member closing
    pub staff_id: String,
    /// Date being closed
    pub date: NaiveDate,
}

impl SelectForm {
    /// An empty form for a clinic.
    #[must_use]
    pub const fn new(clinic_id: i64) -> Self {
        Self {
            clinic_id,
            staff_id: None,
            date: None,
        }
    }

    /// Validates that both staff member and date are present.
    pub fn selection(&self) -> Result<Selection> {
        let staff_id = self
            .staff_id
            .as_deref()
            .map(str::trim)
            .filter(|staff| !staff.is_empty())
            .ok_or_else(|| Error::Validation {
                field: "staff_id",
                message: "a staff member must be selected".to_string(),
            })?;
        let date = self.date.ok_or_else(|| Error::Validation {
            field: "date",
            message: "a date must be selected".to_string(),
        })?;
        Ok(Selection {
            clinic_id: self.clinic_id,
            staff_id: staff_id.to_string(),
            date,
        })
    }
}

/// Second step: computed box amounts and the entered withdrawals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarySheet {
    /// Who is closing which day
    pub selection: Selection,
    /// Cash at the start of the day
    pub starter_box: Decimal,
    /// Origin of `starter_box`
    pub starter_box_source: StarterBoxSource,
    /// Revenue produced during the day
    pub daily_box: Decimal,
    /// Cash removed during the day; required to continue
    pub cash_withdrawals: Option<Decimal>,
    /// `starter_box + daily_box - cash_withdrawals`
    pub cash_balance: Decimal,
    /// Payment totals per channel
    pub expected: ChannelAmounts,
    /// Largest cash difference accepted
    pub cash_tolerance: Decimal,
    /// Closing being re-opened, if any
    pub existing: Option<ExistingClosing>,
}

impl SummarySheet {
    fn from_ledger(selection: Selection, ledger: DayLedger) -> Self {
        let cash_withdrawals = Some(
            ledger
                .existing
                .as_ref()
                .map_or(Decimal::ZERO, |existing| existing.cash_withdrawals),
        );
        let mut sheet = Self {
            selection,
            starter_box: ledger.starter_box,
            starter_box_source: ledger.starter_box_source,
            daily_box: ledger.daily_box,
            cash_withdrawals,
            cash_balance: Decimal::ZERO,
            expected: ledger.expected,
            cash_tolerance: ledger.cash_tolerance,
            existing: ledger.existing,
        };
        sheet.recompute_balance();
        sheet
    }

    fn recompute_balance(&mut self) {
        self.cash_balance =
            self.starter_box + self.daily_box - self.cash_withdrawals.unwrap_or(Decimal::ZERO);
    }
}

/// Third step: physical count per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecountSheet {
    /// Summary the recount is based on
    pub summary: SummarySheet,
    /// Withdrawals confirmed in the summary step
    pub cash_withdrawals: Decimal,
    /// Amounts counted so far
    pub counted: ChannelAmounts,
}

/// Outcome of checking a recount without advancing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecountReview {
    /// Blocking cash mismatch as `(expected, counted)`, if any
    pub cash_mismatch: Option<(Decimal, Decimal)>,
    /// Non-blocking discrepancies on the other channels
    pub discrepancies: Vec<Discrepancy>,
}

impl RecountReview {
    /// Whether the recount cannot proceed at all.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.cash_mismatch.is_some()
    }

    /// Whether proceeding requires acknowledging discrepancies.
    #[must_use]
    pub fn needs_acknowledgement(&self) -> bool {
        !self.discrepancies.is_empty()
    }
}

impl RecountSheet {
    /// Checks the current count against the expected amounts.
    #[must_use]
    pub fn review(&self) -> RecountReview {
        let expected = self.summary.expected.cash;
        let counted = self.counted.cash;
        let cash_mismatch = check_cash(expected, counted, self.summary.cash_tolerance)
            .is_err()
            .then_some((expected, counted));
        RecountReview {
            cash_mismatch,
            discrepancies: find_discrepancies(
                &self.summary.expected,
                &self.counted,
                self.summary.cash_tolerance,
            ),
        }
    }

    /// Validates the count and builds the closing to persist.
    ///
    /// Fails with `CashMismatch` when cash does not reconcile, and with
    /// `UnacknowledgedDiscrepancies` when other channels differ and
    /// `acknowledge_discrepancies` is false.
    pub fn finalize(&self, acknowledge_discrepancies: bool) -> Result<ClosingDraft> {
        let summary = &self.summary;
        check_cash(
            summary.expected.cash,
            self.counted.cash,
            summary.cash_tolerance,
        )?;

        let discrepancies =
            find_discrepancies(&summary.expected, &self.counted, summary.cash_tolerance);
        if !discrepancies.is_empty() && !acknowledge_discrepancies {
            return Err(Error::UnacknowledgedDiscrepancies { discrepancies });
        }

        Ok(ClosingDraft {
            clinic_id: summary.selection.clinic_id,
            staff_id: summary.selection.staff_id.clone(),
            date: summary.selection.date,
            starter_box: summary.starter_box,
            daily_box: summary.daily_box,
            cash_withdrawals: self.cash_withdrawals,
            cash_balance: summary.cash_balance,
            expected: summary.expected,
            counted: self.counted,
            discrepancies,
            expected_version: summary.existing.as_ref().map(|existing| existing.version),
        })
    }
}

/// State of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosingState {
    /// Choosing staff member and date
    Select(SelectForm),
    /// Reviewing computed amounts and entering withdrawals
    Summary(SummarySheet),
    /// Entering the physical count
    Recount(RecountSheet),
    /// Closing persisted; terminal
    Confirmation(cash_closing::Model),
}

impl ClosingState {
    /// Step name used in messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Summary(_) => "summary",
            Self::Recount(_) => "recount",
            Self::Confirmation(_) => "confirmation",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmation(_))
    }
}

/// Inputs accepted by [`transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosingInput {
    /// Go back to an empty selection
    Restart,
    /// Fill in the selection form
    EnterSelection {
        /// Staff member
        staff_id: Option<String>,
        /// Date to close
        date: Option<NaiveDate>,
    },
    /// Validate the selection and load its day
    LoadLedger(DayLedger),
    /// Override the starter box amount
    SetStarterBox(Decimal),
    /// Override the daily box amount
    SetDailyBox(Decimal),
    /// Enter or clear the withdrawals
    SetWithdrawals(Option<Decimal>),
    /// Accept the summary and start counting
    ConfirmSummary,
    /// Enter the counted amount of one channel
    SetCounted {
        /// Channel counted
        channel: PaymentChannel,
        /// Amount counted
        amount: Decimal,
    },
    /// Record the persisted closing
    Commit {
        /// Whether non-cash discrepancies were acknowledged
        acknowledge_discrepancies: bool,
        /// The persisted row
        record: cash_closing::Model,
    },
}

impl ClosingInput {
    /// Action name used in messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::EnterSelection { .. } => "enter a selection",
            Self::LoadLedger(_) => "load the day",
            Self::SetStarterBox(_) => "set the starter box",
            Self::SetDailyBox(_) => "set the daily box",
            Self::SetWithdrawals(_) => "set withdrawals",
            Self::ConfirmSummary => "confirm the summary",
            Self::SetCounted { .. } => "enter a count",
            Self::Commit { .. } => "commit",
        }
    }
}

/// Accepts an entered amount that is non-negative and whole cents.
fn non_negative(field: &'static str, amount: Decimal) -> Result<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::Validation {
            field,
            message: format!("must not be negative, got {amount}"),
        });
    }
    to_cents(amount).map_err(|_| Error::Validation {
        field,
        message: format!("must have at most two decimal places, got {amount}"),
    })?;
    Ok(amount)
}

/// Computes the state that follows `state` after `input`.
pub fn transition(state: &ClosingState, input: ClosingInput) -> Result<ClosingState> {
    let invalid = |input: &ClosingInput| Error::InvalidTransition {
        state: state.name(),
        action: input.name(),
    };

    match (state, input) {
        (ClosingState::Confirmation(_), input) => Err(invalid(&input)),

        (current, ClosingInput::Restart) => {
            let clinic_id = match current {
                ClosingState::Select(form) => form.clinic_id,
                ClosingState::Summary(sheet) => sheet.selection.clinic_id,
                ClosingState::Recount(sheet) => sheet.summary.selection.clinic_id,
                ClosingState::Confirmation(record) => record.clinic_id,
            };
            Ok(ClosingState::Select(SelectForm::new(clinic_id)))
        }

        (ClosingState::Select(form), ClosingInput::EnterSelection { staff_id, date }) => {
            Ok(ClosingState::Select(SelectForm {
                clinic_id: form.clinic_id,
                staff_id,
                date,
            }))
        }

        (ClosingState::Select(form), ClosingInput::LoadLedger(ledger)) => {
            let selection = form.selection()?;
            if ledger.clinic_id != selection.clinic_id
                || ledger.staff_id != selection.staff_id
                || ledger.date != selection.date
            {
                return Err(Error::Validation {
                    field: "ledger",
                    message: format!(
                        "ledger for clinic {} / {} / {} does not match the selection",
                        ledger.clinic_id, ledger.staff_id, ledger.date
                    ),
                });
            }
            Ok(ClosingState::Summary(SummarySheet::from_ledger(
                selection, ledger,
            )))
        }

        (ClosingState::Summary(sheet), ClosingInput::SetStarterBox(amount)) => {
            let mut next = sheet.clone();
            next.starter_box = non_negative("starter_box", amount)?;
            next.recompute_balance();
            Ok(ClosingState::Summary(next))
        }

        (ClosingState::Summary(sheet), ClosingInput::SetDailyBox(amount)) => {
            let mut next = sheet.clone();
            next.daily_box = non_negative("daily_box", amount)?;
            next.recompute_balance();
            Ok(ClosingState::Summary(next))
        }

        (ClosingState::Summary(sheet), ClosingInput::SetWithdrawals(amount)) => {
            let mut next = sheet.clone();
            next.cash_withdrawals = amount
                .map(|amount| non_negative("cash_withdrawals", amount))
                .transpose()?;
            next.recompute_balance();
            Ok(ClosingState::Summary(next))
        }

        (ClosingState::Summary(sheet), ClosingInput::ConfirmSummary) => {
            let cash_withdrawals = sheet.cash_withdrawals.ok_or_else(|| Error::Validation {
                field: "cash_withdrawals",
                message: "withdrawals must be entered (zero is valid)".to_string(),
            })?;
            let counted = sheet
                .existing
                .as_ref()
                .map(|existing| existing.counted)
                .unwrap_or_default();
            Ok(ClosingState::Recount(RecountSheet {
                summary: sheet.clone(),
                cash_withdrawals,
                counted,
            }))
        }

        (ClosingState::Recount(sheet), ClosingInput::SetCounted { channel, amount }) => {
            let mut next = sheet.clone();
            *next.counted.get_mut(channel) = non_negative("counted", amount)?;
            Ok(ClosingState::Recount(next))
        }

        (
            ClosingState::Recount(sheet),
            ClosingInput::Commit {
                acknowledge_discrepancies,
                record,
            },
        ) => {
            let draft = sheet.finalize(acknowledge_discrepancies)?;
            if record.clinic_id != draft.clinic_id
                || record.staff_id != draft.staff_id
                || record.date != draft.date
            {
                return Err(Error::Validation {
                    field: "record",
                    message: "persisted closing does not match the session".to_string(),
                });
            }
            Ok(ClosingState::Confirmation(record))
        }

        (_, input) => Err(invalid(&input)),
    }
}
