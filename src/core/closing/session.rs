//! Async driver of a reconciliation.
//!
//! [`ClosingSession`] owns one [`ClosingState`] and only replaces it when a
//! transition succeeds. The store is touched at two points: loading the day
//! when a selection is made, and writing the closing on confirm.

use super::{
    model::{ChannelAmounts, DayLedger, ExistingClosing, StarterBoxSource},
    state::{ClosingInput, ClosingState, RecountReview, SelectForm, transition},
    store::{fetch_prior_closing, find_closing, upsert_closing},
};
use crate::{
    config::Settings,
    core::{
        calendar::{BusinessCalendar, Granularity},
        money::from_cents,
        payment_method::{
            Classification, KeywordClassifier, PaymentChannel, PaymentMethodClassifier,
        },
        records::{fetch_financial_records, fetch_payment_records},
    },
    entities::cash_closing,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing::{debug, info, warn};

/// Loads everything the Summary step needs for one clinic day.
///
/// Records, the prior closing and any existing closing of the key are read
/// concurrently.
pub async fn load_day_ledger<C>(
    db: &C,
    settings: &Settings,
    classifier: &dyn PaymentMethodClassifier,
    clinic_id: i64,
    staff_id: &str,
    date: NaiveDate,
) -> Result<DayLedger>
where
    C: ConnectionTrait,
{
    let calendar = BusinessCalendar::from_settings(settings);
    let window = calendar.window(date, Granularity::Day)?;

    let (invoices, payments, prior, existing) = tokio::try_join!(
        fetch_financial_records(db, clinic_id, &window),
        fetch_payment_records(db, clinic_id, &window),
        fetch_prior_closing(db, clinic_id, date),
        find_closing(db, clinic_id, staff_id, date),
    )?;

    let daily_box: Decimal = invoices
        .iter()
        .map(|record| from_cents(record.amount_cents))
        .sum();

    let mut expected = ChannelAmounts::default();
    for payment in &payments {
        let classification = classifier.classify(&payment.method);
        if classification == Classification::Unknown {
            warn!(
                "Payment {} has unrecognised method '{}', counted as {}",
                payment.id,
                payment.method,
                PaymentChannel::Card
            );
        }
        *expected.get_mut(classification.channel()) += from_cents(payment.amount_cents);
    }

    let (starter_box, starter_box_source) = prior.map_or(
        (settings.default_opening_float, StarterBoxSource::OpeningFloat),
        |closing| {
            (
                from_cents(closing.cash_balance_cents),
                StarterBoxSource::PriorClosing(closing.date),
            )
        },
    );

    debug!(
        "Loaded day {} for clinic {}: {} invoices, {} payments, starter box {} ({:?})",
        date,
        clinic_id,
        invoices.len(),
        payments.len(),
        starter_box,
        starter_box_source
    );

    Ok(DayLedger {
        clinic_id,
        staff_id: staff_id.trim().to_string(),
        date,
        starter_box,
        starter_box_source,
        daily_box,
        expected,
        cash_tolerance: settings.cash_tolerance,
        existing: existing.as_ref().map(ExistingClosing::from),
    })
}

/// One reconciliation of a clinic day by a staff member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingSession {
    state: ClosingState,
}

impl ClosingSession {
    /// A session at the selection step.
    #[must_use]
    pub const fn new(clinic_id: i64) -> Self {
        Self {
            state: ClosingState::Select(SelectForm::new(clinic_id)),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &ClosingState {
        &self.state
    }

    /// Whether the closing has been committed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Applies one input; on error the state is left unchanged.
    pub fn apply(&mut self, input: ClosingInput) -> Result<&ClosingState> {
        let action = input.name();
        let next = transition(&self.state, input)?;
        debug!(
            "Closing session: {} -> {} ({})",
            self.state.name(),
            next.name(),
            action
        );
        self.state = next;
        Ok(&self.state)
    }

    /// Checks the current count without advancing.
    pub fn review(&self) -> Result<RecountReview> {
        match &self.state {
            ClosingState::Recount(sheet) => Ok(sheet.review()),
            other => Err(Error::InvalidTransition {
                state: other.name(),
                action: "review the count",
            }),
        }
    }

    /// Selects staff member and date, loads the day and enters Summary.
    ///
    /// Payment methods are classified with the keyword table extended by the
    /// configured synonyms.
    pub async fn select<C>(
        &mut self,
        db: &C,
        settings: &Settings,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<&ClosingState>
    where
        C: ConnectionTrait,
    {
        let classifier = KeywordClassifier::with_synonyms(&settings.payment_methods);
        self.select_with(db, settings, &classifier, staff_id, date)
            .await
    }

    /// Like [`Self::select`] with a caller-provided classifier.
    pub async fn select_with<C>(
        &mut self,
        db: &C,
        settings: &Settings,
        classifier: &dyn PaymentMethodClassifier,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<&ClosingState>
    where
        C: ConnectionTrait,
    {
        let selected = transition(
            &self.state,
            ClosingInput::EnterSelection {
                staff_id: Some(staff_id.to_string()),
                date: Some(date),
            },
        )?;
        let ClosingState::Select(form) = &selected else {
            return Err(Error::InvalidTransition {
                state: self.state.name(),
                action: "enter a selection",
            });
        };
        let selection = form.selection()?;

        let ledger = load_day_ledger(
            db,
            settings,
            classifier,
            selection.clinic_id,
            &selection.staff_id,
            selection.date,
        )
        .await?;
        if let Some(existing) = &ledger.existing {
            info!(
                "Re-opening closing {} (version {}) for clinic {} on {} by {}",
                existing.id, existing.version, selection.clinic_id, date, selection.staff_id
            );
        }

        let summary = transition(&selected, ClosingInput::LoadLedger(ledger))?;
        self.state = summary;
        Ok(&self.state)
    }

    /// Persists the counted closing and enters Confirmation.
    ///
    /// Validation failures and write failures leave the session in Recount
    /// with every entered value intact. Store errors other than a concurrent
    /// modification are reported as [`Error::Persistence`].
    pub async fn confirm(
        &mut self,
        db: &DatabaseConnection,
        acknowledge_discrepancies: bool,
    ) -> Result<&cash_closing::Model> {
        let ClosingState::Recount(sheet) = &self.state else {
            return Err(Error::InvalidTransition {
                state: self.state.name(),
                action: "confirm the closing",
            });
        };

        let draft = sheet.finalize(acknowledge_discrepancies)?;
        if !draft.discrepancies.is_empty() {
            info!(
                "Closing for clinic {} on {} proceeds with {} acknowledged discrepancies",
                draft.clinic_id,
                draft.date,
                draft.discrepancies.len()
            );
        }

        let record = upsert_closing(db, &draft)
            .await
            .map_err(|err| match err {
                Error::ClosingConflict { .. } => err,
                other => Error::Persistence {
                    message: other.to_string(),
                },
            })?;

        self.apply(ClosingInput::Commit {
            acknowledge_discrepancies,
            record,
        })?;
        match &self.state {
            ClosingState::Confirmation(record) => Ok(record),
            other => Err(Error::InvalidTransition {
                state: other.name(),
                action: "confirm the closing",
            }),
        }
    }
}
