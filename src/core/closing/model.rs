//! Values exchanged between the reconciliation steps.

use crate::{
    core::{money::from_cents, payment_method::PaymentChannel},
    entities::cash_closing,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// One amount per payment channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelAmounts {
    /// Cash amount
    pub cash: Decimal,
    /// Card/TPV amount
    pub card: Decimal,
    /// Bank transfer amount
    pub transfer: Decimal,
    /// Check amount
    pub check: Decimal,
}

impl ChannelAmounts {
    /// Amount of one channel.
    #[must_use]
    pub const fn get(&self, channel: PaymentChannel) -> Decimal {
        match channel {
            PaymentChannel::Cash => self.cash,
            PaymentChannel::Card => self.card,
            PaymentChannel::Transfer => self.transfer,
            PaymentChannel::Check => self.check,
        }
    }

    /// Mutable amount of one channel.
    pub fn get_mut(&mut self, channel: PaymentChannel) -> &mut Decimal {
        match channel {
            PaymentChannel::Cash => &mut self.cash,
            PaymentChannel::Card => &mut self.card,
            PaymentChannel::Transfer => &mut self.transfer,
            PaymentChannel::Check => &mut self.check,
        }
    }

    /// Sum over all channels.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.cash + self.card + self.transfer + self.check
    }
}

/// A non-cash channel whose counted amount does not match the expected one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discrepancy {
    /// Channel concerned
    pub channel: PaymentChannel,
    /// Amount according to payment records
    pub expected: Decimal,
    /// Amount counted by the operator
    pub counted: Decimal,
}

impl Discrepancy {
    /// `counted - expected`
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.counted - self.expected
    }
}

/// Whether a counted amount fails to reconcile with the expected one.
///
/// A channel with money expected mismatches when the difference exceeds
/// `tolerance`; a channel with nothing expected mismatches as soon as
/// anything is counted.
#[must_use]
pub fn is_mismatch(expected: Decimal, counted: Decimal, tolerance: Decimal) -> bool {
    if expected > Decimal::ZERO {
        (counted - expected).abs() > tolerance
    } else {
        counted > Decimal::ZERO
    }
}

/// Cash gate: rejects the closing when the counted cash does not reconcile.
pub fn check_cash(expected: Decimal, counted: Decimal, tolerance: Decimal) -> Result<()> {
    if is_mismatch(expected, counted, tolerance) {
        return Err(Error::CashMismatch {
            expected,
            counted,
            difference: counted - expected,
        });
    }
    Ok(())
}

/// Non-cash discrepancies between expected and counted amounts.
#[must_use]
pub fn find_discrepancies(
    expected: &ChannelAmounts,
    counted: &ChannelAmounts,
    tolerance: Decimal,
) -> Vec<Discrepancy> {
    PaymentChannel::ALL
        .into_iter()
        .filter(|channel| *channel != PaymentChannel::Cash)
        .filter(|channel| is_mismatch(expected.get(*channel), counted.get(*channel), tolerance))
        .map(|channel| Discrepancy {
            channel,
            expected: expected.get(channel),
            counted: counted.get(channel),
        })
        .collect()
}

/// Where the starter box amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StarterBoxSource {
    /// Cash balance of the most recent earlier closing, on the given date
    PriorClosing(NaiveDate),
    /// No earlier closing exists; the configured opening float is used
    OpeningFloat,
}

/// An already persisted closing being re-opened for edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingClosing {
    /// Row ID
    pub id: i64,
    /// Version read when the session loaded the day
    pub version: i32,
    /// Previously entered withdrawals
    pub cash_withdrawals: Decimal,
    /// Previously counted amounts
    pub counted: ChannelAmounts,
}

impl From<&cash_closing::Model> for ExistingClosing {
    fn from(model: &cash_closing::Model) -> Self {
        Self {
            id: model.id,
            version: model.version,
            cash_withdrawals: from_cents(model.cash_withdrawals_cents),
            counted: counted_amounts(model),
        }
    }
}

/// Expected amounts stored on a closing row.
#[must_use]
pub fn expected_amounts(model: &cash_closing::Model) -> ChannelAmounts {
    ChannelAmounts {
        cash: from_cents(model.expected_cash_cents),
        card: from_cents(model.expected_card_cents),
        transfer: from_cents(model.expected_transfer_cents),
        check: from_cents(model.expected_check_cents),
    }
}

/// Counted amounts stored on a closing row.
#[must_use]
pub fn counted_amounts(model: &cash_closing::Model) -> ChannelAmounts {
    ChannelAmounts {
        cash: from_cents(model.counted_cash_cents),
        card: from_cents(model.counted_card_cents),
        transfer: from_cents(model.counted_transfer_cents),
        check: from_cents(model.counted_check_cents),
    }
}

/// Everything the workflow needs to know about one clinic day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLedger {
    /// Clinic being closed
    pub clinic_id: i64,
    /// Staff member closing
    pub staff_id: String,
    /// Business-local date being closed
    pub date: NaiveDate,
    /// Cash in the drawer at the start of the day
    pub starter_box: Decimal,
    /// Origin of `starter_box`
    pub starter_box_source: StarterBoxSource,
    /// Revenue produced during the day
    pub daily_box: Decimal,
    /// Payment totals per channel according to payment records
    pub expected: ChannelAmounts,
    /// Largest cash difference accepted
    pub cash_tolerance: Decimal,
    /// Existing closing for the same key, when re-opening
    pub existing: Option<ExistingClosing>,
}

/// A validated closing ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingDraft {
    /// Clinic being closed
    pub clinic_id: i64,
    /// Staff member closing
    pub staff_id: String,
    /// Date being closed
    pub date: NaiveDate,
    /// Cash at the start of the day
    pub starter_box: Decimal,
    /// Revenue produced during the day
    pub daily_box: Decimal,
    /// Cash removed during the day
    pub cash_withdrawals: Decimal,
    /// `starter_box + daily_box - cash_withdrawals`
    pub cash_balance: Decimal,
    /// Payment totals per channel according to payment records
    pub expected: ChannelAmounts,
    /// Amounts counted by the operator
    pub counted: ChannelAmounts,
    /// Acknowledged non-cash discrepancies
    pub discrepancies: Vec<Discrepancy>,
    /// Version of the row being edited, `None` when creating
    pub expected_version: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cash_within_tolerance_accepted() {
        assert!(check_cash(dec!(120.00), dec!(120.00), dec!(0.01)).is_ok());
        assert!(check_cash(dec!(120.00), dec!(120.01), dec!(0.01)).is_ok());
        assert!(check_cash(dec!(120.00), dec!(119.99), dec!(0.01)).is_ok());
        assert!(check_cash(Decimal::ZERO, Decimal::ZERO, dec!(0.01)).is_ok());
    }

    #[test]
    fn test_cash_over_tolerance_rejected_with_values() {
        let result = check_cash(dec!(120.00), dec!(120.02), dec!(0.01));
        match result {
            Err(Error::CashMismatch {
                expected,
                counted,
                difference,
            }) => {
                assert_eq!(expected, dec!(120.00));
                assert_eq!(counted, dec!(120.02));
                assert_eq!(difference, dec!(0.02));
            }
            other => panic!("expected CashMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_cash_counted_without_expected_rejected() {
        assert!(matches!(
            check_cash(Decimal::ZERO, dec!(0.01), dec!(0.01)),
            Err(Error::CashMismatch { .. })
        ));
    }

    #[test]
    fn test_find_discrepancies_skips_cash() {
        let expected = ChannelAmounts {
            cash: dec!(100),
            card: Decimal::ZERO,
            transfer: dec!(200),
            check: dec!(50),
        };
        let counted = ChannelAmounts {
            cash: dec!(0),
            card: dec!(50.00),
            transfer: dec!(200.01),
            check: dec!(40),
        };

        let found = find_discrepancies(&expected, &counted, dec!(0.01));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].channel, PaymentChannel::Card);
        assert_eq!(found[0].difference(), dec!(50.00));
        assert_eq!(found[1].channel, PaymentChannel::Check);
        assert_eq!(found[1].difference(), dec!(-10));
    }

    #[test]
    fn test_channel_amounts_access() {
        let mut amounts = ChannelAmounts::default();
        *amounts.get_mut(PaymentChannel::Transfer) += dec!(12.50);
        *amounts.get_mut(PaymentChannel::Cash) += dec!(1);
        assert_eq!(amounts.get(PaymentChannel::Transfer), dec!(12.50));
        assert_eq!(amounts.total(), dec!(13.50));
    }
}
