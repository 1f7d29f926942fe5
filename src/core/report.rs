//! Report formatting.
//!
//! Turns trends and closings into plain-text summaries for the command line.
//! All functions are pure and take already computed data.

use crate::{
    core::{
        closing::{counted_amounts, discrepancy_channel, expected_amounts},
        money::from_cents,
        payment_method::PaymentChannel,
        trend::TrendResponse,
    },
    entities::{cash_closing, closing_discrepancy},
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::fmt::Write;

/// Calculates how much of a target has been reached, as a percentage.
///
/// Values above 100 mean the target was exceeded. A zero target yields 0.
#[must_use]
pub fn calculate_progress(achieved: Decimal, target: Decimal) -> Decimal {
    if target.is_zero() {
        return Decimal::ZERO;
    }

    (achieved / target * Decimal::ONE_HUNDRED).round_dp(1)
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`
///
/// # Arguments
/// * `progress_percent` - Progress percentage (0-100)
/// * `bar_length` - Length of the progress bar in characters (default 10)
#[must_use]
pub fn format_progress_bar(progress_percent: Decimal, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped = progress_percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);

    let filled = (clamped / Decimal::ONE_HUNDRED * Decimal::from(length))
        .round()
        .to_usize()
        .unwrap_or(0)
        .min(length);
    let empty = length - filled;

    format!(
        "[{}{}] {progress_percent:.1}%",
        "█".repeat(filled),
        "░".repeat(empty)
    )
}

/// Formats an amount with two decimals and the currency sign.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("€{amount:.2}")
}

/// Formats a difference with an explicit sign, like "+€0.02" or "-€5.00".
#[must_use]
pub fn format_signed_amount(amount: Decimal) -> String {
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("-€{:.2}", amount.abs())
    } else {
        format!("+€{amount:.2}")
    }
}

/// Multi-line summary of a trend.
///
/// Future buckets show `-` instead of a running total; the highlighted bucket
/// is marked with `<`.
#[must_use]
pub fn format_trend_summary(trend: &TrendResponse) -> String {
    let mut out = String::new();
    let progress = calculate_progress(trend.produced_so_far(), trend.target);

    let _ = writeln!(
        out,
        "{} trend anchored on {}",
        trend.granularity, trend.anchor_date
    );
    let _ = writeln!(
        out,
        "Produced {} | Collected {} | Target {}",
        format_amount(trend.exact_total),
        format_amount(trend.exact_collected_total),
        format_amount(trend.target)
    );
    let _ = writeln!(out, "{}", format_progress_bar(progress, None));

    for (index, point) in trend.points.iter().enumerate() {
        let running = |value: Option<Decimal>| value.map_or_else(|| "-".to_string(), format_amount);
        let marker = if index == trend.highlight_index { " <" } else { "" };
        let _ = writeln!(
            out,
            "{:>6} {:>12} {:>12} {:>12}{marker}",
            point.label,
            format_amount(point.produced_delta),
            running(point.produced_cumulative),
            running(point.collected_cumulative),
        );
    }

    out
}

/// Multi-line summary of a committed closing and its discrepancies.
#[must_use]
pub fn format_closing_summary(
    closing: &cash_closing::Model,
    discrepancies: &[closing_discrepancy::Model],
) -> String {
    let mut out = String::new();
    let expected = expected_amounts(closing);
    let counted = counted_amounts(closing);

    let _ = writeln!(
        out,
        "Closing {} by {} (version {})",
        closing.date, closing.staff_id, closing.version
    );
    let _ = writeln!(
        out,
        "Starter {} + Daily {} - Withdrawals {} = Balance {}",
        format_amount(from_cents(closing.starter_box_cents)),
        format_amount(from_cents(closing.daily_box_cents)),
        format_amount(from_cents(closing.cash_withdrawals_cents)),
        format_amount(from_cents(closing.cash_balance_cents))
    );

    for channel in PaymentChannel::ALL {
        let _ = writeln!(
            out,
            "  {:<9} expected {:>12} counted {:>12}",
            channel.as_str(),
            format_amount(expected.get(channel)),
            format_amount(counted.get(channel))
        );
    }
    let _ = writeln!(
        out,
        "  {:<9} expected {:>12} counted {:>12}",
        "total",
        format_amount(expected.total()),
        format_amount(counted.total())
    );

    for discrepancy in discrepancies {
        let difference = from_cents(discrepancy.counted_cents - discrepancy.expected_cents);
        let channel = discrepancy_channel(discrepancy).map_or_else(
            || format!("{} (unknown channel)", discrepancy.channel),
            |channel| channel.to_string(),
        );
        let _ = writeln!(
            out,
            "  ! {} differs by {}",
            channel,
            format_signed_amount(difference)
        );
    }

    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        config::Settings,
        core::{calendar::Granularity, trend::build_trend},
        test_utils::madrid_instant,
    };
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_calculate_progress() {
        assert_eq!(calculate_progress(dec!(50), dec!(100)), dec!(50.0));
        assert_eq!(calculate_progress(dec!(150), dec!(100)), dec!(150.0));
        assert_eq!(calculate_progress(dec!(1), dec!(3)), dec!(33.3));
    }

    #[test]
    fn test_calculate_progress_zero_target() {
        assert_eq!(calculate_progress(dec!(50), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_format_progress_bar_full() {
        let bar = format_progress_bar(dec!(100), Some(10));
        assert_eq!(bar, "[██████████] 100.0%");
    }

    #[test]
    fn test_format_progress_bar_half() {
        let bar = format_progress_bar(dec!(50), Some(10));
        assert_eq!(bar, "[█████░░░░░] 50.0%");
    }

    #[test]
    fn test_format_progress_bar_exceeded() {
        // The bar is clamped, the label is not
        let bar = format_progress_bar(dec!(140), Some(10));
        assert_eq!(bar, "[██████████] 140.0%");
    }

    #[test]
    fn test_format_amounts() {
        assert_eq!(format_amount(dec!(120)), "€120.00");
        assert_eq!(format_signed_amount(dec!(0.02)), "+€0.02");
        assert_eq!(format_signed_amount(dec!(-5)), "-€5.00");
        assert_eq!(format_signed_amount(Decimal::ZERO), "+€0.00");
    }

    #[test]
    fn test_format_trend_summary_marks_current_bucket() {
        let trend = build_trend(
            &Settings::default(),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            Granularity::Week,
            &[],
            &[],
            &[],
            madrid_instant(2024, 6, 15, 12),
        )
        .unwrap();

        let summary = format_trend_summary(&trend);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "week trend anchored on 2024-06-15");
        assert!(lines[1].contains("Target €2309.47"));
        assert!(lines[3].trim_start().starts_with("Mon"));
        assert!(lines[8].ends_with(" <"));
        assert!(lines[9].contains(" -"));
    }

    #[test]
    fn test_format_closing_summary() {
        let closing = cash_closing::Model {
            id: 1,
            clinic_id: 1,
            staff_id: "ana".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(),
            starter_box_cents: 20_000,
            daily_box_cents: 50_000,
            cash_withdrawals_cents: 1_000,
            cash_balance_cents: 69_000,
            expected_cash_cents: 12_000,
            expected_card_cents: 30_000,
            expected_transfer_cents: 0,
            expected_check_cents: 0,
            counted_cash_cents: 12_000,
            counted_card_cents: 30_000,
            counted_transfer_cents: 0,
            counted_check_cents: 5_000,
            version: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let discrepancy = closing_discrepancy::Model {
            id: 1,
            closing_id: 1,
            channel: "check".to_string(),
            expected_cents: 0,
            counted_cents: 5_000,
        };

        let summary = format_closing_summary(&closing, &[discrepancy]);
        assert!(summary.starts_with("Closing 2024-06-14 by ana (version 2)"));
        assert!(summary.contains("Balance €690.00"));
        assert!(summary.contains("! check differs by +€50.00"));
        assert!(summary.contains("total     expected      €420.00 counted      €470.00"));
    }
}
