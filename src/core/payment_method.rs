//! Payment method classification.
//!
//! Payment records carry a free-text method typed at the front desk, in
//! Spanish or English. A [`PaymentMethodClassifier`] maps that text onto a
//! [`Classification`]; the reconciliation treats [`Classification::Unknown`]
//! as card, the dominant channel.

use crate::config::PaymentMethodSynonyms;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Channel through which money reaches the clinic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentChannel {
    /// Physical cash in the drawer
    Cash,
    /// Card payment through the TPV terminal
    Card,
    /// Bank transfer
    Transfer,
    /// Check
    Check,
}

impl PaymentChannel {
    /// All channels, in reconciliation order.
    pub const ALL: [Self; 4] = [Self::Cash, Self::Card, Self::Transfer, Self::Check];

    /// Lowercase channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Check => "check",
        }
    }
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying a free-text payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Recognised as cash
    Cash,
    /// Recognised as card/TPV
    Card,
    /// Recognised as bank transfer
    Transfer,
    /// Recognised as check
    Check,
    /// No keyword matched
    Unknown,
}

impl Classification {
    /// Channel used for reconciliation; unrecognised methods count as card.
    #[must_use]
    pub const fn channel(self) -> PaymentChannel {
        match self {
            Self::Cash => PaymentChannel::Cash,
            Self::Card | Self::Unknown => PaymentChannel::Card,
            Self::Transfer => PaymentChannel::Transfer,
            Self::Check => PaymentChannel::Check,
        }
    }
}

impl From<PaymentChannel> for Classification {
    fn from(channel: PaymentChannel) -> Self {
        match channel {
            PaymentChannel::Cash => Self::Cash,
            PaymentChannel::Card => Self::Card,
            PaymentChannel::Transfer => Self::Transfer,
            PaymentChannel::Check => Self::Check,
        }
    }
}

/// Maps a free-text payment method onto a classification.
pub trait PaymentMethodClassifier: Send + Sync {
    /// Classifies `method`.
    fn classify(&self, method: &str) -> Classification;
}

const CASH_KEYWORDS: &[&str] = &["efectivo", "cash", "metalico", "metálico", "contado"];
const CARD_KEYWORDS: &[&str] = &[
    "tarjeta", "tpv", "card", "credit", "credito", "crédito", "debit", "debito", "débito",
    "visa", "mastercard", "datafono", "datáfono",
];
const TRANSFER_KEYWORDS: &[&str] = &["transferencia", "transfer", "bank", "banco", "wire"];
const CHECK_KEYWORDS: &[&str] = &["cheque", "check", "talon", "talón"];

/// Case-insensitive substring matcher over a synonym table.
///
/// Channels are tried in the order check, transfer, cash, card, so
/// "bank check" is a check and "transferencia bancaria" a transfer.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    table: Vec<(PaymentChannel, Vec<String>)>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::with_synonyms(&PaymentMethodSynonyms::default())
    }
}

impl KeywordClassifier {
    /// Builds the built-in table extended with configured synonyms.
    #[must_use]
    pub fn with_synonyms(extra: &PaymentMethodSynonyms) -> Self {
        let entry = |channel: PaymentChannel, builtin: &[&str], extra: &[String]| {
            let keywords: Vec<String> = builtin
                .iter()
                .map(|keyword| (*keyword).to_string())
                .chain(extra.iter().map(|keyword| keyword.trim().to_lowercase()))
                .filter(|keyword| !keyword.is_empty())
                .collect();
            (channel, keywords)
        };

        Self {
            table: vec![
                entry(PaymentChannel::Check, CHECK_KEYWORDS, &extra.check),
                entry(PaymentChannel::Transfer, TRANSFER_KEYWORDS, &extra.transfer),
                entry(PaymentChannel::Cash, CASH_KEYWORDS, &extra.cash),
                entry(PaymentChannel::Card, CARD_KEYWORDS, &extra.card),
            ],
        }
    }
}

impl PaymentMethodClassifier for KeywordClassifier {
    fn classify(&self, method: &str) -> Classification {
        let normalized = method.trim().to_lowercase();
        for (channel, keywords) in &self.table {
            if keywords.iter().any(|keyword| normalized.contains(keyword.as_str())) {
                return Classification::from(*channel);
            }
        }
        debug!("Unrecognised payment method '{}'", method);
        Classification::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spanish_and_english_keywords() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify("Efectivo"), Classification::Cash);
        assert_eq!(classifier.classify("CASH"), Classification::Cash);
        assert_eq!(classifier.classify("Tarjeta Visa"), Classification::Card);
        assert_eq!(classifier.classify("TPV"), Classification::Card);
        assert_eq!(classifier.classify("credit card"), Classification::Card);
        assert_eq!(classifier.classify("Transferencia"), Classification::Transfer);
        assert_eq!(classifier.classify("bank"), Classification::Transfer);
        assert_eq!(classifier.classify("Cheque"), Classification::Check);
    }

    #[test]
    fn test_precedence_between_channels() {
        let classifier = KeywordClassifier::default();
        assert_eq!(classifier.classify("bank check"), Classification::Check);
        assert_eq!(
            classifier.classify("transferencia bancaria"),
            Classification::Transfer
        );
    }

    #[test]
    fn test_unknown_defaults_to_card_channel() {
        let classifier = KeywordClassifier::default();
        let result = classifier.classify("Bizum");
        assert_eq!(result, Classification::Unknown);
        assert_eq!(result.channel(), PaymentChannel::Card);
        assert_eq!(classifier.classify("").channel(), PaymentChannel::Card);
    }

    #[test]
    fn test_configured_synonyms() {
        let classifier = KeywordClassifier::with_synonyms(&PaymentMethodSynonyms {
            transfer: vec![" Bizum ".to_string()],
            ..PaymentMethodSynonyms::default()
        });
        assert_eq!(classifier.classify("bizum"), Classification::Transfer);
    }

    #[test]
    fn test_channel_names() {
        let names: Vec<String> = PaymentChannel::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["cash", "card", "transfer", "check"]);
    }
}
