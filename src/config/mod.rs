/// Database connection and schema creation
pub mod database;

/// Application settings loaded from a TOML file
pub mod settings;

pub use settings::{PaymentMethodSynonyms, Settings};
