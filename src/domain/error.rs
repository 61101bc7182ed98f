//! Crate error taxonomy.
//!
//! Configuration and accounting errors are fatal; data gaps never surface
//! here — they travel as warning values on simulation results instead.

use chrono::NaiveDate;

use super::ledger::LedgerError;
use super::panel::PanelError;

#[derive(Debug, thiserror::Error)]
pub enum QuantfolioError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no price data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("empty panel: no bars for any requested symbol between {start} and {end}")]
    EmptyPanel { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuantfolioError {
    /// Process exit code for the error class; 0 is reserved for success.
    pub fn exit_code(&self) -> u8 {
        match self {
            QuantfolioError::Io(_) => 1,
            QuantfolioError::ConfigParse { .. }
            | QuantfolioError::ConfigMissing { .. }
            | QuantfolioError::ConfigInvalid { .. } => 2,
            QuantfolioError::Database { .. } | QuantfolioError::DatabaseQuery { .. } => 3,
            QuantfolioError::Ledger(_) => 4,
            QuantfolioError::NoData { .. }
            | QuantfolioError::InsufficientData { .. }
            | QuantfolioError::EmptyPanel { .. }
            | QuantfolioError::Panel(_) => 5,
        }
    }
}

impl From<&QuantfolioError> for std::process::ExitCode {
    fn from(err: &QuantfolioError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
