//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for investsim.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
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

    #[error("unknown strategy: {id} (available: {available})")]
    UnknownStrategy { id: String, available: String },

    #[error("no price data for {symbol} between {start} and {end}")]
    DataUnavailable {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("market data provider failed for {symbol}: {reason}")]
    Provider { symbol: String, reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimulatorError {
    /// Shorthand for an invalid value in a config section.
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        SimulatorError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(section: &str, key: &str) -> Self {
        SimulatorError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    /// True for the configuration family: the simulation never started.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimulatorError::ConfigParse { .. }
                | SimulatorError::ConfigMissing { .. }
                | SimulatorError::ConfigInvalid { .. }
                | SimulatorError::UnknownStrategy { .. }
        )
    }
}

impl From<&SimulatorError> for std::process::ExitCode {
    fn from(err: &SimulatorError) -> Self {
        let code: u8 = match err {
            SimulatorError::Io(_) => 1,
            SimulatorError::ConfigParse { .. }
            | SimulatorError::ConfigMissing { .. }
            | SimulatorError::ConfigInvalid { .. } => 2,
            SimulatorError::Database { .. } | SimulatorError::DatabaseQuery { .. } => 3,
            SimulatorError::UnknownStrategy { .. } => 4,
            SimulatorError::DataUnavailable { .. } | SimulatorError::Provider { .. } => 5,
            SimulatorError::Report { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
