//! Domain error types.

/// Top-level error type for regime.
#[derive(Debug, thiserror::Error)]
pub enum RegimeError {
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

    #[error("failed to fetch {source_name}: {reason}")]
    DataFetch { source_name: String, reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("unsupported signal config: {kind}/{direction}")]
    UnsupportedSignal { kind: String, direction: String },

    #[error("invalid timeframe: {months} months (expected 1-12)")]
    InvalidTimeframe { months: u32 },

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("unsupported rule schema version {version}")]
    UnsupportedSchema { version: u32 },

    #[error("{format} codec error: {reason}")]
    Codec { format: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RegimeError {
    /// True for errors caused by a rule's own configuration rather than by
    /// the data it was evaluated against.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RegimeError::UnsupportedSignal { .. }
                | RegimeError::InvalidTimeframe { .. }
                | RegimeError::RuleInvalid { .. }
        )
    }
}

impl From<&RegimeError> for std::process::ExitCode {
    fn from(err: &RegimeError) -> Self {
        let code: u8 = match err {
            RegimeError::Io(_) => 1,
            RegimeError::ConfigParse { .. }
            | RegimeError::ConfigMissing { .. }
            | RegimeError::ConfigInvalid { .. } => 2,
            RegimeError::Database { .. } | RegimeError::DatabaseQuery { .. } => 3,
            RegimeError::UnsupportedSignal { .. }
            | RegimeError::InvalidTimeframe { .. }
            | RegimeError::RuleInvalid { .. }
            | RegimeError::UnsupportedSchema { .. }
            | RegimeError::Codec { .. } => 4,
            RegimeError::DataFetch { .. } | RegimeError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
