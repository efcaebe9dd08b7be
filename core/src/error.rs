use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Payee '{payee_id}' not found")]
    PayeeNotFound { payee_id: String },

    #[error("No total incentive supplied or recorded for payee '{payee_id}'")]
    MissingTotalIncentive { payee_id: String },

    #[error("Invalid term: {term_months} months yields no whole {period_months}-month periods")]
    InvalidTerm { term_months: i64, period_months: u32 },

    #[error("Dataset has no numeric column")]
    NoNumericColumn,

    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("No data available. Please upload a file first.")]
    DatasetUnavailable,

    #[error("Column '{column}' not found")]
    MissingColumn { column: String },

    #[error("Invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },

    #[error("Duplicate column '{column}'")]
    DuplicateColumn { column: String },

    #[error("Row {row} has {actual} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, actual: usize },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Outlier model fit aborted: {reason}")]
    FitAborted { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    /// Stable machine-readable name, used in response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PayeeNotFound { .. }         => "payee_not_found",
            Self::MissingTotalIncentive { .. } => "missing_total_incentive",
            Self::InvalidTerm { .. }           => "invalid_term",
            Self::NoNumericColumn              => "no_numeric_column",
            Self::InsufficientData { .. }      => "insufficient_data",
            Self::DatasetUnavailable           => "dataset_unavailable",
            Self::MissingColumn { .. }         => "missing_column",
            Self::InvalidValue { .. }          => "invalid_value",
            Self::DuplicateColumn { .. }       => "duplicate_column",
            Self::RaggedRow { .. }             => "ragged_row",
            Self::InvalidConfig { .. }         => "invalid_config",
            Self::FitAborted { .. }            => "fit_aborted",
            Self::Serialization(_)             => "serialization",
            Self::Io(_)                        => "io",
            Self::Other(_)                     => "other",
        }
    }

    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData { reason: reason.into() }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
