//! Error types for the rollup engine.
//!
//! Two tiers: [`RollupError`] is a configuration problem and aborts the
//! whole call; [`EvalFailure`] is one entity's data not fitting one
//! predicate and only removes that entity from that metric.

/// Configuration errors. These are programmer errors in a metric set or a
/// request, never a consequence of row contents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollupError {
    #[error("unknown metric: {name}")]
    UnknownMetric { name: String },

    #[error("metric '{metric}' references unknown field '{field}'")]
    UnknownField { metric: String, field: String },

    #[error("metric '{metric}' counts over interaction history but no history was supplied")]
    MissingHistory { metric: String },

    #[error("date filter runs backwards: {from} is after {to}")]
    InvalidDateRange { from: String, to: String },

    #[error("invalid field reference '{raw}': {reason}")]
    InvalidFieldRef { raw: String, reason: String },

    #[error("unknown dashboard: {name}")]
    UnknownDashboard { name: String },
}

impl RollupError {
    /// Stable machine-readable tag for response envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            RollupError::UnknownMetric { .. } => "unknown_metric",
            RollupError::UnknownField { .. } => "unknown_field",
            RollupError::MissingHistory { .. } => "missing_history",
            RollupError::InvalidDateRange { .. } => "invalid_date_range",
            RollupError::InvalidFieldRef { .. } => "invalid_field_ref",
            RollupError::UnknownDashboard { .. } => "unknown_dashboard",
        }
    }
}

/// Why a predicate could not be evaluated against one entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalFailure {
    #[error("field '{field}' holds {found}, expected text")]
    NotText { field: String, found: &'static str },

    #[error("field '{field}' holds '{raw}', expected a number")]
    NotNumeric { field: String, raw: String },

    #[error("field '{field}' holds '{raw}', expected a date")]
    NotADate { field: String, raw: String },
}
