// 🚨 Error Taxonomy - Typed failures for every branch that cannot complete
//
// Lookup and validation failures go back to the caller as-is.
// VerificationFailure is an engine-internal fault: it never travels as a quote.

use crate::verification::Discrepancy;
use rust_decimal::Decimal;
use thiserror::Error;

pub type QuoteResult<T> = std::result::Result<T, QuoteError>;

#[derive(Debug, Error)]
pub enum QuoteError {
    /// No source in scope defines the requested product or rule
    #[error("not found: {entity}")]
    NotFound { entity: String },

    /// A pattern matched several distinct SKUs in the winning source
    #[error("pattern {pattern} is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousMatch {
        pattern: String,
        candidates: Vec<String>,
    },

    #[error("no structural limit tabulated for family {family} at {thickness_mm} mm")]
    UnknownStructuralLimit { family: String, thickness_mm: u32 },

    #[error(
        "span {span_m} m exceeds the maximum of {max_span_m} m for {family} at {thickness_mm} mm"
    )]
    SpanExceeded {
        family: String,
        thickness_mm: u32,
        span_m: Decimal,
        max_span_m: Decimal,
    },

    #[error("invalid dimension `{field}`: {reason}")]
    InvalidDimension { field: String, reason: String },

    /// Unit-basis tag outside the fixed vocabulary; no formula is guessed
    #[error("unknown unit-basis tag `{tag}`")]
    UnitBasisUnknown { tag: String },

    /// A source record that breaks a load-time invariant
    #[error("invalid record {sku} in source {source_id}: {reason}")]
    InvalidRecord {
        source_id: String,
        sku: String,
        reason: String,
    },

    #[error("quote verification failed with {} discrepancies", discrepancies.len())]
    VerificationFailure { discrepancies: Vec<Discrepancy> },

    #[error("failed to load {path}: {reason}")]
    SourceLoad { path: String, reason: String },
}

impl QuoteError {
    pub fn invalid_dimension(field: &str, reason: impl Into<String>) -> Self {
        QuoteError::InvalidDimension {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        QuoteError::NotFound {
            entity: entity.into(),
        }
    }

    /// Errors the caller can fix by changing the request
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            QuoteError::NotFound { .. }
                | QuoteError::AmbiguousMatch { .. }
                | QuoteError::UnknownStructuralLimit { .. }
                | QuoteError::SpanExceeded { .. }
                | QuoteError::InvalidDimension { .. }
        )
    }

    /// Short machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            QuoteError::NotFound { .. } => "not_found",
            QuoteError::AmbiguousMatch { .. } => "ambiguous_match",
            QuoteError::UnknownStructuralLimit { .. } => "unknown_structural_limit",
            QuoteError::SpanExceeded { .. } => "span_exceeded",
            QuoteError::InvalidDimension { .. } => "invalid_dimension",
            QuoteError::UnitBasisUnknown { .. } => "unit_basis_unknown",
            QuoteError::InvalidRecord { .. } => "invalid_record",
            QuoteError::VerificationFailure { .. } => "verification_failure",
            QuoteError::SourceLoad { .. } => "source_load",
        }
    }
}
