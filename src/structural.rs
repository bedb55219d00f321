// 🏗️ Structural Validator - Span feasibility against the limit table
//
// Validation only. The limit never enters pricing.
// Untabulated family/thickness pairs block the quote; they never pass silently.

use crate::catalog::StructuralLimit;
use crate::error::{QuoteError, QuoteResult};
use crate::knowledge::{KnowledgeResolver, LookupScope, Resolved};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralCheck {
    pub family: String,
    pub thickness_mm: u32,
    pub span_m: Decimal,
    /// False only when a warning was raised; exceeding spans are errors
    pub ok: bool,
    pub max_allowed_span_m: Decimal,
    /// max_allowed_span_m - span_m
    pub margin_m: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct StructuralValidator {
    /// Fraction of the max span inside which a span warns (0.05 = 5%)
    safety_margin: Decimal,
}

impl StructuralValidator {
    pub fn new(safety_margin: Decimal) -> Self {
        StructuralValidator { safety_margin }
    }

    /// Look the limit up and check the span against it.
    ///
    /// The resolved limit is handed back so quantity derivation uses the
    /// same record the span was checked against.
    pub fn validate(
        &self,
        resolver: &KnowledgeResolver<'_>,
        family: &str,
        thickness_mm: u32,
        span_m: Decimal,
        scope: &LookupScope,
    ) -> QuoteResult<(StructuralCheck, Resolved<StructuralLimit>)> {
        if span_m <= Decimal::ZERO {
            return Err(QuoteError::invalid_dimension(
                "span_m",
                format!("must be greater than zero, got {}", span_m),
            ));
        }

        let resolved = resolver.resolve_structural_limit(family, thickness_mm, scope)?;
        let check = self.check(&resolved.value, span_m)?;
        Ok((check, resolved))
    }

    /// Pure comparison against an already-resolved limit
    pub fn check(&self, limit: &StructuralLimit, span_m: Decimal) -> QuoteResult<StructuralCheck> {
        if span_m > limit.max_span_m {
            return Err(QuoteError::SpanExceeded {
                family: limit.family.clone(),
                thickness_mm: limit.thickness_mm,
                span_m,
                max_span_m: limit.max_span_m,
            });
        }

        // Inclusive: a span exactly on the threshold warns
        let threshold = limit.max_span_m * (Decimal::ONE - self.safety_margin);
        let warning = (span_m >= threshold).then(|| {
            format!(
                "span {} m is within {}% of the {} m limit for {} {} mm",
                span_m,
                (self.safety_margin * Decimal::ONE_HUNDRED).normalize(),
                limit.max_span_m,
                limit.family,
                limit.thickness_mm
            )
        });

        if let Some(message) = &warning {
            warn!(family = %limit.family, thickness_mm = limit.thickness_mm, "{}", message);
        }

        Ok(StructuralCheck {
            family: limit.family.clone(),
            thickness_mm: limit.thickness_mm,
            span_m,
            ok: warning.is_none(),
            max_allowed_span_m: limit.max_span_m,
            margin_m: limit.max_span_m - span_m,
            warning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{KnowledgeSnapshot, KnowledgeSource};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn limit() -> StructuralLimit {
        StructuralLimit {
            family: "ISOROOF".to_string(),
            thickness_mm: 50,
            max_span_m: dec("2.5"),
        }
    }

    fn validator() -> StructuralValidator {
        StructuralValidator::new(dec("0.05"))
    }

    #[test]
    fn test_comfortable_span_passes() {
        let check = validator().check(&limit(), dec("2.0")).unwrap();
        assert!(check.ok);
        assert_eq!(check.margin_m, dec("0.5"));
        assert_eq!(check.max_allowed_span_m, dec("2.5"));
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_span_inside_margin_warns() {
        // threshold = 2.5 × 0.95 = 2.375
        let check = validator().check(&limit(), dec("2.4")).unwrap();
        assert!(!check.ok);
        assert!(check.warning.is_some());
    }

    #[test]
    fn test_margin_boundary_is_inclusive() {
        let check = validator().check(&limit(), dec("2.375")).unwrap();
        assert!(check.warning.is_some());

        let check = validator().check(&limit(), dec("2.374")).unwrap();
        assert!(check.warning.is_none());
    }

    #[test]
    fn test_span_equal_to_limit_succeeds_with_warning() {
        let check = validator().check(&limit(), dec("2.5")).unwrap();
        assert_eq!(check.margin_m, Decimal::ZERO);
        assert!(check.warning.is_some());
    }

    #[test]
    fn test_span_over_limit_fails() {
        let err = validator().check(&limit(), dec("2.51")).unwrap_err();
        assert!(matches!(
            err,
            QuoteError::SpanExceeded { ref max_span_m, .. } if *max_span_m == dec("2.5")
        ));
    }

    #[test]
    fn test_unknown_pair_blocks() {
        let source = KnowledgeSource::new(
            "limits",
            1,
            None,
            vec![],
            vec![limit()],
            vec![],
        )
        .unwrap();
        let snapshot = KnowledgeSnapshot::build(vec![source], 1).unwrap();
        let resolver = snapshot.resolver(dec("0.01"));

        let err = validator()
            .validate(&resolver, "ISOROOF", 100, dec("1.0"), &LookupScope::All)
            .unwrap_err();
        assert!(matches!(err, QuoteError::UnknownStructuralLimit { .. }));

        let (check, limit) = validator()
            .validate(&resolver, "isoroof", 50, dec("1.0"), &LookupScope::All)
            .unwrap();
        assert!(check.ok);
        assert_eq!(limit.provenance.source_id, "limits");
        assert_eq!(limit.value.max_span_m, dec("2.5"));
    }

    #[test]
    fn test_non_positive_span_rejected() {
        let snapshot = KnowledgeSnapshot::empty();
        let resolver = snapshot.resolver(dec("0.01"));
        let err = validator()
            .validate(&resolver, "ISOROOF", 50, Decimal::ZERO, &LookupScope::All)
            .unwrap_err();
        assert!(matches!(err, QuoteError::InvalidDimension { .. }));
    }
}
