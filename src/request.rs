// 📐 Quote Request - Shape validation before any calculation
//
// Requests come from an orchestrating component we do not trust to be
// numerically careful. Every dimension is checked here so the calculators
// never see zero, negative or missing values.

use crate::error::{QuoteError, QuoteResult};
use crate::knowledge::ProductQuery;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Longest side, span or run accepted in a request (m)
pub const MAX_DIMENSION_M: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
/// Largest surface accepted in a request (m²)
pub const MAX_AREA_M2: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);
/// Most discrete pieces accepted for one selection
pub const MAX_UNITS: u64 = 1_000_000;

// ============================================================================
// REQUEST TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Free-form customer or job reference, echoed on the quote
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    pub items: Vec<ProductSelection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSelection {
    pub product: ProductQuery,

    /// Unsupported distance between supports; required for surfaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_m: Option<Decimal>,

    pub intent: QuantityIntent,
}

/// What the quantity of a selection means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantityIntent {
    /// Panel surface given by its sides
    Area { width_m: Decimal, length_m: Decimal },
    /// Panel surface given by its area and panel length
    Surface { area_m2: Decimal, length_m: Decimal },
    /// Discrete pieces
    Count { units: u64 },
    /// A run covered by nominal-length pieces
    LinearRun { length_m: Decimal },
}

/// Normalized surface: width × length, with the billed area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_m: Decimal,
    pub length_m: Decimal,
    pub area_m2: Decimal,
}

impl QuantityIntent {
    /// Surface dimensions for panel intents, None otherwise
    pub fn dimensions(&self) -> QuoteResult<Option<Dimensions>> {
        match *self {
            QuantityIntent::Area { width_m, length_m } => {
                let area_m2 = width_m.checked_mul(length_m).ok_or_else(|| {
                    QuoteError::invalid_dimension("area_m2", "width × length is out of range")
                })?;
                Ok(Some(Dimensions {
                    width_m,
                    length_m,
                    area_m2,
                }))
            }
            QuantityIntent::Surface { area_m2, length_m } => {
                let width_m = area_m2.checked_div(length_m).ok_or_else(|| {
                    QuoteError::invalid_dimension("length_m", "cannot derive width from a zero length")
                })?;
                Ok(Some(Dimensions {
                    width_m,
                    length_m,
                    area_m2,
                }))
            }
            QuantityIntent::Count { .. } | QuantityIntent::LinearRun { .. } => Ok(None),
        }
    }

    pub fn is_surface(&self) -> bool {
        matches!(
            self,
            QuantityIntent::Area { .. } | QuantityIntent::Surface { .. }
        )
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn positive(field: &str, value: Decimal) -> QuoteResult<()> {
    if value <= Decimal::ZERO {
        return Err(QuoteError::invalid_dimension(
            field,
            format!("must be greater than zero, got {}", value),
        ));
    }
    Ok(())
}

/// Positive and no larger than `max`
fn bounded(field: &str, value: Decimal, max: Decimal) -> QuoteResult<()> {
    positive(field, value)?;
    if value > max {
        return Err(QuoteError::invalid_dimension(
            field,
            format!("{} exceeds the maximum of {}", value, max),
        ));
    }
    Ok(())
}

impl ProductSelection {
    pub fn validate(&self) -> QuoteResult<()> {
        if let ProductQuery::Sku(sku) = &self.product {
            if sku.trim().is_empty() {
                return Err(QuoteError::invalid_dimension("product", "empty SKU"));
            }
        }

        if let Some(span) = self.span_m {
            bounded("span_m", span, MAX_DIMENSION_M)?;
        }

        match self.intent {
            QuantityIntent::Area { width_m, length_m } => {
                bounded("width_m", width_m, MAX_DIMENSION_M)?;
                bounded("length_m", length_m, MAX_DIMENSION_M)?;
            }
            QuantityIntent::Surface { area_m2, length_m } => {
                bounded("area_m2", area_m2, MAX_AREA_M2)?;
                bounded("length_m", length_m, MAX_DIMENSION_M)?;
            }
            QuantityIntent::Count { units } => {
                if units == 0 {
                    return Err(QuoteError::invalid_dimension("units", "must be at least 1"));
                }
                if units > MAX_UNITS {
                    return Err(QuoteError::invalid_dimension(
                        "units",
                        format!("{} exceeds the maximum of {}", units, MAX_UNITS),
                    ));
                }
            }
            QuantityIntent::LinearRun { length_m } => {
                bounded("length_m", length_m, MAX_DIMENSION_M)?
            }
        }

        if self.intent.is_surface() && self.span_m.is_none() {
            return Err(QuoteError::invalid_dimension(
                "span_m",
                "required to validate a panel surface",
            ));
        }

        Ok(())
    }
}

impl QuoteRequest {
    pub fn validate(&self) -> QuoteResult<()> {
        if self.items.is_empty() {
            return Err(QuoteError::invalid_dimension("items", "request has no selections"));
        }

        for (i, item) in self.items.iter().enumerate() {
            item.validate().map_err(|err| match err {
                QuoteError::InvalidDimension { field, reason } => QuoteError::InvalidDimension {
                    field: format!("items[{}].{}", i, field),
                    reason,
                },
                other => other,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn surface_item() -> ProductSelection {
        ProductSelection {
            product: ProductQuery::Sku("ISOROOF-50".to_string()),
            span_m: Some(dec("2.0")),
            intent: QuantityIntent::Area {
                width_m: dec("10"),
                length_m: dec("6"),
            },
        }
    }

    #[test]
    fn test_parse_request_json() {
        let json = r#"{
            "reference": "job-17",
            "items": [
                {
                    "product": { "sku": "ISOROOF-50" },
                    "span_m": "2.0",
                    "intent": { "kind": "area", "width_m": "10", "length_m": "6" }
                },
                {
                    "product": { "pattern": { "family": "isoroof", "thickness_mm": 50, "category": "accessory" } },
                    "intent": { "kind": "linear_run", "length_m": "12.5" }
                },
                {
                    "product": { "sku": "RIVET-STD" },
                    "intent": { "kind": "count", "units": 100 }
                }
            ]
        }"#;

        let request: QuoteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.reference.as_deref(), Some("job-17"));
        assert_eq!(request.items.len(), 3);
        assert_eq!(request.items[0], surface_item());
        assert!(matches!(request.items[1].product, ProductQuery::Pattern(_)));
        assert_eq!(request.items[2].intent, QuantityIntent::Count { units: 100 });
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_area_dimensions() {
        let dims = surface_item().intent.dimensions().unwrap().unwrap();
        assert_eq!(dims.area_m2, dec("60"));
        assert_eq!(dims.width_m, dec("10"));
    }

    #[test]
    fn test_surface_dimensions_derive_width() {
        let intent = QuantityIntent::Surface {
            area_m2: dec("180"),
            length_m: dec("6"),
        };
        let dims = intent.dimensions().unwrap().unwrap();
        assert_eq!(dims.width_m, dec("30"));
        assert_eq!(dims.area_m2, dec("180"));
    }

    #[test]
    fn test_count_has_no_dimensions() {
        let intent = QuantityIntent::Count { units: 4 };
        assert!(intent.dimensions().unwrap().is_none());
    }

    #[test]
    fn test_rejects_zero_and_negative() {
        let mut item = surface_item();
        item.intent = QuantityIntent::Area {
            width_m: dec("0"),
            length_m: dec("6"),
        };
        assert!(matches!(
            item.validate(),
            Err(QuoteError::InvalidDimension { ref field, .. }) if field == "width_m"
        ));

        let mut item = surface_item();
        item.span_m = Some(dec("-1"));
        assert!(item.validate().is_err());

        let mut item = surface_item();
        item.intent = QuantityIntent::Count { units: 0 };
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_dimensions() {
        let mut item = surface_item();
        item.intent = QuantityIntent::Area {
            width_m: dec("100000000000000000"),
            length_m: dec("1000000000000000"),
        };
        assert!(matches!(
            item.validate(),
            Err(QuoteError::InvalidDimension { ref field, .. }) if field == "width_m"
        ));

        let mut item = surface_item();
        item.intent = QuantityIntent::Surface {
            area_m2: dec("1000000.01"),
            length_m: dec("6"),
        };
        assert!(item.validate().is_err());

        let mut item = surface_item();
        item.intent = QuantityIntent::Count { units: MAX_UNITS + 1 };
        assert!(item.validate().is_err());

        // The largest accepted side still multiplies safely
        let mut item = surface_item();
        item.intent = QuantityIntent::Area {
            width_m: MAX_DIMENSION_M,
            length_m: MAX_DIMENSION_M,
        };
        assert!(item.validate().is_ok());
        assert_eq!(
            item.intent.dimensions().unwrap().unwrap().area_m2,
            dec("100000000")
        );
    }

    #[test]
    fn test_unchecked_area_product_is_an_error() {
        let intent = QuantityIntent::Area {
            width_m: Decimal::MAX,
            length_m: dec("2"),
        };
        assert!(matches!(
            intent.dimensions(),
            Err(QuoteError::InvalidDimension { ref field, .. }) if field == "area_m2"
        ));
    }

    #[test]
    fn test_surface_requires_span() {
        let mut item = surface_item();
        item.span_m = None;
        assert!(matches!(
            item.validate(),
            Err(QuoteError::InvalidDimension { ref field, .. }) if field == "span_m"
        ));
    }

    #[test]
    fn test_empty_request_and_indexed_field_names() {
        let empty = QuoteRequest {
            reference: None,
            items: vec![],
        };
        assert!(empty.validate().is_err());

        let mut bad = surface_item();
        bad.intent = QuantityIntent::LinearRun { length_m: dec("0") };
        let request = QuoteRequest {
            reference: None,
            items: vec![surface_item(), bad],
        };
        assert!(matches!(
            request.validate(),
            Err(QuoteError::InvalidDimension { ref field, .. }) if field == "items[1].length_m"
        ));
    }
}
