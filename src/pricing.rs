// 💲 Pricing Engine - Quantities to money, by unit basis
//
// All money is rust_decimal::Decimal. Line subtotals and tax are rounded
// to cents, midpoint away from zero. Nominal piece length only multiplies
// under PerLinearPiece; under PerUnit it is informational.

use crate::catalog::{Component, ProductCategory, ProductRecord, UnitBasis};
use crate::error::{QuoteError, QuoteResult};
use crate::knowledge::{Provenance, Resolved};
use crate::request::Dimensions;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// LINE ITEM & TOTALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub category: ProductCategory,
    pub unit_basis: UnitBasis,
    /// Pieces (panels, trims, fasteners)
    pub quantity: u64,
    /// Billed area, present for per-area lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<Decimal>,
    pub piece_length_m: Decimal,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub provenance: Provenance,
    /// Set when the line was derived from a panel surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<Component>,
}

/// What the engine handed the pricer: the resolved record and its own counts
#[derive(Debug, Clone, PartialEq)]
pub struct PricingInput {
    pub record: ProductRecord,
    pub quantity: u64,
    pub area_m2: Option<Decimal>,
}

/// A priced line kept next to the inputs it was priced from
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub input: PricingInput,
    pub line: LineItem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub materials_total: Decimal,
    pub shipping: Decimal,
    pub grand_total: Decimal,
}

// ============================================================================
// LINE PRICER
// ============================================================================

/// Turns a resolved product and a quantity into a priced line
pub trait LinePricer: Send + Sync {
    fn price_line_item(
        &self,
        product: &Resolved<ProductRecord>,
        quantity: u64,
        dimensions: Option<&Dimensions>,
    ) -> QuoteResult<LineItem>;
}

pub struct PricingEngine {
    tax_rate: Decimal,
    shipping_cost: Decimal,
}

impl PricingEngine {
    pub fn new(tax_rate: Decimal, shipping_cost: Decimal) -> Self {
        PricingEngine {
            tax_rate,
            shipping_cost,
        }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Subtotal, tax once on the subtotal, then shipping on top
    pub fn aggregate<'a, I>(&self, lines: I) -> Totals
    where
        I: IntoIterator<Item = &'a LineItem>,
    {
        let subtotal: Decimal = lines.into_iter().map(|line| line.subtotal).sum();
        let tax = round_money(subtotal * self.tax_rate);
        let materials_total = subtotal + tax;

        Totals {
            subtotal,
            tax,
            materials_total,
            shipping: self.shipping_cost,
            grand_total: materials_total + self.shipping_cost,
        }
    }
}

impl LinePricer for PricingEngine {
    fn price_line_item(
        &self,
        product: &Resolved<ProductRecord>,
        quantity: u64,
        dimensions: Option<&Dimensions>,
    ) -> QuoteResult<LineItem> {
        let record = &product.value;
        let price = record.price_excl_tax;

        let overflow = || {
            QuoteError::invalid_dimension(
                "subtotal",
                format!("{} × {} overflows", quantity, record.sku),
            )
        };

        let (raw, area_m2) = match record.unit_basis {
            UnitBasis::PerUnit => (
                Decimal::from(quantity).checked_mul(price).ok_or_else(overflow)?,
                None,
            ),
            UnitBasis::PerLinearPiece => (
                Decimal::from(quantity)
                    .checked_mul(record.nominal_length_m)
                    .and_then(|length| length.checked_mul(price))
                    .ok_or_else(overflow)?,
                None,
            ),
            UnitBasis::PerArea => {
                let area = dimensions.map(|d| d.area_m2).ok_or_else(|| {
                    QuoteError::invalid_dimension(
                        "area_m2",
                        format!("{} is priced per area but no surface was given", record.sku),
                    )
                })?;
                (area.checked_mul(price).ok_or_else(overflow)?, Some(area))
            }
        };

        Ok(LineItem {
            sku: record.sku.clone(),
            name: record.name.clone(),
            category: record.category,
            unit_basis: record.unit_basis,
            quantity,
            area_m2,
            piece_length_m: record.nominal_length_m,
            unit_price: price,
            subtotal: round_money(raw),
            provenance: product.provenance.clone(),
            component: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn resolved(basis: UnitBasis, price: &str, nominal_length: &str) -> Resolved<ProductRecord> {
        Resolved {
            value: ProductRecord {
                sku: "SKU-1".to_string(),
                name: "Test product".to_string(),
                category: ProductCategory::Accessory,
                family: "ISOROOF".to_string(),
                subcategory: None,
                thickness_mm: 0,
                nominal_length_m: dec(nominal_length),
                useful_width_m: None,
                unit_basis: basis,
                price_excl_tax: dec(price),
                price_incl_tax: round_money(dec(price) * dec("1.22")),
                min_length_m: None,
                max_length_m: None,
            },
            provenance: Provenance {
                source_id: "catalog".to_string(),
                priority: 1,
                generation: 1,
            },
            conflicts: vec![],
        }
    }

    fn engine() -> PricingEngine {
        PricingEngine::new(dec("0.22"), dec("280.00"))
    }

    fn area(value: &str) -> Dimensions {
        Dimensions {
            width_m: dec(value),
            length_m: Decimal::ONE,
            area_m2: dec(value),
        }
    }

    #[test]
    fn test_per_unit_ignores_piece_length() {
        let product = resolved(UnitBasis::PerUnit, "20.77", "3.0");
        let line = engine().price_line_item(&product, 4, None).unwrap();

        assert_eq!(line.subtotal, dec("83.08"));
        assert_ne!(line.subtotal, dec("249.24"));
        assert_eq!(line.provenance.source_id, "catalog");

        // Same result whatever the nominal length says
        for length in ["0", "1.5", "6.0", "12.75"] {
            let product = resolved(UnitBasis::PerUnit, "20.77", length);
            let line = engine().price_line_item(&product, 4, None).unwrap();
            assert_eq!(line.subtotal, dec("83.08"));
        }
    }

    #[test]
    fn test_per_area() {
        let product = resolved(UnitBasis::PerArea, "36.54", "0");
        let line = engine()
            .price_line_item(&product, 30, Some(&area("180")))
            .unwrap();

        assert_eq!(line.subtotal, dec("6577.20"));
        assert_eq!(line.area_m2, Some(dec("180")));
        assert_eq!(line.quantity, 30);
    }

    #[test]
    fn test_per_area_without_surface_fails() {
        let product = resolved(UnitBasis::PerArea, "36.54", "0");
        let err = engine().price_line_item(&product, 30, None).unwrap_err();
        assert!(matches!(err, QuoteError::InvalidDimension { ref field, .. } if field == "area_m2"));
    }

    #[test]
    fn test_per_linear_piece() {
        let product = resolved(UnitBasis::PerLinearPiece, "3.90", "3.0");
        let line = engine().price_line_item(&product, 15, None).unwrap();
        assert_eq!(line.subtotal, dec("175.50"));
        assert_eq!(line.piece_length_m, dec("3.0"));
    }

    #[test]
    fn test_overflowing_area_is_an_error() {
        let product = resolved(UnitBasis::PerArea, "36.54", "0");
        let huge = Dimensions {
            width_m: Decimal::MAX,
            length_m: Decimal::ONE,
            area_m2: Decimal::MAX,
        };
        let err = engine().price_line_item(&product, 1, Some(&huge)).unwrap_err();
        assert!(matches!(err, QuoteError::InvalidDimension { ref field, .. } if field == "subtotal"));
    }

    #[test]
    fn test_subtotal_rounds_to_cents() {
        let product = resolved(UnitBasis::PerUnit, "0.125", "0");
        let line = engine().price_line_item(&product, 1, None).unwrap();
        assert_eq!(line.subtotal, dec("0.13"));
    }

    #[test]
    fn test_tax_applied_once_to_subtotal() {
        let e = engine();
        let lines = vec![
            e.price_line_item(&resolved(UnitBasis::PerArea, "36.54", "0"), 30, Some(&area("180")))
                .unwrap(),
            e.price_line_item(&resolved(UnitBasis::PerUnit, "20.77", "3.0"), 4, None)
                .unwrap(),
            e.price_line_item(&resolved(UnitBasis::PerLinearPiece, "3.90", "3.0"), 15, None)
                .unwrap(),
            e.price_line_item(&resolved(UnitBasis::PerUnit, "0.38", "0"), 128, None)
                .unwrap(),
        ];

        let totals = e.aggregate(&lines);
        assert_eq!(totals.subtotal, dec("6884.42"));
        assert_eq!(totals.tax, dec("1514.57"));
        assert_eq!(totals.materials_total, dec("8398.99"));
        assert_eq!(totals.shipping, dec("280.00"));
        // Shipping is added after tax and never taxed
        assert_eq!(totals.grand_total, dec("8678.99"));
    }

    #[test]
    fn test_empty_aggregate() {
        let totals = engine().aggregate(&Vec::<LineItem>::new());
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.grand_total, dec("280.00"));
    }
}
