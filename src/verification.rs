// ⚖️ Verification Layer - Second, independent pass over every money figure
//
// Recomputes each line from the resolved record and the engine's own
// quantities, then re-sums the totals from the recomputed lines. The
// priced line is only ever compared against, never read as an input.
//
// Any difference above the tolerance withholds the quote.

use crate::catalog::{ProductCategory, UnitBasis};
use crate::pricing::{PricedLine, PricingInput, Totals};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::error;

// ============================================================================
// DISCREPANCIES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiscrepancyCategory {
    /// Line names another SKU than the record it was priced from
    Identity,
    UnitBasis,
    UnitPrice,
    PieceLength,
    Quantity,
    Area,
    LineSubtotal,
    MissingArea,
    Overflow,
    Partition,
    Subtotal,
    Tax,
    MaterialsTotal,
    Shipping,
    GrandTotal,
    /// Report was produced for another draft
    ReportMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub description: String,
    pub expected: Decimal,
    pub actual: Decimal,
    pub category: DiscrepancyCategory,
}

impl Discrepancy {
    pub fn difference(&self) -> Decimal {
        (self.expected - self.actual).abs()
    }

    /// Non-numeric mismatch (labels, categories)
    fn label(category: DiscrepancyCategory, description: String) -> Self {
        Discrepancy {
            description,
            expected: Decimal::ZERO,
            actual: Decimal::ZERO,
            category,
        }
    }
}

// ============================================================================
// VERIFICATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub verified: bool,
    pub discrepancies: Vec<Discrepancy>,
    pub lines_checked: usize,
    /// Totals as rebuilt by this layer
    pub recomputed: Totals,
}

impl VerificationReport {
    pub fn summary(&self) -> String {
        format!(
            "Verification: {} lines, recomputed grand total {}, {} discrepancies",
            self.lines_checked,
            self.recomputed.grand_total,
            self.discrepancies.len()
        )
    }
}

// ============================================================================
// VERIFIER
// ============================================================================

pub struct Verifier {
    tax_rate: Decimal,
    shipping_cost: Decimal,
    /// Largest tolerated difference (default: one cent)
    tolerance: Decimal,
}

impl Verifier {
    pub fn new(tax_rate: Decimal, shipping_cost: Decimal, tolerance: Decimal) -> Self {
        Verifier {
            tax_rate,
            shipping_cost,
            tolerance,
        }
    }

    /// Check sections and totals of a draft against the records it was priced from
    pub fn verify(
        &self,
        panels: &[PricedLine],
        accessories: &[PricedLine],
        fixings: &[PricedLine],
        totals: &Totals,
    ) -> VerificationReport {
        let mut discrepancies = Vec::new();
        let mut recomputed_subtotal = Decimal::ZERO;
        let mut lines_checked = 0;

        let sections = [
            (ProductCategory::Panel, panels),
            (ProductCategory::Accessory, accessories),
            (ProductCategory::Fixing, fixings),
        ];

        for (section, lines) in sections {
            for priced in lines {
                lines_checked += 1;
                let (input, line) = (&priced.input, &priced.line);
                let record = &input.record;

                if record.category != section || line.category != section {
                    discrepancies.push(Discrepancy::label(
                        DiscrepancyCategory::Partition,
                        format!(
                            "{} is a {} listed under {}",
                            record.sku,
                            record.category.as_str(),
                            section.as_str()
                        ),
                    ));
                }

                check_line_fields(&mut discrepancies, priced);

                match recompute_line(input) {
                    Ok(expected) => {
                        recomputed_subtotal += expected;
                        self.compare(
                            &mut discrepancies,
                            DiscrepancyCategory::LineSubtotal,
                            format!("line {} subtotal", record.sku),
                            expected,
                            line.subtotal,
                        );
                    }
                    Err(discrepancy) => discrepancies.push(discrepancy),
                }
            }
        }

        let recomputed = self.recompute_totals(recomputed_subtotal);

        let checks = [
            (DiscrepancyCategory::Subtotal, "subtotal", recomputed.subtotal, totals.subtotal),
            (DiscrepancyCategory::Tax, "tax", recomputed.tax, totals.tax),
            (
                DiscrepancyCategory::MaterialsTotal,
                "materials total",
                recomputed.materials_total,
                totals.materials_total,
            ),
            (DiscrepancyCategory::Shipping, "shipping", recomputed.shipping, totals.shipping),
            (
                DiscrepancyCategory::GrandTotal,
                "grand total",
                recomputed.grand_total,
                totals.grand_total,
            ),
        ];
        for (category, label, expected, actual) in checks {
            self.compare(&mut discrepancies, category, label.to_string(), expected, actual);
        }

        let report = VerificationReport {
            verified: discrepancies.is_empty(),
            discrepancies,
            lines_checked,
            recomputed,
        };

        if !report.verified {
            for d in &report.discrepancies {
                error!(
                    category = ?d.category,
                    expected = %d.expected,
                    actual = %d.actual,
                    "verification discrepancy: {}",
                    d.description
                );
            }
        }

        report
    }

    fn recompute_totals(&self, subtotal: Decimal) -> Totals {
        let tax = to_cents(self.tax_rate * subtotal);
        Totals {
            subtotal,
            tax,
            materials_total: subtotal + tax,
            shipping: self.shipping_cost,
            grand_total: subtotal + tax + self.shipping_cost,
        }
    }

    fn compare(
        &self,
        discrepancies: &mut Vec<Discrepancy>,
        category: DiscrepancyCategory,
        description: String,
        expected: Decimal,
        actual: Decimal,
    ) {
        let difference = (expected - actual).abs();
        if difference > self.tolerance {
            discrepancies.push(Discrepancy {
                description: format!("{}: {} difference", description, difference),
                expected,
                actual,
                category,
            });
        }
    }
}

/// The priced line must restate the record and quantities it was given
fn check_line_fields(discrepancies: &mut Vec<Discrepancy>, priced: &PricedLine) {
    let (input, line) = (&priced.input, &priced.line);
    let record = &input.record;

    if line.sku != record.sku {
        discrepancies.push(Discrepancy::label(
            DiscrepancyCategory::Identity,
            format!("line {} was priced from {}", line.sku, record.sku),
        ));
    }
    if line.unit_basis != record.unit_basis {
        discrepancies.push(Discrepancy::label(
            DiscrepancyCategory::UnitBasis,
            format!(
                "line {} billed {} but the record is {}",
                record.sku,
                line.unit_basis.as_str(),
                record.unit_basis.as_str()
            ),
        ));
    }

    let exact = [
        (
            DiscrepancyCategory::UnitPrice,
            "unit price",
            record.price_excl_tax,
            line.unit_price,
        ),
        (
            DiscrepancyCategory::PieceLength,
            "piece length",
            record.nominal_length_m,
            line.piece_length_m,
        ),
        (
            DiscrepancyCategory::Quantity,
            "quantity",
            Decimal::from(input.quantity),
            Decimal::from(line.quantity),
        ),
    ];
    for (category, label, expected, actual) in exact {
        if expected != actual {
            discrepancies.push(Discrepancy {
                description: format!("line {} {}", record.sku, label),
                expected,
                actual,
                category,
            });
        }
    }

    if line.area_m2 != input.area_m2 {
        discrepancies.push(Discrepancy {
            description: format!(
                "line {} area {:?}, surface was {:?}",
                record.sku, line.area_m2, input.area_m2
            ),
            expected: input.area_m2.unwrap_or(Decimal::ZERO),
            actual: line.area_m2.unwrap_or(Decimal::ZERO),
            category: DiscrepancyCategory::Area,
        });
    }
}

/// Record price × (surface area | pieces × nominal length | pieces), to the cent
fn recompute_line(input: &PricingInput) -> Result<Decimal, Discrepancy> {
    let record = &input.record;
    let pieces = Decimal::from(input.quantity);

    let raw = match record.unit_basis {
        UnitBasis::PerArea => {
            let area = input.area_m2.ok_or_else(|| {
                Discrepancy::label(
                    DiscrepancyCategory::MissingArea,
                    format!("{} is priced per area without an area", record.sku),
                )
            })?;
            record.price_excl_tax.checked_mul(area)
        }
        UnitBasis::PerLinearPiece => record
            .price_excl_tax
            .checked_mul(record.nominal_length_m)
            .and_then(|per_piece| per_piece.checked_mul(pieces)),
        UnitBasis::PerUnit => record.price_excl_tax.checked_mul(pieces),
    };

    raw.map(to_cents).ok_or_else(|| {
        Discrepancy::label(
            DiscrepancyCategory::Overflow,
            format!("line {} cannot be recomputed without overflow", record.sku),
        )
    })
}

fn to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductRecord;
    use crate::knowledge::Provenance;
    use crate::pricing::LineItem;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn priced(
        category: ProductCategory,
        basis: UnitBasis,
        quantity: u64,
        area: Option<&str>,
        length: &str,
        price: &str,
        subtotal: &str,
    ) -> PricedLine {
        let sku = format!("{}-{}", category.as_str(), quantity);
        let record = ProductRecord {
            sku: sku.clone(),
            name: "Test".to_string(),
            category,
            family: "ISOROOF".to_string(),
            subcategory: None,
            thickness_mm: 0,
            nominal_length_m: dec(length),
            useful_width_m: None,
            unit_basis: basis,
            price_excl_tax: dec(price),
            price_incl_tax: to_cents(dec(price) * dec("1.22")),
            min_length_m: None,
            max_length_m: None,
        };
        PricedLine {
            input: PricingInput {
                record,
                quantity,
                area_m2: area.map(dec),
            },
            line: LineItem {
                sku,
                name: "Test".to_string(),
                category,
                unit_basis: basis,
                quantity,
                area_m2: area.map(dec),
                piece_length_m: dec(length),
                unit_price: dec(price),
                subtotal: dec(subtotal),
                provenance: Provenance {
                    source_id: "catalog".to_string(),
                    priority: 1,
                    generation: 1,
                },
                component: None,
            },
        }
    }

    fn verifier() -> Verifier {
        Verifier::new(dec("0.22"), dec("280.00"), dec("0.01"))
    }

    fn sample() -> (Vec<PricedLine>, Vec<PricedLine>, Vec<PricedLine>, Totals) {
        let panels = vec![priced(
            ProductCategory::Panel,
            UnitBasis::PerArea,
            30,
            Some("180"),
            "0",
            "36.54",
            "6577.20",
        )];
        let accessories = vec![priced(
            ProductCategory::Accessory,
            UnitBasis::PerLinearPiece,
            15,
            None,
            "3.0",
            "3.90",
            "175.50",
        )];
        let fixings = vec![priced(
            ProductCategory::Fixing,
            UnitBasis::PerUnit,
            4,
            None,
            "3.0",
            "20.77",
            "83.08",
        )];
        // 6835.78 × 0.22 = 1503.8716
        let totals = Totals {
            subtotal: dec("6835.78"),
            tax: dec("1503.87"),
            materials_total: dec("8339.65"),
            shipping: dec("280.00"),
            grand_total: dec("8619.65"),
        };
        (panels, accessories, fixings, totals)
    }

    fn categories(report: &VerificationReport) -> Vec<DiscrepancyCategory> {
        report.discrepancies.iter().map(|d| d.category.clone()).collect()
    }

    #[test]
    fn test_consistent_quote_verifies() {
        let (p, a, f, totals) = sample();
        let report = verifier().verify(&p, &a, &f, &totals);

        assert!(report.verified, "{:?}", report.discrepancies);
        assert_eq!(report.lines_checked, 3);
        assert_eq!(report.recomputed, totals);
    }

    #[test]
    fn test_per_unit_line_priced_with_length_is_caught() {
        let (p, a, mut f, totals) = sample();
        // 20.77 × 3.0 × 4: the classic per-unit mistake
        f[0].line.subtotal = dec("249.24");

        let report = verifier().verify(&p, &a, &f, &totals);
        assert!(!report.verified);
        assert_eq!(report.discrepancies[0].category, DiscrepancyCategory::LineSubtotal);
        assert_eq!(report.discrepancies[0].expected, dec("83.08"));
        assert_eq!(report.discrepancies[0].difference(), dec("166.16"));
    }

    #[test]
    fn test_relabelled_unit_basis_is_caught() {
        let (p, a, mut f, mut totals) = sample();
        // Line rewritten as per-piece so that its own fields agree with 249.24
        f[0].line.unit_basis = UnitBasis::PerLinearPiece;
        f[0].line.subtotal = dec("249.24");
        totals.subtotal = dec("7001.94");
        totals.tax = dec("1540.43");
        totals.materials_total = dec("8542.37");
        totals.grand_total = dec("8822.37");

        let report = verifier().verify(&p, &a, &f, &totals);
        let found = categories(&report);
        assert!(found.contains(&DiscrepancyCategory::UnitBasis));
        assert!(found.contains(&DiscrepancyCategory::LineSubtotal));
        // Recomputed from the record, not from the relabelled line
        assert_eq!(report.recomputed.subtotal, dec("6835.78"));
    }

    #[test]
    fn test_price_incl_tax_billed_as_unit_price_is_caught() {
        let (p, a, mut f, mut totals) = sample();
        // 25.34 × 4 = 101.36 and tax charged on top again
        f[0].line.unit_price = dec("25.34");
        f[0].line.subtotal = dec("101.36");
        totals.subtotal = dec("6854.06");
        totals.tax = dec("1507.89");
        totals.materials_total = dec("8361.95");
        totals.grand_total = dec("8641.95");

        let report = verifier().verify(&p, &a, &f, &totals);
        let price = report
            .discrepancies
            .iter()
            .find(|d| d.category == DiscrepancyCategory::UnitPrice)
            .unwrap();
        assert_eq!(price.expected, dec("20.77"));
        assert_eq!(price.actual, dec("25.34"));
        assert!(categories(&report).contains(&DiscrepancyCategory::LineSubtotal));
    }

    #[test]
    fn test_changed_quantity_or_piece_length_is_caught() {
        let (p, mut a, f, totals) = sample();
        a[0].line.quantity = 16;
        a[0].line.piece_length_m = dec("2.8");

        let report = verifier().verify(&p, &a, &f, &totals);
        let found = categories(&report);
        assert!(found.contains(&DiscrepancyCategory::Quantity));
        assert!(found.contains(&DiscrepancyCategory::PieceLength));
    }

    #[test]
    fn test_one_cent_is_tolerated() {
        let (p, a, mut f, totals) = sample();
        f[0].line.subtotal = dec("83.09");

        let report = verifier().verify(&p, &a, &f, &totals);
        assert!(report.verified);
    }

    #[test]
    fn test_compounded_tax_is_caught() {
        let (p, a, f, mut totals) = sample();
        // tax charged on shipping as well
        totals.tax = dec("1565.47");
        totals.materials_total = totals.subtotal + totals.tax;
        totals.grand_total = totals.materials_total + totals.shipping;

        let report = verifier().verify(&p, &a, &f, &totals);
        assert_eq!(
            categories(&report),
            vec![
                DiscrepancyCategory::Tax,
                DiscrepancyCategory::MaterialsTotal,
                DiscrepancyCategory::GrandTotal
            ]
        );
    }

    #[test]
    fn test_wrong_section_is_caught() {
        let (p, a, f, totals) = sample();
        let report = verifier().verify(&p, &f, &a, &totals);

        assert!(!report.verified);
        assert_eq!(
            report
                .discrepancies
                .iter()
                .filter(|d| d.category == DiscrepancyCategory::Partition)
                .count(),
            2
        );
    }

    #[test]
    fn test_per_area_line_without_area_is_caught() {
        let (mut p, a, f, totals) = sample();
        p[0].input.area_m2 = None;

        let report = verifier().verify(&p, &a, &f, &totals);
        assert!(categories(&report).contains(&DiscrepancyCategory::MissingArea));
    }

    #[test]
    fn test_report_summary() {
        let (p, a, f, totals) = sample();
        let report = verifier().verify(&p, &a, &f, &totals);
        assert_eq!(
            report.summary(),
            "Verification: 3 lines, recomputed grand total 8619.65, 0 discrepancies"
        );
    }
}
