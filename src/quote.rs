// 🧾 Quote Assembler - Verified sections and totals, composed once
//
// Assembly is pure composition: no figure is recalculated here.
// A Quote only exists with verified = true; a failing report never
// becomes a quote.

use crate::error::{QuoteError, QuoteResult};
use crate::knowledge::KnowledgeConflict;
use crate::pricing::{LineItem, PricedLine, Totals};
use crate::structural::StructuralCheck;
use crate::verification::{Discrepancy, DiscrepancyCategory, VerificationReport};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

// ============================================================================
// DRAFT (priced, not yet verified)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteDraft {
    pub reference: Option<String>,
    pub panels: Vec<PricedLine>,
    pub accessories: Vec<PricedLine>,
    pub fixings: Vec<PricedLine>,
    pub totals: Totals,
    pub tax_rate: Decimal,
    pub currency: String,
    pub structural_checks: Vec<StructuralCheck>,
    pub conflicts: Vec<KnowledgeConflict>,
    pub generation: u64,
}

impl QuoteDraft {
    pub fn line_count(&self) -> usize {
        self.panels.len() + self.accessories.len() + self.fixings.len()
    }
}

// ============================================================================
// QUOTE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub panels: Vec<LineItem>,
    pub accessories: Vec<LineItem>,
    pub fixings: Vec<LineItem>,
    pub totals: Totals,
    pub tax_rate: Decimal,
    pub currency: String,
    pub structural_checks: Vec<StructuralCheck>,
    pub warnings: Vec<String>,
    pub conflicts: Vec<KnowledgeConflict>,
    /// Knowledge snapshot the quote was computed against
    pub generation: u64,
    /// SHA-256 over every line and total
    pub fingerprint: String,
    pub verified: bool,
}

impl Quote {
    /// Lines in section order: panels, accessories, fixings
    pub fn line_items(&self) -> impl Iterator<Item = &LineItem> {
        self.panels
            .iter()
            .chain(self.accessories.iter())
            .chain(self.fixings.iter())
    }

    pub fn line_count(&self) -> usize {
        self.panels.len() + self.accessories.len() + self.fixings.len()
    }

    /// Gate for anything that shows a quote to a person
    pub fn ensure_renderable(&self) -> QuoteResult<()> {
        if !self.verified {
            return Err(QuoteError::VerificationFailure {
                discrepancies: Vec::new(),
            });
        }
        Ok(())
    }

    /// Plain-text itemized summary
    pub fn render_text(&self) -> QuoteResult<String> {
        self.ensure_renderable()?;

        let mut out = String::new();
        let _ = writeln!(out, "QUOTE {}", self.reference.as_deref().unwrap_or("(no reference)"));
        let _ = writeln!(out, "Knowledge generation {} | {}", self.generation, self.fingerprint);

        let sections = [
            ("PANELS", &self.panels),
            ("ACCESSORIES", &self.accessories),
            ("FIXINGS", &self.fixings),
        ];
        for (title, lines) in sections {
            if lines.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", title);
            for line in lines.iter() {
                let quantity = match line.area_m2 {
                    Some(area) => format!("{} m² ({} pcs)", area, line.quantity),
                    None => format!("{} pcs", line.quantity),
                };
                let _ = writeln!(
                    out,
                    "  {:<16} {:<32} {:>18} × {:>10} = {:>12}",
                    line.sku, line.name, quantity, line.unit_price, line.subtotal
                );
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "  {:<24} {:>14}", "Subtotal", self.totals.subtotal);
        let _ = writeln!(
            out,
            "  {:<24} {:>14}",
            format!("Tax ({}%)", (self.tax_rate * Decimal::ONE_HUNDRED).normalize()),
            self.totals.tax
        );
        let _ = writeln!(out, "  {:<24} {:>14}", "Materials total", self.totals.materials_total);
        let _ = writeln!(out, "  {:<24} {:>14}", "Shipping", self.totals.shipping);
        let _ = writeln!(
            out,
            "  {:<24} {:>14} {}",
            "GRAND TOTAL", self.totals.grand_total, self.currency
        );

        if !self.warnings.is_empty() {
            let _ = writeln!(out);
            for warning in &self.warnings {
                let _ = writeln!(out, "  ⚠ {}", warning);
            }
        }

        Ok(out)
    }
}

/// Hash of every line and total; stable across runs
fn fingerprint(
    reference: Option<&str>,
    lines: &[&[LineItem]],
    totals: &Totals,
    generation: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}\n", reference.unwrap_or(""), generation));
    for section in lines {
        for line in section.iter() {
            hasher.update(format!(
                "{}|{}|{}|{:?}|{}|{}|{}|{}\n",
                line.sku,
                line.unit_basis.as_str(),
                line.quantity,
                line.area_m2,
                line.piece_length_m,
                line.unit_price,
                line.subtotal,
                line.provenance.source_id
            ));
        }
        hasher.update("--\n");
    }
    hasher.update(format!(
        "{}|{}|{}|{}|{}",
        totals.subtotal, totals.tax, totals.materials_total, totals.shipping, totals.grand_total
    ));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// ASSEMBLER
// ============================================================================

pub struct QuoteAssembler;

impl QuoteAssembler {
    /// Compose a quote from a draft and its verification report
    pub fn assemble(draft: QuoteDraft, report: &VerificationReport) -> QuoteResult<Quote> {
        if !report.verified {
            return Err(QuoteError::VerificationFailure {
                discrepancies: report.discrepancies.clone(),
            });
        }

        let mut mismatches = Vec::new();
        if report.lines_checked != draft.line_count() {
            mismatches.push(Discrepancy {
                description: format!(
                    "report checked {} lines, draft has {}",
                    report.lines_checked,
                    draft.line_count()
                ),
                expected: Decimal::from(draft.line_count()),
                actual: Decimal::from(report.lines_checked),
                category: DiscrepancyCategory::ReportMismatch,
            });
        }
        if report.recomputed != draft.totals {
            mismatches.push(Discrepancy {
                description: "report totals differ from the draft".to_string(),
                expected: draft.totals.grand_total,
                actual: report.recomputed.grand_total,
                category: DiscrepancyCategory::ReportMismatch,
            });
        }
        if !mismatches.is_empty() {
            return Err(QuoteError::VerificationFailure {
                discrepancies: mismatches,
            });
        }

        let panels = lines_of(draft.panels);
        let accessories = lines_of(draft.accessories);
        let fixings = lines_of(draft.fixings);

        let fingerprint = fingerprint(
            draft.reference.as_deref(),
            &[panels.as_slice(), accessories.as_slice(), fixings.as_slice()],
            &draft.totals,
            draft.generation,
        );

        let warnings = draft
            .structural_checks
            .iter()
            .filter_map(|check| check.warning.clone())
            .collect();

        Ok(Quote {
            reference: draft.reference,
            panels,
            accessories,
            fixings,
            totals: draft.totals,
            tax_rate: draft.tax_rate,
            currency: draft.currency,
            structural_checks: draft.structural_checks,
            warnings,
            conflicts: draft.conflicts,
            generation: draft.generation,
            fingerprint,
            verified: true,
        })
    }
}

fn lines_of(priced: Vec<PricedLine>) -> Vec<LineItem> {
    priced.into_iter().map(|p| p.line).collect()
}
