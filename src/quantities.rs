// 🧮 Quantity Calculator - Continuous dimensions to discrete piece counts
//
// Every count is ceiling-rounded on its own formula, never on an
// intermediate. Arithmetic is exact decimal, so a width that divides
// evenly by the useful width never gains an extra panel.

use crate::catalog::{Component, ProductRecord, StructuralLimit};
use crate::error::{QuoteError, QuoteResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spacing between perimeter fixations along the panel length (m)
const FIXATION_SPACING_M: Decimal = Decimal::from_parts(25, 0, 0, false, 1);
/// Drip-edge trims are sold in 3 m pieces
const TRIM_PIECE_LENGTH_M: u64 = 3;
const RIVETS_PER_TRIM_PIECE: u64 = 20;
const FIXATIONS_PER_ROD: u64 = 4;
const NUTS_PER_FIXATION: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitySet {
    pub panel_count: u64,
    pub support_count: u64,
    pub fixation_points: u64,
    pub rods: u64,
    pub nuts: u64,
    pub front_drip_edge_pieces: u64,
    pub lateral_drip_edge_pieces: u64,
    pub rivets: u64,
}

impl QuantitySet {
    pub fn trim_pieces(&self) -> u64 {
        self.front_drip_edge_pieces
            .saturating_add(self.lateral_drip_edge_pieces)
    }

    /// Pieces of a derived component
    pub fn for_component(&self, component: Component) -> u64 {
        match component {
            Component::FrontDripEdge => self.front_drip_edge_pieces,
            Component::LateralDripEdge => self.lateral_drip_edge_pieces,
            Component::Rod => self.rods,
            Component::Nut => self.nuts,
            Component::Rivet => self.rivets,
            Component::FixationKit => self.fixation_points,
        }
    }
}

fn divide(field: &str, numerator: Decimal, denominator: Decimal) -> QuoteResult<Decimal> {
    if denominator <= Decimal::ZERO {
        return Err(QuoteError::invalid_dimension(
            field,
            format!("divisor must be greater than zero, got {}", denominator),
        ));
    }
    numerator
        .checked_div(denominator)
        .ok_or_else(|| QuoteError::invalid_dimension(field, "division overflow"))
}

fn multiply(field: &str, lhs: Decimal, rhs: Decimal) -> QuoteResult<Decimal> {
    lhs.checked_mul(rhs)
        .ok_or_else(|| QuoteError::invalid_dimension(field, "value out of range"))
}

/// Product of piece counts; overflow is a bad dimension, never a wrap
fn count_product(field: &str, factors: &[u64]) -> QuoteResult<u64> {
    factors.iter().try_fold(1u64, |acc, &factor| {
        acc.checked_mul(factor).ok_or_else(|| {
            QuoteError::invalid_dimension(field, format!("count overflows {:?}", factors))
        })
    })
}

/// Rivets for a number of drip-edge pieces
pub fn rivets_for(trim_pieces: u64) -> QuoteResult<u64> {
    count_product("rivets", &[trim_pieces, RIVETS_PER_TRIM_PIECE])
}

fn ceil_count(field: &str, value: Decimal) -> QuoteResult<u64> {
    value
        .ceil()
        .to_u64()
        .ok_or_else(|| QuoteError::invalid_dimension(field, format!("count {} out of range", value)))
}

/// Derive the BOM counts for one panel surface.
///
/// `limit` supplies max_allowed_span_m; the span itself was already checked
/// by the structural validator.
pub fn derive_quantities(
    product: &ProductRecord,
    limit: &StructuralLimit,
    span_m: Decimal,
    total_width_m: Decimal,
    total_length_m: Decimal,
) -> QuoteResult<QuantitySet> {
    let useful_width_m = product.useful_width_m.ok_or_else(|| {
        QuoteError::invalid_dimension(
            "useful_width_m",
            format!("product {} has no useful width", product.sku),
        )
    })?;

    for (field, value) in [
        ("span_m", span_m),
        ("total_width_m", total_width_m),
        ("total_length_m", total_length_m),
    ] {
        if value <= Decimal::ZERO {
            return Err(QuoteError::invalid_dimension(
                field,
                format!("must be greater than zero, got {}", value),
            ));
        }
    }

    if !product.accepts_length(total_length_m) {
        return Err(QuoteError::invalid_dimension(
            "total_length_m",
            format!(
                "{} m is outside the {}..{} m range of {}",
                total_length_m,
                product.min_length_m.map_or("-".to_string(), |v| v.to_string()),
                product.max_length_m.map_or("-".to_string(), |v| v.to_string()),
                product.sku
            ),
        ));
    }

    let panel_count = ceil_count(
        "panel_count",
        divide("useful_width_m", total_width_m, useful_width_m)?,
    )?;

    let support_count = ceil_count(
        "support_count",
        divide("max_allowed_span_m", span_m, limit.max_span_m)?,
    )?
    .checked_add(1)
    .ok_or_else(|| QuoteError::invalid_dimension("support_count", "count out of range"))?;

    let perimeter_fixations = divide(
        "fixation_spacing",
        multiply("total_length_m", total_length_m, Decimal::TWO)?,
        FIXATION_SPACING_M,
    )?;
    let panel_fixations = count_product("fixation_points", &[panel_count, support_count, 2])?;
    let fixation_points = ceil_count(
        "fixation_points",
        Decimal::from(panel_fixations)
            .checked_add(perimeter_fixations)
            .ok_or_else(|| QuoteError::invalid_dimension("fixation_points", "count out of range"))?,
    )?;

    let rods = ceil_count(
        "rods",
        divide(
            "fixations_per_rod",
            Decimal::from(fixation_points),
            Decimal::from(FIXATIONS_PER_ROD),
        )?,
    )?;

    let nuts = count_product("nuts", &[fixation_points, NUTS_PER_FIXATION])?;

    let front_drip_edge_pieces = ceil_count(
        "front_drip_edge_pieces",
        divide(
            "trim_piece_length",
            multiply("useful_width_m", Decimal::from(panel_count), useful_width_m)?,
            Decimal::from(TRIM_PIECE_LENGTH_M),
        )?,
    )?;

    let lateral_drip_edge_pieces = ceil_count(
        "lateral_drip_edge_pieces",
        divide(
            "trim_piece_length",
            multiply("total_length_m", total_length_m, Decimal::TWO)?,
            Decimal::from(TRIM_PIECE_LENGTH_M),
        )?,
    )?;

    let trim_pieces = front_drip_edge_pieces
        .checked_add(lateral_drip_edge_pieces)
        .ok_or_else(|| QuoteError::invalid_dimension("trim_pieces", "count out of range"))?;
    let rivets = rivets_for(trim_pieces)?;

    Ok(QuantitySet {
        panel_count,
        support_count,
        fixation_points,
        rods,
        nuts,
        front_drip_edge_pieces,
        lateral_drip_edge_pieces,
        rivets,
    })
}

/// Pieces of nominal length needed to cover a run
pub fn linear_pieces(product: &ProductRecord, length_m: Decimal) -> QuoteResult<u64> {
    if length_m <= Decimal::ZERO {
        return Err(QuoteError::invalid_dimension(
            "length_m",
            format!("must be greater than zero, got {}", length_m),
        ));
    }
    ceil_count(
        "pieces",
        divide("nominal_length_m", length_m, product.nominal_length_m)?,
    )
}
