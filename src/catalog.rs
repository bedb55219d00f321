// 📦 Catalog Records - Products and rule tables as immutable values
//
// Records are built once from a source's raw rows and never mutated.
// A reload produces new records; nothing is patched in place.

use crate::error::{QuoteError, QuoteResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// UNIT BASIS
// ============================================================================

/// How a line total is derived from a quantity.
///
/// Closed set: every formula site matches exhaustively, so adding a basis
/// forces every pricing path to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitBasis {
    /// quantity × unit price
    PerUnit,
    /// quantity × nominal piece length × unit price
    PerLinearPiece,
    /// area × unit price
    PerArea,
}

impl UnitBasis {
    /// Parse a tag from the versioned source vocabulary.
    ///
    /// Accepted: `unidad`/`per_unit`, `ml`/`per_linear_piece`, `m²`/`m2`/`per_area`.
    pub fn from_tag(tag: &str) -> QuoteResult<Self> {
        match tag.trim().to_lowercase().as_str() {
            "unidad" | "per_unit" => Ok(UnitBasis::PerUnit),
            "ml" | "per_linear_piece" => Ok(UnitBasis::PerLinearPiece),
            "m²" | "m2" | "per_area" => Ok(UnitBasis::PerArea),
            _ => Err(QuoteError::UnitBasisUnknown {
                tag: tag.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitBasis::PerUnit => "per_unit",
            UnitBasis::PerLinearPiece => "per_linear_piece",
            UnitBasis::PerArea => "per_area",
        }
    }
}

// ============================================================================
// PRODUCT CATEGORY
// ============================================================================

/// Quote section a product is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Panel,
    Accessory,
    Fixing,
}

impl ProductCategory {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "panel" | "panels" | "panel_sandwich" => Some(ProductCategory::Panel),
            "accessory" | "accessories" | "accesorio" | "accesorios" | "perfileria" => {
                Some(ProductCategory::Accessory)
            }
            "fixing" | "fixings" | "fijacion" | "fijaciones" => Some(ProductCategory::Fixing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Panel => "panel",
            ProductCategory::Accessory => "accessory",
            ProductCategory::Fixing => "fixing",
        }
    }
}

// ============================================================================
// PRODUCT RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sku: String,
    pub name: String,
    pub category: ProductCategory,
    pub family: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// 0 when thickness does not apply (trims, fasteners)
    pub thickness_mm: u32,
    /// Informational for per-unit products; a multiplier for per-linear-piece
    pub nominal_length_m: Decimal,
    /// Covering width of one panel; required for panels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useful_width_m: Option<Decimal>,
    pub unit_basis: UnitBasis,
    pub price_excl_tax: Decimal,
    pub price_incl_tax: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length_m: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length_m: Option<Decimal>,
}

impl ProductRecord {
    pub fn is_panel(&self) -> bool {
        self.category == ProductCategory::Panel
    }

    /// Whether a piece length fits the product's valid range (open bounds accept)
    pub fn accepts_length(&self, length_m: Decimal) -> bool {
        self.min_length_m.map_or(true, |min| length_m >= min)
            && self.max_length_m.map_or(true, |max| length_m <= max)
    }

    /// price_excl × (1 + tax) must land within `tolerance` of price_incl
    pub fn check_price_invariant(&self, tax_rate: Decimal, tolerance: Decimal) -> Result<(), String> {
        let expected = self.price_excl_tax * (Decimal::ONE + tax_rate);
        let drift = (expected - self.price_incl_tax).abs();

        if drift > tolerance {
            return Err(format!(
                "price incl. tax {} differs from {} × (1 + {}) = {} by {}",
                self.price_incl_tax,
                self.price_excl_tax,
                tax_rate,
                expected.round_dp(4),
                drift.round_dp(4)
            ));
        }

        Ok(())
    }

    /// Structural checks that do not depend on configuration
    pub fn check_shape(&self) -> Result<(), String> {
        if self.sku.trim().is_empty() {
            return Err("empty SKU".to_string());
        }
        if self.price_excl_tax < Decimal::ZERO || self.price_incl_tax < Decimal::ZERO {
            return Err("negative price".to_string());
        }
        if self.nominal_length_m < Decimal::ZERO {
            return Err("negative nominal length".to_string());
        }
        if self.unit_basis == UnitBasis::PerLinearPiece && self.nominal_length_m.is_zero() {
            return Err("per_linear_piece pricing needs a nominal length".to_string());
        }
        if self.is_panel() {
            if self.thickness_mm == 0 {
                return Err("panel without thickness".to_string());
            }
            match self.useful_width_m {
                Some(width) if width > Decimal::ZERO => {}
                _ => return Err("panel without a positive useful width".to_string()),
            }
        }
        if let (Some(min), Some(max)) = (self.min_length_m, self.max_length_m) {
            if min > max {
                return Err(format!("length range {}..{} is inverted", min, max));
            }
        }
        Ok(())
    }
}

// ============================================================================
// RULE RECORDS
// ============================================================================

/// Maximum unsupported span for a family at one thickness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralLimit {
    pub family: String,
    pub thickness_mm: u32,
    pub max_span_m: Decimal,
}

/// BOM parts derived from a panel surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    FrontDripEdge,
    LateralDripEdge,
    Rod,
    Nut,
    Rivet,
    /// One kit (screw + washer) per fixation point
    FixationKit,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::FrontDripEdge,
        Component::LateralDripEdge,
        Component::Rod,
        Component::Nut,
        Component::Rivet,
        Component::FixationKit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::FrontDripEdge => "front_drip_edge",
            Component::LateralDripEdge => "lateral_drip_edge",
            Component::Rod => "rod",
            Component::Nut => "nut",
            Component::Rivet => "rivet",
            Component::FixationKit => "fixation_kit",
        }
    }
}

/// Which SKU supplies a component for a panel family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRule {
    pub family: String,
    pub component: Component,
    pub sku: String,
}

// ============================================================================
// RAW ROWS (as found in JSON documents and CSV price lists)
// ============================================================================

/// Loosely-typed product row before vocabulary checks
#[derive(Debug, Clone, Deserialize)]
pub struct RawProduct {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub family: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub thickness_mm: Option<u32>,
    #[serde(default)]
    pub nominal_length_m: Option<Decimal>,
    #[serde(default)]
    pub useful_width_m: Option<Decimal>,
    pub unit_basis: String,
    pub price_excl_tax: Decimal,
    pub price_incl_tax: Decimal,
    #[serde(default)]
    pub min_length_m: Option<Decimal>,
    #[serde(default)]
    pub max_length_m: Option<Decimal>,
}

impl RawProduct {
    /// Convert into a typed record, rejecting unknown vocabulary
    pub fn into_record(self, source_id: &str) -> QuoteResult<ProductRecord> {
        let unit_basis = UnitBasis::from_tag(&self.unit_basis)?;

        let category = ProductCategory::from_tag(&self.category).ok_or_else(|| {
            QuoteError::InvalidRecord {
                source_id: source_id.to_string(),
                sku: self.sku.clone(),
                reason: format!("unknown category `{}`", self.category),
            }
        })?;

        let record = ProductRecord {
            sku: self.sku.trim().to_string(),
            name: self.name.trim().to_string(),
            category,
            family: self.family.trim().to_uppercase(),
            subcategory: self
                .subcategory
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            thickness_mm: self.thickness_mm.unwrap_or(0),
            nominal_length_m: self.nominal_length_m.unwrap_or(Decimal::ZERO),
            useful_width_m: self.useful_width_m,
            unit_basis,
            price_excl_tax: self.price_excl_tax,
            price_incl_tax: self.price_incl_tax,
            min_length_m: self.min_length_m,
            max_length_m: self.max_length_m,
        };

        record.check_shape().map_err(|reason| QuoteError::InvalidRecord {
            source_id: source_id.to_string(),
            sku: record.sku.clone(),
            reason,
        })?;

        Ok(record)
    }
}
