// ⚙️ Engine Configuration - Constants consumed at initialization
//
// Loaded from `quote-engine.toml` with QUOTE_* environment overrides.
// Validated once at startup; the engine never re-reads it mid-request.

use crate::error::{QuoteError, QuoteResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE: &str = "quote-engine.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tax applied once to the materials subtotal (0.22 = 22%)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Flat shipping added after tax (USD)
    #[serde(default = "default_shipping_cost")]
    pub shipping_cost: Decimal,

    /// Maximum difference tolerated between pricing and verification
    #[serde(default = "default_cent")]
    pub rounding_tolerance: Decimal,

    /// Fraction of the max span inside which a span only warns
    #[serde(default = "default_safety_margin")]
    pub safety_margin: Decimal,

    /// Price difference above which two sources are in conflict
    #[serde(default = "default_cent")]
    pub conflict_tolerance: Decimal,

    /// Allowed drift between price_incl_tax and price_excl_tax × (1 + tax)
    #[serde(default = "default_cent")]
    pub price_tolerance: Decimal,

    /// Currency label shown on quotes
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_tax_rate() -> Decimal {
    Decimal::new(22, 2)
}

fn default_shipping_cost() -> Decimal {
    Decimal::new(28000, 2)
}

fn default_cent() -> Decimal {
    Decimal::new(1, 2)
}

fn default_safety_margin() -> Decimal {
    Decimal::new(5, 2)
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tax_rate: default_tax_rate(),
            shipping_cost: default_shipping_cost(),
            rounding_tolerance: default_cent(),
            safety_margin: default_safety_margin(),
            conflict_tolerance: default_cent(),
            price_tolerance: default_cent(),
            currency: default_currency(),
        }
    }
}

impl EngineConfig {
    /// Load from the default file if present, then apply env overrides
    pub fn load() -> QuoteResult<Self> {
        Self::load_from(None)
    }

    /// Like `load`, but an explicit path must exist
    pub fn load_from(path: Option<&Path>) -> QuoteResult<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file (no env overrides)
    pub fn from_file(path: &Path) -> QuoteResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QuoteError::SourceLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: EngineConfig = toml::from_str(&content).map_err(|e| QuoteError::SourceLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Override fields from QUOTE_* variables; `lookup` abstracts the environment
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> QuoteResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut Decimal); 5] = [
            ("QUOTE_TAX_RATE", &mut self.tax_rate),
            ("QUOTE_SHIPPING_COST", &mut self.shipping_cost),
            ("QUOTE_ROUNDING_TOLERANCE", &mut self.rounding_tolerance),
            ("QUOTE_SAFETY_MARGIN", &mut self.safety_margin),
            ("QUOTE_CONFLICT_TOLERANCE", &mut self.conflict_tolerance),
        ];

        for (key, slot) in fields {
            if let Some(raw) = lookup(key) {
                *slot = Decimal::from_str(raw.trim()).map_err(|e| QuoteError::SourceLoad {
                    path: key.to_string(),
                    reason: format!("not a decimal: {}", e),
                })?;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> QuoteResult<()> {
        let unit_interval = |field: &str, value: Decimal| {
            if value < Decimal::ZERO || value >= Decimal::ONE {
                Err(QuoteError::invalid_dimension(
                    field,
                    format!("must be in [0, 1), got {}", value),
                ))
            } else {
                Ok(())
            }
        };
        unit_interval("tax_rate", self.tax_rate)?;
        unit_interval("safety_margin", self.safety_margin)?;

        for (field, value) in [
            ("shipping_cost", self.shipping_cost),
            ("rounding_tolerance", self.rounding_tolerance),
            ("conflict_tolerance", self.conflict_tolerance),
            ("price_tolerance", self.price_tolerance),
        ] {
            if value < Decimal::ZERO {
                return Err(QuoteError::invalid_dimension(
                    field,
                    format!("must not be negative, got {}", value),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tax_rate, Decimal::new(22, 2));
        assert_eq!(config.shipping_cost, Decimal::new(28000, 2));
        assert_eq!(config.rounding_tolerance, Decimal::new(1, 2));
        assert_eq!(config.safety_margin, Decimal::new(5, 2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: EngineConfig = toml::from_str("tax_rate = \"0.10\"\n").unwrap();
        assert_eq!(config.tax_rate, Decimal::new(10, 2));
        assert_eq!(config.shipping_cost, Decimal::new(28000, 2));
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shipping_cost = \"150.00\"").unwrap();
        writeln!(file, "safety_margin = \"0.10\"").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.shipping_cost, Decimal::new(15000, 2));
        assert_eq!(config.safety_margin, Decimal::new(10, 2));
    }

    #[test]
    fn test_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("quote-engine.toml");
        assert!(matches!(
            EngineConfig::load_from(Some(&missing)),
            Err(QuoteError::SourceLoad { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            [("QUOTE_TAX_RATE", "0.18"), ("QUOTE_SHIPPING_COST", " 0 ")].into();
        let mut config = EngineConfig::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.tax_rate, Decimal::new(18, 2));
        assert_eq!(config.shipping_cost, Decimal::ZERO);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = EngineConfig::default();
        let result = config.apply_env_overrides(|key| {
            (key == "QUOTE_SAFETY_MARGIN").then(|| "five percent".to_string())
        });
        assert!(matches!(result, Err(QuoteError::SourceLoad { .. })));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = EngineConfig {
            tax_rate: Decimal::ONE,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(QuoteError::InvalidDimension { .. })
        ));

        let config = EngineConfig {
            shipping_cost: Decimal::new(-1, 0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
