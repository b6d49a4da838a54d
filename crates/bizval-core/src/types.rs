use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%).
pub type Rate = Decimal;

/// Percentage points (5.0 = 5%). Used where inputs are quoted that way.
pub type Percent = Decimal;

/// Multiples (e.g., 6.5x EBITDA)
pub type Multiple = Decimal;

/// Currency code. Valuations default to CHF.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    CHF,
    EUR,
    USD,
    GBP,
    Other(String),
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub precision: String,
}

pub(crate) const DECIMAL_PRECISION: &str = "rust_decimal_128bit";
pub(crate) const FLOAT_PRECISION: &str = "ieee754_f64";

/// Helper to wrap decimal computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    result: T,
) -> ComputationOutput<T> {
    envelope(methodology, assumptions, warnings, result, DECIMAL_PRECISION)
}

/// Same envelope for results produced by floating-point model fits.
pub fn with_metadata_f64<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    result: T,
) -> ComputationOutput<T> {
    envelope(methodology, assumptions, warnings, result, FLOAT_PRECISION)
}

fn envelope<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    result: T,
    precision: &str,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            precision: precision.to_string(),
        },
    }
}

impl<T: Serialize> ComputationOutput<T> {
    /// Re-wrap the result, keeping envelope fields intact.
    pub fn map<U: Serialize>(self, f: impl FnOnce(T) -> U) -> ComputationOutput<U> {
        ComputationOutput {
            result: f(self.result),
            methodology: self.methodology,
            assumptions: self.assumptions,
            warnings: self.warnings,
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_currency_is_chf() {
        assert_eq!(Currency::default(), Currency::CHF);
    }

    #[test]
    fn test_envelope_is_deterministic() {
        let a = with_metadata("m", &dec!(1), vec![], dec!(2));
        let b = with_metadata("m", &dec!(1), vec![], dec!(2));
        assert_eq!(a.metadata, b.metadata);
        assert_eq!(a.metadata.precision, "rust_decimal_128bit");
        assert_eq!(
            with_metadata_f64("m", &(), vec![], 1.0).metadata.precision,
            "ieee754_f64"
        );
    }

    #[test]
    fn test_map_keeps_warnings() {
        let out = with_metadata("m", &(), vec!["w".into()], 3u32).map(|v| v * 2);
        assert_eq!(out.result, 6);
        assert_eq!(out.warnings, vec!["w".to_string()]);
    }
}
