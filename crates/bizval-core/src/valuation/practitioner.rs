use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{ensure_unit_interval, round_money};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::BizValResult;

use super::{MethodValuation, ValuationMethodKind};

fn default_earnings_weight() -> Rate {
    dec!(0.67)
}

/// Weighted blend of an earnings value and an asset value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerInput {
    pub earnings_value: Money,
    pub asset_value: Money,
    #[serde(default = "default_earnings_weight")]
    pub earnings_weight: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PractitionerDetails {
    pub earnings_value: Money,
    pub asset_value: Money,
    pub earnings_weight: Rate,
    pub asset_weight: Rate,
    pub weighted_value: Money,
}

pub type PractitionerOutput = MethodValuation<PractitionerDetails>;

impl PractitionerInput {
    pub fn validate(&self) -> BizValResult<()> {
        ensure_unit_interval("earnings_weight", self.earnings_weight)
    }
}

pub fn calculate_practitioner(
    input: &PractitionerInput,
) -> BizValResult<ComputationOutput<PractitionerOutput>> {
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let asset_weight = Decimal::ONE - input.earnings_weight;
    let weighted_value =
        round_money(input.earnings_value * input.earnings_weight + input.asset_value * asset_weight);

    if input.earnings_value < input.asset_value {
        warnings.push(
            "Earnings value is below asset value; liquidation may be the better reference".into(),
        );
    }

    let output = PractitionerOutput {
        method: ValuationMethodKind::Practitioner,
        calculated_value: weighted_value,
        enterprise_value: None,
        equity_value: None,
        details: PractitionerDetails {
            earnings_value: input.earnings_value,
            asset_value: input.asset_value,
            earnings_weight: input.earnings_weight,
            asset_weight,
            weighted_value,
        },
    };

    Ok(with_metadata(
        &format!(
            "Practitioner method ({}% earnings / {}% assets)",
            (input.earnings_weight * dec!(100)).normalize(),
            (asset_weight * dec!(100)).normalize()
        ),
        input,
        warnings,
        output,
    ))
}
