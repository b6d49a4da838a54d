use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{ensure_non_negative, ensure_percentage, pct_to_rate, round_money};
use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::BizValResult;

use super::{MethodValuation, ValuationMethodKind};

/// Substance (net asset) valuation inputs. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetValueInput {
    #[serde(default)]
    pub real_estate_value: Money,
    #[serde(default)]
    pub machinery_replacement_value: Money,
    #[serde(default)]
    pub machinery_depreciation: Percent,
    #[serde(default)]
    pub inventory_value: Money,
    #[serde(default)]
    pub receivables: Money,
    /// Expected bad-debt share of receivables
    #[serde(default)]
    pub receivables_risk: Percent,
    #[serde(default)]
    pub cash: Money,
    #[serde(default)]
    pub intangible_assets: Money,
    #[serde(default)]
    pub liabilities: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedAssets {
    pub real_estate: Money,
    pub machinery_gross: Money,
    /// Reported as a negative deduction
    pub machinery_depreciation: Money,
    pub machinery_net: Money,
    pub intangibles: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentAssets {
    pub inventory: Money,
    pub receivables_gross: Money,
    /// Reported as a negative deduction
    pub receivables_provision: Money,
    pub receivables_net: Money,
    pub cash: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetValueDetails {
    pub fixed_assets: FixedAssets,
    pub current_assets: CurrentAssets,
    pub total_assets: Money,
    pub liabilities: Money,
    pub net_asset_value: Money,
}

pub type AssetValueOutput = MethodValuation<AssetValueDetails>;

impl AssetValueInput {
    pub fn validate(&self) -> BizValResult<()> {
        ensure_percentage("machinery_depreciation", self.machinery_depreciation)?;
        ensure_percentage("receivables_risk", self.receivables_risk)?;
        ensure_non_negative("real_estate_value", self.real_estate_value)?;
        ensure_non_negative("machinery_replacement_value", self.machinery_replacement_value)?;
        ensure_non_negative("inventory_value", self.inventory_value)?;
        ensure_non_negative("receivables", self.receivables)?;
        ensure_non_negative("cash", self.cash)?;
        ensure_non_negative("intangible_assets", self.intangible_assets)?;
        ensure_non_negative("liabilities", self.liabilities)?;
        Ok(())
    }
}

/// Net asset value: depreciated fixed assets plus risk-adjusted current
/// assets, less liabilities.
pub fn calculate_asset_value(
    input: &AssetValueInput,
) -> BizValResult<ComputationOutput<AssetValueOutput>> {
    input.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let machinery_depreciation =
        round_money(input.machinery_replacement_value * pct_to_rate(input.machinery_depreciation));
    let machinery_net = input.machinery_replacement_value - machinery_depreciation;
    let fixed_total = input.real_estate_value + machinery_net + input.intangible_assets;

    let receivables_provision =
        round_money(input.receivables * pct_to_rate(input.receivables_risk));
    let receivables_net = input.receivables - receivables_provision;
    let current_total = input.inventory_value + receivables_net + input.cash;

    let total_assets = fixed_total + current_total;
    let net_asset_value = round_money(total_assets - input.liabilities);

    if net_asset_value < Decimal::ZERO {
        warnings.push(format!(
            "Liabilities exceed assets; net asset value is {net_asset_value}"
        ));
    }
    if input.intangible_assets > Decimal::ZERO {
        warnings.push("Intangible assets included at stated value; verify recoverability".into());
    }

    let output = AssetValueOutput {
        method: ValuationMethodKind::AssetValue,
        calculated_value: net_asset_value,
        enterprise_value: None,
        equity_value: None,
        details: AssetValueDetails {
            fixed_assets: FixedAssets {
                real_estate: input.real_estate_value,
                machinery_gross: input.machinery_replacement_value,
                machinery_depreciation: -machinery_depreciation,
                machinery_net,
                intangibles: input.intangible_assets,
                total: fixed_total,
            },
            current_assets: CurrentAssets {
                inventory: input.inventory_value,
                receivables_gross: input.receivables,
                receivables_provision: -receivables_provision,
                receivables_net,
                cash: input.cash,
                total: current_total,
            },
            total_assets,
            liabilities: input.liabilities,
            net_asset_value,
        },
    };

    Ok(with_metadata(
        "Net asset value (substance value)",
        input,
        warnings,
        output,
    ))
}
