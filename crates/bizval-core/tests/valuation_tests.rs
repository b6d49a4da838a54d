use bizval_core::config::ValuationSettings;
use bizval_core::valuation::blend::{run_valuation, ValuationRequest, WeightedMethod};
use bizval_core::decimal::round_money;
use bizval_core::valuation::dcf::{calculate_dcf, DcfInput};
use bizval_core::valuation::earnings_value::{calculate_earnings_value, EarningsValueInput};
use bizval_core::valuation::ebitda_multiple::{
    calculate_ebitda_multiple, CompanySize, EbitdaMultipleInput,
};
use bizval_core::valuation::practitioner::PractitionerInput;
use bizval_core::valuation::wacc::{calculate_wacc, WaccInput};
use bizval_core::valuation::{ValuationMethod, ValuationMethodKind};
use bizval_core::{BizValError, Currency, ErrorKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Reference scenarios
// ===========================================================================

#[test]
fn test_ebitda_multiple_mid_sized_company() {
    // Growth 15% -> +7.5%, risk 5 -> -13.33%, medium -> 0
    let input = EbitdaMultipleInput {
        ebitda: dec!(1_000_000),
        base_multiple: dec!(5),
        growth_rate: dec!(15),
        risk_score: 5,
        company_size: CompanySize::Medium,
        cash: Decimal::ZERO,
        debt: Decimal::ZERO,
        non_operating_assets: Decimal::ZERO,
    };
    let out = calculate_ebitda_multiple(&input).unwrap();
    assert_eq!(out.result.calculated_value, dec!(4708333.33));
    assert_eq!(out.result.method, ValuationMethodKind::EbitdaMultiple);
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
}

#[test]
fn test_wacc_feeds_dcf() {
    let wacc = calculate_wacc(&WaccInput {
        risk_free_rate: dec!(0.03),
        beta: dec!(1.2),
        market_risk_premium: dec!(0.06),
        size_premium: Decimal::ZERO,
        company_specific_risk: Decimal::ZERO,
        interest_rate: dec!(0.05),
        equity_value: dec!(600),
        debt_value: dec!(400),
        tax_rate: dec!(0.25),
    })
    .unwrap()
    .result
    .wacc;
    // Ke = 10.2%, Kd after tax = 3.75%, WACC = 0.6 * 10.2% + 0.4 * 3.75%
    assert_eq!(wacc, dec!(0.0762));

    let dcf = calculate_dcf(&DcfInput {
        fcf_projections: vec![dec!(100), dec!(105), dec!(110)],
        wacc,
        terminal_growth_rate: dec!(0.02),
        cash: dec!(20),
        debt: dec!(400),
        non_operating_assets: Decimal::ZERO,
    })
    .unwrap()
    .result;
    let ev = dcf.enterprise_value.unwrap();
    assert_eq!(ev, dcf.details.sum_pv_fcfs + dcf.details.pv_terminal_value);
    assert_eq!(dcf.calculated_value, ev + dec!(20) - dec!(400));
}

#[test]
fn test_blend_of_every_method_from_json() {
    let json = serde_json::json!({
        "currency": "EUR",
        "methods": [
            {
                "method": "ebitda_multiple",
                "weight": "0.4",
                "parameters": {
                    "ebitda": "1000000", "base_multiple": "5", "growth_rate": "15",
                    "risk_score": 5, "company_size": "medium"
                }
            },
            {
                "method": "dcf",
                "weight": "0.3",
                "parameters": {
                    "fcf_projections": ["100", "110", "121"],
                    "wacc": "0.10", "terminal_growth_rate": "0.02",
                    "cash": "50", "debt": "200"
                }
            },
            {
                "method": "earnings_value",
                "weight": "0.1",
                "parameters": {
                    "historical_earnings": ["100000", "110000", "120000"],
                    "risk_free_rate": "3", "risk_premium": "5"
                }
            },
            {
                "method": "asset_value",
                "weight": "0.1",
                "parameters": {"real_estate_value": "500000", "liabilities": "100000"}
            },
            {
                "method": "practitioner",
                "weight": "0.1",
                "parameters": {"earnings_value": "1000000", "asset_value": "700000"}
            }
        ]
    });
    let request: ValuationRequest = serde_json::from_value(json).unwrap();
    let out = run_valuation(&request, &ValuationSettings::default()).unwrap();
    let r = &out.result;

    assert_eq!(r.currency, Currency::EUR);
    assert_eq!(r.method_results.len(), 5);
    // 0.4 * 4708333.33 + 0.3 * 1281.82 + 0.1 * (1375000 + 400000 + 901000)
    assert_eq!(r.final_value, dec!(2151317.88));
    assert_eq!(r.final_value_min, dec!(1828620.20));
    assert_eq!(r.final_value_max, dec!(2474015.56));

    let kinds: Vec<_> = r.method_results.iter().map(|m| m.valuation.method).collect();
    assert_eq!(
        kinds,
        vec![
            ValuationMethodKind::EbitdaMultiple,
            ValuationMethodKind::Dcf,
            ValuationMethodKind::EarningsValue,
            ValuationMethodKind::AssetValue,
            ValuationMethodKind::Practitioner,
        ]
    );
    assert!(out.warnings.iter().any(|w| w.starts_with("[dcf]")));
}

#[test]
fn test_invalid_method_fails_whole_request() {
    let request = ValuationRequest {
        methods: vec![
            WeightedMethod {
                method: ValuationMethod::Practitioner(PractitionerInput {
                    earnings_value: dec!(100),
                    asset_value: dec!(100),
                    earnings_weight: dec!(0.67),
                }),
                weight: Decimal::ONE,
            },
            WeightedMethod {
                method: ValuationMethod::Dcf(DcfInput {
                    fcf_projections: vec![dec!(100)],
                    wacc: dec!(0.05),
                    terminal_growth_rate: dec!(0.06),
                    cash: Decimal::ZERO,
                    debt: Decimal::ZERO,
                    non_operating_assets: Decimal::ZERO,
                }),
                weight: Decimal::ONE,
            },
        ],
        currency: None,
    };
    let err = run_valuation(&request, &ValuationSettings::default()).unwrap_err();
    assert!(matches!(err, BizValError::InvalidInput { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_unknown_method_rejected_at_parse() {
    let json = serde_json::json!({
        "methods": [{"method": "liquidation", "parameters": {}}]
    });
    assert!(serde_json::from_value::<ValuationRequest>(json).is_err());
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #[test]
    fn prop_dcf_details_reproduce_value(
        fcfs in prop::collection::vec(1i64..10_000, 1..6),
        wacc_bps in 500i64..2_000,
        g_bps in 0i64..400,
        cash in 0i64..1_000,
        debt in 0i64..1_000,
    ) {
        let input = DcfInput {
            fcf_projections: fcfs.into_iter().map(Decimal::from).collect(),
            wacc: Decimal::new(wacc_bps, 4),
            terminal_growth_rate: Decimal::new(g_bps, 4),
            cash: Decimal::from(cash),
            debt: Decimal::from(debt),
            non_operating_assets: Decimal::ZERO,
        };
        let out = calculate_dcf(&input).unwrap().result;
        let d = &out.details;
        let ev = out.enterprise_value.unwrap();
        let pv_sum: Decimal = d.projections.iter().map(|y| y.present_value).sum();
        prop_assert_eq!(pv_sum, d.sum_pv_fcfs);
        prop_assert_eq!(ev, d.sum_pv_fcfs + d.pv_terminal_value);
        prop_assert_eq!(out.calculated_value, ev + Decimal::from(cash) - Decimal::from(debt));
    }

    #[test]
    fn prop_blend_is_convex(
        items in prop::collection::vec((1i64..5_000_000, 1i64..=100), 1..6),
    ) {
        let methods: Vec<WeightedMethod> = items
            .iter()
            .map(|(value, weight)| WeightedMethod {
                method: ValuationMethod::Practitioner(PractitionerInput {
                    earnings_value: Decimal::from(*value),
                    asset_value: Decimal::from(*value),
                    earnings_weight: dec!(0.5),
                }),
                weight: Decimal::new(*weight, 2),
            })
            .collect();
        let request = ValuationRequest { methods, currency: None };
        let out = run_valuation(&request, &ValuationSettings::default()).unwrap().result;

        let lo = items.iter().map(|(v, _)| *v).min().map(Decimal::from).unwrap();
        let hi = items.iter().map(|(v, _)| *v).max().map(Decimal::from).unwrap();
        prop_assert!(out.final_value >= lo - dec!(0.01));
        prop_assert!(out.final_value <= hi + dec!(0.01));
        prop_assert!(out.final_value_min <= out.final_value);
        prop_assert!(out.final_value <= out.final_value_max);
        let total: Decimal = out.method_results.iter().map(|m| m.weight).sum();
        prop_assert!((total - Decimal::ONE).abs() < dec!(0.000000001));
    }

    #[test]
    fn prop_earnings_value_capitalizes_exact_mean(
        earnings in prop::collection::vec(-50_000i64..500_000, 3..8),
        rf_bp in 0i64..600,
        rp_bp in 1i64..900,
    ) {
        let historical: Vec<Decimal> = earnings.iter().map(|e| Decimal::new(*e, 0)).collect();
        let risk_free_rate = Decimal::new(rf_bp, 2);
        let risk_premium = Decimal::new(rp_bp, 2);
        let input = EarningsValueInput {
            historical_earnings: historical.clone(),
            risk_free_rate,
            risk_premium,
            use_practitioner_method: false,
            asset_value: None,
        };
        let out = calculate_earnings_value(&input).unwrap().result;

        let total: Decimal = historical.iter().copied().sum();
        let avg = total / Decimal::from(historical.len());
        let expected = round_money(avg / (risk_free_rate + risk_premium) * dec!(100));
        prop_assert_eq!(out.calculated_value, expected);
    }
}
