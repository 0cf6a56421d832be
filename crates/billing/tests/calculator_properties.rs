//! Property tests for outcome pricing
#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rust_decimal::Decimal;
use xyra_billing::{calculate, BillingModel, BillingModelType, OutcomeBasedConfig, UsageData};
use xyra_shared::OrgId;

#[derive(Debug, Clone)]
struct OutcomeParams {
    base: u32,
    percentage: u8,
    risk_premium: u8,
    tiers: Vec<(u64, u8)>,
    minimum_attribution: Option<u32>,
    bonus: Option<(u32, u8)>,
    cap: Option<u32>,
}

fn outcome_params() -> impl Strategy<Value = OutcomeParams> {
    (
        0u32..10_000,
        0u8..=100,
        0u8..=100,
        prop::collection::vec((1u64..200_000, 0u8..=100), 0..=3),
        prop::option::of(0u32..50_000),
        prop::option::of((0u32..500_000, 0u8..=20)),
        prop::option::of(0u32..100_000),
    )
        .prop_map(
            |(base, percentage, risk_premium, deltas, minimum_attribution, bonus, cap)| {
                // turn gaps into strictly increasing thresholds
                let mut threshold = 0;
                let tiers = deltas
                    .into_iter()
                    .map(|(delta, pct)| {
                        threshold += delta;
                        (threshold, pct)
                    })
                    .collect();
                OutcomeParams {
                    base,
                    percentage,
                    risk_premium,
                    tiers,
                    minimum_attribution,
                    bonus,
                    cap,
                }
            },
        )
}

fn model(params: &OutcomeParams) -> BillingModel {
    let mut builder = OutcomeBasedConfig::builder(Decimal::from(params.base))
        .percentage(Decimal::from(params.percentage))
        .risk_premium_percentage(Decimal::from(params.risk_premium));
    for (threshold, pct) in &params.tiers {
        builder = builder.tier(Decimal::from(*threshold), Decimal::from(*pct));
    }
    if let Some(minimum) = params.minimum_attribution {
        builder = builder.minimum_attribution_value(Decimal::from(minimum));
    }
    if let Some((threshold, pct)) = params.bonus {
        builder = builder.success_bonus(Decimal::from(threshold), Decimal::from(pct));
    }
    if let Some(cap) = params.cap {
        builder = builder.monthly_cap_amount(Decimal::from(cap));
    }
    BillingModel::builder(OrgId::new(), BillingModelType::Outcome)
        .config(builder.build().unwrap())
        .build()
        .unwrap()
}

fn price(model: &BillingModel, value: u64) -> Decimal {
    calculate(model, &UsageData::new().with("outcome_value", value)).unwrap()
}

proptest! {
    #[test]
    fn total_is_never_negative(params in outcome_params(), value in 0u64..10_000_000) {
        prop_assert!(price(&model(&params), value) >= Decimal::ZERO);
    }

    #[test]
    fn total_never_decreases_with_value(
        params in outcome_params(),
        a in 0u64..10_000_000,
        b in 0u64..10_000_000,
    ) {
        let model = model(&params);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(price(&model, low) <= price(&model, high));
    }

    #[test]
    fn same_inputs_same_total(params in outcome_params(), value in 0u64..10_000_000) {
        let model = model(&params);
        prop_assert_eq!(price(&model, value), price(&model, value));
    }

    #[test]
    fn total_stays_at_cap_once_reached(
        params in outcome_params(),
        value in 0u64..10_000_000,
        extra in 0u64..10_000_000,
    ) {
        let model = model(&params);
        let total = price(&model, value);
        if let Some(cap) = params.cap {
            let cap = Decimal::from(cap);
            prop_assert!(total <= cap);
            if total == cap {
                prop_assert_eq!(price(&model, value + extra), cap);
            }
        }
    }

    #[test]
    fn tier_boundaries_are_exact(threshold in 1u64..1_000_000, pct in 0u8..=100) {
        let params = OutcomeParams {
            base: 0,
            percentage: 0,
            risk_premium: 0,
            tiers: vec![(threshold, pct), (threshold * 2, 100)],
            minimum_attribution: None,
            bonus: None,
            cap: None,
        };
        let model = model(&params);
        let at_threshold = Decimal::from(threshold) * Decimal::from(pct) / Decimal::ONE_HUNDRED;
        prop_assert_eq!(price(&model, threshold), at_threshold);
        // one unit past the boundary is charged at the next tier's rate
        prop_assert_eq!(price(&model, threshold + 1), at_threshold + Decimal::ONE);
    }
}
