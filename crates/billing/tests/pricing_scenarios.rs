//! End-to-end pricing scenarios, with billing models read from their JSON form
#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use xyra_billing::{
    calculate, calculate_breakdown, BillingError, BillingModel, BillingModelType, ChargeDetail,
    UsageData,
};

fn model(model_type: &str, configs: Vec<Value>) -> BillingModel {
    let records: Vec<Value> = configs
        .into_iter()
        .map(|config| {
            json!({
                "id": uuid::Uuid::new_v4(),
                "is_active": true,
                "config": config,
            })
        })
        .collect();
    serde_json::from_value(json!({
        "id": uuid::Uuid::new_v4(),
        "org_id": uuid::Uuid::new_v4(),
        "name": "scenario",
        "model_type": model_type,
        "configs": records,
        "created_at": "2024-10-01T00:00:00Z",
    }))
    .unwrap()
}

fn usage(value: Value) -> UsageData {
    UsageData::from_value(value).unwrap()
}

#[test]
fn tiered_outcome_with_risk_premium() {
    let model = model(
        "outcome",
        vec![json!({
            "type": "outcome",
            "base_platform_fee": "2000",
            "tier_1_threshold": "50000",
            "tier_1_percentage": "12",
            "tier_2_threshold": "100000",
            "tier_2_percentage": "15",
            "risk_premium_percentage": "40",
        })],
    );
    let total = calculate(&model, &usage(json!({ "outcome_value": 75000 }))).unwrap();
    assert_eq!(total, dec!(15650.0));
}

#[test]
fn flat_outcome_with_success_bonus() {
    let model = model(
        "outcome",
        vec![json!({
            "type": "outcome",
            "base_platform_fee": "500",
            "percentage": "5",
            "risk_premium_percentage": "30",
            "success_bonus_threshold": "50000",
            "success_bonus_percentage": "2",
        })],
    );
    // 500 + 3000 + 900 + 1200
    let total = calculate(&model, &usage(json!({ "outcome_value": 60000 }))).unwrap();
    assert_eq!(total, dec!(5600.0));
}

#[test]
fn outcome_clamped_to_monthly_cap() {
    let model = model(
        "outcome",
        vec![json!({
            "type": "outcome",
            "base_platform_fee": "1000",
            "percentage": "10",
            "monthly_cap_amount": "8000",
        })],
    );
    let total = calculate(&model, &usage(json!({ "outcome_value": 100000 }))).unwrap();
    assert_eq!(total, dec!(8000.0));
}

#[test]
fn outcome_below_minimum_attribution_pays_platform_fee() {
    let model = model(
        "outcome",
        vec![json!({
            "type": "outcome",
            "base_platform_fee": "1000",
            "percentage": "5",
            "minimum_attribution_value": "5000",
        })],
    );
    let total = calculate(&model, &usage(json!({ "outcome_value": 3000 }))).unwrap();
    assert_eq!(total, dec!(1000.0));
}

#[test]
fn seat_pricing_with_volume_discount() {
    let model = model(
        "agent",
        vec![json!({
            "type": "agent",
            "base_agent_fee": "100",
            "volume_discount_enabled": true,
            "volume_discount_threshold": 10,
            "volume_discount_percentage": "20",
        })],
    );
    assert_eq!(calculate(&model, &usage(json!({ "seats": 12 }))).unwrap(), dec!(80.0));
    assert_eq!(calculate(&model, &usage(json!({ "seats": 9 }))).unwrap(), dec!(100));
    assert_eq!(calculate(&model, &usage(json!({}))).unwrap(), dec!(100));
}

#[test]
fn legacy_seat_tag_is_agent_pricing() {
    let model = model(
        "seat",
        vec![json!({ "type": "seat", "base_agent_fee": "250" })],
    );
    assert_eq!(model.model_type, BillingModelType::Agent);
    assert_eq!(calculate(&model, &usage(json!({}))).unwrap(), dec!(250));
}

#[test]
fn activity_pricing_uses_volume_tier_rate() {
    let model = model(
        "activity",
        vec![json!({
            "type": "activity",
            "activity_type": "ticket_resolved",
            "unit_type": "ticket",
            "price_per_unit": "2.50",
            "base_agent_fee": "100",
            "volume_tiers": [
                { "threshold": 1000, "price_per_unit": "2.00" },
                { "threshold": 5000, "price_per_unit": "1.50" },
            ],
        })],
    );
    let total = calculate(
        &model,
        &usage(json!({ "activity_type": "ticket_resolved", "activity_count": 1200 })),
    )
    .unwrap();
    assert_eq!(total, dec!(2500));
}

#[test]
fn workflow_pricing_reports_human_equivalent() {
    let model = model(
        "workflow",
        vec![json!({
            "type": "workflow",
            "base_agent_fee": "200",
            "workflow_types": [
                { "name": "invoice_processing", "price_per_workflow": "4", "human_equivalent_value": "35" },
                { "name": "onboarding", "price_per_workflow": "25" },
            ],
            "minimum_charge": "300",
        })],
    );
    let breakdown = calculate_breakdown(
        &model,
        &usage(json!({ "workflow_type": "invoice_processing", "workflow_count": 10 })),
    )
    .unwrap();
    // 200 + 40 lifted to the 300 minimum
    assert_eq!(breakdown.total, dec!(300));
    match &breakdown.components[0].detail {
        ChargeDetail::Workflow(charge) => {
            assert_eq!(charge.minimum_charge_adjustment, dec!(60));
            assert_eq!(charge.human_equivalent_value, Some(dec!(350)));
        }
        other => panic!("unexpected charge {:?}", other),
    }
}

#[test]
fn hybrid_sums_every_active_component() {
    let model = model(
        "hybrid",
        vec![
            json!({ "type": "agent", "base_agent_fee": "100" }),
            json!({
                "type": "outcome",
                "base_platform_fee": "0",
                "percentage": "10",
                "monthly_cap_amount": "500",
            }),
        ],
    );
    let breakdown = calculate_breakdown(&model, &usage(json!({ "outcome_value": 20000 }))).unwrap();
    assert_eq!(breakdown.components.len(), 2);
    // the outcome cap bounds only the outcome component
    assert_eq!(breakdown.total, dec!(600));
}

#[test]
fn unknown_model_type_is_rejected() {
    assert!(matches!(
        "subscription".parse::<BillingModelType>(),
        Err(BillingError::UnsupportedModelType(_))
    ));
    let bad = serde_json::from_value::<BillingModel>(json!({
        "id": uuid::Uuid::new_v4(),
        "org_id": uuid::Uuid::new_v4(),
        "name": "bad",
        "model_type": "subscription",
        "configs": [],
        "created_at": "2024-10-01T00:00:00Z",
    }));
    assert!(bad.is_err());
}

#[test]
fn invalid_configs_fail_to_load() {
    let tiers_out_of_order = json!({
        "type": "outcome",
        "base_platform_fee": "0",
        "tier_1_threshold": "100000",
        "tier_1_percentage": "10",
        "tier_2_threshold": "50000",
        "tier_2_percentage": "5",
    });
    let negative_fee = json!({ "type": "agent", "base_agent_fee": "-1" });
    for config in [tiers_out_of_order, negative_fee] {
        let record = json!({
            "id": uuid::Uuid::new_v4(),
            "org_id": uuid::Uuid::new_v4(),
            "name": "bad",
            "model_type": "hybrid",
            "configs": [{ "id": uuid::Uuid::new_v4(), "is_active": true, "config": config }],
            "created_at": "2024-10-01T00:00:00Z",
        });
        assert!(serde_json::from_value::<BillingModel>(record).is_err());
    }
}

#[test]
fn usage_errors_are_reported() {
    let model = model(
        "outcome",
        vec![json!({ "type": "outcome", "base_platform_fee": "100", "percentage": "5" })],
    );
    for bad in [json!({ "outcome_value": -1 }), json!({ "outcome_value": "a lot" })] {
        assert!(matches!(
            calculate(&model, &usage(bad)),
            Err(BillingError::InvalidUsageData(_))
        ));
    }
    // missing outcome value prices as zero
    assert_eq!(calculate(&model, &usage(json!({}))).unwrap(), dec!(100));
    assert!(calculate(&model, &usage(json!({}))).unwrap() >= Decimal::ZERO);
}
