//! Billing cost calculation
//!
//! Turns a billing model and one period's usage into an amount. Every function here
//! is pure: no I/O, no logging, no shared state. All arithmetic is exact decimal
//! arithmetic and fails with [`BillingError::ArithmeticOverflow`] instead of wrapping.
//!
//! ## Outcome pricing
//!
//! With tiers configured, the outcome value is split into half-open brackets
//! `[previous threshold, threshold)` each charged at its tier's percentage, and the
//! open bracket above the last threshold is charged at the last tier's percentage.
//! Risk premium is added on top of the outcome fee, the success bonus is charged on
//! the raw outcome value, and the monthly cap clamps the total once at the end.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;
use xyra_shared::BillingModelId;

use crate::error::{BillingError, BillingResult};
use crate::model::{BillingModel, BillingModelType};
use crate::pricing::{
    ActivityBasedConfig, AgentBasedConfig, OutcomeBasedConfig, PricingConfig, WorkflowBasedConfig,
};
use crate::usage::{
    UsageData, ACTIVITY_COUNT, ACTIVITY_TYPE, OUTCOME_VALUE, WORKFLOW_COUNT, WORKFLOW_TYPE,
};

/// Cost of one billing period, itemized per evaluated config
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub billing_model_id: BillingModelId,
    pub model_type: BillingModelType,
    pub components: Vec<ComponentCharge>,
    pub total: Decimal,
}

/// Charge produced by a single config record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentCharge {
    pub config_id: Uuid,
    pub amount: Decimal,
    pub detail: ChargeDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChargeDetail {
    Agent(AgentCharge),
    Activity(ActivityCharge),
    Outcome(OutcomeCharge),
    Workflow(WorkflowCharge),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentCharge {
    pub base_agent_fee: Decimal,
    pub seats: u64,
    /// Amount taken off the base fee by the volume discount
    pub volume_discount: Decimal,
    pub human_equivalent_value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityCharge {
    pub base_agent_fee: Decimal,
    pub activity_type: String,
    pub unit_type: String,
    pub units: u64,
    pub unit_price: Decimal,
    pub usage_fee: Decimal,
    /// Added to reach the configured minimum charge
    pub minimum_charge_adjustment: Decimal,
}

/// Fee for one slice of the outcome value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketCharge {
    pub lower: Decimal,
    /// `None` for the open-ended bracket
    pub upper: Option<Decimal>,
    pub percentage: Decimal,
    pub portion: Decimal,
    pub fee: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeCharge {
    pub platform_fee: Decimal,
    pub outcome_value: Decimal,
    /// False when the value fell below the minimum attribution value
    pub attributed: bool,
    pub brackets: Vec<BracketCharge>,
    pub outcome_fee: Decimal,
    pub risk_premium: Decimal,
    pub success_bonus: Decimal,
    /// Amount removed by the monthly cap
    pub cap_reduction: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowCharge {
    pub base_agent_fee: Decimal,
    pub workflow_type: String,
    pub workflows: u64,
    pub unit_price: Decimal,
    pub usage_fee: Decimal,
    pub minimum_charge_adjustment: Decimal,
    /// What the same work would have cost with humans; not billed
    pub human_equivalent_value: Option<Decimal>,
}

/// Amount owed for one period of `usage` under `model`
pub fn calculate(model: &BillingModel, usage: &UsageData) -> BillingResult<Decimal> {
    calculate_breakdown(model, usage).map(|breakdown| breakdown.total)
}

/// Amount owed for one period of `usage` under `model`, itemized per config
pub fn calculate_breakdown(model: &BillingModel, usage: &UsageData) -> BillingResult<CostBreakdown> {
    let records = model.active_configs()?;

    let mut components = Vec::with_capacity(records.len());
    let mut total = Decimal::ZERO;
    for record in records {
        let (amount, detail) = price_config(&record.config, usage)?;
        total = add(total, amount, "total")?;
        components.push(ComponentCharge {
            config_id: record.id,
            amount,
            detail,
        });
    }

    Ok(CostBreakdown {
        billing_model_id: model.id,
        model_type: model.model_type,
        components,
        total,
    })
}

/// Price a single config against `usage`
pub fn price_config(config: &PricingConfig, usage: &UsageData) -> BillingResult<(Decimal, ChargeDetail)> {
    match config {
        PricingConfig::Agent(c) => {
            let charge = agent_charge(c, usage)?;
            let amount = sub(charge.base_agent_fee, charge.volume_discount, "agent fee")?;
            Ok((amount, ChargeDetail::Agent(charge)))
        }
        PricingConfig::Activity(c) => {
            let charge = activity_charge(c, usage)?;
            let amount = sum(
                &[charge.base_agent_fee, charge.usage_fee, charge.minimum_charge_adjustment],
                "activity fee",
            )?;
            Ok((amount, ChargeDetail::Activity(charge)))
        }
        PricingConfig::Outcome(c) => {
            let charge = outcome_charge(c, usage)?;
            let uncapped = sum(
                &[
                    charge.platform_fee,
                    charge.outcome_fee,
                    charge.risk_premium,
                    charge.success_bonus,
                ],
                "outcome total",
            )?;
            let amount = sub(uncapped, charge.cap_reduction, "outcome total")?;
            Ok((amount, ChargeDetail::Outcome(charge)))
        }
        PricingConfig::Workflow(c) => {
            let charge = workflow_charge(c, usage)?;
            let amount = sum(
                &[charge.base_agent_fee, charge.usage_fee, charge.minimum_charge_adjustment],
                "workflow fee",
            )?;
            Ok((amount, ChargeDetail::Workflow(charge)))
        }
    }
}

pub fn agent_charge(config: &AgentBasedConfig, usage: &UsageData) -> BillingResult<AgentCharge> {
    let seats = usage.seats()?;
    let base_agent_fee = config.base_agent_fee();
    let volume_discount = if config.discount_applies(seats) {
        percent_of(base_agent_fee, config.volume_discount_percentage(), "volume discount")?
    } else {
        Decimal::ZERO
    };

    Ok(AgentCharge {
        base_agent_fee,
        seats,
        volume_discount,
        human_equivalent_value: config.human_equivalent_value(),
    })
}

pub fn activity_charge(config: &ActivityBasedConfig, usage: &UsageData) -> BillingResult<ActivityCharge> {
    let activity_type = usage.required_text(ACTIVITY_TYPE)?;
    if activity_type != config.activity_type() {
        return Err(BillingError::InvalidUsageData(format!(
            "activity_type '{}' does not match configured activity '{}'",
            activity_type,
            config.activity_type()
        )));
    }

    let units = usage.count_or_zero(ACTIVITY_COUNT)?;
    let unit_price = config.unit_price_for(units);
    let usage_fee = mul(unit_price, Decimal::from(units), "activity usage fee")?;
    let subtotal = add(config.base_agent_fee(), usage_fee, "activity fee")?;

    Ok(ActivityCharge {
        base_agent_fee: config.base_agent_fee(),
        activity_type: activity_type.to_string(),
        unit_type: config.unit_type().to_string(),
        units,
        unit_price,
        usage_fee,
        minimum_charge_adjustment: shortfall(subtotal, config.minimum_charge()),
    })
}

pub fn outcome_charge(config: &OutcomeBasedConfig, usage: &UsageData) -> BillingResult<OutcomeCharge> {
    let outcome_value = usage.decimal_or_zero(OUTCOME_VALUE)?;
    let attributed = config.is_attributable(outcome_value);

    let brackets = if attributed {
        outcome_brackets(config, outcome_value)?
    } else {
        Vec::new()
    };
    let outcome_fee = brackets
        .iter()
        .try_fold(Decimal::ZERO, |acc, b| add(acc, b.fee, "outcome fee"))?;
    let risk_premium = percent_of(outcome_fee, config.risk_premium_percentage(), "risk premium")?;

    let success_bonus = match config.success_bonus() {
        Some(bonus) if outcome_value >= bonus.threshold => {
            percent_of(outcome_value, bonus.percentage, "success bonus")?
        }
        _ => Decimal::ZERO,
    };

    let uncapped = sum(
        &[config.base_platform_fee(), outcome_fee, risk_premium, success_bonus],
        "outcome total",
    )?;
    let cap_reduction = match config.monthly_cap_amount() {
        Some(cap) if uncapped > cap => uncapped - cap,
        _ => Decimal::ZERO,
    };

    Ok(OutcomeCharge {
        platform_fee: config.base_platform_fee(),
        outcome_value,
        attributed,
        brackets,
        outcome_fee,
        risk_premium,
        success_bonus,
        cap_reduction,
    })
}

/// Split `value` into the config's marginal brackets. Flat-rate configs produce a
/// single open bracket; configs with neither tiers nor a percentage produce none.
pub fn outcome_brackets(config: &OutcomeBasedConfig, value: Decimal) -> BillingResult<Vec<BracketCharge>> {
    let mut brackets = Vec::new();

    let tiers = config.tiers();
    let last = match tiers.last() {
        Some(last) => last,
        None => {
            if let Some(percentage) = config.percentage() {
                if value > Decimal::ZERO {
                    brackets.push(bracket(Decimal::ZERO, None, percentage, value)?);
                }
            }
            return Ok(brackets);
        }
    };

    let mut lower = Decimal::ZERO;
    for tier in tiers {
        if value > lower {
            let portion = value.min(tier.threshold) - lower;
            brackets.push(bracket(lower, Some(tier.threshold), tier.percentage, portion)?);
        }
        lower = tier.threshold;
    }
    if value > lower {
        brackets.push(bracket(lower, None, last.percentage, value - lower)?);
    }

    Ok(brackets)
}

pub fn workflow_charge(config: &WorkflowBasedConfig, usage: &UsageData) -> BillingResult<WorkflowCharge> {
    let workflow_type = usage.required_text(WORKFLOW_TYPE)?;
    let rate = config.workflow_type(workflow_type).ok_or_else(|| {
        BillingError::InvalidUsageData(format!(
            "workflow_type '{}' has no configured rate",
            workflow_type
        ))
    })?;

    let workflows = usage.count_or_zero(WORKFLOW_COUNT)?;
    let count = Decimal::from(workflows);
    let unit_price = rate.unit_price_for(workflows);
    let usage_fee = mul(unit_price, count, "workflow usage fee")?;
    let subtotal = add(config.base_agent_fee(), usage_fee, "workflow fee")?;
    let human_equivalent_value = rate
        .human_equivalent_value
        .map(|value| mul(value, count, "human equivalent value"))
        .transpose()?;

    Ok(WorkflowCharge {
        base_agent_fee: config.base_agent_fee(),
        workflow_type: workflow_type.to_string(),
        workflows,
        unit_price,
        usage_fee,
        minimum_charge_adjustment: shortfall(subtotal, config.minimum_charge()),
        human_equivalent_value,
    })
}

fn bracket(
    lower: Decimal,
    upper: Option<Decimal>,
    percentage: Decimal,
    portion: Decimal,
) -> BillingResult<BracketCharge> {
    Ok(BracketCharge {
        lower,
        upper,
        percentage,
        portion,
        fee: percent_of(portion, percentage, "outcome bracket fee")?,
    })
}

/// How far `subtotal` falls short of `minimum`
fn shortfall(subtotal: Decimal, minimum: Option<Decimal>) -> Decimal {
    match minimum {
        Some(minimum) if subtotal < minimum => minimum - subtotal,
        _ => Decimal::ZERO,
    }
}

fn percent_of(value: Decimal, percentage: Decimal, what: &'static str) -> BillingResult<Decimal> {
    value
        .checked_mul(percentage)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(BillingError::ArithmeticOverflow(what))
}

fn add(a: Decimal, b: Decimal, what: &'static str) -> BillingResult<Decimal> {
    a.checked_add(b).ok_or(BillingError::ArithmeticOverflow(what))
}

fn sub(a: Decimal, b: Decimal, what: &'static str) -> BillingResult<Decimal> {
    a.checked_sub(b).ok_or(BillingError::ArithmeticOverflow(what))
}

fn mul(a: Decimal, b: Decimal, what: &'static str) -> BillingResult<Decimal> {
    a.checked_mul(b).ok_or(BillingError::ArithmeticOverflow(what))
}

fn sum(values: &[Decimal], what: &'static str) -> BillingResult<Decimal> {
    values
        .iter()
        .try_fold(Decimal::ZERO, |acc, v| add(acc, *v, what))
}
