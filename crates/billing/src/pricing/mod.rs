//! Pricing configurations
//!
//! Each billing model variant has its own immutable configuration type. Configs are
//! built through builders (or deserialized through the same validation path), so a
//! `PricingConfig` value always satisfies its invariants.

mod activity;
mod agent;
mod outcome;
mod workflow;

pub use activity::{ActivityBasedConfig, ActivityBasedConfigBuilder};
pub use agent::{AgentBasedConfig, AgentBasedConfigBuilder};
pub use outcome::{
    OutcomeBasedConfig, OutcomeBasedConfigBuilder, OutcomeTier, SuccessBonus, MAX_OUTCOME_TIERS,
};
pub use workflow::{WorkflowBasedConfig, WorkflowBasedConfigBuilder, WorkflowType};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};
use crate::model::BillingModelType;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// A pricing configuration of one of the billing model variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PricingConfig {
    /// Seat/agent pricing
    #[serde(alias = "seat")]
    Agent(AgentBasedConfig),
    Activity(ActivityBasedConfig),
    Outcome(OutcomeBasedConfig),
    Workflow(WorkflowBasedConfig),
}

impl PricingConfig {
    /// The billing model type this config prices for
    pub fn model_type(&self) -> BillingModelType {
        match self {
            PricingConfig::Agent(_) => BillingModelType::Agent,
            PricingConfig::Activity(_) => BillingModelType::Activity,
            PricingConfig::Outcome(_) => BillingModelType::Outcome,
            PricingConfig::Workflow(_) => BillingModelType::Workflow,
        }
    }

    /// Re-check the config's invariants
    pub fn validate(&self) -> BillingResult<()> {
        match self {
            PricingConfig::Agent(c) => c.validate(),
            PricingConfig::Activity(c) => c.validate(),
            PricingConfig::Outcome(c) => c.validate(),
            PricingConfig::Workflow(c) => c.validate(),
        }
    }
}

impl From<AgentBasedConfig> for PricingConfig {
    fn from(config: AgentBasedConfig) -> Self {
        PricingConfig::Agent(config)
    }
}

impl From<ActivityBasedConfig> for PricingConfig {
    fn from(config: ActivityBasedConfig) -> Self {
        PricingConfig::Activity(config)
    }
}

impl From<OutcomeBasedConfig> for PricingConfig {
    fn from(config: OutcomeBasedConfig) -> Self {
        PricingConfig::Outcome(config)
    }
}

impl From<WorkflowBasedConfig> for PricingConfig {
    fn from(config: WorkflowBasedConfig) -> Self {
        PricingConfig::Workflow(config)
    }
}

/// Unit price applied once a usage count reaches `threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeTier {
    pub threshold: u64,
    pub price_per_unit: Decimal,
}

impl VolumeTier {
    pub fn new(threshold: u64, price_per_unit: Decimal) -> Self {
        Self {
            threshold,
            price_per_unit,
        }
    }

    /// Price of the highest tier whose threshold `count` reaches, or `flat_price`
    /// when no tier is reached. Tiers must be sorted by ascending threshold.
    pub fn applicable_price(tiers: &[VolumeTier], count: u64, flat_price: Decimal) -> Decimal {
        tiers
            .iter()
            .rev()
            .find(|tier| count >= tier.threshold)
            .map(|tier| tier.price_per_unit)
            .unwrap_or(flat_price)
    }
}

pub(crate) fn ensure_non_negative(field: &str, value: Decimal) -> BillingResult<()> {
    if value < Decimal::ZERO {
        return Err(BillingError::InvalidConfig(format!(
            "{} must not be negative (got {})",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn ensure_percentage(field: &str, value: Decimal) -> BillingResult<()> {
    if value < Decimal::ZERO || value > ONE_HUNDRED {
        return Err(BillingError::InvalidConfig(format!(
            "{} must be between 0 and 100 (got {})",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_volume_tiers(field: &str, tiers: &[VolumeTier]) -> BillingResult<()> {
    for (i, tier) in tiers.iter().enumerate() {
        ensure_non_negative(&format!("{}[{}].price_per_unit", field, i), tier.price_per_unit)?;
        if i > 0 && tier.threshold <= tiers[i - 1].threshold {
            return Err(BillingError::InvalidConfig(format!(
                "{} thresholds must be strictly increasing ({} follows {})",
                field,
                tier.threshold,
                tiers[i - 1].threshold
            )));
        }
    }
    Ok(())
}

pub(crate) fn ensure_label(field: &str, value: &str) -> BillingResult<()> {
    if value.trim().is_empty() {
        return Err(BillingError::InvalidConfig(format!("{} must not be empty", field)));
    }
    Ok(())
}
