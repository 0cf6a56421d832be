//! Seat/agent-based pricing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use xyra_shared::BillingFrequency;

use super::{ensure_non_negative, ensure_percentage};
use crate::error::{BillingError, BillingResult};

/// Flat fee per billing period for an agent, with an optional volume discount
/// once the organization runs enough seats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AgentBasedConfigBuilder")]
pub struct AgentBasedConfig {
    base_agent_fee: Decimal,
    billing_frequency: BillingFrequency,
    setup_fee: Option<Decimal>,
    volume_discount_enabled: bool,
    volume_discount_threshold: u64,
    volume_discount_percentage: Decimal,
    agent_tier: Option<String>,
    human_equivalent_value: Option<Decimal>,
}

impl AgentBasedConfig {
    pub fn builder(base_agent_fee: Decimal) -> AgentBasedConfigBuilder {
        AgentBasedConfigBuilder::new(base_agent_fee)
    }

    pub fn base_agent_fee(&self) -> Decimal {
        self.base_agent_fee
    }

    pub fn billing_frequency(&self) -> BillingFrequency {
        self.billing_frequency
    }

    /// One-time fee, billed on the first invoice only
    pub fn setup_fee(&self) -> Option<Decimal> {
        self.setup_fee
    }

    pub fn volume_discount_enabled(&self) -> bool {
        self.volume_discount_enabled
    }

    pub fn volume_discount_threshold(&self) -> u64 {
        self.volume_discount_threshold
    }

    pub fn volume_discount_percentage(&self) -> Decimal {
        self.volume_discount_percentage
    }

    pub fn agent_tier(&self) -> Option<&str> {
        self.agent_tier.as_deref()
    }

    /// Informational only, never billed
    pub fn human_equivalent_value(&self) -> Option<Decimal> {
        self.human_equivalent_value
    }

    /// Whether a seat count qualifies for the volume discount
    pub fn discount_applies(&self, seats: u64) -> bool {
        self.volume_discount_enabled && seats >= self.volume_discount_threshold
    }

    pub(crate) fn validate(&self) -> BillingResult<()> {
        ensure_non_negative("base_agent_fee", self.base_agent_fee)?;
        if let Some(fee) = self.setup_fee {
            ensure_non_negative("setup_fee", fee)?;
        }
        ensure_percentage("volume_discount_percentage", self.volume_discount_percentage)?;
        if let Some(value) = self.human_equivalent_value {
            ensure_non_negative("human_equivalent_value", value)?;
        }
        Ok(())
    }
}

/// Builder for [`AgentBasedConfig`]; also the shape it is deserialized from
#[derive(Debug, Clone, Deserialize)]
pub struct AgentBasedConfigBuilder {
    base_agent_fee: Decimal,
    #[serde(default)]
    billing_frequency: BillingFrequency,
    #[serde(default)]
    setup_fee: Option<Decimal>,
    #[serde(default)]
    volume_discount_enabled: bool,
    #[serde(default)]
    volume_discount_threshold: u64,
    #[serde(default)]
    volume_discount_percentage: Decimal,
    #[serde(default)]
    agent_tier: Option<String>,
    #[serde(default)]
    human_equivalent_value: Option<Decimal>,
}

impl AgentBasedConfigBuilder {
    pub fn new(base_agent_fee: Decimal) -> Self {
        Self {
            base_agent_fee,
            billing_frequency: BillingFrequency::default(),
            setup_fee: None,
            volume_discount_enabled: false,
            volume_discount_threshold: 0,
            volume_discount_percentage: Decimal::ZERO,
            agent_tier: None,
            human_equivalent_value: None,
        }
    }

    pub fn billing_frequency(mut self, frequency: BillingFrequency) -> Self {
        self.billing_frequency = frequency;
        self
    }

    pub fn setup_fee(mut self, fee: Decimal) -> Self {
        self.setup_fee = Some(fee);
        self
    }

    /// Enable a `percentage` discount once the seat count reaches `threshold`
    pub fn volume_discount(mut self, threshold: u64, percentage: Decimal) -> Self {
        self.volume_discount_enabled = true;
        self.volume_discount_threshold = threshold;
        self.volume_discount_percentage = percentage;
        self
    }

    pub fn agent_tier(mut self, tier: impl Into<String>) -> Self {
        self.agent_tier = Some(tier.into());
        self
    }

    pub fn human_equivalent_value(mut self, value: Decimal) -> Self {
        self.human_equivalent_value = Some(value);
        self
    }

    pub fn build(self) -> BillingResult<AgentBasedConfig> {
        let config = AgentBasedConfig {
            base_agent_fee: self.base_agent_fee,
            billing_frequency: self.billing_frequency,
            setup_fee: self.setup_fee,
            volume_discount_enabled: self.volume_discount_enabled,
            volume_discount_threshold: self.volume_discount_threshold,
            volume_discount_percentage: self.volume_discount_percentage,
            agent_tier: self.agent_tier,
            human_equivalent_value: self.human_equivalent_value,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<AgentBasedConfigBuilder> for AgentBasedConfig {
    type Error = BillingError;

    fn try_from(builder: AgentBasedConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}
