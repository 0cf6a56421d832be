//! Activity-based (per unit) pricing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use xyra_shared::BillingFrequency;

use super::{ensure_label, ensure_non_negative, validate_volume_tiers, VolumeTier};
use crate::error::{BillingError, BillingResult};

/// Price per unit of a single activity type, with optional volume tiers and a
/// minimum charge per billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActivityBasedConfigBuilder")]
pub struct ActivityBasedConfig {
    activity_type: String,
    unit_type: String,
    price_per_unit: Decimal,
    base_agent_fee: Decimal,
    volume_tiers: Vec<VolumeTier>,
    minimum_charge: Option<Decimal>,
    billing_frequency: BillingFrequency,
}

impl ActivityBasedConfig {
    pub fn builder(activity_type: impl Into<String>, price_per_unit: Decimal) -> ActivityBasedConfigBuilder {
        ActivityBasedConfigBuilder::new(activity_type, price_per_unit)
    }

    pub fn activity_type(&self) -> &str {
        &self.activity_type
    }

    pub fn unit_type(&self) -> &str {
        &self.unit_type
    }

    pub fn price_per_unit(&self) -> Decimal {
        self.price_per_unit
    }

    pub fn base_agent_fee(&self) -> Decimal {
        self.base_agent_fee
    }

    /// Volume tiers, sorted by ascending threshold
    pub fn volume_tiers(&self) -> &[VolumeTier] {
        &self.volume_tiers
    }

    pub fn minimum_charge(&self) -> Option<Decimal> {
        self.minimum_charge
    }

    pub fn billing_frequency(&self) -> BillingFrequency {
        self.billing_frequency
    }

    /// Unit price for a period in which `count` units were used
    pub fn unit_price_for(&self, count: u64) -> Decimal {
        VolumeTier::applicable_price(&self.volume_tiers, count, self.price_per_unit)
    }

    pub(crate) fn validate(&self) -> BillingResult<()> {
        ensure_label("activity_type", &self.activity_type)?;
        ensure_non_negative("price_per_unit", self.price_per_unit)?;
        ensure_non_negative("base_agent_fee", self.base_agent_fee)?;
        validate_volume_tiers("volume_tiers", &self.volume_tiers)?;
        if let Some(minimum) = self.minimum_charge {
            ensure_non_negative("minimum_charge", minimum)?;
        }
        Ok(())
    }
}

/// Builder for [`ActivityBasedConfig`]; also the shape it is deserialized from
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityBasedConfigBuilder {
    activity_type: String,
    price_per_unit: Decimal,
    #[serde(default = "default_unit_type")]
    unit_type: String,
    #[serde(default)]
    base_agent_fee: Decimal,
    #[serde(default)]
    volume_tiers: Vec<VolumeTier>,
    #[serde(default)]
    minimum_charge: Option<Decimal>,
    #[serde(default)]
    billing_frequency: BillingFrequency,
}

fn default_unit_type() -> String {
    "unit".to_string()
}

impl ActivityBasedConfigBuilder {
    pub fn new(activity_type: impl Into<String>, price_per_unit: Decimal) -> Self {
        Self {
            activity_type: activity_type.into(),
            price_per_unit,
            unit_type: default_unit_type(),
            base_agent_fee: Decimal::ZERO,
            volume_tiers: Vec::new(),
            minimum_charge: None,
            billing_frequency: BillingFrequency::default(),
        }
    }

    pub fn unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = unit_type.into();
        self
    }

    pub fn base_agent_fee(mut self, fee: Decimal) -> Self {
        self.base_agent_fee = fee;
        self
    }

    /// Add a volume tier. Tiers must be added in ascending threshold order.
    pub fn volume_tier(mut self, threshold: u64, price_per_unit: Decimal) -> Self {
        self.volume_tiers.push(VolumeTier::new(threshold, price_per_unit));
        self
    }

    pub fn minimum_charge(mut self, minimum: Decimal) -> Self {
        self.minimum_charge = Some(minimum);
        self
    }

    pub fn billing_frequency(mut self, frequency: BillingFrequency) -> Self {
        self.billing_frequency = frequency;
        self
    }

    pub fn build(self) -> BillingResult<ActivityBasedConfig> {
        let config = ActivityBasedConfig {
            activity_type: self.activity_type,
            unit_type: self.unit_type,
            price_per_unit: self.price_per_unit,
            base_agent_fee: self.base_agent_fee,
            volume_tiers: self.volume_tiers,
            minimum_charge: self.minimum_charge,
            billing_frequency: self.billing_frequency,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<ActivityBasedConfigBuilder> for ActivityBasedConfig {
    type Error = BillingError;

    fn try_from(builder: ActivityBasedConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}
