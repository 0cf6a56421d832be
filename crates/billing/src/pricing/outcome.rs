//! Outcome-based pricing
//!
//! The outcome fee is a percentage of the attributed outcome value, either flat or
//! split into marginal brackets by up to three tiers. Stored records use the flat
//! `tier_N_threshold` / `tier_N_percentage` column layout; in memory the tiers are
//! an ordered list.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use xyra_shared::BillingFrequency;

use super::{ensure_non_negative, ensure_percentage};
use crate::error::{BillingError, BillingResult};

/// Maximum number of outcome tiers a config may define
pub const MAX_OUTCOME_TIERS: usize = 3;

/// Marginal bracket: the slice of outcome value from the previous tier's threshold
/// up to this tier's threshold is charged at `percentage`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeTier {
    pub threshold: Decimal,
    pub percentage: Decimal,
}

/// Extra fee once the outcome value reaches `threshold`, charged on the raw outcome value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessBonus {
    pub threshold: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OutcomeConfigRecord", into = "OutcomeConfigRecord")]
pub struct OutcomeBasedConfig {
    base_platform_fee: Decimal,
    percentage: Option<Decimal>,
    minimum_attribution_value: Option<Decimal>,
    risk_premium_percentage: Decimal,
    monthly_cap_amount: Option<Decimal>,
    success_bonus: Option<SuccessBonus>,
    tiers: Vec<OutcomeTier>,
    billing_frequency: BillingFrequency,
}

impl OutcomeBasedConfig {
    pub fn builder(base_platform_fee: Decimal) -> OutcomeBasedConfigBuilder {
        OutcomeBasedConfigBuilder::new(base_platform_fee)
    }

    pub fn base_platform_fee(&self) -> Decimal {
        self.base_platform_fee
    }

    /// Flat rate, only used when no tiers are defined
    pub fn percentage(&self) -> Option<Decimal> {
        self.percentage
    }

    pub fn minimum_attribution_value(&self) -> Option<Decimal> {
        self.minimum_attribution_value
    }

    pub fn risk_premium_percentage(&self) -> Decimal {
        self.risk_premium_percentage
    }

    /// Ceiling on the total period cost, platform fee included
    pub fn monthly_cap_amount(&self) -> Option<Decimal> {
        self.monthly_cap_amount
    }

    pub fn success_bonus(&self) -> Option<SuccessBonus> {
        self.success_bonus
    }

    /// Tiers in strictly ascending threshold order
    pub fn tiers(&self) -> &[OutcomeTier] {
        &self.tiers
    }

    pub fn is_tiered(&self) -> bool {
        !self.tiers.is_empty()
    }

    pub fn billing_frequency(&self) -> BillingFrequency {
        self.billing_frequency
    }

    /// Whether an outcome value clears the minimum attribution floor
    pub fn is_attributable(&self, outcome_value: Decimal) -> bool {
        match self.minimum_attribution_value {
            Some(minimum) => outcome_value >= minimum,
            None => true,
        }
    }

    pub(crate) fn validate(&self) -> BillingResult<()> {
        ensure_non_negative("base_platform_fee", self.base_platform_fee)?;
        if let Some(percentage) = self.percentage {
            ensure_percentage("percentage", percentage)?;
        }
        if let Some(minimum) = self.minimum_attribution_value {
            ensure_non_negative("minimum_attribution_value", minimum)?;
        }
        ensure_percentage("risk_premium_percentage", self.risk_premium_percentage)?;
        if let Some(cap) = self.monthly_cap_amount {
            ensure_non_negative("monthly_cap_amount", cap)?;
        }
        if let Some(bonus) = self.success_bonus {
            ensure_non_negative("success_bonus_threshold", bonus.threshold)?;
            ensure_percentage("success_bonus_percentage", bonus.percentage)?;
        }

        if self.tiers.len() > MAX_OUTCOME_TIERS {
            return Err(BillingError::InvalidConfig(format!(
                "at most {} outcome tiers are supported (got {})",
                MAX_OUTCOME_TIERS,
                self.tiers.len()
            )));
        }
        let mut previous = Decimal::ZERO;
        for (i, tier) in self.tiers.iter().enumerate() {
            let n = i + 1;
            ensure_percentage(&format!("tier_{}_percentage", n), tier.percentage)?;
            if tier.threshold <= previous {
                return Err(BillingError::InvalidConfig(format!(
                    "tier_{}_threshold must be greater than {} (got {})",
                    n, previous, tier.threshold
                )));
            }
            previous = tier.threshold;
        }
        Ok(())
    }
}

pub struct OutcomeBasedConfigBuilder {
    base_platform_fee: Decimal,
    percentage: Option<Decimal>,
    minimum_attribution_value: Option<Decimal>,
    risk_premium_percentage: Decimal,
    monthly_cap_amount: Option<Decimal>,
    success_bonus: Option<SuccessBonus>,
    tiers: Vec<OutcomeTier>,
    billing_frequency: BillingFrequency,
}

impl OutcomeBasedConfigBuilder {
    pub fn new(base_platform_fee: Decimal) -> Self {
        Self {
            base_platform_fee,
            percentage: None,
            minimum_attribution_value: None,
            risk_premium_percentage: Decimal::ZERO,
            monthly_cap_amount: None,
            success_bonus: None,
            tiers: Vec::new(),
            billing_frequency: BillingFrequency::default(),
        }
    }

    pub fn percentage(mut self, percentage: Decimal) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn minimum_attribution_value(mut self, minimum: Decimal) -> Self {
        self.minimum_attribution_value = Some(minimum);
        self
    }

    pub fn risk_premium_percentage(mut self, percentage: Decimal) -> Self {
        self.risk_premium_percentage = percentage;
        self
    }

    pub fn monthly_cap_amount(mut self, cap: Decimal) -> Self {
        self.monthly_cap_amount = Some(cap);
        self
    }

    pub fn success_bonus(mut self, threshold: Decimal, percentage: Decimal) -> Self {
        self.success_bonus = Some(SuccessBonus {
            threshold,
            percentage,
        });
        self
    }

    /// Append the next tier. Thresholds must be strictly increasing.
    pub fn tier(mut self, threshold: Decimal, percentage: Decimal) -> Self {
        self.tiers.push(OutcomeTier {
            threshold,
            percentage,
        });
        self
    }

    pub fn billing_frequency(mut self, frequency: BillingFrequency) -> Self {
        self.billing_frequency = frequency;
        self
    }

    pub fn build(self) -> BillingResult<OutcomeBasedConfig> {
        let config = OutcomeBasedConfig {
            base_platform_fee: self.base_platform_fee,
            percentage: self.percentage,
            minimum_attribution_value: self.minimum_attribution_value,
            risk_premium_percentage: self.risk_premium_percentage,
            monthly_cap_amount: self.monthly_cap_amount,
            success_bonus: self.success_bonus,
            tiers: self.tiers,
            billing_frequency: self.billing_frequency,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Stored layout of an outcome config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OutcomeConfigRecord {
    base_platform_fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minimum_attribution_value: Option<Decimal>,
    #[serde(default)]
    risk_premium_percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    monthly_cap_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success_bonus_threshold: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    success_bonus_percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier_1_threshold: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier_1_percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier_2_threshold: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier_2_percentage: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier_3_threshold: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier_3_percentage: Option<Decimal>,
    #[serde(default)]
    billing_frequency: BillingFrequency,
}

impl TryFrom<OutcomeConfigRecord> for OutcomeBasedConfig {
    type Error = BillingError;

    fn try_from(record: OutcomeConfigRecord) -> Result<Self, Self::Error> {
        let mut builder = OutcomeBasedConfig::builder(record.base_platform_fee)
            .risk_premium_percentage(record.risk_premium_percentage)
            .billing_frequency(record.billing_frequency);
        if let Some(percentage) = record.percentage {
            builder = builder.percentage(percentage);
        }
        if let Some(minimum) = record.minimum_attribution_value {
            builder = builder.minimum_attribution_value(minimum);
        }
        if let Some(cap) = record.monthly_cap_amount {
            builder = builder.monthly_cap_amount(cap);
        }
        match (record.success_bonus_threshold, record.success_bonus_percentage) {
            (Some(threshold), Some(percentage)) => {
                builder = builder.success_bonus(threshold, percentage);
            }
            (None, None) => {}
            _ => {
                return Err(BillingError::InvalidConfig(
                    "success_bonus_threshold and success_bonus_percentage must be set together"
                        .to_string(),
                ))
            }
        }

        let slots = [
            (record.tier_1_threshold, record.tier_1_percentage),
            (record.tier_2_threshold, record.tier_2_percentage),
            (record.tier_3_threshold, record.tier_3_percentage),
        ];
        let mut gap_at = None;
        for (i, slot) in slots.into_iter().enumerate() {
            let n = i + 1;
            match slot {
                (Some(threshold), Some(percentage)) => {
                    if let Some(missing) = gap_at {
                        return Err(BillingError::InvalidConfig(format!(
                            "tier_{} is set but tier_{} is not",
                            n, missing
                        )));
                    }
                    builder = builder.tier(threshold, percentage);
                }
                (None, None) => {
                    gap_at.get_or_insert(n);
                }
                _ => {
                    return Err(BillingError::InvalidConfig(format!(
                        "tier_{}_threshold and tier_{}_percentage must be set together",
                        n, n
                    )))
                }
            }
        }

        builder.build()
    }
}

impl From<OutcomeBasedConfig> for OutcomeConfigRecord {
    fn from(config: OutcomeBasedConfig) -> Self {
        let tier = |i: usize| config.tiers.get(i).copied();
        Self {
            base_platform_fee: config.base_platform_fee,
            percentage: config.percentage,
            minimum_attribution_value: config.minimum_attribution_value,
            risk_premium_percentage: config.risk_premium_percentage,
            monthly_cap_amount: config.monthly_cap_amount,
            success_bonus_threshold: config.success_bonus.map(|b| b.threshold),
            success_bonus_percentage: config.success_bonus.map(|b| b.percentage),
            tier_1_threshold: tier(0).map(|t| t.threshold),
            tier_1_percentage: tier(0).map(|t| t.percentage),
            tier_2_threshold: tier(1).map(|t| t.threshold),
            tier_2_percentage: tier(1).map(|t| t.percentage),
            tier_3_threshold: tier(2).map(|t| t.threshold),
            tier_3_percentage: tier(2).map(|t| t.percentage),
            billing_frequency: config.billing_frequency,
        }
    }
}
