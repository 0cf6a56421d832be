//! Workflow-based pricing

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use xyra_shared::BillingFrequency;

use super::{ensure_label, ensure_non_negative, validate_volume_tiers, VolumeTier};
use crate::error::{BillingError, BillingResult};

/// Rate card entry for one kind of workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowType {
    pub name: String,
    pub price_per_workflow: Decimal,
    #[serde(default)]
    pub volume_tiers: Vec<VolumeTier>,
    /// What a human would cost for the same workflow; reported, never billed
    #[serde(default)]
    pub human_equivalent_value: Option<Decimal>,
}

impl WorkflowType {
    pub fn new(name: impl Into<String>, price_per_workflow: Decimal) -> Self {
        Self {
            name: name.into(),
            price_per_workflow,
            volume_tiers: Vec::new(),
            human_equivalent_value: None,
        }
    }

    pub fn with_volume_tier(mut self, threshold: u64, price_per_workflow: Decimal) -> Self {
        self.volume_tiers.push(VolumeTier::new(threshold, price_per_workflow));
        self
    }

    pub fn with_human_equivalent_value(mut self, value: Decimal) -> Self {
        self.human_equivalent_value = Some(value);
        self
    }

    pub fn unit_price_for(&self, count: u64) -> Decimal {
        VolumeTier::applicable_price(&self.volume_tiers, count, self.price_per_workflow)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WorkflowBasedConfigBuilder")]
pub struct WorkflowBasedConfig {
    base_agent_fee: Decimal,
    workflow_types: Vec<WorkflowType>,
    minimum_charge: Option<Decimal>,
    billing_frequency: BillingFrequency,
}

impl WorkflowBasedConfig {
    pub fn builder() -> WorkflowBasedConfigBuilder {
        WorkflowBasedConfigBuilder::default()
    }

    pub fn base_agent_fee(&self) -> Decimal {
        self.base_agent_fee
    }

    pub fn workflow_types(&self) -> &[WorkflowType] {
        &self.workflow_types
    }

    pub fn workflow_type(&self, name: &str) -> Option<&WorkflowType> {
        self.workflow_types.iter().find(|w| w.name == name)
    }

    pub fn minimum_charge(&self) -> Option<Decimal> {
        self.minimum_charge
    }

    pub fn billing_frequency(&self) -> BillingFrequency {
        self.billing_frequency
    }

    pub(crate) fn validate(&self) -> BillingResult<()> {
        ensure_non_negative("base_agent_fee", self.base_agent_fee)?;
        if let Some(minimum) = self.minimum_charge {
            ensure_non_negative("minimum_charge", minimum)?;
        }

        let mut seen = HashSet::new();
        for workflow in &self.workflow_types {
            ensure_label("workflow_types[].name", &workflow.name)?;
            if !seen.insert(workflow.name.as_str()) {
                return Err(BillingError::InvalidConfig(format!(
                    "duplicate workflow type: {}",
                    workflow.name
                )));
            }
            ensure_non_negative(
                &format!("{}.price_per_workflow", workflow.name),
                workflow.price_per_workflow,
            )?;
            validate_volume_tiers(&format!("{}.volume_tiers", workflow.name), &workflow.volume_tiers)?;
            if let Some(value) = workflow.human_equivalent_value {
                ensure_non_negative(&format!("{}.human_equivalent_value", workflow.name), value)?;
            }
        }
        Ok(())
    }
}

/// Builder for [`WorkflowBasedConfig`]; also the shape it is deserialized from
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowBasedConfigBuilder {
    #[serde(default)]
    base_agent_fee: Decimal,
    #[serde(default)]
    workflow_types: Vec<WorkflowType>,
    #[serde(default)]
    minimum_charge: Option<Decimal>,
    #[serde(default)]
    billing_frequency: BillingFrequency,
}

impl WorkflowBasedConfigBuilder {
    pub fn base_agent_fee(mut self, fee: Decimal) -> Self {
        self.base_agent_fee = fee;
        self
    }

    pub fn workflow_type(mut self, workflow: WorkflowType) -> Self {
        self.workflow_types.push(workflow);
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

    pub fn build(self) -> BillingResult<WorkflowBasedConfig> {
        let config = WorkflowBasedConfig {
            base_agent_fee: self.base_agent_fee,
            workflow_types: self.workflow_types,
            minimum_charge: self.minimum_charge,
            billing_frequency: self.billing_frequency,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<WorkflowBasedConfigBuilder> for WorkflowBasedConfig {
    type Error = BillingError;

    fn try_from(builder: WorkflowBasedConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}
