//! Billing models
//!
//! A billing model selects a pricing strategy for an organization (optionally scoped
//! to one agent) and carries the config records that parameterize it. Exactly one
//! record of the model's variant is expected to be active when a bill is computed;
//! hybrid models combine every active record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;
use xyra_shared::{AgentId, BillingModelId, OrgId};

use crate::error::{BillingError, BillingResult};
use crate::pricing::PricingConfig;

/// Pricing strategy of a billing model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingModelType {
    #[serde(alias = "seat")]
    Agent,
    Activity,
    Outcome,
    Workflow,
    Hybrid,
}

impl BillingModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Activity => "activity",
            Self::Outcome => "outcome",
            Self::Workflow => "workflow",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for BillingModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingModelType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "agent" | "seat" => Ok(Self::Agent),
            "activity" => Ok(Self::Activity),
            "outcome" => Ok(Self::Outcome),
            "workflow" => Ok(Self::Workflow),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(BillingError::UnsupportedModelType(other.to_string())),
        }
    }
}

/// A pricing config attached to a billing model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub id: Uuid,
    pub is_active: bool,
    pub config: PricingConfig,
}

impl ConfigRecord {
    pub fn active(config: impl Into<PricingConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_active: true,
            config: config.into(),
        }
    }

    pub fn inactive(config: impl Into<PricingConfig>) -> Self {
        Self {
            is_active: false,
            ..Self::active(config)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingModel {
    pub id: BillingModelId,
    pub org_id: OrgId,
    #[serde(default)]
    pub agent_id: Option<AgentId>,
    pub name: String,
    pub model_type: BillingModelType,
    #[serde(default)]
    pub configs: Vec<ConfigRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl BillingModel {
    pub fn builder(org_id: OrgId, model_type: BillingModelType) -> BillingModelBuilder {
        BillingModelBuilder::new(org_id, model_type)
    }

    /// Check every attached config's invariants
    pub fn validate(&self) -> BillingResult<()> {
        for record in &self.configs {
            record.config.validate()?;
        }
        Ok(())
    }

    /// The active config records to evaluate for this model.
    ///
    /// Non-hybrid models must have exactly one active record of their own variant;
    /// active records of other variants are ignored. Hybrid models evaluate every
    /// active record and need at least one.
    pub fn active_configs(&self) -> BillingResult<Vec<&ConfigRecord>> {
        let active: Vec<&ConfigRecord> = self
            .configs
            .iter()
            .filter(|record| record.is_active)
            .filter(|record| {
                self.model_type == BillingModelType::Hybrid
                    || record.config.model_type() == self.model_type
            })
            .collect();

        match (self.model_type, active.len()) {
            (_, 0) => Err(BillingError::NoActiveConfig(self.model_type.to_string())),
            (BillingModelType::Hybrid, _) | (_, 1) => Ok(active),
            (model_type, count) => Err(BillingError::MultipleActiveConfigs {
                model_type: model_type.to_string(),
                count,
            }),
        }
    }
}

pub struct BillingModelBuilder {
    id: BillingModelId,
    org_id: OrgId,
    agent_id: Option<AgentId>,
    name: Option<String>,
    model_type: BillingModelType,
    configs: Vec<ConfigRecord>,
    created_at: Option<OffsetDateTime>,
}

impl BillingModelBuilder {
    pub fn new(org_id: OrgId, model_type: BillingModelType) -> Self {
        Self {
            id: BillingModelId::new(),
            org_id,
            agent_id: None,
            name: None,
            model_type,
            configs: Vec::new(),
            created_at: None,
        }
    }

    pub fn id(mut self, id: BillingModelId) -> Self {
        self.id = id;
        self
    }

    pub fn agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an active config
    pub fn config(mut self, config: impl Into<PricingConfig>) -> Self {
        self.configs.push(ConfigRecord::active(config));
        self
    }

    /// Attach a config that is kept on the model but not billed
    pub fn inactive_config(mut self, config: impl Into<PricingConfig>) -> Self {
        self.configs.push(ConfigRecord::inactive(config));
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self) -> BillingResult<BillingModel> {
        let model = BillingModel {
            id: self.id,
            org_id: self.org_id,
            agent_id: self.agent_id,
            name: self
                .name
                .unwrap_or_else(|| format!("{} billing", self.model_type)),
            model_type: self.model_type,
            configs: self.configs,
            created_at: self.created_at.unwrap_or_else(OffsetDateTime::now_utc),
        };
        model.validate()?;
        Ok(model)
    }
}
