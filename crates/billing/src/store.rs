//! Billing model registry
//!
//! Billing models are owned by the account service; pricing only reads them.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;
use xyra_shared::{AgentId, BillingModelId, OrgId};

use crate::error::{BillingError, BillingResult};
use crate::model::{BillingModel, ConfigRecord};
use crate::pricing::PricingConfig;

#[async_trait]
pub trait BillingModelStore: Send + Sync {
    /// Fetch a billing model with all of its config records
    async fn get_billing_model(&self, id: BillingModelId) -> BillingResult<BillingModel>;

    /// The model that bills `agent_id`: the agent's own model if it has one,
    /// otherwise the organization-wide model. Newest wins on ties.
    async fn find_for_agent(
        &self,
        org_id: OrgId,
        agent_id: AgentId,
    ) -> BillingResult<Option<BillingModel>>;

    /// Every model of an organization, newest first
    async fn list_for_org(&self, org_id: OrgId) -> BillingResult<Vec<BillingModel>>;
}

/// Process-local store, used by tests and the quote tool
#[derive(Default)]
pub struct InMemoryBillingModelStore {
    models: RwLock<HashMap<BillingModelId, BillingModel>>,
}

impl InMemoryBillingModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a model
    pub fn insert(&self, model: BillingModel) -> BillingResult<()> {
        model.validate()?;
        let mut models = self.models.write().map_err(|_| poisoned())?;
        models.insert(model.id, model);
        Ok(())
    }

    fn org_models(&self, org_id: OrgId) -> BillingResult<Vec<BillingModel>> {
        let models = self.models.read().map_err(|_| poisoned())?;
        let mut found: Vec<BillingModel> = models
            .values()
            .filter(|m| m.org_id == org_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

fn poisoned() -> BillingError {
    BillingError::Database("billing model store lock poisoned".to_string())
}

#[async_trait]
impl BillingModelStore for InMemoryBillingModelStore {
    async fn get_billing_model(&self, id: BillingModelId) -> BillingResult<BillingModel> {
        let models = self.models.read().map_err(|_| poisoned())?;
        models
            .get(&id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(format!("billing model {}", id)))
    }

    async fn find_for_agent(
        &self,
        org_id: OrgId,
        agent_id: AgentId,
    ) -> BillingResult<Option<BillingModel>> {
        let models = self.org_models(org_id)?;
        let own = models.iter().find(|m| m.agent_id == Some(agent_id));
        let org_wide = models.iter().find(|m| m.agent_id.is_none());
        Ok(own.or(org_wide).cloned())
    }

    async fn list_for_org(&self, org_id: OrgId) -> BillingResult<Vec<BillingModel>> {
        self.org_models(org_id)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillingModelRow {
    id: Uuid,
    org_id: Uuid,
    agent_id: Option<Uuid>,
    name: String,
    model_type: String,
    created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    id: Uuid,
    billing_model_id: Uuid,
    is_active: bool,
    config: Json<serde_json::Value>,
}

const MODEL_COLUMNS: &str = "id, org_id, agent_id, name, model_type, created_at";

/// Store backed by the `billing_models` and `billing_model_configs` tables
pub struct PgBillingModelStore {
    pool: PgPool,
}

impl PgBillingModelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn configs_for(&self, model_ids: &[Uuid]) -> BillingResult<Vec<ConfigRow>> {
        if model_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ConfigRow> = sqlx::query_as(
            "SELECT id, billing_model_id, is_active, config
             FROM billing_model_configs
             WHERE billing_model_id = ANY($1)
             ORDER BY created_at ASC",
        )
        .bind(model_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn assemble(&self, rows: Vec<BillingModelRow>) -> BillingResult<Vec<BillingModel>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut configs: HashMap<Uuid, Vec<ConfigRecord>> = HashMap::new();
        for row in self.configs_for(&ids).await? {
            let config = parse_config(&row)?;
            configs
                .entry(row.billing_model_id)
                .or_default()
                .push(ConfigRecord {
                    id: row.id,
                    is_active: row.is_active,
                    config,
                });
        }

        rows.into_iter()
            .map(|row| -> BillingResult<BillingModel> {
                let model = BillingModel {
                    id: BillingModelId(row.id),
                    org_id: OrgId(row.org_id),
                    agent_id: row.agent_id.map(AgentId),
                    name: row.name,
                    model_type: row.model_type.parse()?,
                    configs: configs.remove(&row.id).unwrap_or_default(),
                    created_at: row.created_at,
                };
                model.validate()?;
                Ok(model)
            })
            .collect()
    }
}

fn parse_config(row: &ConfigRow) -> BillingResult<PricingConfig> {
    serde_json::from_value::<PricingConfig>(row.config.0.clone()).map_err(|e| {
        tracing::warn!(
            config_id = %row.id,
            billing_model_id = %row.billing_model_id,
            error = %e,
            "Stored pricing config could not be parsed"
        );
        BillingError::InvalidConfig(format!("config {}: {}", row.id, e))
    })
}

#[async_trait]
impl BillingModelStore for PgBillingModelStore {
    async fn get_billing_model(&self, id: BillingModelId) -> BillingResult<BillingModel> {
        let row: Option<BillingModelRow> = sqlx::query_as(&format!(
            "SELECT {} FROM billing_models WHERE id = $1",
            MODEL_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| BillingError::NotFound(format!("billing model {}", id)))?;
        let mut models = self.assemble(vec![row]).await?;
        let model = models
            .pop()
            .ok_or_else(|| BillingError::NotFound(format!("billing model {}", id)))?;

        tracing::debug!(
            billing_model_id = %model.id,
            model_type = %model.model_type,
            configs = model.configs.len(),
            "Loaded billing model"
        );
        Ok(model)
    }

    async fn find_for_agent(
        &self,
        org_id: OrgId,
        agent_id: AgentId,
    ) -> BillingResult<Option<BillingModel>> {
        let row: Option<BillingModelRow> = sqlx::query_as(&format!(
            "SELECT {} FROM billing_models
             WHERE org_id = $1 AND (agent_id = $2 OR agent_id IS NULL)
             ORDER BY (agent_id IS NULL) ASC, created_at DESC
             LIMIT 1",
            MODEL_COLUMNS
        ))
        .bind(org_id.0)
        .bind(agent_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let row = match row {
            Some(row) => row,
            None => {
                tracing::debug!(org_id = %org_id, agent_id = %agent_id, "No billing model for agent");
                return Ok(None);
            }
        };
        Ok(self.assemble(vec![row]).await?.pop())
    }

    async fn list_for_org(&self, org_id: OrgId) -> BillingResult<Vec<BillingModel>> {
        let rows: Vec<BillingModelRow> = sqlx::query_as(&format!(
            "SELECT {} FROM billing_models WHERE org_id = $1 ORDER BY created_at DESC",
            MODEL_COLUMNS
        ))
        .bind(org_id.0)
        .fetch_all(&self.pool)
        .await?;
        self.assemble(rows).await
    }
}
