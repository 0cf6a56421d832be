//! Billing service
//!
//! Loads billing models from a [`BillingModelStore`] and prices usage against them.

use rust_decimal::Decimal;
use std::sync::Arc;
use xyra_shared::{AgentId, BillingModelId, OrgId};

use crate::calculator::{calculate_breakdown, CostBreakdown};
use crate::config::BillingSettings;
use crate::error::{BillingError, BillingResult};
use crate::invoice::{BillingPeriod, InvoiceBuilder, InvoiceDraft};
use crate::model::BillingModel;
use crate::store::BillingModelStore;
use crate::usage::UsageData;

pub struct BillingService {
    store: Arc<dyn BillingModelStore>,
    settings: BillingSettings,
}

impl BillingService {
    pub fn new(store: Arc<dyn BillingModelStore>, settings: BillingSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    /// Itemized cost of `usage` under a stored billing model
    pub async fn quote(
        &self,
        model_id: BillingModelId,
        usage: &UsageData,
    ) -> BillingResult<CostBreakdown> {
        let model = self.store.get_billing_model(model_id).await?;
        self.price(&model, usage)
    }

    /// Amount owed for `usage` under a stored billing model
    pub async fn calculate(
        &self,
        model_id: BillingModelId,
        usage: &UsageData,
    ) -> BillingResult<Decimal> {
        Ok(self.quote(model_id, usage).await?.total)
    }

    /// Price an agent's usage with whichever model bills that agent
    pub async fn quote_for_agent(
        &self,
        org_id: OrgId,
        agent_id: AgentId,
        usage: &UsageData,
    ) -> BillingResult<CostBreakdown> {
        let model = self
            .store
            .find_for_agent(org_id, agent_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(org_id = %org_id, agent_id = %agent_id, "No billing model for agent");
                BillingError::NotFound(format!("billing model for agent {}", agent_id))
            })?;
        self.price(&model, usage)
    }

    /// Draft an invoice for one billing period
    pub async fn draft_invoice(
        &self,
        model_id: BillingModelId,
        period: BillingPeriod,
        usage: &UsageData,
        include_setup_fee: bool,
    ) -> BillingResult<InvoiceDraft> {
        let model = self.store.get_billing_model(model_id).await?;
        let breakdown = self.price(&model, usage)?;

        let invoice = InvoiceBuilder::new(&model, period)
            .currency(self.settings.currency.as_str())
            .due_in_days(self.settings.invoice_due_days)
            .include_setup_fee(include_setup_fee)
            .build(&breakdown)?;

        tracing::info!(
            invoice_id = %invoice.id,
            org_id = %invoice.org_id,
            billing_model_id = %invoice.billing_model_id,
            line_items = invoice.line_items.len(),
            total = %invoice.total,
            currency = %invoice.currency,
            "Drafted invoice"
        );
        Ok(invoice)
    }

    fn price(&self, model: &BillingModel, usage: &UsageData) -> BillingResult<CostBreakdown> {
        match calculate_breakdown(model, usage) {
            Ok(breakdown) => {
                tracing::info!(
                    org_id = %model.org_id,
                    billing_model_id = %model.id,
                    model_type = %model.model_type,
                    components = breakdown.components.len(),
                    total = %breakdown.total,
                    "Priced usage"
                );
                Ok(breakdown)
            }
            Err(e) => {
                tracing::warn!(
                    org_id = %model.org_id,
                    billing_model_id = %model.id,
                    model_type = %model.model_type,
                    error = %e,
                    "Failed to price usage"
                );
                Err(e)
            }
        }
    }
}
