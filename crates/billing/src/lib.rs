//! Xyra billing
//!
//! Prices AI-agent usage against an organization's billing model. Four pricing
//! strategies are supported (agent seats, activities, outcomes and workflows), and
//! hybrid models combine several of them.
//!
//! The calculator itself is pure; the store, service and invoice layers wrap it for
//! callers that work with persisted billing models.

pub mod calculator;
pub mod config;
pub mod error;
pub mod invoice;
pub mod model;
pub mod pricing;
pub mod service;
pub mod store;
pub mod usage;

pub use calculator::{
    calculate, calculate_breakdown, ActivityCharge, AgentCharge, BracketCharge, ChargeDetail,
    ComponentCharge, CostBreakdown, OutcomeCharge, WorkflowCharge,
};
pub use config::{BillingSettings, ConfigError};
pub use error::{BillingError, BillingResult};
pub use invoice::{BillingPeriod, InvoiceBuilder, InvoiceDraft, InvoiceLineItem, LineItemKind};
pub use model::{BillingModel, BillingModelBuilder, BillingModelType, ConfigRecord};
pub use pricing::{
    ActivityBasedConfig, AgentBasedConfig, OutcomeBasedConfig, OutcomeTier, PricingConfig,
    SuccessBonus, VolumeTier, WorkflowBasedConfig, WorkflowType,
};
pub use service::BillingService;
pub use store::{BillingModelStore, InMemoryBillingModelStore, PgBillingModelStore};
pub use usage::UsageData;
