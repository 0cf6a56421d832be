//! Invoice drafts
//!
//! Builds invoice line items from a [`CostBreakdown`]. Each charge element becomes
//! its own line so customers can see how the total was reached. Line amounts are
//! rounded to cents, and a rounding adjustment line absorbs any drift so the charges
//! add up to the rounded breakdown total.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use time::{Date, Duration, Month, OffsetDateTime, Time};
use uuid::Uuid;
use xyra_shared::{AgentId, BillingModelId, OrgId};

use crate::calculator::{ChargeDetail, ComponentCharge, CostBreakdown};
use crate::error::{BillingError, BillingResult};
use crate::model::{BillingModel, BillingModelType};
use crate::pricing::PricingConfig;

pub const DEFAULT_CURRENCY: &str = "usd";
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// Half-open billing period `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end: OffsetDateTime,
}

impl BillingPeriod {
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> BillingResult<Self> {
        if end <= start {
            return Err(BillingError::InvalidInput(format!(
                "billing period must end after it starts ({} .. {})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// The calendar month (UTC) containing `at`
    pub fn month_containing(at: OffsetDateTime) -> BillingResult<Self> {
        let at = at.to_offset(time::UtcOffset::UTC);
        let start = first_of_month(at.year(), at.month())?;
        let (next_year, next_month) = match at.month() {
            Month::December => (at.year() + 1, Month::January),
            month => (at.year(), month.next()),
        };
        let end = first_of_month(next_year, next_month)?;
        Self::new(start, end)
    }
}

fn first_of_month(year: i32, month: Month) -> BillingResult<OffsetDateTime> {
    Date::from_calendar_date(year, month, 1)
        .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
        .map_err(|e| BillingError::InvalidInput(format!("invalid billing month: {}", e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemKind {
    AgentFee,
    PlatformFee,
    Usage,
    OutcomeFee,
    RiskPremium,
    SuccessBonus,
    VolumeDiscount,
    MinimumChargeAdjustment,
    MonthlyCapAdjustment,
    RoundingAdjustment,
    SetupFee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub kind: LineItemKind,
    pub description: String,
    pub config_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit_amount: Decimal,
    /// Rounded to cents; negative for discounts and cap adjustments
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub id: Uuid,
    pub org_id: OrgId,
    pub billing_model_id: BillingModelId,
    pub agent_id: Option<AgentId>,
    pub model_type: BillingModelType,
    pub currency: String,
    pub period: BillingPeriod,
    pub line_items: Vec<InvoiceLineItem>,
    pub total: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub due_at: OffsetDateTime,
}

impl InvoiceDraft {
    /// Total in the currency's minor unit
    pub fn total_cents(&self) -> BillingResult<i64> {
        self.total
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .ok_or(BillingError::ArithmeticOverflow("invoice total in cents"))
    }
}

pub struct InvoiceBuilder<'a> {
    model: &'a BillingModel,
    period: BillingPeriod,
    currency: String,
    due_in_days: i64,
    include_setup_fee: bool,
    created_at: Option<OffsetDateTime>,
}

impl<'a> InvoiceBuilder<'a> {
    pub fn new(model: &'a BillingModel, period: BillingPeriod) -> Self {
        Self {
            model,
            period,
            currency: DEFAULT_CURRENCY.to_string(),
            due_in_days: DEFAULT_DUE_DAYS,
            include_setup_fee: false,
            created_at: None,
        }
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_lowercase();
        self
    }

    pub fn due_in_days(mut self, days: i64) -> Self {
        self.due_in_days = days;
        self
    }

    /// Bill the one-time setup fee of active agent configs on this invoice
    pub fn include_setup_fee(mut self, include: bool) -> Self {
        self.include_setup_fee = include;
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn build(self, breakdown: &CostBreakdown) -> BillingResult<InvoiceDraft> {
        if breakdown.billing_model_id != self.model.id {
            return Err(BillingError::InvalidInput(format!(
                "breakdown for billing model {} cannot be invoiced under model {}",
                breakdown.billing_model_id, self.model.id
            )));
        }
        if self.due_in_days < 0 {
            return Err(BillingError::InvalidInput(format!(
                "due_in_days must not be negative (got {})",
                self.due_in_days
            )));
        }

        let mut lines = LineItems::default();
        for component in &breakdown.components {
            lines.push_component(component);
        }
        let charged = lines.sum()?;
        let residue = round_to_cents(breakdown.total)
            .checked_sub(charged)
            .ok_or(BillingError::ArithmeticOverflow("invoice rounding"))?;
        lines.push(
            LineItemKind::RoundingAdjustment,
            "Rounding adjustment".to_string(),
            None,
            residue,
        );

        if self.include_setup_fee {
            for record in self.model.configs.iter().filter(|r| r.is_active) {
                if let PricingConfig::Agent(config) = &record.config {
                    if let Some(fee) = config.setup_fee() {
                        lines.push(
                            LineItemKind::SetupFee,
                            "One-time setup fee".to_string(),
                            Some(record.id),
                            fee,
                        );
                    }
                }
            }
        }

        let total = lines.sum()?;

        let created_at = self.created_at.unwrap_or_else(OffsetDateTime::now_utc);
        Ok(InvoiceDraft {
            id: Uuid::new_v4(),
            org_id: self.model.org_id,
            billing_model_id: self.model.id,
            agent_id: self.model.agent_id,
            model_type: self.model.model_type,
            currency: self.currency,
            period: self.period,
            line_items: lines.items,
            total,
            created_at,
            due_at: created_at + Duration::days(self.due_in_days),
        })
    }
}

/// Round a money amount to cents
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Default)]
struct LineItems {
    items: Vec<InvoiceLineItem>,
}

impl LineItems {
    fn sum(&self) -> BillingResult<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.amount))
            .ok_or(BillingError::ArithmeticOverflow("invoice total"))
    }

    /// Single-quantity line; skipped when zero
    fn push(&mut self, kind: LineItemKind, description: String, config_id: Option<Uuid>, amount: Decimal) {
        self.push_quantity(kind, description, config_id, Decimal::ONE, amount, amount);
    }

    fn push_quantity(
        &mut self,
        kind: LineItemKind,
        description: String,
        config_id: Option<Uuid>,
        quantity: Decimal,
        unit_amount: Decimal,
        amount: Decimal,
    ) {
        let amount = round_to_cents(amount);
        if amount.is_zero() {
            return;
        }
        self.items.push(InvoiceLineItem {
            kind,
            description,
            config_id,
            quantity,
            unit_amount,
            amount,
        });
    }

    fn push_component(&mut self, component: &ComponentCharge) {
        let id = Some(component.config_id);
        match &component.detail {
            ChargeDetail::Agent(charge) => {
                self.push(LineItemKind::AgentFee, "Agent fee".to_string(), id, charge.base_agent_fee);
                self.push(
                    LineItemKind::VolumeDiscount,
                    format!("Volume discount ({} seats)", charge.seats),
                    id,
                    -charge.volume_discount,
                );
            }
            ChargeDetail::Activity(charge) => {
                self.push(LineItemKind::AgentFee, "Base agent fee".to_string(), id, charge.base_agent_fee);
                self.push_quantity(
                    LineItemKind::Usage,
                    format!("{} ({} x {})", charge.activity_type, charge.units, charge.unit_type),
                    id,
                    Decimal::from(charge.units),
                    charge.unit_price,
                    charge.usage_fee,
                );
                self.push(
                    LineItemKind::MinimumChargeAdjustment,
                    "Minimum charge adjustment".to_string(),
                    id,
                    charge.minimum_charge_adjustment,
                );
            }
            ChargeDetail::Outcome(charge) => {
                self.push(LineItemKind::PlatformFee, "Platform fee".to_string(), id, charge.platform_fee);
                for bracket in &charge.brackets {
                    let range = match bracket.upper {
                        Some(upper) => format!("{} to {}", bracket.lower, upper),
                        None => format!("above {}", bracket.lower),
                    };
                    self.push(
                        LineItemKind::OutcomeFee,
                        format!(
                            "Outcome fee: {}% of {} attributed value ({})",
                            bracket.percentage.normalize(),
                            bracket.portion.normalize(),
                            range
                        ),
                        id,
                        bracket.fee,
                    );
                }
                self.push(LineItemKind::RiskPremium, "Risk premium".to_string(), id, charge.risk_premium);
                self.push(LineItemKind::SuccessBonus, "Success bonus".to_string(), id, charge.success_bonus);
                self.push(
                    LineItemKind::MonthlyCapAdjustment,
                    "Monthly cap adjustment".to_string(),
                    id,
                    -charge.cap_reduction,
                );
            }
            ChargeDetail::Workflow(charge) => {
                self.push(LineItemKind::AgentFee, "Base agent fee".to_string(), id, charge.base_agent_fee);
                self.push_quantity(
                    LineItemKind::Usage,
                    format!("{} workflows ({})", charge.workflow_type, charge.workflows),
                    id,
                    Decimal::from(charge.workflows),
                    charge.unit_price,
                    charge.usage_fee,
                );
                self.push(
                    LineItemKind::MinimumChargeAdjustment,
                    "Minimum charge adjustment".to_string(),
                    id,
                    charge.minimum_charge_adjustment,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_breakdown;
    use crate::pricing::{AgentBasedConfig, OutcomeBasedConfig};
    use crate::usage::{UsageData, OUTCOME_VALUE, SEATS};
    use rust_decimal_macros::dec;

    fn period() -> BillingPeriod {
        let start = OffsetDateTime::from_unix_timestamp(1_727_740_800).unwrap(); // 2024-10-01
        BillingPeriod::new(start, start + Duration::days(31)).unwrap()
    }

    fn outcome_model() -> BillingModel {
        BillingModel::builder(OrgId::new(), BillingModelType::Outcome)
            .config(
                OutcomeBasedConfig::builder(dec!(2000))
                    .tier(dec!(50000), dec!(12))
                    .tier(dec!(100000), dec!(15))
                    .risk_premium_percentage(dec!(40))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_outcome_invoice_lines() {
        let model = outcome_model();
        let usage = UsageData::new().with(OUTCOME_VALUE, 75000);
        let breakdown = calculate_breakdown(&model, &usage).unwrap();
        let invoice = InvoiceBuilder::new(&model, period()).build(&breakdown).unwrap();

        let kinds: Vec<LineItemKind> = invoice.line_items.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineItemKind::PlatformFee,
                LineItemKind::OutcomeFee,
                LineItemKind::OutcomeFee,
                LineItemKind::RiskPremium,
            ]
        );
        assert_eq!(invoice.total, dec!(15650));
        assert_eq!(invoice.total_cents().unwrap(), 1_565_000);
        assert_eq!(invoice.currency, "usd");
    }

    #[test]
    fn test_setup_fee_only_when_requested() {
        let model = BillingModel::builder(OrgId::new(), BillingModelType::Agent)
            .config(
                AgentBasedConfig::builder(dec!(100))
                    .setup_fee(dec!(250))
                    .volume_discount(10, dec!(20))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let usage = UsageData::new().with(SEATS, 12);
        let breakdown = calculate_breakdown(&model, &usage).unwrap();

        let regular = InvoiceBuilder::new(&model, period()).build(&breakdown).unwrap();
        assert_eq!(regular.total, dec!(80));
        assert!(regular.line_items.iter().all(|l| l.kind != LineItemKind::SetupFee));
        let discount = regular
            .line_items
            .iter()
            .find(|l| l.kind == LineItemKind::VolumeDiscount)
            .unwrap();
        assert_eq!(discount.amount, dec!(-20));

        let first = InvoiceBuilder::new(&model, period())
            .include_setup_fee(true)
            .build(&breakdown)
            .unwrap();
        assert_eq!(first.total, dec!(330));
    }

    #[test]
    fn test_cap_adjustment_line_is_negative() {
        let model = BillingModel::builder(OrgId::new(), BillingModelType::Outcome)
            .config(
                OutcomeBasedConfig::builder(dec!(1000))
                    .percentage(dec!(10))
                    .monthly_cap_amount(dec!(8000))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let breakdown =
            calculate_breakdown(&model, &UsageData::new().with(OUTCOME_VALUE, 100000)).unwrap();
        let invoice = InvoiceBuilder::new(&model, period()).build(&breakdown).unwrap();
        let cap = invoice
            .line_items
            .iter()
            .find(|l| l.kind == LineItemKind::MonthlyCapAdjustment)
            .unwrap();
        assert_eq!(cap.amount, dec!(-3000));
        assert_eq!(invoice.total, dec!(8000));
    }

    #[test]
    fn test_lines_are_rounded_to_cents() {
        assert_eq!(round_to_cents(dec!(10.005)), dec!(10.01));
        assert_eq!(round_to_cents(dec!(-10.005)), dec!(-10.01));
        assert_eq!(round_to_cents(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn test_half_cent_lines_do_not_exceed_cap() {
        let model = BillingModel::builder(OrgId::new(), BillingModelType::Outcome)
            .config(
                OutcomeBasedConfig::builder(dec!(0))
                    .tier(dec!(1), dec!(0.5))
                    .tier(dec!(2), dec!(0.5))
                    .monthly_cap_amount(dec!(0.01))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let breakdown =
            calculate_breakdown(&model, &UsageData::new().with(OUTCOME_VALUE, 2)).unwrap();
        assert_eq!(breakdown.total, dec!(0.010));

        let invoice = InvoiceBuilder::new(&model, period()).build(&breakdown).unwrap();
        // two 0.005 brackets each round up to a cent
        let rounding = invoice
            .line_items
            .iter()
            .find(|l| l.kind == LineItemKind::RoundingAdjustment)
            .unwrap();
        assert_eq!(rounding.amount, dec!(-0.01));
        assert_eq!(invoice.total, dec!(0.01));
    }

    #[test]
    fn test_rejects_breakdown_of_another_model() {
        let model = outcome_model();
        let other = outcome_model();
        let breakdown = calculate_breakdown(&other, &UsageData::new()).unwrap();
        assert!(matches!(
            InvoiceBuilder::new(&model, period()).build(&breakdown),
            Err(BillingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_due_date_and_currency() {
        let model = outcome_model();
        let breakdown = calculate_breakdown(&model, &UsageData::new()).unwrap();
        let created = OffsetDateTime::from_unix_timestamp(1_730_419_200).unwrap();
        let invoice = InvoiceBuilder::new(&model, period())
            .currency("EUR")
            .due_in_days(14)
            .created_at(created)
            .build(&breakdown)
            .unwrap();
        assert_eq!(invoice.currency, "eur");
        assert_eq!(invoice.due_at - invoice.created_at, Duration::days(14));
    }

    #[test]
    fn test_period_validation() {
        let now = OffsetDateTime::from_unix_timestamp(1_730_419_200).unwrap();
        assert!(BillingPeriod::new(now, now).is_err());

        // 2024-12-15 -> December 2024
        let december = OffsetDateTime::from_unix_timestamp(1_734_220_800).unwrap();
        let period = BillingPeriod::month_containing(december).unwrap();
        assert_eq!(period.start.month(), Month::December);
        assert_eq!(period.start.day(), 1);
        assert_eq!(period.end.year(), 2025);
        assert_eq!(period.end.month(), Month::January);
    }
}
