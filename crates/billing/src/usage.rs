//! Usage data records
//!
//! Usage arrives from the usage/outcome recorder as a loose JSON object whose keys
//! depend on the billing model variant. Missing (or `null`) keys read as absent;
//! keys that are present must hold non-negative numbers (or numeric strings).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{BillingError, BillingResult};

pub const OUTCOME_VALUE: &str = "outcome_value";
pub const SEATS: &str = "seats";
pub const AGENT_COUNT: &str = "agent_count";
pub const ACTIVITY_TYPE: &str = "activity_type";
pub const ACTIVITY_COUNT: &str = "activity_count";
pub const WORKFLOW_TYPE: &str = "workflow_type";
pub const WORKFLOW_COUNT: &str = "workflow_count";

/// One period's usage for a billing model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageData(Map<String, Value>);

impl UsageData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a key
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Parse a usage record from a JSON value, which must be an object
    pub fn from_value(value: Value) -> BillingResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(BillingError::InvalidUsageData(format!(
                "usage record must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.present(key).is_some()
    }

    /// Non-negative decimal value of `key`, `None` when absent
    pub fn decimal(&self, key: &str) -> BillingResult<Option<Decimal>> {
        let value = match self.present(key) {
            Some(v) => v,
            None => return Ok(None),
        };
        let amount = match value {
            // a JSON number that does not parse lies outside the decimal range
            Value::Number(n) => parse_decimal(&n.to_string())
                .ok_or(BillingError::ArithmeticOverflow("usage value"))?,
            Value::String(s) => parse_decimal(s.trim()).ok_or_else(|| {
                BillingError::InvalidUsageData(format!("{} must be numeric, got {:?}", key, s))
            })?,
            other => {
                return Err(BillingError::InvalidUsageData(format!(
                    "{} must be a number, got {}",
                    key,
                    json_kind(other)
                )))
            }
        };
        if amount < Decimal::ZERO {
            return Err(BillingError::InvalidUsageData(format!(
                "{} must not be negative (got {})",
                key, amount
            )));
        }
        Ok(Some(amount))
    }

    /// Decimal value of `key`, zero when absent
    pub fn decimal_or_zero(&self, key: &str) -> BillingResult<Decimal> {
        Ok(self.decimal(key)?.unwrap_or(Decimal::ZERO))
    }

    /// Whole, non-negative count stored under `key`, `None` when absent
    pub fn count(&self, key: &str) -> BillingResult<Option<u64>> {
        let amount = match self.decimal(key)? {
            Some(a) => a,
            None => return Ok(None),
        };
        if !amount.fract().is_zero() {
            return Err(BillingError::InvalidUsageData(format!(
                "{} must be a whole number (got {})",
                key, amount
            )));
        }
        amount
            .to_u64()
            .map(Some)
            .ok_or(BillingError::ArithmeticOverflow("usage count"))
    }

    /// Count stored under `key`, zero when absent
    pub fn count_or_zero(&self, key: &str) -> BillingResult<u64> {
        Ok(self.count(key)?.unwrap_or(0))
    }

    /// String value of `key`, `None` when absent
    pub fn text(&self, key: &str) -> BillingResult<Option<&str>> {
        match self.present(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(BillingError::InvalidUsageData(format!(
                "{} must be a string, got {}",
                key,
                json_kind(other)
            ))),
        }
    }

    /// String value of a key that selects a pricing path
    pub fn required_text(&self, key: &str) -> BillingResult<&str> {
        match self.text(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(BillingError::InvalidUsageData(format!("{} is required", key))),
        }
    }

    /// Seat count, read from `seats` with `agent_count` as a fallback
    pub fn seats(&self) -> BillingResult<u64> {
        match self.count(SEATS)? {
            Some(seats) => Ok(seats),
            None => self.count_or_zero(AGENT_COUNT),
        }
    }

    fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }
}

impl From<Map<String, Value>> for UsageData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for UsageData {
    type Error = BillingError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_absent_and_null_keys_read_as_zero() {
        let usage = UsageData::new().with(OUTCOME_VALUE, Value::Null);
        assert_eq!(usage.decimal(OUTCOME_VALUE).unwrap(), None);
        assert_eq!(usage.decimal_or_zero(OUTCOME_VALUE).unwrap(), Decimal::ZERO);
        assert_eq!(usage.count_or_zero(SEATS).unwrap(), 0);
        assert!(!usage.contains(OUTCOME_VALUE));
    }

    #[test]
    fn test_numbers_and_numeric_strings() {
        let usage = UsageData::from_value(json!({
            "outcome_value": 75000.5,
            "activity_count": "1200",
            "big": 1e21,
        }))
        .unwrap();
        assert_eq!(usage.decimal(OUTCOME_VALUE).unwrap(), Some(dec!(75000.5)));
        assert_eq!(usage.count(ACTIVITY_COUNT).unwrap(), Some(1200));
        assert_eq!(
            usage.decimal("big").unwrap(),
            Some(Decimal::from_str("1000000000000000000000").unwrap())
        );
    }

    #[test]
    fn test_negative_values_are_rejected() {
        let usage = UsageData::new().with(OUTCOME_VALUE, -10);
        assert!(matches!(
            usage.decimal(OUTCOME_VALUE),
            Err(BillingError::InvalidUsageData(_))
        ));
    }

    #[test]
    fn test_out_of_range_numbers_overflow() {
        let usage = UsageData::from_value(json!({ "outcome_value": 1e30 })).unwrap();
        assert!(matches!(
            usage.decimal(OUTCOME_VALUE),
            Err(BillingError::ArithmeticOverflow(_))
        ));
        let usage = UsageData::new().with(OUTCOME_VALUE, "lots");
        assert!(matches!(
            usage.decimal(OUTCOME_VALUE),
            Err(BillingError::InvalidUsageData(_))
        ));
    }

    #[test]
    fn test_counts_must_be_whole() {
        let usage = UsageData::new().with(SEATS, 2.5);
        assert!(matches!(usage.count(SEATS), Err(BillingError::InvalidUsageData(_))));
    }

    #[test]
    fn test_non_numeric_values_are_rejected() {
        let usage = UsageData::new().with(OUTCOME_VALUE, "lots").with(SEATS, true);
        assert!(usage.decimal(OUTCOME_VALUE).is_err());
        assert!(usage.count(SEATS).is_err());
    }

    #[test]
    fn test_seats_falls_back_to_agent_count() {
        assert_eq!(UsageData::new().with(AGENT_COUNT, 7).seats().unwrap(), 7);
        assert_eq!(
            UsageData::new().with(SEATS, 12).with(AGENT_COUNT, 7).seats().unwrap(),
            12
        );
        assert_eq!(UsageData::new().seats().unwrap(), 0);
    }

    #[test]
    fn test_required_text() {
        let usage = UsageData::new().with(ACTIVITY_TYPE, "ticket_resolved");
        assert_eq!(usage.required_text(ACTIVITY_TYPE).unwrap(), "ticket_resolved");
        assert!(matches!(
            usage.required_text(WORKFLOW_TYPE),
            Err(BillingError::InvalidUsageData(_))
        ));
        let usage = UsageData::new().with(WORKFLOW_TYPE, 42);
        assert!(usage.required_text(WORKFLOW_TYPE).is_err());
    }

    #[test]
    fn test_usage_must_be_an_object() {
        assert!(UsageData::from_value(json!([1, 2, 3])).is_err());
    }
}
