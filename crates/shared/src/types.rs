//! Common types used across Xyra

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::XyraError;

// =============================================================================
// ID Wrappers
// =============================================================================

macro_rules! id_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = XyraError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| XyraError::Validation(format!("invalid {}: {}", stringify!($name), e)))
            }
        }
    };
}

id_wrapper!(
    /// Organization ID wrapper
    OrgId
);

id_wrapper!(
    /// Agent ID wrapper
    AgentId
);

id_wrapper!(
    /// Billing model ID wrapper
    BillingModelId
);

// =============================================================================
// Enums
// =============================================================================

/// How often a pricing configuration is billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    #[serde(alias = "yearly")]
    Annual,
}

impl Default for BillingFrequency {
    fn default() -> Self {
        Self::Monthly
    }
}

impl BillingFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        }
    }
}

impl fmt::Display for BillingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingFrequency {
    type Err = XyraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "annual" | "yearly" => Ok(Self::Annual),
            other => Err(XyraError::Validation(format!(
                "unknown billing frequency: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_frequency_parsing() {
        assert_eq!("monthly".parse::<BillingFrequency>().unwrap(), BillingFrequency::Monthly);
        assert_eq!(" Yearly ".parse::<BillingFrequency>().unwrap(), BillingFrequency::Annual);
        assert!("weekly".parse::<BillingFrequency>().is_err());
    }

    #[test]
    fn test_billing_frequency_serde_alias() {
        let freq: BillingFrequency = serde_json::from_str("\"yearly\"").unwrap();
        assert_eq!(freq, BillingFrequency::Annual);
        assert_eq!(serde_json::to_string(&freq).unwrap(), "\"annual\"");
    }

    #[test]
    fn test_id_wrapper_roundtrip_through_display() {
        let id = OrgId::new();
        let parsed: OrgId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<AgentId>().is_err());
    }
}
