use serde::{Deserialize, Serialize};
use rust_decimal::Decimal;
use chrono::{DateTime, Utc};

/// Reduced ledger object kept in the dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinifiedRecord {
    Account {
        address: String,
        balance: Decimal,
        message_key: Option<String>,
    },
    Escrow {
        index: String,
        destination: String,
        amount: Decimal,
    },
}

impl MinifiedRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            MinifiedRecord::Account { .. } => "Account",
            MinifiedRecord::Escrow { .. } => "Escrow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowDetails {
    #[serde(rename = "Index")]
    pub index: String,
    #[serde(rename = "Amount")]
    pub amount: Decimal,
}

/// Escrows held for one destination, in dump order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowGroup {
    pub destination: String,
    pub escrows: Vec<EscrowDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedAccount {
    pub address: String,
    pub balance: Decimal,
    pub message_key: Option<String>,
    pub incoming_escrows: Vec<EscrowDetails>,
}

/// New balance and escrow list for an account that receives escrows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateUpdate {
    pub address: String,
    pub balance: Decimal,
    pub incoming_escrows: Vec<EscrowDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAccount {
    pub address: String,
    pub class: DataClass,
    pub balance: Decimal,
    pub message_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerMeta {
    pub ledger_index: u32,
    pub total_coins: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataClass {
    #[serde(rename = "INCLUDED")]
    Included,
    #[serde(rename = "INCLUDED_MANUAL")]
    IncludedManual,
    #[serde(rename = "EXCLUDED_MANUAL")]
    ExcludedManual,
    #[serde(rename = "EXCLUDED_RIPPLE")]
    ExcludedRipple,
    #[serde(rename = "EXCLUDED_EXCHANGE")]
    ExcludedExchange,
    #[serde(rename = "EXCLUDED_NO_KEY")]
    ExcludedNoKey,
    #[serde(rename = "EXCLUDED_BAD_KEY")]
    ExcludedBadKey,
}

impl DataClass {
    pub const ALL: [DataClass; 7] = [
        DataClass::Included,
        DataClass::IncludedManual,
        DataClass::ExcludedManual,
        DataClass::ExcludedRipple,
        DataClass::ExcludedExchange,
        DataClass::ExcludedNoKey,
        DataClass::ExcludedBadKey,
    ];

    /// Classes that take part in the distribution
    pub const PARTICIPATING: [DataClass; 2] = [DataClass::Included, DataClass::IncludedManual];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::Included => "INCLUDED",
            DataClass::IncludedManual => "INCLUDED_MANUAL",
            DataClass::ExcludedManual => "EXCLUDED_MANUAL",
            DataClass::ExcludedRipple => "EXCLUDED_RIPPLE",
            DataClass::ExcludedExchange => "EXCLUDED_EXCHANGE",
            DataClass::ExcludedNoKey => "EXCLUDED_NO_KEY",
            DataClass::ExcludedBadKey => "EXCLUDED_BAD_KEY",
        }
    }

    pub fn is_participating(&self) -> bool {
        Self::PARTICIPATING.contains(self)
    }
}

impl std::fmt::Display for DataClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DataClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DataClass::ALL
            .iter()
            .find(|class| class.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown data class {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_class_labels() {
        for class in DataClass::ALL {
            assert_eq!(class.as_str().parse::<DataClass>().unwrap(), class);
            assert_eq!(serde_json::to_string(&class).unwrap(), format!("\"{}\"", class));
        }
        assert!("INCLUDED_SOMETIMES".parse::<DataClass>().is_err());
    }

    #[test]
    fn test_escrow_details_json() {
        let details = EscrowDetails {
            index: "ABC".to_string(),
            amount: Decimal::from(4_000_000u64),
        };
        let json = serde_json::to_string(&details).unwrap();
        assert_eq!(json, r#"{"Index":"ABC","Amount":"4000000"}"#);

        let parsed: EscrowDetails = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, details);
    }
}
