use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};
use crate::{
    error::{Result, SnapshotError},
    storage::Database,
};

pub use crate::storage::models::DataClass;

/// Account lists and message key rules, as stored in the classification JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(rename = "Accounts", default)]
    pub accounts: AccountLists,
    #[serde(rename = "MessageKey", default)]
    pub message_key: MessageKeyRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccountLists {
    pub included_exchange_manual: Vec<String>,
    pub excluded: Vec<String>,
    pub excluded_ripple: Vec<String>,
    pub excluded_exchange: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MessageKeyRules {
    pub prefixes: Vec<String>,
}

impl ClassificationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SnapshotError::Config(format!("cannot read classification rules {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Assigns exactly one class to an account.
///
/// Rules are checked in a fixed order and the first match wins: manual
/// inclusion, manual exclusion, Ripple accounts, exchanges, missing key,
/// key without an accepted prefix. Anything else is included.
#[derive(Debug, Clone)]
pub struct Classifier {
    included_manual: HashSet<String>,
    excluded_manual: HashSet<String>,
    excluded_ripple: HashSet<String>,
    excluded_exchange: HashSet<String>,
    prefixes: Vec<String>,
}

impl Classifier {
    pub fn new(config: &ClassificationConfig) -> Self {
        let set = |list: &[String]| list.iter().cloned().collect::<HashSet<_>>();
        Self {
            included_manual: set(&config.accounts.included_exchange_manual),
            excluded_manual: set(&config.accounts.excluded),
            excluded_ripple: set(&config.accounts.excluded_ripple),
            excluded_exchange: set(&config.accounts.excluded_exchange),
            prefixes: config.message_key.prefixes.clone(),
        }
    }

    pub fn classify(&self, address: &str, message_key: Option<&str>) -> DataClass {
        if self.included_manual.contains(address) {
            return DataClass::IncludedManual;
        }
        if self.excluded_manual.contains(address) {
            return DataClass::ExcludedManual;
        }
        if self.excluded_ripple.contains(address) {
            return DataClass::ExcludedRipple;
        }
        if self.excluded_exchange.contains(address) {
            return DataClass::ExcludedExchange;
        }

        match message_key {
            None => DataClass::ExcludedNoKey,
            Some(key) if !self.has_valid_prefix(key) => DataClass::ExcludedBadKey,
            Some(_) => DataClass::Included,
        }
    }

    fn has_valid_prefix(&self, key: &str) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassificationSummary {
    pub counts: BTreeMap<DataClass, u64>,
}

impl ClassificationSummary {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, class: DataClass) -> u64 {
        self.counts.get(&class).copied().unwrap_or(0)
    }
}

/// Writes the classified snapshot from the aggregated balances
pub struct ClassificationEngine<'a> {
    db: &'a Database,
    classifier: Classifier,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(db: &'a Database, config: &ClassificationConfig) -> Self {
        Self {
            db,
            classifier: Classifier::new(config),
        }
    }

    pub fn classify(&self) -> Result<ClassificationSummary> {
        info!("Classifying {} accounts...", self.db.count_aggregated()?);

        let mut summary = ClassificationSummary::default();
        let written = self.db.create_snapshot(|account| {
            let class = self.classifier.classify(&account.address, account.message_key.as_deref());
            *summary.counts.entry(class).or_insert(0) += 1;
            class
        })?;

        debug!("Wrote {} snapshot records", written);
        Ok(summary)
    }
}
