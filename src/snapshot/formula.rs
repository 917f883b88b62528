use rust_decimal::{Decimal, RoundingStrategy};
use crate::{
    error::{Result, SnapshotError},
    storage::{models::DataClass, Database},
    xrpl::drops::initial_supply,
};

/// Decimal places kept in the quota
pub const QUOTA_DECIMALS: u32 = 4;

/// Inputs of the claim formula, all in drops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaParameters {
    pub total_xrp: Decimal,
    pub ripple_xrp: Decimal,
    pub npe_xrp: Decimal,
}

impl FormulaParameters {
    /// Spark claimable per XRP held
    ///
    /// (initial supply - Ripple XRP) / (total XRP - Ripple XRP - non-participating exchange XRP),
    /// rounded half-up to four decimals.
    pub fn quota(&self) -> Result<Decimal> {
        let numerator = initial_supply() - self.ripple_xrp;
        let denominator = self.total_xrp - self.ripple_xrp - self.npe_xrp;

        if denominator <= Decimal::ZERO {
            return Err(SnapshotError::Formula(format!(
                "participating supply must be positive, got {} drops",
                denominator
            )));
        }

        let quota = numerator
            .checked_div(denominator)
            .ok_or_else(|| SnapshotError::Formula("quota overflow".to_string()))?;
        Ok(quota.round_dp_with_strategy(QUOTA_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
    }
}

/// Spark claimable for a balance, in the balance's units
pub fn claimable(balance: Decimal, quota: Decimal) -> Decimal {
    balance * quota
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    Eligible { balance: Decimal, claimable: Decimal },
    /// Account could claim once it sets a valid message key
    MissingKey,
    NotEligible,
}

/// Computes the claim quota from the ledger metadata and the snapshot
pub struct FormulaCalculator<'a> {
    db: &'a Database,
}

impl<'a> FormulaCalculator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn parameters(&self) -> Result<FormulaParameters> {
        let meta = self.db.read_meta()?.ok_or(SnapshotError::MetadataMissing)?;

        Ok(FormulaParameters {
            total_xrp: meta.total_coins,
            ripple_xrp: self.db.sum_classes(&[DataClass::ExcludedRipple])?,
            npe_xrp: self.db.sum_classes(&[DataClass::ExcludedExchange])?,
        })
    }

    pub fn quota(&self) -> Result<Decimal> {
        self.parameters()?.quota()
    }

    pub fn claim_status(&self, address: &str) -> Result<ClaimStatus> {
        let quota = self.quota()?;

        let status = match self.db.find_classified(address)? {
            Some(account) => match account.class {
                class if class.is_participating() => ClaimStatus::Eligible {
                    balance: account.balance,
                    claimable: claimable(account.balance, quota),
                },
                DataClass::ExcludedNoKey | DataClass::ExcludedBadKey => ClaimStatus::MissingKey,
                _ => ClaimStatus::NotEligible,
            },
            None => ClaimStatus::NotEligible,
        };

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_support::{aggregated, temp_db};
    use crate::storage::models::LedgerMeta;
    use crate::storage::Collection;
    use std::str::FromStr;

    fn drops(value: u64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn test_quota_rounds_half_up_to_four_places() {
        let params = FormulaParameters {
            total_xrp: initial_supply() / drops(2),
            ripple_xrp: drops(0),
            npe_xrp: drops(0),
        };
        assert_eq!(params.quota().unwrap(), drops(2));

        // 100e15 / 45e15 = 2.2222...
        let params = FormulaParameters {
            total_xrp: drops(45_000_000_000_000_000),
            ripple_xrp: drops(0),
            npe_xrp: drops(0),
        };
        assert_eq!(params.quota().unwrap().to_string(), "2.2222");

        // 100e15 / 64e15 = 1.5625 exactly
        let params = FormulaParameters {
            total_xrp: drops(64_000_000_000_000_000),
            ripple_xrp: drops(0),
            npe_xrp: drops(0),
        };
        assert_eq!(params.quota().unwrap(), Decimal::from_str("1.5625").unwrap());

        // 40001e12 / 20000e12 = 2.00005, a midpoint
        let params = FormulaParameters {
            total_xrp: drops(79_999_000_000_000_000),
            ripple_xrp: drops(59_999_000_000_000_000),
            npe_xrp: drops(0),
        };
        assert_eq!(params.quota().unwrap().to_string(), "2.0001");
    }

    #[test]
    fn test_quota_subtracts_excluded_supply() {
        let params = FormulaParameters {
            total_xrp: drops(99_990_000_000_000_000),
            ripple_xrp: drops(50_000_000_000_000_000),
            npe_xrp: drops(4_990_000_000_000_000),
        };
        // 50e15 / 45e15
        assert_eq!(params.quota().unwrap().to_string(), "1.1111");
    }

    #[test]
    fn test_quota_with_ripple_and_exchange_supply() {
        // (100e15 - 999) / (45e15 - 999 - 333)
        let params = FormulaParameters {
            total_xrp: drops(45_000_000_000_000_000),
            ripple_xrp: drops(999),
            npe_xrp: drops(333),
        };
        assert_eq!(params.quota().unwrap().to_string(), "2.2222");
    }

    #[test]
    fn test_parameters_sum_excluded_classes() {
        let (_dir, db) = temp_db(&[Collection::Meta, Collection::Aggregate, Collection::Snapshot]);
        db.write_meta(&LedgerMeta {
            ledger_index: 1,
            total_coins: drops(45_000_000_000_000_000),
            created_at: chrono::Utc::now(),
        })
        .unwrap();
        db.insert_aggregated(&aggregated("rRipple1", 600, None)).unwrap();
        db.insert_aggregated(&aggregated("rRipple2", 399, Some("02"))).unwrap();
        db.insert_aggregated(&aggregated("rExchange1", 300, None)).unwrap();
        db.insert_aggregated(&aggregated("rExchange2", 33, None)).unwrap();
        db.insert_aggregated(&aggregated("rHolder", 5_000, Some("02"))).unwrap();
        db.create_snapshot(|account| match account.address.as_str() {
            "rRipple1" | "rRipple2" => DataClass::ExcludedRipple,
            "rExchange1" | "rExchange2" => DataClass::ExcludedExchange,
            _ => DataClass::Included,
        })
        .unwrap();

        let calculator = FormulaCalculator::new(&db);
        assert_eq!(
            calculator.parameters().unwrap(),
            FormulaParameters {
                total_xrp: drops(45_000_000_000_000_000),
                ripple_xrp: drops(999),
                npe_xrp: drops(333),
            }
        );
        assert_eq!(calculator.quota().unwrap().to_string(), "2.2222");
    }

    #[test]
    fn test_quota_requires_positive_denominator() {
        let params = FormulaParameters {
            total_xrp: drops(10),
            ripple_xrp: drops(6),
            npe_xrp: drops(4),
        };
        assert!(matches!(params.quota(), Err(SnapshotError::Formula(_))));
    }

    #[test]
    fn test_missing_metadata() {
        let (_dir, db) = temp_db(&[Collection::Snapshot]);
        let result = FormulaCalculator::new(&db).parameters();
        assert!(matches!(result, Err(SnapshotError::MetadataMissing)));
    }

    #[test]
    fn test_claim_status() {
        let (_dir, db) = temp_db(&[Collection::Meta, Collection::Aggregate, Collection::Snapshot]);
        db.write_meta(&LedgerMeta {
            ledger_index: 1,
            total_coins: drops(45_000_000_000_000_000),
            created_at: chrono::Utc::now(),
        })
        .unwrap();
        db.insert_aggregated(&aggregated("rIncluded", 999, Some("02"))).unwrap();
        db.insert_aggregated(&aggregated("rManual", 333, None)).unwrap();
        db.insert_aggregated(&aggregated("rNoKey", 10, None)).unwrap();
        db.insert_aggregated(&aggregated("rBadKey", 10, Some("FF"))).unwrap();
        db.insert_aggregated(&aggregated("rExchange", 10, Some("02"))).unwrap();
        db.create_snapshot(|account| match account.address.as_str() {
            "rIncluded" => DataClass::Included,
            "rManual" => DataClass::IncludedManual,
            "rNoKey" => DataClass::ExcludedNoKey,
            "rBadKey" => DataClass::ExcludedBadKey,
            _ => DataClass::ExcludedManual,
        })
        .unwrap();

        let calculator = FormulaCalculator::new(&db);
        assert_eq!(calculator.quota().unwrap().to_string(), "2.2222");

        assert_eq!(
            calculator.claim_status("rIncluded").unwrap(),
            ClaimStatus::Eligible {
                balance: drops(999),
                claimable: Decimal::from_str("2219.9778").unwrap(),
            }
        );
        assert_eq!(
            calculator.claim_status("rManual").unwrap(),
            ClaimStatus::Eligible {
                balance: drops(333),
                claimable: Decimal::from_str("739.9926").unwrap(),
            }
        );
        assert_eq!(calculator.claim_status("rNoKey").unwrap(), ClaimStatus::MissingKey);
        assert_eq!(calculator.claim_status("rBadKey").unwrap(), ClaimStatus::MissingKey);
        assert_eq!(calculator.claim_status("rExchange").unwrap(), ClaimStatus::NotEligible);
        assert_eq!(calculator.claim_status("rUnknown").unwrap(), ClaimStatus::NotEligible);
    }
}
