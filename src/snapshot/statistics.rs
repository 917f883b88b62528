use clap::ValueEnum;
use rust_decimal::Decimal;
use crate::{
    error::Result,
    storage::{models::DataClass, Database},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Statistic {
    TotalParticipatingBalance,
    TotalParticipatingCount,
}

impl Statistic {
    pub const ALL: [Statistic; 2] = [Statistic::TotalParticipatingBalance, Statistic::TotalParticipatingCount];
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statistic::TotalParticipatingBalance => write!(f, "total-participating-balance"),
            Statistic::TotalParticipatingCount => write!(f, "total-participating-count"),
        }
    }
}

/// Number of accounts taking part in the distribution
pub fn participating_count(db: &Database) -> Result<u64> {
    db.count_classes(&DataClass::PARTICIPATING)
}

/// XRP held by participating accounts, in drops
pub fn participating_balance(db: &Database) -> Result<Decimal> {
    db.sum_classes(&DataClass::PARTICIPATING)
}

/// Breakdown of the snapshot by class, in label order
pub fn class_breakdown(db: &Database) -> Result<Vec<(DataClass, u64, Decimal)>> {
    DataClass::ALL
        .iter()
        .map(|class| Ok((*class, db.count_classes(&[*class])?, db.sum_classes(&[*class])?)))
        .collect()
}
