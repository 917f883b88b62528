use rust_decimal::Decimal;
use tracing::{debug, info};
use crate::{
    error::{Result, SnapshotError},
    storage::{
        models::{AggregateUpdate, EscrowDetails, EscrowGroup},
        Database,
    },
    xrpl::drops::sum_drops,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub accounts: u64,
    pub escrow_destinations: u64,
}

/// Folds escrowed XRP into the balance of the receiving account
pub struct BalanceAggregator<'a> {
    db: &'a Database,
}

impl<'a> BalanceAggregator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn aggregate(&self) -> Result<AggregateSummary> {
        let accounts = self.db.count_dump("Account")?;
        info!("Preparing to aggregate {} accounts...", accounts);

        let projected = self.db.project_accounts()?;
        debug!("Copied {} accounts into the aggregate", projected);

        info!("Aggregating escrow balances...");
        let updates = self.build_updates()?;

        debug!("Starting to write... ({} operations)", updates.len());
        if !updates.is_empty() {
            self.db.apply_aggregate_updates(&updates)?;
        }
        debug!("Write complete!");

        Ok(AggregateSummary {
            accounts: projected as u64,
            escrow_destinations: updates.len() as u64,
        })
    }

    fn build_updates(&self) -> Result<Vec<AggregateUpdate>> {
        let mut updates = Vec::new();

        self.db.process_escrow_groups(|group| {
            let base = self.db.find_dump_balance(&group.destination)?.ok_or_else(|| {
                SnapshotError::DataIntegrity(format!(
                    "escrow destination {} has no account record",
                    group.destination
                ))
            })?;
            updates.push(merge_escrows(base, group)?);
            Ok(())
        })?;

        Ok(updates)
    }
}

/// Add a destination's escrows to its balance and order them by amount
pub fn merge_escrows(base: Decimal, group: EscrowGroup) -> Result<AggregateUpdate> {
    let EscrowGroup {
        destination,
        mut escrows,
    } = group;

    let balance = sum_drops(std::iter::once(base).chain(escrows.iter().map(|e| e.amount)))?;
    sort_escrows(&mut escrows);

    Ok(AggregateUpdate {
        address: destination,
        balance,
        incoming_escrows: escrows,
    })
}

/// Stable ascending sort by amount
pub fn sort_escrows(escrows: &mut [EscrowDetails]) {
    escrows.sort_by(|a, b| a.amount.cmp(&b.amount));
}
