use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;
use crate::{
    error::{Result, SnapshotError},
    storage::models::{
        AggregateUpdate, AggregatedAccount, ClassifiedAccount, DataClass, EscrowDetails, EscrowGroup,
        LedgerMeta, MinifiedRecord,
    },
};

/// Data sets produced by the pipeline steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Dump,
    Meta,
    Aggregate,
    Snapshot,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Dump => "dump",
            Collection::Meta => "meta",
            Collection::Aggregate => "aggregated",
            Collection::Snapshot => "snapshot",
        }
    }

    /// Command that produces this data set
    pub fn producing_step(&self) -> &'static str {
        match self {
            Collection::Dump | Collection::Meta => "dump",
            Collection::Aggregate => "aggregate",
            Collection::Snapshot => "classify",
        }
    }

    fn schema(&self) -> &'static str {
        match self {
            Collection::Dump => {
                "CREATE TABLE IF NOT EXISTS dump (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    type TEXT NOT NULL,
                    address TEXT,
                    balance TEXT,
                    message_key TEXT,
                    escrow_index TEXT,
                    destination TEXT,
                    amount TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_dump_type ON dump(type);
                CREATE INDEX IF NOT EXISTS idx_dump_address ON dump(address);
                CREATE INDEX IF NOT EXISTS idx_dump_destination ON dump(destination);"
            }
            Collection::Meta => {
                "CREATE TABLE IF NOT EXISTS meta (
                    id INTEGER PRIMARY KEY CHECK (id = 0),
                    ledger_index INTEGER NOT NULL,
                    total_coins TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );"
            }
            Collection::Aggregate => {
                "CREATE TABLE IF NOT EXISTS aggregated (
                    address TEXT PRIMARY KEY,
                    balance TEXT NOT NULL,
                    message_key TEXT,
                    incoming_escrows TEXT NOT NULL DEFAULT '[]'
                );"
            }
            Collection::Snapshot => {
                "CREATE TABLE IF NOT EXISTS snapshot (
                    address TEXT PRIMARY KEY,
                    class TEXT NOT NULL,
                    balance TEXT NOT NULL,
                    message_key TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_snapshot_class ON snapshot(class);"
            }
        }
    }
}

fn decimal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str_exact(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn class_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DataClass> {
    let text: String = row.get(idx)?;
    text.parse::<DataClass>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn aggregated_from_row(row: &Row<'_>) -> rusqlite::Result<AggregatedAccount> {
    let escrows: String = row.get(3)?;
    let incoming_escrows = serde_json::from_str(&escrows).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(AggregatedAccount {
        address: row.get(0)?,
        balance: decimal_column(row, 1)?,
        message_key: row.get(2)?,
        incoming_escrows,
    })
}

fn classified_from_row(row: &Row<'_>) -> rusqlite::Result<ClassifiedAccount> {
    Ok(ClassifiedAccount {
        address: row.get(0)?,
        class: class_column(row, 1)?,
        balance: decimal_column(row, 2)?,
        message_key: row.get(3)?,
    })
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    /// Open the database for a pipeline step.
    ///
    /// Every collection in `needed` must already exist. Every collection in
    /// `kinds` is created; an existing one is an error unless `force` is set,
    /// in which case its old contents are dropped.
    pub fn prepare(path: &str, force: bool, kinds: &[Collection], needed: &[Collection]) -> Result<Self> {
        // read-only steps must not leave an empty database file behind
        if kinds.is_empty() && !Path::new(path).exists() {
            if let Some(required) = needed.first() {
                return Err(SnapshotError::Precondition {
                    step: required.producing_step(),
                });
            }
        }

        let db = Self::open(path)?;

        for required in needed {
            if !db.exists(*required)? {
                return Err(SnapshotError::Precondition {
                    step: required.producing_step(),
                });
            }
        }

        for kind in kinds {
            let present = db.exists(*kind)?;
            if present {
                if !force {
                    return Err(SnapshotError::DuplicateData {
                        database: path.to_string(),
                    });
                }
                info!("Removing old {} data...", kind.table());
            }
            db.initialize(*kind, present)?;
        }

        Ok(db)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn exists(&self, collection: Collection) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [collection.table()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn initialize(&self, collection: Collection, drop: bool) -> Result<()> {
        if drop {
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {}", collection.table()))?;
        }
        self.conn.execute_batch(collection.schema())?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| SnapshotError::Database(e))
    }

    // Dump

    pub fn insert_dump(&self, records: &[MinifiedRecord]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO dump (type, address, balance, message_key, escrow_index, destination, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for record in records {
                match record {
                    MinifiedRecord::Account {
                        address,
                        balance,
                        message_key,
                    } => stmt.execute(params![
                        record.kind(),
                        address,
                        balance.to_string(),
                        message_key,
                        None::<String>,
                        None::<String>,
                        None::<String>,
                    ])?,
                    MinifiedRecord::Escrow {
                        index,
                        destination,
                        amount,
                    } => stmt.execute(params![
                        record.kind(),
                        None::<String>,
                        None::<String>,
                        None::<String>,
                        index,
                        destination,
                        amount.to_string(),
                    ])?,
                };
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_dump(&self, kind: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dump WHERE type = ?1", [kind], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Balance of an account record in the dump
    pub fn find_dump_balance(&self, address: &str) -> Result<Option<Decimal>> {
        let balance = self
            .conn
            .query_row(
                "SELECT balance FROM dump WHERE type = 'Account' AND address = ?1 ORDER BY id LIMIT 1",
                [address],
                |row| decimal_column(row, 0),
            )
            .optional()?;
        Ok(balance)
    }

    /// Visit escrows grouped by destination, in dump order within each group
    pub fn process_escrow_groups<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(EscrowGroup) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(
            "SELECT destination, escrow_index, amount FROM dump
             WHERE type = 'Escrow'
             ORDER BY destination, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                EscrowDetails {
                    index: row.get(1)?,
                    amount: decimal_column(row, 2)?,
                },
            ))
        })?;

        let mut current: Option<EscrowGroup> = None;
        for row in rows {
            let (destination, details) = row?;
            if let Some(group) = current.as_mut() {
                if group.destination == destination {
                    group.escrows.push(details);
                    continue;
                }
            }
            if let Some(done) = current.replace(EscrowGroup {
                destination,
                escrows: vec![details],
            }) {
                f(done)?;
            }
        }
        if let Some(done) = current {
            f(done)?;
        }

        Ok(())
    }

    // Aggregate

    /// Copy every dumped account into the aggregate with its own balance
    pub fn project_accounts(&self) -> Result<usize> {
        let inserted = self.conn.execute(
            "INSERT INTO aggregated (address, balance, message_key, incoming_escrows)
             SELECT address, balance, message_key, '[]' FROM dump
             WHERE type = 'Account'
             ORDER BY id",
            [],
        )?;
        Ok(inserted)
    }

    /// Write all escrow updates in a single transaction
    pub fn apply_aggregate_updates(&self, updates: &[AggregateUpdate]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE aggregated SET balance = ?1, incoming_escrows = ?2 WHERE address = ?3",
            )?;
            for update in updates {
                let changed = stmt.execute(params![
                    update.balance.to_string(),
                    serde_json::to_string(&update.incoming_escrows)?,
                    update.address,
                ])?;
                if changed != 1 {
                    return Err(SnapshotError::DataIntegrity(format!(
                        "no aggregated account {}",
                        update.address
                    )));
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_aggregated(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM aggregated", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Label every aggregated account and store it in the snapshot
    pub fn create_snapshot<F>(&self, mut classify: F) -> Result<usize>
    where
        F: FnMut(&AggregatedAccount) -> DataClass,
    {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut select = tx.prepare(
                "SELECT address, balance, message_key, incoming_escrows FROM aggregated ORDER BY address",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO snapshot (address, class, balance, message_key) VALUES (?1, ?2, ?3, ?4)",
            )?;

            let rows = select.query_map([], aggregated_from_row)?;
            for row in rows {
                let account = row?;
                let class = classify(&account);
                insert.execute(params![
                    account.address,
                    class.as_str(),
                    account.balance.to_string(),
                    account.message_key,
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    // Snapshot

    pub fn process_snapshot<F>(&self, class: DataClass, mut f: F) -> Result<()>
    where
        F: FnMut(ClassifiedAccount) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(
            "SELECT address, class, balance, message_key FROM snapshot WHERE class = ?1 ORDER BY address",
        )?;
        let rows = stmt.query_map([class.as_str()], classified_from_row)?;
        for row in rows {
            f(row?)?;
        }
        Ok(())
    }

    pub fn count_classes(&self, classes: &[DataClass]) -> Result<u64> {
        if classes.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM snapshot WHERE class IN ({})",
            placeholders(classes.len())
        );
        let count: i64 = self.conn.query_row(
            &sql,
            params_from_iter(classes.iter().map(DataClass::as_str)),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Exact balance total over the given classes
    pub fn sum_classes(&self, classes: &[DataClass]) -> Result<Decimal> {
        if classes.is_empty() {
            return Ok(Decimal::ZERO);
        }
        let sql = format!(
            "SELECT balance FROM snapshot WHERE class IN ({})",
            placeholders(classes.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(classes.iter().map(DataClass::as_str)), |row| {
            decimal_column(row, 0)
        })?;

        let mut total = Decimal::ZERO;
        for balance in rows {
            total = total
                .checked_add(balance?)
                .ok_or_else(|| SnapshotError::InvalidAmount("balance overflow".to_string()))?;
        }
        Ok(total)
    }

    pub fn find_classified(&self, address: &str) -> Result<Option<ClassifiedAccount>> {
        let account = self
            .conn
            .query_row(
                "SELECT address, class, balance, message_key FROM snapshot WHERE address = ?1",
                [address],
                classified_from_row,
            )
            .optional()?;
        Ok(account)
    }

    /// SHA-256 over the snapshot rows in address order
    pub fn snapshot_hash(&self) -> Result<String> {
        let mut stmt = self.conn.prepare(
            "SELECT address, class, balance, message_key FROM snapshot ORDER BY address",
        )?;
        let rows = stmt.query_map([], classified_from_row)?;

        let mut hasher = Sha256::new();
        for row in rows {
            let account = row?;
            hasher.update(account.address.as_bytes());
            hasher.update([0x1F]);
            hasher.update(account.class.as_str().as_bytes());
            hasher.update([0x1F]);
            hasher.update(account.balance.to_string().as_bytes());
            hasher.update([0x1F]);
            hasher.update(account.message_key.as_deref().unwrap_or("").as_bytes());
            hasher.update([0x1E]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    // Meta

    pub fn write_meta(&self, meta: &LedgerMeta) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (id, ledger_index, total_coins, created_at) VALUES (0, ?1, ?2, ?3)",
            params![
                meta.ledger_index,
                meta.total_coins.to_string(),
                meta.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn read_meta(&self) -> Result<Option<LedgerMeta>> {
        if !self.exists(Collection::Meta)? {
            return Ok(None);
        }

        let row = self
            .conn
            .query_row(
                "SELECT ledger_index, total_coins, created_at FROM meta WHERE id = 0",
                [],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        decimal_column(row, 1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((ledger_index, total_coins, created_at)) => {
                let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| SnapshotError::DataIntegrity(format!("bad meta timestamp: {}", e)))?
                    .with_timezone(&chrono::Utc);
                Ok(Some(LedgerMeta {
                    ledger_index,
                    total_coins,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_reading_a_missing_database_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.db");

        let result = Database::prepare(path.to_str().unwrap(), false, &[], &[Collection::Snapshot]);
        assert!(matches!(result, Err(SnapshotError::Precondition { step: "classify" })));
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_requires_prior_step() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.db");

        let result = Database::prepare(
            path.to_str().unwrap(),
            false,
            &[Collection::Aggregate],
            &[Collection::Dump],
        );
        assert!(matches!(result, Err(SnapshotError::Precondition { step: "dump" })));
    }

    #[test]
    fn test_prepare_refuses_existing_data_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.db");
        let path = path.to_str().unwrap();

        let db = Database::prepare(path, false, &[Collection::Dump], &[]).unwrap();
        db.insert_dump(&[account("rA", 10, None)]).unwrap();
        db.close().unwrap();

        match Database::prepare(path, false, &[Collection::Dump], &[]) {
            Err(SnapshotError::DuplicateData { database }) => assert_eq!(database, path),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }

        let db = Database::prepare(path, true, &[Collection::Dump], &[]).unwrap();
        assert_eq!(db.count_dump("Account").unwrap(), 0);
    }

    #[test]
    fn test_escrow_groups() {
        let (_dir, db) = temp_db(&[Collection::Dump]);
        db.insert_dump(&[
            account("rB", 97_000_000, None),
            escrow("E2", "rB", 5_000_000),
            escrow("E1", "rA", 1_000_000),
            escrow("E3", "rB", 4_000_000),
        ])
        .unwrap();

        let mut groups = Vec::new();
        db.process_escrow_groups(|group| {
            groups.push(group);
            Ok(())
        })
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].destination, "rA");
        assert_eq!(groups[1].destination, "rB");
        let indexes: Vec<_> = groups[1].escrows.iter().map(|e| e.index.as_str()).collect();
        assert_eq!(indexes, vec!["E2", "E3"]);

        assert_eq!(db.find_dump_balance("rB").unwrap(), Some(Decimal::from(97_000_000u64)));
        assert_eq!(db.find_dump_balance("rA").unwrap(), None);
    }

    #[test]
    fn test_snapshot_queries() {
        let (_dir, db) = temp_db(&[Collection::Aggregate, Collection::Snapshot]);
        db.insert_aggregated(&aggregated("rA", 999, Some("02AA"))).unwrap();
        db.insert_aggregated(&aggregated("rB", 333, None)).unwrap();
        db.insert_aggregated(&aggregated("rC", 111, Some("FF"))).unwrap();

        let created = db
            .create_snapshot(|account| match account.address.as_str() {
                "rA" => DataClass::Included,
                "rB" => DataClass::ExcludedNoKey,
                _ => DataClass::IncludedManual,
            })
            .unwrap();
        assert_eq!(created, 3);

        assert_eq!(db.count_classes(&DataClass::PARTICIPATING).unwrap(), 2);
        assert_eq!(db.sum_classes(&DataClass::PARTICIPATING).unwrap(), Decimal::from(1110u64));
        assert_eq!(db.sum_classes(&[]).unwrap(), Decimal::ZERO);

        let mut excluded = Vec::new();
        db.process_snapshot(DataClass::ExcludedNoKey, |account| {
            excluded.push(account.address);
            Ok(())
        })
        .unwrap();
        assert_eq!(excluded, vec!["rB".to_string()]);

        let found = db.find_classified("rC").unwrap().unwrap();
        assert_eq!(found.class, DataClass::IncludedManual);
        assert_eq!(found.message_key.as_deref(), Some("FF"));
        assert!(db.find_classified("rZ").unwrap().is_none());
    }

    #[test]
    fn test_snapshot_hash_depends_on_content_only() {
        let (_dir1, first) = temp_db(&[Collection::Aggregate, Collection::Snapshot]);
        let (_dir2, second) = temp_db(&[Collection::Aggregate, Collection::Snapshot]);

        first.insert_aggregated(&aggregated("rA", 1, None)).unwrap();
        first.insert_aggregated(&aggregated("rB", 2, None)).unwrap();
        second.insert_aggregated(&aggregated("rB", 2, None)).unwrap();
        second.insert_aggregated(&aggregated("rA", 1, None)).unwrap();

        first.create_snapshot(|_| DataClass::Included).unwrap();
        second.create_snapshot(|_| DataClass::Included).unwrap();
        assert_eq!(first.snapshot_hash().unwrap(), second.snapshot_hash().unwrap());

        let (_dir3, third) = temp_db(&[Collection::Aggregate, Collection::Snapshot]);
        third.insert_aggregated(&aggregated("rA", 1, None)).unwrap();
        third.insert_aggregated(&aggregated("rB", 2, None)).unwrap();
        third.create_snapshot(|_| DataClass::ExcludedNoKey).unwrap();
        assert_ne!(first.snapshot_hash().unwrap(), third.snapshot_hash().unwrap());
    }

    #[test]
    fn test_meta_is_written_once() {
        let (_dir, db) = temp_db(&[Collection::Meta]);
        assert!(db.read_meta().unwrap().is_none());

        let meta = LedgerMeta {
            ledger_index: 60155580,
            total_coins: Decimal::from(99_990_000_000_000_000u64),
            created_at: Utc.with_ymd_and_hms(2020, 12, 12, 0, 0, 0).unwrap(),
        };
        db.write_meta(&meta).unwrap();
        assert_eq!(db.read_meta().unwrap(), Some(meta.clone()));
        assert!(db.write_meta(&meta).is_err());
    }

    #[test]
    fn test_read_meta_without_table() {
        let (_dir, db) = temp_db(&[]);
        assert!(db.read_meta().unwrap().is_none());
    }
}
