use indicatif::ProgressBar;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};
use crate::{
    error::{Result, SnapshotError},
    storage::{
        models::{LedgerMeta, MinifiedRecord},
        Database,
    },
    xrpl::{codec, connection::LedgerConnection, drops::parse_drops, objects::RawLedgerObject},
};

/// Counters for a finished dump
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpSummary {
    pub pages: u64,
    pub total_objects: u64,
    pub kept_records: u64,
}

/// One `ledger_data` entry in binary form
#[derive(Debug, Deserialize)]
struct BinaryEntry {
    data: String,
    index: String,
}

struct StatePage {
    entries: Vec<BinaryEntry>,
    marker: Option<Value>,
}

/// Downloads the ledger state page by page and stores the relevant records
pub struct DumpFetcher<'a, C> {
    connection: &'a C,
    db: &'a Database,
    timeout: Option<Duration>,
    page_limit: Option<u32>,
    progress: Option<ProgressBar>,
}

impl<'a, C: LedgerConnection> DumpFetcher<'a, C> {
    pub fn new(connection: &'a C, db: &'a Database) -> Self {
        Self {
            connection,
            db,
            timeout: None,
            page_limit: None,
            progress: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_page_limit(mut self, limit: Option<u32>) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Store ledger metadata, then every account root and escrow of the ledger
    pub async fn fetch(&self, ledger_index: u32) -> Result<DumpSummary> {
        let meta = self.fetch_meta(ledger_index).await?;
        info!("Ledger {} holds {} drops", meta.ledger_index, meta.total_coins);

        self.fetch_objects(ledger_index).await
    }

    async fn fetch_meta(&self, ledger_index: u32) -> Result<LedgerMeta> {
        let response = self
            .connection
            .request(json!({ "command": "ledger", "ledger_index": ledger_index }), self.timeout)
            .await?;

        let meta = parse_meta(&response, ledger_index)?;
        self.db.write_meta(&meta)?;
        Ok(meta)
    }

    async fn fetch_objects(&self, ledger_index: u32) -> Result<DumpSummary> {
        let mut summary = DumpSummary::default();
        let mut marker: Option<Value> = None;

        loop {
            let mut payload = Map::new();
            payload.insert("command".to_string(), json!("ledger_data"));
            payload.insert("ledger_index".to_string(), json!(ledger_index));
            payload.insert("binary".to_string(), json!(true));
            if let Some(limit) = self.page_limit {
                payload.insert("limit".to_string(), json!(limit));
            }
            if let Some(marker) = marker.take() {
                payload.insert("marker".to_string(), marker);
            }

            let response = self.connection.request(Value::Object(payload), self.timeout).await?;
            let page = parse_page(response)?;

            let received = page.entries.len() as u64;
            let records = minify_entries(&page.entries)?;
            if !records.is_empty() {
                self.db.insert_dump(&records)?;
            }

            summary.pages += 1;
            summary.total_objects += received;
            summary.kept_records += records.len() as u64;

            debug!(
                "Filtered {} of {} total objects received (marker: {:?})",
                records.len(),
                received,
                page.marker
            );
            if let Some(progress) = &self.progress {
                progress.set_message(format!(
                    "{} pages, kept {} of {} objects",
                    summary.pages, summary.kept_records, summary.total_objects
                ));
            }

            match page.marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(summary)
    }
}

fn parse_meta(response: &Value, requested: u32) -> Result<LedgerMeta> {
    let ledger = response
        .get("ledger")
        .ok_or_else(|| SnapshotError::Protocol("ledger response has no ledger object".to_string()))?;

    let reported = response
        .get("ledger_index")
        .or_else(|| ledger.get("ledger_index"))
        .and_then(|index| match index {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        });
    if let Some(reported) = reported {
        if reported != requested as u64 {
            return Err(SnapshotError::Protocol(format!(
                "requested ledger {} but node returned {}",
                requested, reported
            )));
        }
    }

    let total_coins = ledger
        .get("total_coins")
        .and_then(Value::as_str)
        .ok_or_else(|| SnapshotError::Protocol("ledger has no total_coins".to_string()))?;
    let total_coins: Decimal = parse_drops(total_coins)?;

    Ok(LedgerMeta {
        ledger_index: requested,
        total_coins,
        created_at: chrono::Utc::now(),
    })
}

fn parse_page(response: Value) -> Result<StatePage> {
    let mut response = match response {
        Value::Object(map) => map,
        _ => return Err(SnapshotError::Protocol("ledger_data result is not an object".to_string())),
    };

    let entries = match response.remove("state") {
        None => return Err(SnapshotError::Protocol("ledger_data response has no state".to_string())),
        Some(Value::Null) => Vec::new(),
        Some(state) => serde_json::from_value(state)
            .map_err(|e| SnapshotError::Protocol(format!("malformed ledger_data state: {}", e)))?,
    };

    let marker = match response.remove("marker") {
        None | Some(Value::Null) => None,
        Some(marker) => Some(marker),
    };

    Ok(StatePage { entries, marker })
}

fn minify_entries(entries: &[BinaryEntry]) -> Result<Vec<MinifiedRecord>> {
    let mut records = Vec::new();
    for entry in entries {
        let data = codec::decode_hex(&entry.data)?;
        let object = RawLedgerObject::decode(&entry.index, &data)?;
        if !object.entry_type.is_relevant() {
            continue;
        }
        if let Some(record) = object.minify()? {
            records.push(record);
        }
    }
    Ok(records)
}
