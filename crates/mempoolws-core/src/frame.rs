//! Inbound frame classification.
//!
//! An inbound frame is a JSON object whose fields are all optional; any subset
//! may be present at once. [`classify`] turns one frame into zero or more
//! typed [`FeedEvent`]s, one per recognised field, in a fixed order. Unknown
//! fields are ignored and a malformed field is skipped without affecting its
//! siblings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FeedError;

const BLOCKS: &str = "blocks";
const BLOCK: &str = "block";
const TX_CONFIRMED: &str = "txConfirmed";
const CONVERSIONS: &str = "conversions";
const MEMPOOL_BLOCKS: &str = "mempool-blocks";
const GIT_COMMIT: &str = "git-commit";
const ADDRESS_TRANSACTIONS: &str = "address-transactions";
const ADDRESS_BLOCK_TRANSACTIONS: &str = "address-block-transactions";
const LIVE_2H_CHART: &str = "live-2h-chart";
const MEMPOOL_INFO: &str = "mempoolInfo";
const VBYTES_PER_SECOND: &str = "vBytesPerSecond";

/// A block as pushed by the server. Only `height` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    /// A block carrying nothing but its height.
    pub fn at_height(height: u64) -> Self {
        Self {
            height,
            extra: Map::new(),
        }
    }
}

/// A transaction touching a tracked address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub txid: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Pending-transaction metadata combined with the derived throughput figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MempoolStats {
    pub mempool_info: Value,
    pub vbytes_per_second: Option<f64>,
}

/// One typed event extracted from an inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A batch of blocks, in arrival order.
    Blocks(Vec<Block>),
    /// A single block, optionally confirming the tracked transaction.
    Block { block: Block, tx_confirmed: bool },
    /// Fee/price conversion rates.
    Conversions(Value),
    /// Projected next blocks in the mempool.
    MempoolBlocks(Value),
    /// Server build identifier.
    BuildId(String),
    /// Mempool transactions for the tracked address.
    AddressTransactions(Vec<Transaction>),
    /// Newly confirmed transactions for the tracked address.
    AddressBlockTransactions(Vec<Transaction>),
    /// Short-window transaction-rate chart.
    Live2hChart(Value),
    /// Aggregate mempool statistics.
    MempoolStats(MempoolStats),
}

impl FeedEvent {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Blocks(_) => BLOCKS,
            Self::Block { .. } => BLOCK,
            Self::Conversions(_) => CONVERSIONS,
            Self::MempoolBlocks(_) => MEMPOOL_BLOCKS,
            Self::BuildId(_) => GIT_COMMIT,
            Self::AddressTransactions(_) => ADDRESS_TRANSACTIONS,
            Self::AddressBlockTransactions(_) => ADDRESS_BLOCK_TRANSACTIONS,
            Self::Live2hChart(_) => LIVE_2H_CHART,
            Self::MempoolStats(_) => MEMPOOL_INFO,
        }
    }
}

/// Classify the text of one inbound frame.
///
/// Returns an error only when the text is not a JSON object at all.
pub fn classify(text: &str) -> Result<Vec<FeedEvent>, FeedError> {
    let mut obj: Map<String, Value> = serde_json::from_str(text)?;
    let mut events = Vec::new();

    if let Some(blocks) = list::<Block>(&mut obj, BLOCKS) {
        events.push(FeedEvent::Blocks(blocks));
    }

    if let Some(block) = field::<Block>(&mut obj, BLOCK) {
        let tx_confirmed = obj.get(TX_CONFIRMED).map(truthy).unwrap_or(false);
        events.push(FeedEvent::Block {
            block,
            tx_confirmed,
        });
    }

    if let Some(conversions) = field::<Value>(&mut obj, CONVERSIONS) {
        events.push(FeedEvent::Conversions(conversions));
    }

    if let Some(projected) = field::<Value>(&mut obj, MEMPOOL_BLOCKS) {
        events.push(FeedEvent::MempoolBlocks(projected));
    }

    if let Some(build) = field::<String>(&mut obj, GIT_COMMIT) {
        events.push(FeedEvent::BuildId(build));
    }

    if let Some(txs) = list::<Transaction>(&mut obj, ADDRESS_TRANSACTIONS) {
        events.push(FeedEvent::AddressTransactions(txs));
    }

    if let Some(txs) = list::<Transaction>(&mut obj, ADDRESS_BLOCK_TRANSACTIONS) {
        events.push(FeedEvent::AddressBlockTransactions(txs));
    }

    if let Some(chart) = field::<Value>(&mut obj, LIVE_2H_CHART) {
        events.push(FeedEvent::Live2hChart(chart));
    }

    if let Some(mempool_info) = field::<Value>(&mut obj, MEMPOOL_INFO) {
        let vbytes_per_second = obj.get(VBYTES_PER_SECOND).and_then(Value::as_f64);
        events.push(FeedEvent::MempoolStats(MempoolStats {
            mempool_info,
            vbytes_per_second,
        }));
    }

    Ok(events)
}

/// JavaScript-style truthiness; the server relies on it for presence checks.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn field<T: DeserializeOwned>(obj: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.remove(key).filter(truthy)?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(field = key, error = %e, "ignoring malformed field");
            None
        }
    }
}

/// Decode a list field element by element; bad elements are dropped.
fn list<T: DeserializeOwned>(obj: &mut Map<String, Value>, key: &str) -> Option<Vec<T>> {
    let items: Vec<Value> = field(obj, key)?;
    let decoded: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(field = key, error = %e, "ignoring malformed list element");
                None
            }
        })
        .collect();
    (!decoded.is_empty()).then_some(decoded)
}
