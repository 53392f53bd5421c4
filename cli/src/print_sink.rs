//! A state sink that writes every event to stdout as one JSON line.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{json, Value};

use mempoolws_core::{Block, MempoolStats, StateSink, Transaction};

#[derive(Default)]
pub struct PrintSink {
    latest_block_height: AtomicU64,
}

impl PrintSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, event: &str, data: impl Serialize) {
        let line = json!({ "event": event, "data": data });
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            tracing::error!(error = %e, "failed to write event");
        }
    }
}

impl StateSink for PrintSink {
    fn push_block(&self, block: Block) {
        self.emit("block", block);
    }

    fn push_tx_confirmed(&self, block: Block) {
        self.emit("tx-confirmed", block);
    }

    fn push_conversions(&self, conversions: Value) {
        self.emit("conversions", conversions);
    }

    fn push_mempool_blocks(&self, projected: Value) {
        self.emit("mempool-blocks", projected);
    }

    fn push_mempool_transaction(&self, tx: Transaction) {
        self.emit("address-transaction", tx);
    }

    fn push_block_transaction(&self, tx: Transaction) {
        self.emit("address-block-transaction", tx);
    }

    fn push_live_2h_chart(&self, chart: Value) {
        self.emit("live-2h-chart", chart);
    }

    fn push_mempool_stats(&self, stats: MempoolStats) {
        self.emit("mempool-stats", stats);
    }

    fn set_offline(&self, offline: bool) {
        self.emit("offline", offline);
    }

    fn latest_block_height(&self) -> u64 {
        self.latest_block_height.load(Ordering::Acquire)
    }

    fn set_latest_block_height(&self, height: u64) {
        self.latest_block_height.store(height, Ordering::Release);
    }

    fn request_reload(&self) {
        self.emit("reload", Value::Null);
    }
}
