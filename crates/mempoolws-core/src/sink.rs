//! The consumer side: where dispatched events are pushed.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::config::FeedConfig;
use crate::frame::{Block, MempoolStats, Transaction};

/// Push points for every output stream plus the two shared flags.
///
/// Implementations must be `Send + Sync`; pushes are made from the task that
/// owns the connection and must not block.
pub trait StateSink: Send + Sync + 'static {
    /// A block newer than any seen before.
    fn push_block(&self, block: Block);
    /// The tracked transaction was confirmed in `block`.
    fn push_tx_confirmed(&self, block: Block);
    fn push_conversions(&self, conversions: Value);
    fn push_mempool_blocks(&self, projected: Value);
    /// A mempool transaction touching the tracked address.
    fn push_mempool_transaction(&self, tx: Transaction);
    /// A newly confirmed transaction touching the tracked address.
    fn push_block_transaction(&self, tx: Transaction);
    fn push_live_2h_chart(&self, chart: Value);
    fn push_mempool_stats(&self, stats: MempoolStats);

    /// Connectivity flag observed by consumers.
    fn set_offline(&self, offline: bool);

    /// Highest block height known to the consumer.
    fn latest_block_height(&self) -> u64;
    fn set_latest_block_height(&self, height: u64);

    /// The server build changed; the consumer should fully reload.
    fn request_reload(&self);
}

/// A [`StateSink`] backed by Tokio channels.
///
/// Every output is a `broadcast` stream so any number of consumers can
/// subscribe; the offline flag is a `watch`. Subscribe before connecting to
/// avoid missing events.
pub struct ChannelSink {
    blocks: broadcast::Sender<Block>,
    confirmations: broadcast::Sender<Block>,
    conversions: broadcast::Sender<Value>,
    mempool_blocks: broadcast::Sender<Value>,
    mempool_transactions: broadcast::Sender<Transaction>,
    block_transactions: broadcast::Sender<Transaction>,
    live_2h_chart: broadcast::Sender<Value>,
    mempool_stats: broadcast::Sender<MempoolStats>,
    reloads: broadcast::Sender<()>,
    offline: watch::Sender<bool>,
    latest_block_height: AtomicU64,
}

impl ChannelSink {
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: broadcast::channel(capacity).0,
            confirmations: broadcast::channel(capacity).0,
            conversions: broadcast::channel(capacity).0,
            mempool_blocks: broadcast::channel(capacity).0,
            mempool_transactions: broadcast::channel(capacity).0,
            block_transactions: broadcast::channel(capacity).0,
            live_2h_chart: broadcast::channel(capacity).0,
            mempool_stats: broadcast::channel(capacity).0,
            reloads: broadcast::channel(capacity).0,
            offline: watch::channel(false).0,
            latest_block_height: AtomicU64::new(0),
        }
    }

    /// Sink sized by `config.channel_capacity`.
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.channel_capacity)
    }

    pub fn blocks(&self) -> broadcast::Receiver<Block> {
        self.blocks.subscribe()
    }

    pub fn confirmations(&self) -> broadcast::Receiver<Block> {
        self.confirmations.subscribe()
    }

    pub fn conversions(&self) -> broadcast::Receiver<Value> {
        self.conversions.subscribe()
    }

    pub fn mempool_blocks(&self) -> broadcast::Receiver<Value> {
        self.mempool_blocks.subscribe()
    }

    pub fn mempool_transactions(&self) -> broadcast::Receiver<Transaction> {
        self.mempool_transactions.subscribe()
    }

    pub fn block_transactions(&self) -> broadcast::Receiver<Transaction> {
        self.block_transactions.subscribe()
    }

    pub fn live_2h_chart(&self) -> broadcast::Receiver<Value> {
        self.live_2h_chart.subscribe()
    }

    pub fn mempool_stats(&self) -> broadcast::Receiver<MempoolStats> {
        self.mempool_stats.subscribe()
    }

    pub fn reloads(&self) -> broadcast::Receiver<()> {
        self.reloads.subscribe()
    }

    pub fn offline(&self) -> watch::Receiver<bool> {
        self.offline.subscribe()
    }

    pub fn is_offline(&self) -> bool {
        *self.offline.borrow()
    }
}

impl Default for ChannelSink {
    fn default() -> Self {
        Self::new(1_024)
    }
}

// A send error only means nobody is subscribed to that stream.
impl StateSink for ChannelSink {
    fn push_block(&self, block: Block) {
        let _ = self.blocks.send(block);
    }

    fn push_tx_confirmed(&self, block: Block) {
        let _ = self.confirmations.send(block);
    }

    fn push_conversions(&self, conversions: Value) {
        let _ = self.conversions.send(conversions);
    }

    fn push_mempool_blocks(&self, projected: Value) {
        let _ = self.mempool_blocks.send(projected);
    }

    fn push_mempool_transaction(&self, tx: Transaction) {
        let _ = self.mempool_transactions.send(tx);
    }

    fn push_block_transaction(&self, tx: Transaction) {
        let _ = self.block_transactions.send(tx);
    }

    fn push_live_2h_chart(&self, chart: Value) {
        let _ = self.live_2h_chart.send(chart);
    }

    fn push_mempool_stats(&self, stats: MempoolStats) {
        let _ = self.mempool_stats.send(stats);
    }

    fn set_offline(&self, offline: bool) {
        self.offline.send_replace(offline);
    }

    fn latest_block_height(&self) -> u64 {
        self.latest_block_height.load(Ordering::Acquire)
    }

    fn set_latest_block_height(&self, height: u64) {
        self.latest_block_height.store(height, Ordering::Release);
    }

    fn request_reload(&self) {
        let _ = self.reloads.send(());
    }
}
