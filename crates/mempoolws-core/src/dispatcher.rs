//! Event Dispatcher — routes classified events to the state sink.

use std::sync::Arc;

use crate::build_id::BuildWatcher;
use crate::frame::{Block, FeedEvent};
use crate::interest::InterestSet;
use crate::metrics::FeedMetrics;
use crate::sink::StateSink;
use crate::timer::OneShotTimer;

/// Applies per-field rules and pushes the results to a [`StateSink`].
pub struct EventDispatcher {
    sink: Arc<dyn StateSink>,
    build: BuildWatcher,
    pending_reload: Option<OneShotTimer>,
}

impl EventDispatcher {
    pub fn new(sink: Arc<dyn StateSink>, build: BuildWatcher) -> Self {
        Self {
            sink,
            build,
            pending_reload: None,
        }
    }

    /// The scheduled reload, if a build change was seen.
    pub fn pending_reload(&self) -> Option<&OneShotTimer> {
        self.pending_reload.as_ref()
    }

    /// Dispatch one event. `interests` is mutated when a confirmation clears
    /// the tracked transaction.
    pub fn dispatch(
        &mut self,
        event: FeedEvent,
        interests: &mut InterestSet,
        metrics: &mut FeedMetrics,
    ) {
        match event {
            FeedEvent::Blocks(blocks) => {
                for block in blocks {
                    self.offer_block(block, metrics);
                }
            }
            FeedEvent::Block {
                block,
                tx_confirmed,
            } => {
                if tx_confirmed {
                    self.offer_block(block.clone(), metrics);
                    let txid = interests.clear_tracked_transaction();
                    tracing::info!(height = block.height, txid = ?txid, "tracked transaction confirmed");
                    metrics.confirmations += 1;
                    self.sink.push_tx_confirmed(block);
                } else {
                    self.offer_block(block, metrics);
                }
            }
            FeedEvent::Conversions(conversions) => self.sink.push_conversions(conversions),
            FeedEvent::MempoolBlocks(projected) => self.sink.push_mempool_blocks(projected),
            FeedEvent::BuildId(build) => self.observe_build(&build, metrics),
            FeedEvent::AddressTransactions(txs) => {
                for tx in txs {
                    self.sink.push_mempool_transaction(tx);
                }
            }
            FeedEvent::AddressBlockTransactions(txs) => {
                for tx in txs {
                    self.sink.push_block_transaction(tx);
                }
            }
            FeedEvent::Live2hChart(chart) => self.sink.push_live_2h_chart(chart),
            FeedEvent::MempoolStats(stats) => self.sink.push_mempool_stats(stats),
        }
    }

    /// Emit `block` only if it is strictly higher than the latest known height.
    fn offer_block(&self, block: Block, metrics: &mut FeedMetrics) {
        let latest = self.sink.latest_block_height();
        if block.height > latest {
            self.sink.set_latest_block_height(block.height);
            metrics.blocks_emitted += 1;
            self.sink.push_block(block);
        } else {
            tracing::debug!(height = block.height, latest, "dropping stale block");
            metrics.stale_blocks_dropped += 1;
        }
    }

    fn observe_build(&mut self, build: &str, metrics: &mut FeedMetrics) {
        let Some(delay) = self.build.observe(build) else {
            return;
        };
        tracing::warn!(
            build,
            baseline = self.build.baseline().unwrap_or_default(),
            delay_ms = delay.as_millis() as u64,
            "server build changed, scheduling reload"
        );
        let sink = Arc::clone(&self.sink);
        match OneShotTimer::schedule(delay, move || sink.request_reload()) {
            Some(timer) => {
                metrics.reloads_scheduled += 1;
                self.pending_reload = Some(timer);
            }
            None => tracing::warn!("no async runtime, reload left unscheduled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{MempoolStats, Transaction};
    use crate::sink::ChannelSink;
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (Arc<ChannelSink>, EventDispatcher) {
        let sink = Arc::new(ChannelSink::new(64));
        let dispatcher = EventDispatcher::new(sink.clone(), BuildWatcher::new(1_000, 60_000));
        (sink, dispatcher)
    }

    fn blocks(heights: &[u64]) -> FeedEvent {
        FeedEvent::Blocks(heights.iter().copied().map(Block::at_height).collect())
    }

    #[test]
    fn block_stream_is_strictly_increasing() {
        let (sink, mut dispatcher) = setup();
        let mut rx = sink.blocks();
        let mut interests = InterestSet::new();
        let mut metrics = FeedMetrics::default();

        for batch in [&[5, 3, 6][..], &[6, 6, 2][..], &[9, 7, 10][..]] {
            dispatcher.dispatch(blocks(batch), &mut interests, &mut metrics);
        }

        let mut emitted = Vec::new();
        while let Ok(block) = rx.try_recv() {
            emitted.push(block.height);
        }
        assert_eq!(emitted, vec![5, 6, 9, 10]);
        assert_eq!(sink.latest_block_height(), 10);
        assert_eq!(metrics.blocks_emitted, 4);
        assert_eq!(metrics.stale_blocks_dropped, 5);
    }

    #[test]
    fn confirmation_clears_tracked_transaction() {
        let (sink, mut dispatcher) = setup();
        let mut blocks_rx = sink.blocks();
        let mut confirmed_rx = sink.confirmations();
        sink.set_latest_block_height(800_000);

        let mut interests = InterestSet::new();
        interests.track_transaction("abc");
        let mut metrics = FeedMetrics::default();

        dispatcher.dispatch(
            FeedEvent::Block {
                block: Block::at_height(800_001),
                tx_confirmed: true,
            },
            &mut interests,
            &mut metrics,
        );

        assert_eq!(blocks_rx.try_recv().unwrap().height, 800_001);
        assert_eq!(sink.latest_block_height(), 800_001);
        assert!(interests.tracked_tx_id.is_none());
        assert_eq!(confirmed_rx.try_recv().unwrap().height, 800_001);
        assert!(confirmed_rx.try_recv().is_err());
    }

    #[test]
    fn confirmation_is_emitted_even_for_known_height() {
        let (sink, mut dispatcher) = setup();
        let mut blocks_rx = sink.blocks();
        let mut confirmed_rx = sink.confirmations();
        sink.set_latest_block_height(100);

        let mut interests = InterestSet::new();
        interests.track_transaction("abc");
        dispatcher.dispatch(
            FeedEvent::Block {
                block: Block::at_height(100),
                tx_confirmed: true,
            },
            &mut interests,
            &mut FeedMetrics::default(),
        );

        assert!(blocks_rx.try_recv().is_err());
        assert_eq!(confirmed_rx.try_recv().unwrap().height, 100);
        assert!(interests.tracked_tx_id.is_none());
    }

    #[test]
    fn address_lists_are_flattened_in_order() {
        let (sink, mut dispatcher) = setup();
        let mut mempool_rx = sink.mempool_transactions();
        let mut confirmed_rx = sink.block_transactions();
        let tx = |id: &str| Transaction {
            txid: id.into(),
            extra: Default::default(),
        };
        let mut interests = InterestSet::new();
        let mut metrics = FeedMetrics::default();

        dispatcher.dispatch(
            FeedEvent::AddressTransactions(vec![tx("a"), tx("b")]),
            &mut interests,
            &mut metrics,
        );
        dispatcher.dispatch(
            FeedEvent::AddressBlockTransactions(vec![tx("c")]),
            &mut interests,
            &mut metrics,
        );

        assert_eq!(mempool_rx.try_recv().unwrap().txid, "a");
        assert_eq!(mempool_rx.try_recv().unwrap().txid, "b");
        assert_eq!(confirmed_rx.try_recv().unwrap().txid, "c");
    }

    #[test]
    fn verbatim_payloads_pass_through() {
        let (sink, mut dispatcher) = setup();
        let mut conversions = sink.conversions();
        let mut projected = sink.mempool_blocks();
        let mut stats = sink.mempool_stats();
        let mut interests = InterestSet::new();
        let mut metrics = FeedMetrics::default();

        let events = vec![
            FeedEvent::Conversions(json!({"USD": 61000})),
            FeedEvent::MempoolBlocks(json!([{"nTx": 3000}])),
            FeedEvent::MempoolStats(MempoolStats {
                mempool_info: json!({"size": 12}),
                vbytes_per_second: Some(1800.0),
            }),
        ];
        for event in events {
            dispatcher.dispatch(event, &mut interests, &mut metrics);
        }

        assert_eq!(conversions.try_recv().unwrap(), json!({"USD": 61000}));
        assert_eq!(projected.try_recv().unwrap(), json!([{"nTx": 3000}]));
        let stats = stats.try_recv().unwrap();
        assert_eq!(stats.mempool_info["size"], 12);
        assert_eq!(stats.vbytes_per_second, Some(1800.0));
    }

    #[tokio::test(start_paused = true)]
    async fn build_change_schedules_one_reload() {
        let (sink, mut dispatcher) = setup();
        let mut reloads = sink.reloads();
        let mut interests = InterestSet::new();
        let mut metrics = FeedMetrics::default();

        for build in ["abc", "abc", "def", "def", "ghi"] {
            dispatcher.dispatch(FeedEvent::BuildId(build.into()), &mut interests, &mut metrics);
        }
        let delay = dispatcher.pending_reload().expect("reload pending").delay();
        assert!(delay >= Duration::from_millis(1_000) && delay < Duration::from_millis(61_000));
        assert_eq!(metrics.reloads_scheduled, 1);

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert!(reloads.try_recv().is_ok());
        assert!(reloads.try_recv().is_err());
    }

    #[test]
    fn build_change_without_runtime_does_not_panic() {
        let (sink, mut dispatcher) = setup();
        let mut reloads = sink.reloads();
        let mut metrics = FeedMetrics::default();
        for build in ["abc", "def"] {
            dispatcher.dispatch(FeedEvent::BuildId(build.into()), &mut InterestSet::new(), &mut metrics);
        }
        assert!(dispatcher.pending_reload().is_none());
        assert_eq!(metrics.reloads_scheduled, 0);
        assert!(reloads.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn identical_builds_never_reload() {
        let (sink, mut dispatcher) = setup();
        let mut reloads = sink.reloads();
        for _ in 0..5 {
            dispatcher.dispatch(
                FeedEvent::BuildId("abc".into()),
                &mut InterestSet::new(),
                &mut FeedMetrics::default(),
            );
        }
        assert!(dispatcher.pending_reload().is_none());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(reloads.try_recv().is_err());
    }

    mod proptests {
        use super::*;
        use proptest::collection::vec;
        use proptest::prelude::*;

        /// Heights the dispatcher must emit: each one strictly above the
        /// start and every height offered before it.
        fn expected(start: u64, batches: &[Vec<u64>]) -> Vec<u64> {
            let mut highest = start;
            let mut out = Vec::new();
            for &height in batches.iter().flatten() {
                if height > highest {
                    highest = height;
                    out.push(height);
                }
            }
            out
        }

        fn run(start: u64, batches: &[Vec<u64>]) -> Vec<u64> {
            let sink = Arc::new(ChannelSink::new(1_024));
            let mut dispatcher =
                EventDispatcher::new(sink.clone(), BuildWatcher::new(1_000, 60_000));
            sink.set_latest_block_height(start);
            let mut rx = sink.blocks();
            let mut interests = InterestSet::new();
            let mut metrics = FeedMetrics::default();
            for batch in batches {
                dispatcher.dispatch(blocks(batch), &mut interests, &mut metrics);
            }
            let mut emitted = Vec::new();
            while let Ok(block) = rx.try_recv() {
                emitted.push(block.height);
            }
            emitted
        }

        proptest! {
            #[test]
            fn emitted_heights_strictly_increase(
                start in 0u64..2_000,
                batches in vec(vec(0u64..2_000, 0..16), 0..16),
            ) {
                let emitted = run(start, &batches);
                let mut highest = start;
                for &height in &emitted {
                    prop_assert!(height > highest);
                    highest = height;
                }
                prop_assert_eq!(emitted, expected(start, &batches));
            }

            #[test]
            fn any_start_height_filters_stale_blocks(
                start in any::<u64>(),
                batches in vec(vec(any::<u64>(), 0..8), 0..8),
            ) {
                let emitted = run(start, &batches);
                prop_assert!(emitted.iter().all(|&h| h > start));
                prop_assert!(emitted.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(emitted, expected(start, &batches));
            }
        }
    }
}
