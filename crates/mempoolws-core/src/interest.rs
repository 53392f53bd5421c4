//! Interest Set — the subscription intent replayed after a reconnect.
//!
//! Holds the last declared want list and the currently tracked transaction
//! and address. The slots are independent: tracking an address does not
//! disturb the tracked transaction and vice versa.

use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// What the client currently wants pushed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestSet {
    /// Last declared want list, in declaration order.
    pub want: Option<Vec<String>>,
    /// Transaction id being tracked.
    pub tracked_tx_id: Option<String>,
    /// Address being tracked.
    pub tracked_address: Option<String>,
}

impl InterestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a want list as the replay baseline.
    pub fn set_want(&mut self, categories: Vec<String>) {
        self.want = Some(categories);
    }

    /// Record a tracked transaction, replacing any previous one.
    pub fn track_transaction(&mut self, txid: impl Into<String>) {
        self.tracked_tx_id = Some(txid.into());
    }

    /// Record a tracked address, replacing any previous one.
    pub fn track_address(&mut self, address: impl Into<String>) {
        self.tracked_address = Some(address.into());
    }

    /// Forget the tracked transaction once its confirmation was observed.
    /// Returns the id that was tracked, if any.
    pub fn clear_tracked_transaction(&mut self) -> Option<String> {
        self.tracked_tx_id.take()
    }

    /// Returns `true` if nothing would be replayed.
    pub fn is_empty(&self) -> bool {
        self.want.is_none() && self.tracked_tx_id.is_none() && self.tracked_address.is_none()
    }

    /// Intents that restore server-side state, in replay order:
    /// want list, tracked transaction, tracked address.
    pub fn replay_intents(&self) -> Vec<Intent> {
        let mut intents = Vec::with_capacity(3);
        if let Some(want) = &self.want {
            intents.push(Intent::Want(want.clone()));
        }
        if let Some(txid) = &self.tracked_tx_id {
            intents.push(Intent::TrackTransaction(txid.clone()));
        }
        if let Some(address) = &self.tracked_address {
            intents.push(Intent::TrackAddress(address.clone()));
        }
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_replays_nothing() {
        let set = InterestSet::new();
        assert!(set.is_empty());
        assert!(set.replay_intents().is_empty());
    }

    #[test]
    fn tracking_overwrites_previous() {
        let mut set = InterestSet::new();
        set.track_transaction("aaa");
        set.track_transaction("bbb");
        assert_eq!(set.tracked_tx_id.as_deref(), Some("bbb"));
    }

    #[test]
    fn address_and_transaction_are_independent() {
        let mut set = InterestSet::new();
        set.track_transaction("tx1");
        set.track_address("bc1qaddr");
        assert_eq!(set.clear_tracked_transaction().as_deref(), Some("tx1"));
        assert_eq!(set.tracked_address.as_deref(), Some("bc1qaddr"));
        assert!(set.clear_tracked_transaction().is_none());
    }

    #[test]
    fn replay_order() {
        let mut set = InterestSet::new();
        set.track_address("bc1qaddr");
        set.track_transaction("tx1");
        set.set_want(vec!["blocks".into(), "mempool-blocks".into()]);
        assert_eq!(
            set.replay_intents(),
            vec![
                Intent::Want(vec!["blocks".into(), "mempool-blocks".into()]),
                Intent::TrackTransaction("tx1".into()),
                Intent::TrackAddress("bc1qaddr".into()),
            ]
        );
    }
}
