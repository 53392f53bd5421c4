//! mempoolws-core — frame types and state handling for the mempool WebSocket feed.
//!
//! # Overview
//!
//! One persistent connection carries several kinds of pushed data. This
//! crate holds everything that does not touch the socket:
//!
//! - [`Intent`] — outbound intent frames (`init`, `want`, tracking, history)
//! - [`classify`] / [`FeedEvent`] — inbound frame decoding into typed events
//! - [`InterestSet`] — what gets replayed after a reconnect
//! - [`ReconnectionCoordinator`] — connection state and the one-shot replay
//! - [`EventDispatcher`] — height filtering, confirmations, build tracking
//! - [`StateSink`] / [`ChannelSink`] — where events end up
//! - [`FeedSession`] — all of the above behind a single lock

pub mod build_id;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod intent;
pub mod interest;
pub mod metrics;
pub mod session;
pub mod sink;
pub mod state;
pub mod timer;

pub use build_id::BuildWatcher;
pub use config::FeedConfig;
pub use coordinator::{ReconnectionCoordinator, Resume};
pub use dispatcher::EventDispatcher;
pub use error::FeedError;
pub use frame::{classify, Block, FeedEvent, MempoolStats, Transaction};
pub use intent::{categories, Intent};
pub use interest::InterestSet;
pub use metrics::FeedMetrics;
pub use session::{FeedSession, PendingFrame};
pub use sink::{ChannelSink, StateSink};
pub use state::ConnectionState;
pub use timer::OneShotTimer;
