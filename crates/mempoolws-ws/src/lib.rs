//! mempoolws-ws — WebSocket transport for the mempool feed.
//!
//! # Features
//! - Single persistent connection, `init` handshake on every attempt
//! - Reconnect after a fixed delay, forever
//! - Interest Set replay after reconnect (want list, tracked tx, tracked address)
//! - Non-blocking intent operations from any task

pub mod client;
pub mod retry;

pub use client::FeedClient;
pub use retry::ReconnectSchedule;
