//! Outbound intent frames.
//!
//! Each intent is a single JSON object on the wire. The fields are mutually
//! exclusive per message:
//!
//! ```text
//! {"action":"init"}
//! {"action":"want","data":["blocks","mempool-blocks"]}
//! {"track-tx":"<txid>"}
//! {"track-address":"<address>"}
//! {"historicalDate":"<date>"}
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::FeedError;

/// Push categories understood by the server.
pub mod categories {
    pub const BLOCKS: &str = "blocks";
    pub const MEMPOOL_BLOCKS: &str = "mempool-blocks";
    pub const STATS: &str = "stats";
    pub const LIVE_2H_CHART: &str = "live-2h-chart";
}

/// A message expressing what the client wants from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Opens (or re-opens) the logical session.
    Init,
    /// Declares the push categories the client wants, in order.
    Want(Vec<String>),
    /// Begin tracking a transaction id.
    TrackTransaction(String),
    /// Begin tracking an address.
    TrackAddress(String),
    /// Request historical statistics for a date. The answer arrives as an
    /// ordinary inbound event.
    HistoricalStatistics(String),
}

impl Intent {
    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Want(_) => "want",
            Self::TrackTransaction(_) => "track-tx",
            Self::TrackAddress(_) => "track-address",
            Self::HistoricalStatistics(_) => "historicalDate",
        }
    }

    /// Encode as the text payload of one WebSocket frame.
    pub fn to_text(&self) -> Result<String, FeedError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Init => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("action", "init")?;
                map.end()
            }
            Self::Want(data) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("action", "want")?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            Self::TrackTransaction(txid) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("track-tx", txid)?;
                map.end()
            }
            Self::TrackAddress(address) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("track-address", address)?;
                map.end()
            }
            Self::HistoricalStatistics(date) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("historicalDate", date)?;
                map.end()
            }
        }
    }
}
