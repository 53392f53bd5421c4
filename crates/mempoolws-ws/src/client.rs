//! Feed client: one WebSocket connection, fixed-delay reconnect, interest replay.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use mempoolws_core::{
    ConnectionState, FeedConfig, FeedError, FeedMetrics, FeedSession, Intent, InterestSet,
    StateSink,
};

use crate::retry::ReconnectSchedule;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Command sent from callers to the background task.
enum Command {
    Send(Intent),
    Close,
}

/// Why a live connection ended.
enum Disconnect {
    /// The client was closed or dropped.
    Closed,
    /// Transport failure; reconnect after the retry delay.
    Failed(FeedError),
}

/// Outcome of one connect attempt.
enum Attempt {
    Connected(WsStream),
    Failed(FeedError),
    /// The client closed while the handshake was in flight.
    Closed,
}

/// Handle to the feed.
///
/// A background task owns the WebSocket connection. Every connection attempt
/// starts with an `init` frame; on any transport failure the feed goes
/// offline and a new attempt is made after the configured delay, forever.
/// After a reconnect the Interest Set is replayed before the first frame is
/// dispatched.
///
/// Intent operations never block and never wait for acknowledgement. While a
/// retry delay is pending they are dropped; the Interest Set still records
/// wants and tracked entities so the replay covers them.
pub struct FeedClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<Command>,
    session: FeedSession,
}

impl FeedClient {
    /// Validate `config`, then start the background task. Returns
    /// immediately; the first connection attempt happens in the background.
    pub async fn connect(
        config: FeedConfig,
        sink: Arc<dyn StateSink>,
    ) -> Result<Self, FeedError> {
        config.validate()?;
        let session = FeedSession::new(&config, sink);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();
        let url = config.url.clone();

        tokio::spawn(feed_task(
            url.clone(),
            config.retry_delay(),
            cmd_rx,
            session.clone(),
        ));

        Ok(Self {
            url,
            cmd_tx,
            session,
        })
    }

    /// Declare the wanted push categories; replayed after every reconnect.
    pub fn want<I, S>(&self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let intent = self
            .session
            .want(categories.into_iter().map(Into::into).collect());
        self.send(intent);
    }

    /// Track a transaction id. Replaces any previously tracked transaction.
    pub fn track_transaction(&self, txid: impl Into<String>) {
        let intent = self.session.track_transaction(txid);
        self.send(intent);
    }

    /// Track an address. Replaces any previously tracked address; independent
    /// of the tracked transaction.
    pub fn track_address(&self, address: impl Into<String>) {
        let intent = self.session.track_address(address);
        self.send(intent);
    }

    /// Ask for historical statistics. The answer arrives as an ordinary
    /// inbound event with no correlation to this call.
    pub fn fetch_historical_statistics(&self, date: impl Into<String>) {
        let intent = self.session.historical_statistics(date);
        self.send(intent);
    }

    /// Stop the background task. Also happens on drop.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Snapshot of what would be replayed after a reconnect.
    pub fn interests(&self) -> InterestSet {
        self.session.interests()
    }

    pub fn metrics(&self) -> FeedMetrics {
        self.session.metrics()
    }

    fn send(&self, intent: Intent) {
        if let Err(mpsc::error::SendError(Command::Send(intent))) =
            self.cmd_tx.send(Command::Send(intent))
        {
            self.session.note_dropped(&intent);
        }
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Close);
    }
}

/// Background task that owns the WebSocket connection.
async fn feed_task(
    url: String,
    retry_delay: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    session: FeedSession,
) {
    let mut schedule = ReconnectSchedule::new(retry_delay);

    loop {
        tracing::info!(url = %url, "connecting to feed");

        let mut queued = Vec::new();
        let error = match connect(&url, &mut cmd_rx, &mut queued).await {
            Attempt::Closed => {
                tracing::info!(url = %url, "feed closed while connecting");
                return;
            }
            Attempt::Failed(e) => e,
            Attempt::Connected(ws_stream) => {
                let (mut sink, mut stream) = ws_stream.split();
                match run_connection(&mut sink, &mut stream, &mut cmd_rx, queued, &session).await {
                    Disconnect::Closed => {
                        let _ = sink.close().await;
                        tracing::info!(url = %url, "feed closed");
                        return;
                    }
                    Disconnect::Failed(e) => e,
                }
            }
        };

        session.on_transport_error(&error);
        let delay = schedule.next_delay();
        tracing::warn!(
            url = %url,
            attempt = schedule.attempts(),
            "reconnecting in {delay:?}"
        );
        if !wait_for_retry(delay, &mut cmd_rx, &session).await {
            tracing::info!(url = %url, "feed closed while offline");
            return;
        }
    }
}

/// Open the socket while still listening for callers. Intents issued during
/// the handshake are queued for the new connection.
async fn connect(
    url: &str,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    queued: &mut Vec<Intent>,
) -> Attempt {
    let connecting = tokio_tungstenite::connect_async(url);
    tokio::pin!(connecting);

    loop {
        tokio::select! {
            result = &mut connecting => {
                return match result {
                    Ok((ws_stream, _)) => Attempt::Connected(ws_stream),
                    Err(e) => Attempt::Failed(FeedError::WebSocket(format!("connect failed: {e}"))),
                };
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(Command::Close) => return Attempt::Closed,
                    Some(Command::Send(intent)) => queued.push(intent),
                }
            }
        }
    }
}

/// Drive one live connection until it fails or the client closes.
async fn run_connection(
    sink: &mut WsSink,
    stream: &mut WsSource,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    queued: Vec<Intent>,
    session: &FeedSession,
) -> Disconnect {
    if let Err(e) = send_intent(sink, &session.handshake()).await {
        return Disconnect::Failed(e);
    }
    for intent in &queued {
        if let Err(e) = send_intent(sink, intent).await {
            return Disconnect::Failed(e);
        }
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(Command::Close) => return Disconnect::Closed,
                    Some(Command::Send(intent)) => {
                        if let Err(e) = send_intent(sink, &intent).await {
                            return Disconnect::Failed(e);
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    None => return Disconnect::Failed(FeedError::Closed),
                    Some(Err(e)) => return Disconnect::Failed(FeedError::WebSocket(e.to_string())),
                    Some(Ok(Message::Text(text))) => {
                        let frame = session.receive(text.as_str());
                        for intent in frame.replay() {
                            if let Err(e) = send_intent(sink, intent).await {
                                return Disconnect::Failed(e);
                            }
                        }
                        session.apply(frame);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(frame = ?frame, "close frame from server");
                        return Disconnect::Failed(FeedError::Closed);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::debug!("ignoring binary frame");
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Sleep out the retry delay, dropping intents issued meanwhile.
/// Returns `false` if the client closed.
async fn wait_for_retry(
    delay: Duration,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    session: &FeedSession,
) -> bool {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(Command::Close) => return false,
                    Some(Command::Send(intent)) => session.note_dropped(&intent),
                }
            }
        }
    }
}

/// Write one intent. Only transport failures end the connection; anything
/// else skips the intent.
async fn send_intent(sink: &mut WsSink, intent: &Intent) -> Result<(), FeedError> {
    let result = write(sink, intent).await;
    keep_connection(intent, result)
}

fn keep_connection(intent: &Intent, result: Result<(), FeedError>) -> Result<(), FeedError> {
    match result {
        Err(e) if !e.is_transport() => {
            tracing::warn!(intent = intent.kind(), error = %e, "skipping intent");
            Ok(())
        }
        other => other,
    }
}

async fn write(sink: &mut WsSink, intent: &Intent) -> Result<(), FeedError> {
    let text = intent.to_text()?;
    tracing::debug!(intent = intent.kind(), "sending intent");
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| FeedError::WebSocket(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_write_errors_end_the_connection() {
        let intent = Intent::Init;
        assert!(matches!(
            keep_connection(&intent, Err(FeedError::WebSocket("broken pipe".into()))),
            Err(FeedError::WebSocket(_))
        ));
        assert!(matches!(
            keep_connection(&intent, Err(FeedError::Closed)),
            Err(FeedError::Closed)
        ));
    }

    #[test]
    fn encoding_errors_skip_the_intent() {
        let intent = Intent::HistoricalStatistics("1y".into());
        let decode = serde_json::from_str::<u8>("x").unwrap_err();
        assert!(keep_connection(&intent, Err(FeedError::from(decode))).is_ok());
        assert!(keep_connection(&intent, Ok(())).is_ok());
    }
}
