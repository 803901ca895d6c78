use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, instrument, warn};

use engine::feed::{FeedError, FeedEvent, SpotFeed};

use super::backoff::Backoff;

/// Feed client for a JSON relay that forwards PSKReporter MQTT topics as
/// WebSocket text frames.
///
/// On connect it sends `{"action":"subscribe","topics":[...]}`; every text
/// frame afterwards is one spot object.
pub struct WsSpotFeed {
    url: String,
    topics: Vec<String>,
    backoff: Backoff,
}

impl WsSpotFeed {
    pub fn new(url: String, topics: Vec<String>) -> Self {
        Self {
            url,
            topics,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send_subscribe<S>(write: &mut S, topics: &[String]) -> Result<(), FeedError>
    where
        S: futures::Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let request = json!({ "action": "subscribe", "topics": topics });
        let text = request.to_string();
        debug!(payload = %text, "sending subscribe request");

        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| FeedError::Subscribe(e.to_string()))
    }

    /// One connection lifetime. `Ok` carries the reason the session ended.
    async fn session(
        &self,
        events: &Sender<FeedEvent>,
        backoff: &mut Backoff,
    ) -> Result<String, FeedError> {
        let (ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| FeedError::Connect(e.to_string()))?;
        info!("feed websocket connected");

        let (mut write, mut read) = ws.split();
        Self::send_subscribe(&mut write, &self.topics).await?;

        backoff.reset();
        emit(
            events,
            FeedEvent::Connected {
                topics: self.topics.clone(),
            },
        )
        .await?;

        while let Some(msg) = read.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    warn!(error = %e, "feed stream error");
                    return Ok(e.to_string());
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::trace!(raw = text.as_str(), "feed frame");
                    emit(events, FeedEvent::Message(text.as_str().to_owned())).await?;
                }
                Message::Close(frame) => {
                    let reason = frame
                        .map(|f| format!("closed by server: {}", f.reason.as_str()))
                        .unwrap_or_else(|| "closed by server".to_string());
                    return Ok(reason);
                }
                Message::Ping(_) | Message::Pong(_) => debug!("keep-alive"),
                other => debug!(msg_type = ?other, "ignoring non-text frame"),
            }
        }
        Ok("stream ended".to_string())
    }
}

async fn emit(events: &Sender<FeedEvent>, event: FeedEvent) -> Result<(), FeedError> {
    events.send(event).await.map_err(|_| FeedError::ReceiverGone)
}

#[async_trait]
impl SpotFeed for WsSpotFeed {
    #[instrument(skip(self, events), fields(url = %self.url, topics = self.topics.len()))]
    async fn run(&self, events: Sender<FeedEvent>) -> Result<(), FeedError> {
        info!("starting feed worker");
        let mut backoff = self.backoff.clone();

        loop {
            match self.session(&events, &mut backoff).await {
                Ok(reason) => emit(&events, FeedEvent::Disconnected { reason }).await?,
                Err(FeedError::ReceiverGone) => return Err(FeedError::ReceiverGone),
                Err(e) => {
                    // Failed attempts count as reconnects too.
                    warn!(error = %e, "feed session failed");
                    emit(
                        &events,
                        FeedEvent::Disconnected {
                            reason: e.to_string(),
                        },
                    )
                    .await?;
                }
            }

            let delay = backoff.next_delay();
            warn!(delay_s = delay.as_secs(), "reconnecting to feed");
            tokio::time::sleep(delay).await;
        }
    }
}
