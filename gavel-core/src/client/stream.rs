//! Live push channel over server-sent events.
//!
//! The server emits named frames (`response`, `verdict`, ...) whose data is a
//! JSON-encoded timeline event, plus `heartbeat` frames carrying no event.
//! A background task owns the connection and forwards typed frames over an
//! unbounded channel; the consumer drains the queue synchronously on each
//! tick, so transport mechanics never touch merge logic.
//!
//! At most one channel is live per selected run: opening a new subscription
//! aborts the previous task first. Each subscription carries the generation
//! it was opened under, so frames from an aborted task that are still queued
//! can be discarded by the consumer.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::reconcile::EventBuffer;
use crate::types::TimelineEvent;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// Connection status shown in the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    /// Lost or refused; the task keeps retrying
    Error,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Idle => "idle",
            ChannelStatus::Connecting => "connecting",
            ChannelStatus::Connected => "connected",
            ChannelStatus::Error => "error/retrying",
        }
    }
}

/// One typed frame delivered by the channel task.
#[derive(Debug)]
pub enum ChannelFrame {
    /// The connection was (re)established
    Opened,
    /// A timeline event arrived
    Event(Box<TimelineEvent>),
    /// Keepalive with no event payload
    Heartbeat,
    /// The connection failed; a reconnect attempt follows
    Error(String),
}

/// Map a named SSE frame to a typed channel frame.
///
/// Unparseable event data is surfaced as an error frame rather than dropped
/// silently; reconciliation is idempotent so the event is recovered by the
/// next historical fetch.
pub fn map_frame(name: &str, data: &str) -> ChannelFrame {
    if name == "heartbeat" {
        return ChannelFrame::Heartbeat;
    }
    match serde_json::from_str::<TimelineEvent>(data) {
        Ok(event) => ChannelFrame::Event(Box::new(event)),
        Err(e) => ChannelFrame::Error(format!("malformed {} frame: {}", name, e)),
    }
}

/// Fold one frame into the buffer and connection status.
///
/// Returns true when the buffer changed (the caller recomputes derived state
/// only then). A heartbeat updates the status but never the buffer.
pub fn apply_frame(
    frame: ChannelFrame,
    buffer: &mut EventBuffer,
    status: &mut ChannelStatus,
) -> bool {
    match frame {
        ChannelFrame::Opened => {
            *status = ChannelStatus::Connected;
            false
        }
        ChannelFrame::Heartbeat => {
            *status = ChannelStatus::Connected;
            false
        }
        ChannelFrame::Event(event) => {
            *status = ChannelStatus::Connected;
            buffer.push_live(*event);
            true
        }
        ChannelFrame::Error(message) => {
            tracing::warn!(error = %message, "Live channel error");
            *status = ChannelStatus::Error;
            false
        }
    }
}

/// Handle to one open channel.
pub struct Subscription {
    /// Generation the subscription was opened under
    pub generation: u64,
    receiver: mpsc::UnboundedReceiver<ChannelFrame>,
    handle: JoinHandle<()>,
    closed: bool,
}

impl Subscription {
    /// Drain one queued frame without blocking.
    pub fn try_recv(&mut self) -> Option<ChannelFrame> {
        self.receiver.try_recv().ok()
    }

    /// Abort the connection task. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.handle.abort();
            self.closed = true;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns the single live connection and its generation counter.
pub struct LiveChannel {
    http_client: reqwest::Client,
    generation: u64,
    current: Option<tokio::task::AbortHandle>,
}

impl Default for LiveChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveChannel {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            generation: 0,
            current: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open a channel to `url`, closing any previous one first.
    ///
    /// Must be called from within a tokio runtime. An abort handle is also
    /// retained internally so a later `open` or `close` tears the task down
    /// even if the caller already dropped the subscription.
    pub fn open(&mut self, url: String) -> Subscription {
        self.close();
        self.generation = self.generation.wrapping_add(1);

        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.http_client.clone();
        let generation = self.generation;

        let handle = tokio::spawn(async move {
            run_channel(client, url, tx).await;
        });
        self.current = Some(handle.abort_handle());

        tracing::debug!(generation, "Live channel opened");
        Subscription {
            generation,
            receiver: rx,
            handle,
            closed: false,
        }
    }

    /// Close the open channel, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}

/// Connection loop: connect, forward frames, reconnect with backoff.
async fn run_channel(
    client: reqwest::Client,
    url: String,
    tx: mpsc::UnboundedSender<ChannelFrame>,
) {
    let mut delay = INITIAL_RECONNECT_DELAY;

    loop {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                if tx.send(ChannelFrame::Opened).is_err() {
                    return;
                }
                delay = INITIAL_RECONNECT_DELAY;

                let mut stream = response.bytes_stream().eventsource();
                while let Some(item) = stream.next().await {
                    let frame = match item {
                        Ok(event) => map_frame(&event.event, &event.data),
                        Err(e) => ChannelFrame::Error(format!("stream failed: {}", e)),
                    };
                    let is_error = matches!(frame, ChannelFrame::Error(_));
                    if tx.send(frame).is_err() {
                        return;
                    }
                    if is_error {
                        break;
                    }
                }
                // Server closed the stream; fall through to reconnect.
            }
            Ok(response) => {
                let message = format!("stream endpoint returned {}", response.status());
                if tx.send(ChannelFrame::Error(message)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let message = format!("stream connection failed: {}", e);
                if tx.send(ChannelFrame::Error(message)).is_err() {
                    return;
                }
            }
        }

        tokio::time::sleep(delay).await;
        delay = std::cmp::min(delay * 2, MAX_RECONNECT_DELAY);
    }
}
