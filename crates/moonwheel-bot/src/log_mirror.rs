//! Mirrors WARN and ERROR events from the moonwheel crates to a chat channel.
//!
//! The layer only queues lines on a bounded channel; [`forward`] drains it
//! from a task and posts each line. When the queue is full, lines are
//! counted and reported with the next line that gets through.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::field::{Field, Visit};
use tracing::{warn, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use moonwheel_discord::DiscordChatClient;

/// Lines waiting to be posted before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 64;
/// Chat messages are capped at 2000 characters.
const MAX_LINE_CHARS: usize = 1900;
const MIRRORED_PREFIX: &str = "moonwheel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogLine {
    pub fn render(&self) -> String {
        let icon = if self.level == Level::ERROR {
            "\u{274c}"
        } else {
            "\u{26a0}\u{fe0f}"
        };
        let mut text = format!("{} **{}** `{}`: {}", icon, self.level, self.target, self.message);
        for (name, value) in &self.fields {
            text.push_str(&format!(" {}={}", name, value));
        }
        if text.chars().count() > MAX_LINE_CHARS {
            text = text.chars().take(MAX_LINE_CHARS).collect();
            text.push('\u{2026}');
        }
        text
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}

pub struct MirrorLayer {
    tx: mpsc::Sender<LogLine>,
    dropped: Arc<AtomicUsize>,
}

/// Build the layer and the queue it feeds.
pub fn layer(capacity: usize) -> (MirrorLayer, MirrorQueue) {
    let (tx, rx) = mpsc::channel(capacity);
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        MirrorLayer {
            tx,
            dropped: Arc::clone(&dropped),
        },
        MirrorQueue { rx, dropped },
    )
}

/// Receiving end of the mirror layer.
pub struct MirrorQueue {
    rx: mpsc::Receiver<LogLine>,
    dropped: Arc<AtomicUsize>,
}

impl MirrorQueue {
    /// Wait for the next line. `None` once every layer handle is gone.
    pub async fn recv(&mut self) -> Option<LogLine> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LogLine> {
        self.rx.try_recv().ok()
    }

    /// Lines lost to a full queue since the last call.
    pub fn take_dropped(&self) -> usize {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl<S: Subscriber> Layer<S> for MirrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        // More verbose levels compare greater.
        if *meta.level() > Level::WARN {
            return;
        }
        // Posting failures are logged from this module; never mirror them.
        if !meta.target().starts_with(MIRRORED_PREFIX) || meta.target().starts_with(module_path!()) {
            return;
        }
        if self.tx.is_closed() {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let line = LogLine {
            level: *meta.level(),
            target: meta.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        };
        if self.tx.try_send(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Where mirrored lines end up.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn post(&self, text: &str) -> Result<(), String>;
}

/// Posts to one Discord channel through the REST client.
pub struct ChannelSink {
    pub client: Arc<DiscordChatClient>,
    pub channel_id: u64,
}

#[async_trait]
impl LogSink for ChannelSink {
    async fn post(&self, text: &str) -> Result<(), String> {
        self.client
            .post_to_channel(self.channel_id, text)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Drain the queue into `sink` until shutdown or until the layer is gone.
pub async fn forward<K: LogSink + ?Sized>(
    mut queue: MirrorQueue,
    sink: Arc<K>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            line = queue.recv() => {
                let Some(line) = line else { break };
                let mut text = line.render();
                let dropped = queue.take_dropped();
                if dropped > 0 {
                    text = format!("{}\n_({} more suppressed)_", text, dropped);
                }
                if let Err(e) = sink.post(&text).await {
                    warn!(error = %e, "failed to mirror log line");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
