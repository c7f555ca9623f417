//! A transport that replays a fixed list of events.
//!
//! Used by tests and offline demos. Every request it receives is recorded
//! so callers can inspect what would have been sent to a model.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::ModelTransport;
use crate::types::message::MessageNode;
use crate::types::stream::StreamEvent;

#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    events: Vec<StreamEvent>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<Vec<MessageNode>>>>,
}

impl ScriptedTransport {
    /// Replays `events` verbatim, terminal event included.
    #[must_use]
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    /// Streams `chunks` as content and then completes.
    #[must_use]
    pub fn reply<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<StreamEvent> = chunks
            .into_iter()
            .map(|c| StreamEvent::Chunk(c.into()))
            .collect();
        events.push(StreamEvent::Complete);
        Self::new(events)
    }

    /// Waits `delay` before each event.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Request paths received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<MessageNode>> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: Vec<MessageNode>) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }
}

impl ModelTransport for ScriptedTransport {
    async fn stream(&self, request: Vec<MessageNode>, tx: mpsc::Sender<StreamEvent>) {
        self.record(request);

        for event in self.events.iter().cloned() {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if tx.send(event).await.is_err() {
                return;
            }
        }
    }
}
