//! Stream event types for model responses.
//!
//! A transport delivers one response as an ordered sequence of events:
//! any number of content and thinking chunks, then exactly one terminal
//! event (`Complete` or `Error`).
//!
//! # Examples
//!
//! ```rust
//! use tangent::types::stream::StreamEvent;
//!
//! fn render(event: &StreamEvent) {
//!     match event {
//!         StreamEvent::Chunk(text) => print!("{}", text),
//!         StreamEvent::ThinkingChunk(_) => {}
//!         StreamEvent::Complete => println!(),
//!         StreamEvent::Error(message) => eprintln!("error: {}", message),
//!     }
//! }
//! # render(&StreamEvent::Complete);
//! ```

use serde::{Deserialize, Serialize};

/// Events received during a streaming model response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of visible response text.
    Chunk(String),

    /// A fragment of the model's reasoning trace.
    ///
    /// Only meaningful when the model is reasoning-capable.
    ThinkingChunk(String),

    /// The response finished normally.
    Complete,

    /// The transport failed. No further events follow.
    Error(String),
}

impl StreamEvent {
    /// Returns true if this event ends the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete | StreamEvent::Error(_))
    }

    /// Returns true if this is an error event.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, StreamEvent::Error(_))
    }

    /// Extracts the text if this is a content chunk.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            StreamEvent::Chunk(text) => Some(text),
            _ => None,
        }
    }

    /// Extracts the text if this is a thinking chunk.
    #[must_use]
    pub fn thinking(&self) -> Option<&str> {
        match self {
            StreamEvent::ThinkingChunk(text) => Some(text),
            _ => None,
        }
    }
}
