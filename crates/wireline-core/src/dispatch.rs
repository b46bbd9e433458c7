//! Batched event dispatch
//!
//! The dispatcher consumes a connection's event stream, coalesces everything
//! available in one scheduling turn into a single [`EventBatch`], and invokes
//! each subscribed handler exactly once per batch, sequentially, in
//! subscription order. A failing handler is reported and contained; it never
//! blocks later handlers or later batches.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::connection::EventStream;
use crate::errors::Result;
use crate::events::EventBatch;

// ----------------------------------------------------------------------------
// Event Handler Trait
// ----------------------------------------------------------------------------

/// Consumer of event batches
///
/// This is the only interface application logic is expected to depend on.
/// Handlers see each batch exactly once, with events in arrival order.
#[async_trait]
pub trait EventHandler: Send {
    /// Handler name, used when reporting failures
    fn name(&self) -> &str;

    /// Process one batch
    ///
    /// Errors are logged by the dispatcher and contained to this handler.
    async fn handle_batch(&mut self, batch: &EventBatch) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Event Dispatcher
// ----------------------------------------------------------------------------

/// Fan-out point between the connection and its consumers
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; invocation order is subscription order
    pub fn subscribe<H: EventHandler + 'static>(&mut self, handler: H) {
        self.handlers.push(Box::new(handler));
    }

    /// Number of subscribed handlers
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Drive dispatch until the stream ends
    ///
    /// One batch per delivery cycle: the first event is awaited, then every
    /// event already available is drained into the same batch. Events from a
    /// single transport read cycle arrive together, so they are never split
    /// across batches.
    pub async fn run(&mut self, stream: &mut EventStream) {
        while let Some(first) = stream.next().await {
            let mut batch = EventBatch::new();
            batch.push(first);
            while let Some(event) = stream.try_next() {
                batch.push(event);
            }
            self.dispatch(&batch).await;
        }
        debug!("event stream ended, dispatcher done");
    }

    /// Deliver one batch to every handler, sequentially and exactly once
    pub async fn dispatch(&mut self, batch: &EventBatch) {
        for handler in &mut self.handlers {
            if let Err(err) = handler.handle_batch(batch).await {
                warn!(
                    handler = handler.name(),
                    error = %err,
                    events = batch.len(),
                    "event handler failed; continuing with remaining handlers"
                );
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
