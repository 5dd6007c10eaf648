//! The streaming-consume scope state machine.

use std::error::Error;
use std::fmt;

use broker_tracing::trace::{Scope, Tracer};

use crate::channel::{ChannelError, ConnectionInfo, Deliveries, Delivery};
use crate::tags;
use crate::traced::{extract_parent, SPAN_NAME};

/// Lazily inserts tracing into a long-lived delivery stream.
///
/// Elements pass through with their values and order untouched. For each
/// real delivery the adaptor extracts the producer's context from the
/// headers and opens a scope parented to it *before* yielding, then leaves
/// that scope open while the consumer holds the element — the span's
/// duration runs from message received to message re-requested. Advancing
/// the stream closes the previous element's scope before anything else
/// happens, so no two spans are ever open at once. Idle-poll sentinels
/// (`None`) are re-emitted as-is with no span.
///
/// The `scope` field is the whole state machine: `None` between elements,
/// `Some` from yield to re-request.
///
/// Dropping the adaptor closes any scope still open, so a span never
/// outlives its stream even when the consumer abandons it mid-iteration.
/// Like [`Scope`], the adaptor is bound to the thread it iterates on.
pub struct TracedDeliveries<I> {
    inner: I,
    tracer: Tracer,
    connection: ConnectionInfo,
    queue: String,
    scope: Option<Scope>,
}

impl<I: Deliveries> TracedDeliveries<I> {
    /// Wraps `inner`, tagging each delivery's span as a consume from
    /// `queue`.
    pub fn new(inner: I, tracer: Tracer, connection: ConnectionInfo, queue: &str) -> Self {
        TracedDeliveries {
            inner,
            tracer,
            connection,
            queue: queue.to_owned(),
            scope: None,
        }
    }
}

impl<I> fmt::Debug for TracedDeliveries<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedDeliveries")
            .field("queue", &self.queue)
            .field("scope_open", &self.scope.is_some())
            .finish()
    }
}

impl<I: Deliveries> Iterator for TracedDeliveries<I> {
    type Item = Option<Delivery>;

    fn next(&mut self) -> Option<Self::Item> {
        // The previous element's span lasts until the consumer asks for the
        // next one.
        self.scope = None;

        match self.inner.next()? {
            // Idle-poll sentinel: no extraction, no span.
            None => Some(None),
            Some(delivery) => {
                let parent = extract_parent(&self.tracer, &delivery.properties);
                let mut scope = self.tracer.start_active_span(SPAN_NAME, Some(&parent));
                tags::apply(
                    scope.span_mut(),
                    tags::consumer_tags(&self.connection, &self.queue),
                );
                self.scope = Some(scope);
                Some(Some(delivery))
            }
        }
    }
}

impl<I: Deliveries> Deliveries for TracedDeliveries<I> {
    fn cancel(&mut self) -> Result<(), ChannelError> {
        self.scope = None;
        self.inner.cancel()
    }

    fn abort(&mut self, error: &dyn Error) -> Result<(), ChannelError> {
        if let Some(scope) = self.scope.as_mut() {
            scope.span_mut().record_error(error);
        }
        self.scope = None;
        self.inner.abort(error)
    }
}
