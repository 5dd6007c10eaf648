//! The application-facing channel layer and the single-interception guard.
//!
//! Client construction may hand this layer a transport channel that already
//! carries the tracing decoration. Wrapping the blocking layer as well
//! would open two spans per operation, so the constructor unwraps the
//! delegate back to the raw channel and re-applies interception at the
//! outer layer only. The types make stacking unrepresentable: construction
//! consumes the decorated delegate and yields exactly one decorated
//! blocking channel.

use crate::channel::{
    Channel, ChannelError, ConnectionInfo, Deliveries, DeliveryCallback, DeliveryHandler,
    Properties, PublishOptions,
};
use crate::traced::TracedChannel;

/// Application-facing channel composing a low-level transport channel.
pub struct BlockingChannel {
    inner: Box<dyn Channel>,
}

impl std::fmt::Debug for BlockingChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingChannel").finish()
    }
}

impl BlockingChannel {
    /// Builds the blocking layer over an already-decorated transport
    /// channel, moving interception to the outer layer.
    ///
    /// A tracer configured on the delegate is carried over to the outer
    /// decoration. Repeating construction cannot stack interception.
    pub fn new(delegate: TracedChannel<Box<dyn Channel>>) -> TracedChannel<BlockingChannel> {
        let tracer = delegate.configured_tracer();
        let blocking = BlockingChannel {
            inner: delegate.into_inner(),
        };
        match tracer {
            Some(tracer) => TracedChannel::with_tracer(blocking, tracer),
            None => TracedChannel::new(blocking),
        }
    }

    /// Builds the blocking layer over a raw transport channel.
    pub fn from_raw(inner: Box<dyn Channel>) -> TracedChannel<BlockingChannel> {
        TracedChannel::new(BlockingChannel { inner })
    }

    /// Decomposes the blocking layer back into its transport channel.
    pub fn into_inner(self) -> Box<dyn Channel> {
        self.inner
    }
}

impl Channel for BlockingChannel {
    fn connection(&self) -> ConnectionInfo {
        self.inner.connection()
    }

    fn basic_publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: Option<Properties>,
        options: PublishOptions,
    ) -> Result<(), ChannelError> {
        self.inner
            .basic_publish(exchange, routing_key, body, properties, options)
    }

    fn basic_get(
        &mut self,
        queue: &str,
        on_message: DeliveryCallback<'_>,
    ) -> Result<bool, ChannelError> {
        self.inner.basic_get(queue, on_message)
    }

    fn basic_consume(
        &mut self,
        queue: &str,
        handler: DeliveryHandler,
    ) -> Result<String, ChannelError> {
        self.inner.basic_consume(queue, handler)
    }

    fn consume(&mut self, queue: &str) -> Result<Box<dyn Deliveries + '_>, ChannelError> {
        self.inner.consume(queue)
    }
}
