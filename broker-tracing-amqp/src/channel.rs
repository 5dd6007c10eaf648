//! The broker client surface this layer decorates.
//!
//! [`Channel`] is the seam: one AMQP channel's publish and consume
//! operations, exposed as a trait so that tracing composes as a decorator
//! at construction time. The types here mirror what travels on the wire —
//! properties with a string-keyed header table, deliveries carrying their
//! routing metadata, and the idle-poll sentinel (`None`) a pull-based
//! consumer emits when no message arrived within its polling interval.

use std::collections::HashMap;

use thiserror::Error;

/// Address metadata for the connection carrying a channel.
///
/// Fields are optional because a channel may be asked to describe itself
/// before its connection is fully established; tag derivation omits what is
/// missing rather than failing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Broker host name or address.
    pub host: Option<String>,
    /// Broker port.
    pub port: Option<u16>,
}

impl ConnectionInfo {
    /// Create connection info from its parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ConnectionInfo {
            host: Some(host.into()),
            port: Some(port),
        }
    }
}

/// Message properties travelling with a publish or delivery.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Properties {
    /// MIME content type of the body.
    pub content_type: Option<String>,
    /// Application and propagation headers.
    pub headers: Option<HashMap<String, String>>,
}

impl Properties {
    /// Create empty properties.
    pub fn new() -> Self {
        Properties::default()
    }

    /// The header table, created empty on first use.
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        self.headers.get_or_insert_with(HashMap::new)
    }
}

/// A message handed to a consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Exchange the message was published to.
    pub exchange: String,
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Channel-local delivery tag.
    pub delivery_tag: u64,
    /// Message properties, including any propagation headers.
    pub properties: Properties,
    /// Message body.
    pub body: Vec<u8>,
}

/// Per-publish flags forwarded to the broker untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Return the message if it cannot be routed.
    pub mandatory: bool,
    /// Only deliver if a consumer is immediately available.
    pub immediate: bool,
}

/// Failures surfaced by channel operations.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The channel has been closed.
    #[error("channel is closed")]
    ChannelClosed,

    /// The underlying connection failed.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The broker refused the operation.
    #[error("broker returned {code}: {text}")]
    Broker {
        /// AMQP reply code.
        code: u16,
        /// AMQP reply text.
        text: String,
    },

    /// A consumer-supplied handler reported a failure.
    #[error("delivery handler failed: {0}")]
    Handler(String),
}

/// Per-delivery callback used by the one-shot fetch operation.
pub type DeliveryCallback<'a> = &'a mut dyn FnMut(&Delivery) -> Result<(), ChannelError>;

/// Long-lived handler registered by [`Channel::basic_consume`].
pub type DeliveryHandler = Box<dyn FnMut(&Delivery) -> Result<(), ChannelError> + Send>;

/// A pull-based stream of deliveries.
///
/// `None` items are the idle-poll sentinel: no message arrived within the
/// polling interval. Iteration ending (`next()` returning `None`) means the
/// consumer was cancelled or the channel closed.
pub trait Deliveries: Iterator<Item = Option<Delivery>> {
    /// Stops the underlying consumer.
    fn cancel(&mut self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Reports a consumer-side failure while holding the last yielded
    /// delivery, then stops the stream.
    fn abort(&mut self, error: &dyn std::error::Error) -> Result<(), ChannelError> {
        let _ = error;
        self.cancel()
    }
}

impl<D: Deliveries + ?Sized> Deliveries for Box<D> {
    fn cancel(&mut self) -> Result<(), ChannelError> {
        (**self).cancel()
    }

    fn abort(&mut self, error: &dyn std::error::Error) -> Result<(), ChannelError> {
        (**self).abort(error)
    }
}

/// One AMQP channel: the operations the tracing layer decorates.
pub trait Channel {
    /// Connection metadata used for descriptive span tags.
    fn connection(&self) -> ConnectionInfo;

    /// Publishes `body` to `exchange` under `routing_key`.
    fn basic_publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: Option<Properties>,
        options: PublishOptions,
    ) -> Result<(), ChannelError>;

    /// Fetches at most one message from `queue`, invoking `on_message` for
    /// it before returning. Returns whether a message was delivered.
    fn basic_get(&mut self, queue: &str, on_message: DeliveryCallback<'_>)
        -> Result<bool, ChannelError>;

    /// Registers a long-lived consumer on `queue`; `handler` runs once per
    /// delivery. Returns the consumer tag.
    fn basic_consume(
        &mut self,
        queue: &str,
        handler: DeliveryHandler,
    ) -> Result<String, ChannelError>;

    /// Opens a pull-based delivery stream on `queue`.
    fn consume(&mut self, queue: &str) -> Result<Box<dyn Deliveries + '_>, ChannelError>;

    /// Whether this channel already carries the tracing decoration.
    fn is_traced(&self) -> bool {
        false
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn connection(&self) -> ConnectionInfo {
        (**self).connection()
    }

    fn basic_publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: Option<Properties>,
        options: PublishOptions,
    ) -> Result<(), ChannelError> {
        (**self).basic_publish(exchange, routing_key, body, properties, options)
    }

    fn basic_get(
        &mut self,
        queue: &str,
        on_message: DeliveryCallback<'_>,
    ) -> Result<bool, ChannelError> {
        (**self).basic_get(queue, on_message)
    }

    fn basic_consume(
        &mut self,
        queue: &str,
        handler: DeliveryHandler,
    ) -> Result<String, ChannelError> {
        (**self).basic_consume(queue, handler)
    }

    fn consume(&mut self, queue: &str) -> Result<Box<dyn Deliveries + '_>, ChannelError> {
        (**self).consume(queue)
    }

    fn is_traced(&self) -> bool {
        (**self).is_traced()
    }
}
