//! Scripted channel implementations for exercising the interception layer.
//!
//! [`MockChannel`] stands in for a real transport channel: it records what
//! was published (with the properties the broker would have seen) and feeds
//! scripted deliveries to the fetch and consume paths.

use std::collections::{HashMap, VecDeque};
use std::error::Error;

use crate::channel::{
    Channel, ChannelError, ConnectionInfo, Deliveries, Delivery, DeliveryCallback,
    DeliveryHandler, Properties, PublishOptions,
};

/// One publish as the broker saw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedPublish {
    /// Exchange published to.
    pub exchange: String,
    /// Routing key used.
    pub routing_key: String,
    /// Message body.
    pub body: Vec<u8>,
    /// Properties as they arrived at the broker, decoration included.
    pub properties: Option<Properties>,
    /// Publish flags.
    pub options: PublishOptions,
}

/// A scripted channel.
#[derive(Debug)]
pub struct MockChannel {
    connection: ConnectionInfo,
    deliveries: VecDeque<Option<Delivery>>,
    publishes: Vec<RecordedPublish>,
    fail_next_publish: Option<ChannelError>,
    consumer_cancelled: bool,
    consumer_abort: Option<String>,
}

impl MockChannel {
    /// A channel on a local broker connection.
    pub fn new() -> Self {
        MockChannel {
            connection: ConnectionInfo::new("127.0.0.1", 5672),
            deliveries: VecDeque::new(),
            publishes: Vec::new(),
            fail_next_publish: None,
            consumer_cancelled: false,
            consumer_abort: None,
        }
    }

    /// Replaces the connection metadata this channel reports.
    pub fn with_connection(mut self, connection: ConnectionInfo) -> Self {
        self.connection = connection;
        self
    }

    /// Appends an element to the scripted delivery sequence. `None` is the
    /// idle-poll sentinel.
    pub fn script_delivery(&mut self, delivery: Option<Delivery>) {
        self.deliveries.push_back(delivery);
    }

    /// Makes the next publish fail with `error`.
    pub fn fail_next_publish(&mut self, error: ChannelError) {
        self.fail_next_publish = Some(error);
    }

    /// Publishes recorded so far.
    pub fn publishes(&self) -> &[RecordedPublish] {
        &self.publishes
    }

    /// Whether a consumer stream on this channel was cancelled.
    pub fn consumer_cancelled(&self) -> bool {
        self.consumer_cancelled
    }

    /// The error message a consumer stream was aborted with, if any.
    pub fn consumer_abort(&self) -> Option<&str> {
        self.consumer_abort.as_deref()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        MockChannel::new()
    }
}

impl Channel for MockChannel {
    fn connection(&self) -> ConnectionInfo {
        self.connection.clone()
    }

    fn basic_publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        properties: Option<Properties>,
        options: PublishOptions,
    ) -> Result<(), ChannelError> {
        if let Some(error) = self.fail_next_publish.take() {
            return Err(error);
        }
        self.publishes.push(RecordedPublish {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            body: body.to_vec(),
            properties,
            options,
        });
        Ok(())
    }

    fn basic_get(
        &mut self,
        _queue: &str,
        on_message: DeliveryCallback<'_>,
    ) -> Result<bool, ChannelError> {
        match self.deliveries.pop_front() {
            Some(Some(delivery)) => {
                on_message(&delivery)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn basic_consume(
        &mut self,
        queue: &str,
        mut handler: DeliveryHandler,
    ) -> Result<String, ChannelError> {
        while let Some(element) = self.deliveries.pop_front() {
            if let Some(delivery) = element {
                handler(&delivery)?;
            }
        }
        Ok(format!("ctag-{queue}"))
    }

    fn consume(&mut self, _queue: &str) -> Result<Box<dyn Deliveries + '_>, ChannelError> {
        Ok(Box::new(MockDeliveries { channel: self }))
    }
}

/// Drains the scripted deliveries of a [`MockChannel`].
#[derive(Debug)]
pub struct MockDeliveries<'a> {
    channel: &'a mut MockChannel,
}

impl Iterator for MockDeliveries<'_> {
    type Item = Option<Delivery>;

    fn next(&mut self) -> Option<Self::Item> {
        self.channel.deliveries.pop_front()
    }
}

impl Deliveries for MockDeliveries<'_> {
    fn cancel(&mut self) -> Result<(), ChannelError> {
        self.channel.consumer_cancelled = true;
        Ok(())
    }

    fn abort(&mut self, error: &dyn Error) -> Result<(), ChannelError> {
        self.channel.consumer_abort = Some(error.to_string());
        self.cancel()
    }
}

/// A delivery carrying the given headers, for scripting consume paths.
pub fn delivery(delivery_tag: u64, headers: Option<HashMap<String, String>>) -> Delivery {
    Delivery {
        exchange: "amq.topic".to_owned(),
        routing_key: "test".to_owned(),
        delivery_tag,
        properties: Properties {
            content_type: None,
            headers,
        },
        body: b"payload".to_vec(),
    }
}
