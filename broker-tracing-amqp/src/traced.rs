//! The tracing decorator for channel operations.

use std::fmt;

use broker_tracing::global;
use broker_tracing::trace::{TraceContext, Tracer};

use crate::channel::{
    Channel, ChannelError, ConnectionInfo, Deliveries, Delivery, DeliveryCallback,
    DeliveryHandler, Properties, PublishOptions,
};
use crate::consume::TracedDeliveries;
use crate::tags;

/// Span name shared by every operation of the protocol.
pub(crate) const SPAN_NAME: &str = "amqp";

/// Decorates a [`Channel`] so its operations propagate trace context.
///
/// Publishes open a span child of the caller's active one and inject its
/// context into the outbound headers; consume operations extract the
/// producer's context from the inbound headers and run inside a span
/// parented to it. With no tracer available every operation delegates to
/// the wrapped channel unchanged.
pub struct TracedChannel<C> {
    inner: C,
    tracer: Option<Tracer>,
}

impl<C: Channel> TracedChannel<C> {
    /// Wraps `inner`, consulting the process-wide tracer on each operation.
    pub fn new(inner: C) -> Self {
        TracedChannel {
            inner,
            tracer: None,
        }
    }

    /// Wraps `inner` with an explicit tracer instead of the process-wide
    /// one.
    pub fn with_tracer(inner: C, tracer: Tracer) -> Self {
        TracedChannel {
            inner,
            tracer: Some(tracer),
        }
    }

    /// Removes the decoration, returning the wrapped channel.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// A reference to the wrapped channel.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// A mutable reference to the wrapped channel.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub(crate) fn configured_tracer(&self) -> Option<Tracer> {
        self.tracer.clone()
    }

    fn active_tracer(&self) -> Option<Tracer> {
        self.tracer.clone().or_else(global::tracer)
    }
}

impl<C> fmt::Debug for TracedChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedChannel")
            .field("tracer", &self.tracer)
            .finish()
    }
}

impl<C: Channel> Channel for TracedChannel<C> {
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
        let Some(tracer) = self.active_tracer() else {
            return self
                .inner
                .basic_publish(exchange, routing_key, body, properties, options);
        };

        let mut scope = tracer.start_active_span(SPAN_NAME, None);
        tags::apply(
            scope.span_mut(),
            tags::publisher_tags(&self.inner.connection(), exchange, routing_key),
        );

        let mut properties = properties.unwrap_or_default();
        let trace_context = scope.context().clone();
        tracer.inject(&trace_context, properties.headers_mut());

        match self
            .inner
            .basic_publish(exchange, routing_key, body, Some(properties), options)
        {
            Ok(value) => Ok(value),
            Err(error) => {
                scope.span_mut().record_error(&error);
                Err(error)
            }
        }
    }

    fn basic_get(
        &mut self,
        queue: &str,
        on_message: DeliveryCallback<'_>,
    ) -> Result<bool, ChannelError> {
        let Some(tracer) = self.active_tracer() else {
            return self.inner.basic_get(queue, on_message);
        };

        let connection = self.inner.connection();
        let mut wrapped = |delivery: &Delivery| {
            traced_delivery(&tracer, &connection, queue, delivery, &mut *on_message)
        };
        self.inner.basic_get(queue, &mut wrapped)
    }

    fn basic_consume(
        &mut self,
        queue: &str,
        mut handler: DeliveryHandler,
    ) -> Result<String, ChannelError> {
        let Some(tracer) = self.active_tracer() else {
            return self.inner.basic_consume(queue, handler);
        };

        let connection = self.inner.connection();
        let queue_name = queue.to_owned();
        let wrapped: DeliveryHandler = Box::new(move |delivery| {
            traced_delivery(&tracer, &connection, &queue_name, delivery, handler.as_mut())
        });
        self.inner.basic_consume(queue, wrapped)
    }

    fn consume(&mut self, queue: &str) -> Result<Box<dyn Deliveries + '_>, ChannelError> {
        let Some(tracer) = self.active_tracer() else {
            return self.inner.consume(queue);
        };

        let connection = self.inner.connection();
        let inner = self.inner.consume(queue)?;
        Ok(Box::new(TracedDeliveries::new(
            inner, tracer, connection, queue,
        )))
    }

    fn is_traced(&self) -> bool {
        true
    }
}

/// Applies the tracing decoration to a boxed channel exactly once.
///
/// Already-decorated channels are returned as-is, so repeating client
/// construction never stacks interception layers.
pub fn instrument(channel: Box<dyn Channel>) -> Box<dyn Channel> {
    if channel.is_traced() {
        channel
    } else {
        Box::new(TracedChannel::new(channel))
    }
}

/// Runs `on_message` for one delivery inside a scope parented to the
/// delivery's own propagated context.
fn traced_delivery(
    tracer: &Tracer,
    connection: &ConnectionInfo,
    queue: &str,
    delivery: &Delivery,
    on_message: &mut dyn FnMut(&Delivery) -> Result<(), ChannelError>,
) -> Result<(), ChannelError> {
    let parent = extract_parent(tracer, &delivery.properties);
    let mut scope = tracer.start_active_span(SPAN_NAME, Some(&parent));
    tags::apply(scope.span_mut(), tags::consumer_tags(connection, queue));

    match on_message(delivery) {
        Ok(value) => Ok(value),
        Err(error) => {
            scope.span_mut().record_error(&error);
            Err(error)
        }
    }
}

/// Extracts the producer's context from delivery properties; absent or
/// unusable headers yield the empty (root-only) context.
pub(crate) fn extract_parent(tracer: &Tracer, properties: &Properties) -> TraceContext {
    match &properties.headers {
        Some(headers) => tracer.extract(headers),
        None => TraceContext::empty(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use broker_tracing::propagation::{SPAN_ID_HEADER, TRACE_ID_HEADER};
    use broker_tracing::trace::{InMemoryRecorder, SpanId, TraceFlags, TraceId, Tracer};
    use broker_tracing::Value;

    use super::*;
    use crate::testing::{delivery, MockChannel};

    fn traced_channel() -> (TracedChannel<MockChannel>, Tracer, Arc<InMemoryRecorder>) {
        let recorder = Arc::new(InMemoryRecorder::new());
        let tracer = Tracer::with_recorder(recorder.clone());
        (
            TracedChannel::with_tracer(MockChannel::new(), tracer.clone()),
            tracer,
            recorder,
        )
    }

    fn producer_context(trace_id: u128, span_id: u64) -> TraceContext {
        TraceContext::new(
            TraceId::from_u128(trace_id),
            SpanId::from_u64(span_id),
            None,
            TraceFlags::SAMPLED,
        )
    }

    #[test]
    fn publish_injects_context_and_tags_span() {
        let (mut channel, tracer, recorder) = traced_channel();

        let caller = tracer.start_active_span("caller", None);
        channel
            .basic_publish("orders", "new", b"x", None, PublishOptions::default())
            .unwrap();

        let publishes = channel.get_ref().publishes();
        assert_eq!(publishes.len(), 1);
        let headers = publishes[0]
            .properties
            .as_ref()
            .unwrap()
            .headers
            .as_ref()
            .unwrap();
        assert!(!headers.get(TRACE_ID_HEADER).unwrap().is_empty());

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.name(), "amqp");
        assert_eq!(
            span.tag("exchange"),
            Some(&Value::from("orders".to_string()))
        );
        assert_eq!(span.tag("key"), Some(&Value::from("new".to_string())));
        assert_eq!(span.tag("sort"), Some(&Value::from("publish")));
        assert_eq!(
            span.tag("address"),
            Some(&Value::from("127.0.0.1:5672".to_string()))
        );

        // Parented to the caller's span; the carrier names the publish span.
        assert_eq!(span.context().trace_id(), caller.context().trace_id());
        assert_eq!(
            span.context().parent_span_id(),
            Some(caller.context().span_id())
        );
        assert_eq!(
            headers.get(SPAN_ID_HEADER).unwrap(),
            &format!("{:016x}", span.context().span_id())
        );
    }

    #[test]
    fn publish_proceeds_when_connection_metadata_is_partial() {
        let recorder = Arc::new(InMemoryRecorder::new());
        let tracer = Tracer::with_recorder(recorder.clone());
        let mock = MockChannel::new().with_connection(ConnectionInfo {
            host: None,
            port: None,
        });
        let mut channel = TracedChannel::with_tracer(mock, tracer);

        channel
            .basic_publish("orders", "new", b"x", None, PublishOptions::default())
            .unwrap();

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].tag("address"), None);
        assert_eq!(spans[0].tag("sort"), Some(&Value::from("publish")));
    }

    #[test]
    fn publish_without_caller_span_starts_a_root() {
        let (mut channel, _tracer, recorder) = traced_channel();

        channel
            .basic_publish("orders", "new", b"x", None, PublishOptions::default())
            .unwrap();

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].context().is_valid());
        assert_eq!(spans[0].context().parent_span_id(), None);
    }

    #[test]
    fn publish_preserves_existing_properties() {
        let (mut channel, _tracer, _recorder) = traced_channel();

        let mut properties = Properties::new();
        properties.content_type = Some("application/json".to_owned());
        properties
            .headers_mut()
            .insert("app-header".to_owned(), "value".to_owned());

        channel
            .basic_publish("orders", "new", b"{}", Some(properties), PublishOptions::default())
            .unwrap();

        let publishes = channel.get_ref().publishes();
        let recorded = publishes[0].properties.as_ref().unwrap();
        assert_eq!(recorded.content_type.as_deref(), Some("application/json"));
        let headers = recorded.headers.as_ref().unwrap();
        assert_eq!(headers.get("app-header").map(String::as_str), Some("value"));
        assert!(headers.contains_key(TRACE_ID_HEADER));
    }

    #[test]
    fn publish_error_is_returned_unchanged_and_recorded() {
        let (mut channel, _tracer, recorder) = traced_channel();
        channel.get_mut().fail_next_publish(ChannelError::Broker {
            code: 312,
            text: "NO_ROUTE".to_owned(),
        });

        let error = channel
            .basic_publish("orders", "missing", b"x", None, PublishOptions::default())
            .unwrap_err();
        assert!(matches!(error, ChannelError::Broker { code: 312, .. }));
        assert_eq!(error.to_string(), "broker returned 312: NO_ROUTE");

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].is_error());
        assert_eq!(
            spans[0].events()[0].attributes[0].value,
            Value::from("broker returned 312: NO_ROUTE".to_string())
        );
    }

    #[test]
    fn fetch_runs_callback_inside_child_scope() {
        let (mut channel, tracer, recorder) = traced_channel();

        let producer = producer_context(0xabc, 0x123);
        let mut headers = HashMap::new();
        tracer.inject(&producer, &mut headers);
        channel
            .get_mut()
            .script_delivery(Some(delivery(1, Some(headers))));

        let mut seen = 0;
        let mut on_message = |delivery: &Delivery| -> Result<(), ChannelError> {
            seen += 1;
            assert_eq!(delivery.delivery_tag, 1);
            // The consume scope is active while the callback runs.
            assert!(broker_tracing::context::current().is_some());
            Ok(())
        };
        let delivered = channel.basic_get("q1", &mut on_message).unwrap();
        assert!(delivered);
        assert_eq!(seen, 1);

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].tag("queue"), Some(&Value::from("q1".to_string())));
        assert_eq!(spans[0].tag("sort"), Some(&Value::from("consume")));
        assert_eq!(spans[0].context().trace_id(), producer.trace_id());
        assert_eq!(
            spans[0].context().parent_span_id(),
            Some(producer.span_id())
        );
    }

    #[test]
    fn fetch_without_message_opens_no_span() {
        let (mut channel, _tracer, recorder) = traced_channel();

        let mut called = false;
        let mut on_message = |_: &Delivery| -> Result<(), ChannelError> {
            called = true;
            Ok(())
        };
        let delivered = channel.basic_get("q1", &mut on_message).unwrap();

        assert!(!delivered);
        assert!(!called);
        assert!(recorder.finished_spans().is_empty());
    }

    #[test]
    fn fetch_callback_error_is_recorded_and_returned() {
        let (mut channel, _tracer, recorder) = traced_channel();
        channel.get_mut().script_delivery(Some(delivery(1, None)));

        let mut on_message = |_: &Delivery| -> Result<(), ChannelError> {
            Err(ChannelError::Handler("unparseable body".to_owned()))
        };
        let error = channel.basic_get("q1", &mut on_message).unwrap_err();
        assert!(matches!(error, ChannelError::Handler(_)));

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].is_error());
        // Headerless delivery: the span roots a new trace.
        assert_eq!(spans[0].context().parent_span_id(), None);
    }

    #[test]
    fn push_consume_wraps_each_delivery() {
        let (mut channel, tracer, recorder) = traced_channel();

        let first = producer_context(0xa, 0x1);
        let second = producer_context(0xb, 0x2);
        for (tag, producer) in [(1, &first), (2, &second)] {
            let mut headers = HashMap::new();
            tracer.inject(producer, &mut headers);
            channel
                .get_mut()
                .script_delivery(Some(delivery(tag, Some(headers))));
        }
        channel.get_mut().script_delivery(None);

        let consumer_tag = channel
            .basic_consume("q1", Box::new(|_delivery: &Delivery| Ok(())))
            .unwrap();
        assert_eq!(consumer_tag, "ctag-q1");

        let spans = recorder.finished_spans();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].context().parent_span_id(), Some(first.span_id()));
        assert_eq!(spans[1].context().parent_span_id(), Some(second.span_id()));
        assert_eq!(spans[0].tag("queue"), Some(&Value::from("q1".to_string())));
    }

    #[test]
    fn instrument_marks_channel_exactly_once() {
        let channel: Box<dyn Channel> = Box::new(MockChannel::new());
        let instrumented = instrument(channel);
        assert!(instrumented.is_traced());

        // A second pass leaves the existing decoration in place.
        let again = instrument(instrumented);
        assert!(again.is_traced());
    }
}
