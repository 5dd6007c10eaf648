//! With no tracer registered in the process, decorated and bare channels
//! must be observationally identical: same return values, same errors, no
//! header mutation. No other test in this binary may register a tracer.

use broker_tracing::context;
use broker_tracing_amqp::testing::{delivery, MockChannel};
use broker_tracing_amqp::{Channel, ChannelError, Delivery, Properties, PublishOptions, TracedChannel};

#[test]
fn publish_is_untouched_without_a_tracer() {
    let mut channel = TracedChannel::new(MockChannel::new());

    channel
        .basic_publish("orders", "new", b"x", None, PublishOptions::default())
        .unwrap();

    let mut properties = Properties::new();
    properties
        .headers_mut()
        .insert("app-header".to_owned(), "value".to_owned());
    channel
        .basic_publish("orders", "new", b"x", Some(properties.clone()), PublishOptions::default())
        .unwrap();

    let publishes = channel.get_ref().publishes();
    assert_eq!(publishes[0].properties, None);
    assert_eq!(publishes[1].properties.as_ref(), Some(&properties));
}

#[test]
fn publish_error_passes_through_without_a_tracer() {
    let mut channel = TracedChannel::new(MockChannel::new());
    channel.get_mut().fail_next_publish(ChannelError::ChannelClosed);

    let error = channel
        .basic_publish("orders", "new", b"x", None, PublishOptions::default())
        .unwrap_err();
    assert!(matches!(error, ChannelError::ChannelClosed));
}

#[test]
fn fetch_uses_the_original_callback_without_a_tracer() {
    let mut channel = TracedChannel::new(MockChannel::new());
    channel.get_mut().script_delivery(Some(delivery(1, None)));

    let mut seen = 0;
    let mut on_message = |_: &Delivery| -> Result<(), ChannelError> {
        seen += 1;
        // No scope is opened around the callback.
        assert!(context::current().is_none());
        Ok(())
    };
    let delivered = channel.basic_get("q1", &mut on_message).unwrap();

    assert!(delivered);
    assert_eq!(seen, 1);
}

#[test]
fn consume_passes_elements_through_without_a_tracer() {
    let mut channel = TracedChannel::new(MockChannel::new());
    let scripted = delivery(7, None);
    channel.get_mut().script_delivery(None);
    channel.get_mut().script_delivery(Some(scripted.clone()));

    let collected: Vec<Option<Delivery>> = channel.consume("q1").unwrap().collect();

    assert_eq!(collected, vec![None, Some(scripted)]);
    assert!(context::current().is_none());
}
