//! The install hook runs once per process; this binary holds the single
//! test that exercises it.

use broker_tracing::global;
use broker_tracing::propagation::TRACE_ID_HEADER;
use broker_tracing_amqp::testing::MockChannel;
use broker_tracing_amqp::{install, Channel, PublishOptions, TracedChannel};

#[test]
fn install_is_idempotent_and_registers_a_tracer() {
    assert!(global::tracer().is_none());

    install();
    install();
    assert!(global::tracer().is_some());

    // The registered default tracer drives propagation end to end.
    let mut channel = TracedChannel::new(MockChannel::new());
    channel
        .basic_publish("orders", "new", b"x", None, PublishOptions::default())
        .unwrap();

    let publishes = channel.get_ref().publishes();
    let headers = publishes[0]
        .properties
        .as_ref()
        .unwrap()
        .headers
        .as_ref()
        .unwrap();
    assert!(headers.contains_key(TRACE_ID_HEADER));
}
