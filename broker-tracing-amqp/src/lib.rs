//! Trace propagation for AMQP channels.
//!
//! Decorate a [`Channel`] with [`TracedChannel`] and every publish carries
//! the active trace context in its message headers, while every consume
//! operation — one-shot fetch, push-style consume, or a long-lived delivery
//! stream — recovers that context and runs inside a span parented to the
//! producer's trace.
//!
//! Instrumentation composes at client-construction time, not by patching:
//! wrap the channel you built, or pass it through [`instrument`]. With no
//! tracer registered the decorated channel behaves exactly like the bare
//! one.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use broker_tracing::trace::{InMemoryRecorder, Tracer};
//! use broker_tracing_amqp::testing::MockChannel;
//! use broker_tracing_amqp::{Channel, PublishOptions, TracedChannel};
//!
//! let recorder = Arc::new(InMemoryRecorder::new());
//! let tracer = Tracer::with_recorder(recorder.clone());
//!
//! let mut channel = TracedChannel::with_tracer(MockChannel::new(), tracer);
//! channel
//!     .basic_publish("orders", "new", b"payload", None, PublishOptions::default())
//!     .unwrap();
//!
//! // The broker saw headers it can hand to the consuming side.
//! let publishes = channel.get_ref().publishes();
//! assert!(publishes[0].properties.as_ref().unwrap().headers.is_some());
//! assert_eq!(recorder.finished_spans().len(), 1);
//! ```
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]

pub mod blocking;
pub mod channel;
pub mod consume;
mod install;
pub mod tags;
pub mod testing;
pub mod traced;

pub use blocking::BlockingChannel;
pub use channel::{
    Channel, ChannelError, ConnectionInfo, Deliveries, Delivery, DeliveryCallback,
    DeliveryHandler, Properties, PublishOptions,
};
pub use consume::TracedDeliveries;
pub use install::install;
pub use tags::{consumer_tags, publisher_tags, ConnectionTags};
pub use traced::{instrument, TracedChannel};
