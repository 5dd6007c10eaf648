//! Active-span tracking and trace-context propagation for message broker
//! clients.
//!
//! This crate carries the identity of a distributed trace across a message
//! broker boundary. A producer opens a [`Scope`] around its publish call and
//! injects the scope's [`TraceContext`] into the outbound message headers; a
//! consumer extracts that context from the inbound headers and opens a child
//! scope parented to it. The active scope is tracked per execution context
//! (thread-local), never in shared mutable state.
//!
//! Span export to a collector is intentionally not part of this crate. A
//! [`SpanRecorder`] receives spans as their scopes close; the default
//! recorder discards them, and [`InMemoryRecorder`] buffers them for tests.
//!
//! # Examples
//!
//! ```
//! use broker_tracing::trace::Tracer;
//! use std::collections::HashMap;
//!
//! let tracer = Tracer::new();
//! let mut headers: HashMap<String, String> = HashMap::new();
//!
//! // Producer side: publish inside a scope, injecting its context.
//! {
//!     let scope = tracer.start_active_span("publish", None);
//!     tracer.inject(scope.context(), &mut headers);
//! }
//!
//! // Consumer side: recover the producer's context from the headers.
//! let parent = tracer.extract(&headers);
//! assert!(parent.is_valid());
//!
//! let scope = tracer.start_active_span("consume", Some(&parent));
//! assert_eq!(scope.context().trace_id(), parent.trace_id());
//! ```
//!
//! [`Scope`]: trace::Scope
//! [`TraceContext`]: trace::TraceContext
//! [`SpanRecorder`]: trace::SpanRecorder
//! [`InMemoryRecorder`]: trace::InMemoryRecorder
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]

mod common;
pub mod context;
pub mod global;
pub mod propagation;
pub mod trace;

pub use common::{Key, KeyValue, Value};
