//! The span model: identities, spans, scopes, and the tracer that opens them.
//!
//! A [`Tracer`] opens a [`Span`] bound as the active unit of work through a
//! [`Scope`]; the span's propagatable identity is its [`TraceContext`].
//! Scopes close in strict reverse order of opening within one execution
//! context; the spans they release are handed to the tracer's
//! [`SpanRecorder`].

mod recorder;
mod span;
mod span_context;
mod tracer;

pub use recorder::{InMemoryRecorder, NoopRecorder, SpanRecorder};
pub use span::{Event, Span};
pub use span_context::{SpanId, TraceContext, TraceFlags, TraceId};
pub use tracer::{Scope, Tracer};
