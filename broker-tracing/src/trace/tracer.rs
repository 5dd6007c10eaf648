use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rand::{rngs, Rng, SeedableRng};

use crate::context;
use crate::propagation::{Extractor, HeaderPropagator, Injector};

use super::recorder::{NoopRecorder, SpanRecorder};
use super::span::Span;
use super::span_context::{SpanId, TraceContext, TraceFlags, TraceId};

thread_local! {
    /// Store random number generator for each thread
    static CURRENT_RNG: RefCell<rngs::SmallRng> = RefCell::new(rngs::SmallRng::from_entropy());
}

/// Opens spans, tracks the active one, and moves trace contexts through
/// carriers.
///
/// Cheap to clone; clones share the same recorder.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

struct TracerInner {
    recorder: Arc<dyn SpanRecorder>,
    propagator: HeaderPropagator,
}

impl Tracer {
    /// Create a tracer that discards finished spans.
    pub fn new() -> Self {
        Tracer::with_recorder(Arc::new(NoopRecorder::new()))
    }

    /// Create a tracer handing finished spans to `recorder`.
    pub fn with_recorder(recorder: Arc<dyn SpanRecorder>) -> Self {
        Tracer {
            inner: Arc::new(TracerInner {
                recorder,
                propagator: HeaderPropagator::new(),
            }),
        }
    }

    /// Opens a new span and binds it as the active unit of work.
    ///
    /// The span is parented to `child_of` when that context is valid,
    /// otherwise to the currently active span on this thread when one
    /// exists, otherwise it starts a new trace. The returned [`Scope`]
    /// closes the span when dropped, on every exit path.
    pub fn start_active_span(
        &self,
        name: impl Into<Cow<'static, str>>,
        child_of: Option<&TraceContext>,
    ) -> Scope {
        let parent = child_of
            .filter(|cx| cx.is_valid())
            .cloned()
            .or_else(context::current);

        let span_context = match parent {
            Some(parent) => parent.child(new_span_id()),
            None => TraceContext::new(new_trace_id(), new_span_id(), None, TraceFlags::SAMPLED),
        };

        let span = Span::new(name.into(), span_context.clone());
        context::push(span_context);

        Scope {
            span: Some(span),
            tracer: self.clone(),
            _not_send: PhantomData,
        }
    }

    /// The context of the currently active span on this thread, if any.
    pub fn active_context(&self) -> Option<TraceContext> {
        context::current()
    }

    /// Writes an encoding of `trace_context` into the carrier.
    ///
    /// Keys already present in the carrier are left untouched; injecting an
    /// invalid (root-only) context writes nothing at all.
    pub fn inject(&self, trace_context: &TraceContext, carrier: &mut dyn Injector) {
        self.inner.propagator.inject_context(trace_context, carrier);
    }

    /// Reads a trace context back out of a carrier.
    ///
    /// Absent or malformed propagation keys degrade to the empty context —
    /// the consume path proceeds untraced rather than failing.
    pub fn extract(&self, carrier: &dyn Extractor) -> TraceContext {
        self.inner.propagator.extract(carrier)
    }

    fn record(&self, span: Span) {
        self.inner.recorder.on_end(span);
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer::new()
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer").finish()
    }
}

fn new_trace_id() -> TraceId {
    CURRENT_RNG.with(|rng| TraceId::from_u128(rng.borrow_mut().gen()))
}

fn new_span_id() -> SpanId {
    CURRENT_RNG.with(|rng| SpanId::from_u64(rng.borrow_mut().gen()))
}

/// Binds a [`Span`] as the active unit of work until dropped.
///
/// Scopes obey strict stack discipline within one thread: the scope opened
/// last must close first. Closing out of order is a programming error and
/// trips a debug assertion rather than being recovered from. On close the
/// span's end time is set and the span is handed to the tracer's recorder.
///
/// A scope is bound to the thread it was opened on and is therefore not
/// `Send`.
pub struct Scope {
    span: Option<Span>,
    tracer: Tracer,
    // ensure this type is !Send as it relies on thread locals
    _not_send: PhantomData<*const ()>,
}

impl Scope {
    /// The span this scope holds active.
    pub fn span(&self) -> &Span {
        self.span.as_ref().expect("span is only taken on drop")
    }

    /// Mutable access to the held span, for tagging and error recording.
    pub fn span_mut(&mut self) -> &mut Span {
        self.span.as_mut().expect("span is only taken on drop")
    }

    /// The held span's propagatable identity.
    pub fn context(&self) -> &TraceContext {
        self.span().context()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("span", &self.span).finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end();
            let popped = context::pop();
            debug_assert_eq!(
                popped.as_ref().map(|cx| cx.span_id()),
                Some(span.context().span_id()),
                "scopes must close in reverse order of opening"
            );
            self.tracer.record(span);
        }
    }
}
