use std::fmt;
use std::sync::Mutex;

use super::span::Span;

/// Receives spans as their scopes close.
///
/// This is the seam where a span exporter would attach; this crate only
/// ships recorders that discard or buffer.
pub trait SpanRecorder: Send + Sync {
    /// Called with each span exactly once, after its end time is set.
    fn on_end(&self, span: Span);
}

/// Discards every finished span. The default when no recorder is configured.
#[derive(Debug, Default)]
pub struct NoopRecorder {
    _private: (),
}

impl NoopRecorder {
    /// Create a new no-op recorder.
    pub fn new() -> Self {
        NoopRecorder::default()
    }
}

impl SpanRecorder for NoopRecorder {
    fn on_end(&self, _span: Span) {}
}

/// Buffers finished spans in memory, in the order their scopes closed.
///
/// Intended for tests asserting on span lifecycle; it is not an exporter
/// and never drains itself.
#[derive(Default)]
pub struct InMemoryRecorder {
    spans: Mutex<Vec<Span>>,
}

impl InMemoryRecorder {
    /// Create a new empty recorder.
    pub fn new() -> Self {
        InMemoryRecorder::default()
    }

    /// A snapshot of the finished spans recorded so far.
    pub fn finished_spans(&self) -> Vec<Span> {
        self.spans
            .lock()
            .map(|spans| spans.clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for InMemoryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryRecorder")
            .field(
                "finished",
                &self.spans.lock().map(|spans| spans.len()).unwrap_or(0),
            )
            .finish()
    }
}

impl SpanRecorder for InMemoryRecorder {
    fn on_end(&self, span: Span) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(span);
        }
    }
}
