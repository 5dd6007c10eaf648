use std::borrow::Cow;
use std::error::Error;
use std::time::SystemTime;

use crate::common::{KeyValue, Value};

use super::span_context::TraceContext;

/// A timestamped record attached to a [`Span`], used for logged errors.
#[derive(Clone, Debug)]
pub struct Event {
    /// Event name.
    pub name: Cow<'static, str>,
    /// Event timestamp.
    pub timestamp: SystemTime,
    /// Additional attributes describing the event.
    pub attributes: Vec<KeyValue>,
}

impl Event {
    /// Create a new event occurring now.
    pub fn new(name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) -> Self {
        Event {
            name: name.into(),
            timestamp: SystemTime::now(),
            attributes,
        }
    }
}

/// A timed, taggable record of one traced operation.
///
/// A span is owned exclusively by the [`Scope`] that opened it and is ended
/// exactly once, when that scope closes. Its `end_time` stays unset while
/// the operation is in flight.
///
/// [`Scope`]: super::Scope
#[derive(Clone, Debug)]
pub struct Span {
    context: TraceContext,
    name: Cow<'static, str>,
    start_time: SystemTime,
    end_time: Option<SystemTime>,
    tags: Vec<KeyValue>,
    events: Vec<Event>,
    error: bool,
}

impl Span {
    pub(crate) fn new(name: Cow<'static, str>, context: TraceContext) -> Self {
        Span {
            context,
            name,
            start_time: SystemTime::now(),
            end_time: None,
            tags: Vec::new(),
            events: Vec::new(),
            error: false,
        }
    }

    /// The propagatable identity of this span.
    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// The operation name this span was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the operation started.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// When the operation ended, if it has.
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Set a single tag, replacing any previous value for the same key.
    pub fn set_tag(&mut self, tag: KeyValue) {
        match self.tags.iter_mut().find(|existing| existing.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
    }

    /// Set multiple tags.
    pub fn set_tags(&mut self, tags: impl IntoIterator<Item = KeyValue>) {
        for tag in tags {
            self.set_tag(tag);
        }
    }

    /// Look up a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    /// All tags set on this span.
    pub fn tags(&self) -> &[KeyValue] {
        &self.tags
    }

    /// Record `error` on this span as a logged error event.
    ///
    /// Recording never consumes the error; interceptors return it to the
    /// caller unchanged afterwards.
    pub fn record_error(&mut self, error: &dyn Error) {
        self.error = true;
        self.events.push(Event::new(
            "exception",
            vec![KeyValue::new("exception.message", error.to_string())],
        ));
    }

    /// Whether an error has been recorded on this span.
    pub fn is_error(&self) -> bool {
        self.error
    }

    /// Events recorded on this span.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn end(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(SystemTime::now());
        }
    }
}
