use tracing::debug;

use crate::propagation::{Extractor, Injector, PropagationError};
use crate::trace::{SpanId, TraceContext, TraceFlags, TraceId};

/// Carrier key holding the 128-bit trace id as 32 lowercase hex characters.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Carrier key holding the 64-bit unit-of-work id as 16 lowercase hex characters.
pub const SPAN_ID_HEADER: &str = "x-span-id";
/// Carrier key holding the sampling level: `"1"` sampled, `"0"` suppressed.
pub const TRACE_LEVEL_HEADER: &str = "x-trace-level";

/// Encodes [`TraceContext`]s under the `x-trace-id`, `x-span-id` and
/// `x-trace-level` carrier keys, and decodes them back.
///
/// Injection merges into the carrier without disturbing keys it does not
/// own. Extraction is all-or-nothing: a missing or unusable id degrades the
/// whole carrier to the empty context so the consume path proceeds
/// untraced. An absent level key means sampled.
#[derive(Clone, Debug, Default)]
pub struct HeaderPropagator {
    _private: (),
}

impl HeaderPropagator {
    /// Create a new `HeaderPropagator`.
    pub fn new() -> Self {
        HeaderPropagator { _private: () }
    }

    /// Writes `trace_context` into the carrier; a no-op for invalid contexts.
    pub fn inject_context(&self, trace_context: &TraceContext, injector: &mut dyn Injector) {
        if !trace_context.is_valid() {
            return;
        }

        injector.set(TRACE_ID_HEADER, format!("{:032x}", trace_context.trace_id()));
        injector.set(SPAN_ID_HEADER, format!("{:016x}", trace_context.span_id()));
        injector.set(
            TRACE_LEVEL_HEADER,
            if trace_context.is_sampled() { "1" } else { "0" }.to_string(),
        );
    }

    /// Reads a context from the carrier, degrading to the empty context when
    /// the recognized keys are absent or unusable.
    pub fn extract(&self, extractor: &dyn Extractor) -> TraceContext {
        match self.extract_trace_context(extractor) {
            Ok(trace_context) => trace_context,
            Err(PropagationError::Missing) => TraceContext::empty(),
            Err(error) => {
                debug!(%error, "discarding unusable trace context from carrier");
                TraceContext::empty()
            }
        }
    }

    fn extract_trace_context(
        &self,
        extractor: &dyn Extractor,
    ) -> Result<TraceContext, PropagationError> {
        let trace_id = match extractor.get(TRACE_ID_HEADER) {
            Some(value) => parse_trace_id(value)?,
            None => return Err(PropagationError::Missing),
        };
        let span_id = match extractor.get(SPAN_ID_HEADER) {
            Some(value) => parse_span_id(value)?,
            None => {
                return Err(PropagationError::Malformed {
                    key: SPAN_ID_HEADER,
                })
            }
        };
        let trace_flags = match extractor.get(TRACE_LEVEL_HEADER).map(str::trim) {
            None | Some("1") => TraceFlags::SAMPLED,
            Some("0") => TraceFlags::NOT_SAMPLED,
            Some(_) => {
                return Err(PropagationError::Malformed {
                    key: TRACE_LEVEL_HEADER,
                })
            }
        };

        let trace_context = TraceContext::new(trace_id, span_id, None, trace_flags);
        if !trace_context.is_valid() {
            return Err(PropagationError::Malformed {
                key: TRACE_ID_HEADER,
            });
        }

        Ok(trace_context)
    }
}

fn parse_trace_id(value: &str) -> Result<TraceId, PropagationError> {
    let value = value.trim();
    if value.len() != 32 || !is_lower_hex(value) {
        return Err(PropagationError::Malformed {
            key: TRACE_ID_HEADER,
        });
    }
    TraceId::from_hex(value).map_err(|_| PropagationError::Malformed {
        key: TRACE_ID_HEADER,
    })
}

fn parse_span_id(value: &str) -> Result<SpanId, PropagationError> {
    let value = value.trim();
    if value.len() != 16 || !is_lower_hex(value) {
        return Err(PropagationError::Malformed {
            key: SPAN_ID_HEADER,
        });
    }
    SpanId::from_hex(value).map_err(|_| PropagationError::Malformed {
        key: SPAN_ID_HEADER,
    })
}

fn is_lower_hex(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
