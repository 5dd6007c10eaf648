//! Process-wide tracer registry.
//!
//! Instrumentation layers look the tracer up here on every operation and
//! delegate straight to the wrapped operation when none is registered —
//! tracing is never a precondition for broker operations to function.

use std::sync::{OnceLock, RwLock};

use crate::trace::Tracer;

/// The current process-wide tracer, if one has been registered.
static GLOBAL_TRACER: OnceLock<RwLock<Option<Tracer>>> = OnceLock::new();

#[inline]
fn global_tracer() -> &'static RwLock<Option<Tracer>> {
    GLOBAL_TRACER.get_or_init(|| RwLock::new(None))
}

/// Registers `tracer` as the process-wide tracer, replacing any previous one.
pub fn set_tracer(tracer: Tracer) {
    let _lock = global_tracer()
        .write()
        .map(|mut global| *global = Some(tracer));
}

/// Returns the process-wide tracer, or `None` when tracing is disabled or
/// not initialized for this process.
pub fn tracer() -> Option<Tracer> {
    global_tracer().read().ok().and_then(|guard| guard.clone())
}
