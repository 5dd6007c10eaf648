//! Execution-scoped tracking of the active unit of work.
//!
//! Each execution context (thread) owns its own stack of active trace
//! contexts. Opening a [`Scope`] pushes onto the stack of the thread it is
//! created on and closing it pops; the top of the stack is what
//! [`Tracer::start_active_span`] parents to when no explicit parent is given.
//!
//! Nothing here is shared between threads. Concurrent executions that share
//! one [`Tracer`] each see their own independent stack.
//!
//! [`Scope`]: crate::trace::Scope
//! [`Tracer`]: crate::trace::Tracer
//! [`Tracer::start_active_span`]: crate::trace::Tracer::start_active_span

use std::cell::RefCell;

use crate::trace::TraceContext;

thread_local! {
    static ACTIVE_CONTEXTS: RefCell<Vec<TraceContext>> = const { RefCell::new(Vec::new()) };
}

/// Returns the context of the innermost active scope on this thread, if any.
pub fn current() -> Option<TraceContext> {
    ACTIVE_CONTEXTS.with(|stack| stack.borrow().last().cloned())
}

/// Returns whether any scope is active on this thread.
pub fn is_active() -> bool {
    ACTIVE_CONTEXTS.with(|stack| !stack.borrow().is_empty())
}

pub(crate) fn push(context: TraceContext) {
    ACTIVE_CONTEXTS.with(|stack| stack.borrow_mut().push(context));
}

pub(crate) fn pop() -> Option<TraceContext> {
    ACTIVE_CONTEXTS.with(|stack| stack.borrow_mut().pop())
}
