use std::fmt;
use std::num::ParseIntError;
use std::ops::{BitAnd, BitOr};

/// Flags carried with a [`TraceContext`].
///
/// The only flag currently defined is the sampling bit, which downstream
/// participants propagate unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceFlags(u8);

impl TraceFlags {
    /// Trace is not sampled.
    pub const NOT_SAMPLED: TraceFlags = TraceFlags(0x00);

    /// Trace is sampled.
    pub const SAMPLED: TraceFlags = TraceFlags(0x01);

    /// Construct new trace flags.
    pub const fn new(flags: u8) -> Self {
        TraceFlags(flags)
    }

    /// Returns `true` if the sampling bit is set.
    pub fn is_sampled(&self) -> bool {
        (*self & TraceFlags::SAMPLED) == TraceFlags::SAMPLED
    }

    /// Returns a copy of these flags with the sampling bit set to `sampled`.
    pub fn with_sampled(&self, sampled: bool) -> Self {
        if sampled {
            *self | TraceFlags::SAMPLED
        } else {
            TraceFlags(self.0 & !TraceFlags::SAMPLED.0)
        }
    }
}

impl BitAnd for TraceFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl BitOr for TraceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl fmt::LowerHex for TraceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A 16-byte value identifying a whole trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u128);

impl TraceId {
    /// Invalid trace id, all zeroes.
    pub const INVALID: TraceId = TraceId(0);

    /// Construct a trace id from its raw representation.
    pub const fn from_u128(value: u128) -> Self {
        TraceId(value)
    }

    /// Parse a trace id from 32 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
        u128::from_str_radix(hex, 16).map(TraceId)
    }

    /// The raw representation of this trace id.
    pub const fn to_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:032x}", self.0))
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:032x}", self.0))
    }
}

impl fmt::LowerHex for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// An 8-byte value identifying one unit of work within a trace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(u64);

impl SpanId {
    /// Invalid span id, all zeroes.
    pub const INVALID: SpanId = SpanId(0);

    /// Construct a span id from its raw representation.
    pub const fn from_u64(value: u64) -> Self {
        SpanId(value)
    }

    /// Parse a span id from 16 lowercase hex characters.
    pub fn from_hex(hex: &str) -> Result<Self, ParseIntError> {
        u64::from_str_radix(hex, 16).map(SpanId)
    }

    /// The raw representation of this span id.
    pub const fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:016x}", self.0))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:016x}", self.0))
    }
}

impl fmt::LowerHex for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// The immutable, propagatable identity of a unit of work within a trace.
///
/// A child unit references its parent's context through
/// `parent_span_id` but never mutates it. The empty context stands for "no
/// parent": starting a span from it begins a new trace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    trace_flags: TraceFlags,
}

impl TraceContext {
    /// Construct a new context from its parts.
    pub fn new(
        trace_id: TraceId,
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        trace_flags: TraceFlags,
    ) -> Self {
        TraceContext {
            trace_id,
            span_id,
            parent_span_id,
            trace_flags,
        }
    }

    /// The invalid context, usable only as a trace root.
    pub fn empty() -> Self {
        TraceContext {
            trace_id: TraceId::INVALID,
            span_id: SpanId::INVALID,
            parent_span_id: None,
            trace_flags: TraceFlags::default(),
        }
    }

    /// The id of the trace this context belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The id of the unit of work this context identifies.
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The id of the parent unit of work, if any.
    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    /// The flags carried with this context.
    pub fn trace_flags(&self) -> TraceFlags {
        self.trace_flags
    }

    /// Whether both ids are non-zero.
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }

    /// Whether the sampling bit is set.
    pub fn is_sampled(&self) -> bool {
        self.trace_flags.is_sampled()
    }

    /// The context of a new child unit of work identified by `span_id`.
    pub(crate) fn child(&self, span_id: SpanId) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id,
            span_id,
            parent_span_id: Some(self.span_id),
            trace_flags: self.trace_flags,
        }
    }
}
