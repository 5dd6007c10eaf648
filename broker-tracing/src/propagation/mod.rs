//! Moving trace contexts through carriers.
//!
//! A carrier is the flat string-keyed mapping attached to a message — its
//! headers. [`Injector`] and [`Extractor`] adapt a concrete carrier type for
//! writing and reading; [`HeaderPropagator`] is the codec that decides which
//! keys encode a [`TraceContext`] and how.
//!
//! [`TraceContext`]: crate::trace::TraceContext

use std::collections::HashMap;

use thiserror::Error;

mod header;

pub use header::{HeaderPropagator, SPAN_ID_HEADER, TRACE_ID_HEADER, TRACE_LEVEL_HEADER};

/// Writes string key/value pairs into an outbound carrier.
pub trait Injector {
    /// Add a key and value to the carrier.
    fn set(&mut self, key: &str, value: String);
}

/// Reads string key/value pairs from an inbound carrier.
pub trait Extractor {
    /// Get a value for a key from the carrier.
    fn get(&self, key: &str) -> Option<&str>;

    /// Collect all the keys in the carrier.
    fn keys(&self) -> Vec<&str>;
}

impl<S: std::hash::BuildHasher> Injector for HashMap<String, String, S> {
    /// Set a key and value in the HashMap.
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_lowercase(), value);
    }
}

impl<S: std::hash::BuildHasher> Extractor for HashMap<String, String, S> {
    /// Get a value for a key from the HashMap.
    fn get(&self, key: &str) -> Option<&str> {
        self.get(&key.to_lowercase()).map(|v| v.as_str())
    }

    /// Collect all the keys from the HashMap.
    fn keys(&self) -> Vec<&str> {
        self.keys().map(|k| k.as_str()).collect()
    }
}

/// Errors raised while decoding a carrier.
///
/// These never cross this crate's public boundary: extraction degrades to
/// the empty context and reports the failure at debug level instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PropagationError {
    /// A recognized key held a value that could not be decoded.
    #[error("malformed {key} value in carrier")]
    Malformed {
        /// The carrier key that failed to decode.
        key: &'static str,
    },

    /// No trace context keys were present in the carrier.
    #[error("no trace context in carrier")]
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_map_get_is_case_insensitive() {
        let mut carrier = HashMap::new();
        carrier.set("headerName", "value".to_string());

        assert_eq!(
            Extractor::get(&carrier, "HEADERNAME"),
            Some("value"),
            "case insensitive extraction"
        );
    }

    #[test]
    fn hash_map_keys() {
        let mut carrier = HashMap::new();
        carrier.set("headerName1", "value1".to_string());
        carrier.set("headerName2", "value2".to_string());

        let got = Extractor::keys(&carrier);
        assert_eq!(got.len(), 2);
        assert!(got.contains(&"headername1"));
        assert!(got.contains(&"headername2"));
    }
}
