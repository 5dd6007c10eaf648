//! Best-effort derivation of descriptive span tags from connection
//! metadata.
//!
//! Derivation never fails: tags that cannot be computed from the metadata
//! at hand are omitted and named in the result's diagnostic, which call
//! sites report at debug level. Tagging never blocks the underlying broker
//! call.

use broker_tracing::trace::Span;
use broker_tracing::KeyValue;
use tracing::debug;

use crate::channel::ConnectionInfo;

/// Tags derived from a connection, plus the names of any that could not be
/// derived from the metadata available.
#[derive(Clone, Debug, Default)]
pub struct ConnectionTags {
    /// The tags that could be derived.
    pub tags: Vec<KeyValue>,
    /// Names of tags omitted for lack of metadata.
    pub omitted: Vec<&'static str>,
}

fn broker_tags(connection: &ConnectionInfo) -> ConnectionTags {
    let mut derived = ConnectionTags::default();
    match (connection.host.as_deref(), connection.port) {
        (Some(host), Some(port)) => derived
            .tags
            .push(KeyValue::new("address", format!("{host}:{port}"))),
        _ => derived.omitted.push("address"),
    }
    derived
}

/// Tags describing an outbound publish.
pub fn publisher_tags(
    connection: &ConnectionInfo,
    exchange: &str,
    routing_key: &str,
) -> ConnectionTags {
    let mut derived = broker_tags(connection);
    derived.tags.push(KeyValue::new("sort", "publish"));
    derived.tags.push(KeyValue::new("key", routing_key.to_owned()));
    derived
        .tags
        .push(KeyValue::new("exchange", exchange.to_owned()));
    derived
}

/// Tags describing a consume operation on `queue`.
pub fn consumer_tags(connection: &ConnectionInfo, queue: &str) -> ConnectionTags {
    let mut derived = broker_tags(connection);
    derived.tags.push(KeyValue::new("sort", "consume"));
    derived.tags.push(KeyValue::new("queue", queue.to_owned()));
    derived
}

/// Applies `derived` to `span`, reporting omissions at debug level.
pub(crate) fn apply(span: &mut Span, derived: ConnectionTags) {
    if !derived.omitted.is_empty() {
        debug!(
            omitted = ?derived.omitted,
            "incomplete connection metadata, omitting span tags"
        );
    }
    span.set_tags(derived.tags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_tracing::Value;

    fn tag<'a>(derived: &'a ConnectionTags, key: &str) -> Option<&'a Value> {
        derived
            .tags
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    #[test]
    fn publisher_tags_with_full_metadata() {
        let connection = ConnectionInfo::new("broker.internal", 5672);
        let derived = publisher_tags(&connection, "orders", "new");

        assert!(derived.omitted.is_empty());
        assert_eq!(
            tag(&derived, "address"),
            Some(&Value::from("broker.internal:5672".to_string()))
        );
        assert_eq!(tag(&derived, "sort"), Some(&Value::from("publish")));
        assert_eq!(tag(&derived, "key"), Some(&Value::from("new".to_string())));
        assert_eq!(
            tag(&derived, "exchange"),
            Some(&Value::from("orders".to_string()))
        );
    }

    #[test]
    fn consumer_tags_omit_address_without_host() {
        let connection = ConnectionInfo {
            host: None,
            port: Some(5672),
        };
        let derived = consumer_tags(&connection, "q1");

        assert_eq!(derived.omitted, ["address"]);
        assert_eq!(tag(&derived, "address"), None);
        assert_eq!(tag(&derived, "sort"), Some(&Value::from("consume")));
        assert_eq!(tag(&derived, "queue"), Some(&Value::from("q1".to_string())));
    }
}
