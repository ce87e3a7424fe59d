use chrono::{DateTime, Utc};

use crate::AggregateId;

/// Filter over the journal. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,

    pub aggregate_type: Option<String>,

    /// Any of these event types.
    pub event_types: Option<Vec<String>>,

    /// JSON document the payload must contain, with PostgreSQL `@>` semantics.
    pub payload_contains: Option<serde_json::Value>,

    /// Inclusive lower bound on the event timestamp.
    pub from_timestamp: Option<DateTime<Utc>>,

    /// Inclusive upper bound on the event timestamp.
    pub to_timestamp: Option<DateTime<Utc>>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        }
    }

    pub fn for_event_type(event_type: impl Into<String>) -> Self {
        Self {
            event_types: Some(vec![event_type.into()]),
            ..Default::default()
        }
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_types(mut self, event_types: Vec<String>) -> Self {
        self.event_types = Some(event_types);
        self
    }

    pub fn payload_contains(mut self, fragment: serde_json::Value) -> Self {
        self.payload_contains = Some(fragment);
        self
    }

    pub fn from_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(ts);
        self
    }

    pub fn to_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.to_timestamp = Some(ts);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// JSON containment as PostgreSQL's `jsonb @>` defines it: every key of an
/// object fragment must be present and contained, every element of an array
/// fragment must be contained by some element, scalars must be equal.
pub fn json_contains(document: &serde_json::Value, fragment: &serde_json::Value) -> bool {
    use serde_json::Value;

    match (document, fragment) {
        (Value::Object(doc), Value::Object(frag)) => frag
            .iter()
            .all(|(key, value)| doc.get(key).is_some_and(|d| json_contains(d, value))),
        (Value::Array(doc), Value::Array(frag)) => frag
            .iter()
            .all(|value| doc.iter().any(|d| json_contains(d, value))),
        (Value::Array(doc), scalar) if !scalar.is_object() => doc.iter().any(|d| d == scalar),
        (doc, frag) => doc == frag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_sets_filters() {
        let id = AggregateId::new();
        let query = EventQuery::for_aggregate(id)
            .aggregate_type("Order")
            .event_types(vec!["OrderPlaced".into(), "OrderCancelled".into()])
            .limit(10)
            .offset(5);

        assert_eq!(query.aggregate_id, Some(id));
        assert_eq!(query.aggregate_type.as_deref(), Some("Order"));
        assert_eq!(query.event_types.as_ref().map(Vec::len), Some(2));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }

    #[test]
    fn containment_matches_nested_objects() {
        let doc = json!({"type": "AgentAssigned", "data": {"agent_id": "a-1", "agent_email": "x@y"}});
        assert!(json_contains(&doc, &json!({"data": {"agent_id": "a-1"}})));
        assert!(!json_contains(&doc, &json!({"data": {"agent_id": "a-2"}})));
        assert!(!json_contains(&doc, &json!({"missing": 1})));
    }

    #[test]
    fn containment_matches_array_elements() {
        let doc = json!({"lines": [{"product_id": "p1", "quantity": 2}, {"product_id": "p2"}]});
        assert!(json_contains(&doc, &json!({"lines": [{"product_id": "p2"}]})));
        assert!(!json_contains(&doc, &json!({"lines": [{"product_id": "p3"}]})));
        assert!(json_contains(&json!([1, 2, 3]), &json!(2)));
    }
}
