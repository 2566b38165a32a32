//! Query description and in-process evaluation.
//!
//! Documents have no enforced schema, so filtering and ordering run over
//! the decoded JSON bodies. Field names may use `.` to reach nested values.
//! Results are ordered by the requested field and then by document id,
//! which makes the order total and repeatable.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use synergy_shared::timestamp::StoreTimestamp;

use crate::models::StoredDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Equals { field: String, value: Value },
    /// The array at `field` contains `value`.
    ArrayContains { field: String, value: Value },
}

impl Filter {
    fn matches(&self, data: &Map<String, Value>) -> bool {
        match self {
            Filter::Equals { field, value } => lookup(data, field) == Some(value),
            Filter::ArrayContains { field, value } => match lookup(data, field) {
                Some(Value::Array(items)) => items.contains(value),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Equals {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(
        mut self,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Whether `doc` belongs to this query's result set (ignoring limit).
    pub fn matches(&self, doc: &StoredDocument) -> bool {
        doc.collection == self.collection && self.filters.iter().all(|f| f.matches(&doc.data))
    }

    /// Filter, order and truncate a collection scan.
    pub fn apply(&self, docs: Vec<StoredDocument>) -> Vec<StoredDocument> {
        let mut out: Vec<StoredDocument> = docs.into_iter().filter(|d| self.matches(d)).collect();

        out.sort_by(|a, b| {
            let primary = match &self.order_by {
                Some(order) => {
                    let ord = compare_values(lookup(&a.data, &order.field), lookup(&b.data, &order.field));
                    match order.direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                }
                None => Ordering::Equal,
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });

        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Resolve a dotted field path.
pub fn lookup<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut current = data.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Order values by type first (missing < null < bool < number < timestamp <
/// string < other), then by value within a type.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank_a = rank(a);
    let rank_b = rank(b);
    if rank_a != rank_b {
        return rank_a.cmp(&rank_b);
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => match (StoreTimestamp::from_value(x), StoreTimestamp::from_value(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(v) if StoreTimestamp::from_value(v).is_some() => 4,
        Some(Value::String(_)) => 5,
        Some(_) => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> StoredDocument {
        StoredDocument {
            collection: "tasks".into(),
            id: id.into(),
            data: data.as_object().cloned().unwrap(),
            version: 1,
        }
    }

    fn ts(seconds: i64) -> Value {
        StoreTimestamp { seconds, nanos: 0 }.to_value()
    }

    #[test]
    fn equality_and_array_filters() {
        let q = Query::collection("tasks")
            .where_eq("projectId", "p1")
            .where_array_contains("tags", "urgent");

        assert!(q.matches(&doc("a", json!({"projectId": "p1", "tags": ["urgent"]}))));
        assert!(!q.matches(&doc("b", json!({"projectId": "p1", "tags": []}))));
        assert!(!q.matches(&doc("c", json!({"projectId": "p2", "tags": ["urgent"]}))));
        assert!(!q.matches(&doc("d", json!({"tags": ["urgent"]}))));
    }

    #[test]
    fn orders_by_timestamp_descending() {
        let q = Query::collection("tasks").order_by("createdAt", Direction::Descending);
        let out = q.apply(vec![
            doc("a", json!({"createdAt": ts(1)})),
            doc("b", json!({"createdAt": ts(3)})),
            doc("c", json!({"createdAt": ts(2)})),
        ]);
        let ids: Vec<_> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
    }

    #[test]
    fn ties_break_by_id_regardless_of_direction() {
        for direction in [Direction::Ascending, Direction::Descending] {
            let q = Query::collection("tasks").order_by("createdAt", direction);
            let out = q.apply(vec![
                doc("z", json!({"createdAt": ts(5)})),
                doc("m", json!({"createdAt": ts(5)})),
                doc("a", json!({"createdAt": ts(5)})),
            ]);
            let ids: Vec<_> = out.iter().map(|d| d.id.as_str()).collect();
            assert_eq!(ids, ["a", "m", "z"]);
        }
    }

    #[test]
    fn nested_lookup_and_limit() {
        let q = Query::collection("tasks")
            .where_eq("meta.owner", "u1")
            .order_by("rank", Direction::Ascending)
            .limit(1);
        let out = q.apply(vec![
            doc("a", json!({"meta": {"owner": "u1"}, "rank": 2})),
            doc("b", json!({"meta": {"owner": "u1"}, "rank": 1})),
            doc("c", json!({"meta": {"owner": "u2"}, "rank": 0})),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "b");
    }
}
