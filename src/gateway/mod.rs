// Remote Data Gateway seam - everything remote goes through this trait
pub mod subscription;

pub use subscription::{ChangeEvent, Subscription};

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found")]
    NotFound,

    #[error("Denied: {0}")]
    Denied(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid record: {0}")]
    Invalid(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row predicate applied by the backend. All comparisons work on the
/// JSON representation of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals value.
    Eq(String, Value),
    /// Column is one of the given values.
    In(String, Vec<Value>),
    /// Column contains the needle, case-insensitive. Non-string columns
    /// never match.
    Contains(String, String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn any(column: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In(column.into(), values)
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(column.into(), needle.into())
    }

    pub fn matches(&self, row: &Value) -> bool {
        match self {
            Self::Eq(column, value) => row.get(column) == Some(value),
            Self::In(column, values) => row
                .get(column)
                .map(|v| values.contains(v))
                .unwrap_or(false),
            Self::Contains(column, needle) => row
                .get(column)
                .and_then(Value::as_str)
                .map(|s| s.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// A table-scoped read: AND filters, an optional OR group, ordering and
/// an offset/limit range. Offset pagination has no cursor stability
/// guarantee under concurrent inserts.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// OR group: a row must match at least one (when non-empty).
    pub any_of: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn any_of(mut self, filters: Vec<Filter>) -> Self {
        self.any_of = filters;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        let all = self.filters.iter().all(|f| f.matches(row));
        let any = self.any_of.is_empty() || self.any_of.iter().any(|f| f.matches(row));
        all && any
    }
}

/// Compare two JSON scalars for ordering. Strings that parse as RFC 3339
/// timestamps compare as instants, so subsecond precision differences
/// cannot misorder rows.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => match (parse_instant(x), parse_instant(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        _ => Ordering::Equal,
    }
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Sort rows by the given order columns, applied in sequence.
pub fn sort_rows(rows: &mut [Value], order: &[Order]) {
    rows.sort_by(|a, b| {
        for o in order {
            let av = a.get(&o.column).unwrap_or(&Value::Null);
            let bv = b.get(&o.column).unwrap_or(&Value::Null);
            let mut ord = cmp_values(av, bv);
            if o.direction == Direction::Desc {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Generic interface over the hosted relational backend. Rows travel as
/// JSON values; typed decoding happens at the service boundary.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Value>, GatewayError>;

    /// Insert a record. The backend assigns `id`, `created_at` and
    /// `updated_at` when absent and returns the authoritative row.
    async fn insert(&self, table: &str, record: Value) -> Result<Value, GatewayError>;

    /// Merge a partial patch into the row with the given id.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, GatewayError>;

    /// Hard delete. Returns whether a row existed.
    async fn delete(&self, table: &str, id: &str) -> Result<bool, GatewayError>;

    /// Escape hatch for server-side atomic operations.
    async fn rpc(&self, name: &str, args: Value) -> Result<Value, GatewayError>;

    /// Register a push listener for a table, optionally narrowed to rows
    /// matching a filter. Missed events are never replayed; callers must
    /// re-fetch on (re)subscribe.
    async fn subscribe(
        &self,
        table: &str,
        filter: Option<Filter>,
    ) -> Result<Subscription, GatewayError>;
}

pub type DynGateway = Arc<dyn Gateway>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_filter_matches_row() {
        let row = json!({"slug": "domingo", "published": true});
        assert!(Filter::eq("slug", "domingo").matches(&row));
        assert!(Filter::eq("published", true).matches(&row));
        assert!(!Filter::eq("slug", "otro").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    #[test]
    fn in_filter_matches_any_value() {
        let row = json!({"kind": "like"});
        let filter = Filter::any("kind", vec![json!("like"), json!("favorite")]);
        assert!(filter.matches(&row));
        let filter = Filter::any("kind", vec![json!("share")]);
        assert!(!filter.matches(&row));
    }

    #[test]
    fn contains_filter_is_case_insensitive() {
        let row = json!({"title": "Confia en DIOS"});
        assert!(Filter::contains("title", "dios").matches(&row));
        assert!(!Filter::contains("title", "fe").matches(&row));
        // Non-string columns never match
        let row = json!({"title": 42});
        assert!(!Filter::contains("title", "4").matches(&row));
    }

    #[test]
    fn query_requires_all_filters_and_one_of_any() {
        let query = Query::new()
            .filter(Filter::eq("published", true))
            .any_of(vec![
                Filter::contains("title", "dios"),
                Filter::contains("content", "dios"),
            ]);

        assert!(query.matches(&json!({"published": true, "title": "Dios es fiel", "content": ""})));
        assert!(query.matches(&json!({"published": true, "title": "", "content": "con Dios"})));
        assert!(!query.matches(&json!({"published": false, "title": "Dios es fiel"})));
        assert!(!query.matches(&json!({"published": true, "title": "Retiro", "content": ""})));
    }

    #[test]
    fn timestamps_compare_as_instants_not_strings() {
        // Lexicographic comparison would order these the wrong way round
        let earlier = json!("2024-03-01T10:00:00Z");
        let later = json!("2024-03-01T10:00:00.500Z");
        assert_eq!(cmp_values(&earlier, &later), Ordering::Less);
    }

    #[test]
    fn sort_rows_applies_orders_in_sequence() {
        let mut rows = vec![
            json!({"a": 1, "b": "x"}),
            json!({"a": 2, "b": "y"}),
            json!({"a": 1, "b": "z"}),
        ];
        sort_rows(&mut rows, &[Order::asc("a"), Order::desc("b")]);
        assert_eq!(rows[0]["b"], "z");
        assert_eq!(rows[1]["b"], "x");
        assert_eq!(rows[2]["b"], "y");
    }

    #[test]
    fn null_sorts_first_ascending() {
        let mut rows = vec![json!({"a": 3}), json!({"b": 1}), json!({"a": 1})];
        sort_rows(&mut rows, &[Order::asc("a")]);
        assert!(rows[0].get("a").is_none());
        assert_eq!(rows[1]["a"], 1);
        assert_eq!(rows[2]["a"], 3);
    }
}
