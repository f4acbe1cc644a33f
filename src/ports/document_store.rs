//! DocumentStore port - the hosted document database the core runs on.
//!
//! Collections hold JSON documents addressed by string ids. Queries
//! support equality and "in set" filters plus one optional sort field.
//! A query that touches more than one field needs a composite index; an
//! adapter without that index answers `StoreError::MissingIndex`, and
//! callers degrade to a single-field query with local filtering and
//! sorting (see [`Query::relaxed`] and [`Query::apply_locally`]).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::foundation::CoreError;

// ════════════════════════════════════════════════════════════════════════════
// Documents
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: JsonValue,
}

impl Document {
    pub fn new(id: impl Into<String>, data: JsonValue) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Serializes a record into a document.
    pub fn from_record<T: Serialize>(id: impl Into<String>, record: &T) -> Result<Self, StoreError> {
        Ok(Self::new(id, serde_json::to_value(record)?))
    }

    /// Deserializes the document body into a record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            StoreError::Serialization(format!("document {}: {}", self.id, e))
        })
    }

    /// Top-level field value, `Null` when absent.
    pub fn field(&self, name: &str) -> &JsonValue {
        self.data.get(name).unwrap_or(&JsonValue::Null)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Queries
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: JsonValue },
    In { field: String, values: Vec<JsonValue> },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn in_set<V: Into<JsonValue>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq { field, .. } | Filter::In { field, .. } => field,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => doc.field(field) == value,
            Filter::In { field, values } => values.contains(doc.field(field)),
        }
    }

    fn is_equality(&self) -> bool {
        matches!(self, Filter::Eq { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Name of the composite index this query needs, if any.
    ///
    /// Format: `collection(filter_field,...,order_field)` with filter
    /// fields sorted. Single-field queries never need one.
    pub fn required_index(&self) -> Option<String> {
        let mut fields: Vec<&str> = self.filters.iter().map(Filter::field).collect();
        fields.sort_unstable();
        fields.dedup();
        if let Some(order) = &self.order_by {
            if !fields.contains(&order.field.as_str()) {
                fields.push(order.field.as_str());
            }
        }
        if fields.len() <= 1 {
            return None;
        }
        Some(format!("{}({})", self.collection, fields.join(",")))
    }

    /// Single-field fallback: the first equality filter (or the first
    /// filter if none is an equality), unsorted.
    pub fn relaxed(&self) -> Query {
        let anchor = self
            .filters
            .iter()
            .find(|f| f.is_equality())
            .or_else(|| self.filters.first())
            .cloned();
        Query {
            collection: self.collection.clone(),
            filters: anchor.into_iter().collect(),
            order_by: None,
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Sorts by the order field, ties broken by document id.
    pub fn sort(&self, docs: &mut [Document]) {
        match &self.order_by {
            Some(order) => docs.sort_by(|a, b| {
                let by_field = compare_json(a.field(&order.field), b.field(&order.field));
                let by_field = match order.direction {
                    Direction::Ascending => by_field,
                    Direction::Descending => by_field.reverse(),
                };
                by_field.then_with(|| a.id.cmp(&b.id))
            }),
            None => docs.sort_by(|a, b| a.id.cmp(&b.id)),
        }
    }

    /// Filters and sorts documents the way the store would have.
    pub fn apply_locally(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut kept: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        self.sort(&mut kept);
        kept
    }
}

/// Total order over JSON scalars: null < bool < number < string < other.
pub fn compare_json(a: &JsonValue, b: &JsonValue) -> Ordering {
    fn rank(v: &JsonValue) -> u8 {
        match v {
            JsonValue::Null => 0,
            JsonValue::Bool(_) => 1,
            JsonValue::Number(_) => 2,
            JsonValue::String(_) => 3,
            JsonValue::Array(_) | JsonValue::Object(_) => 4,
        }
    }
    match (a, b) {
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Writes
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite the whole document.
    Replace,
    /// Overwrite the given top-level fields, keep the rest.
    Merge,
    /// Only set top-level fields that are absent or null.
    MergeMissing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub collection: String,
    pub id: String,
    pub data: JsonValue,
    pub mode: WriteMode,
}

/// A document field must hold `expected` when the batch commits.
///
/// A missing document or field reads as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Precondition {
    pub collection: String,
    pub id: String,
    pub field: String,
    pub expected: JsonValue,
}

/// Writes applied atomically, after all preconditions hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<JsonValue>,
    ) -> Self {
        self.preconditions.push(Precondition {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            expected: expected.into(),
        });
        self
    }

    pub fn put(
        mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        data: JsonValue,
        mode: WriteMode,
    ) -> Self {
        self.writes.push(Write {
            collection: collection.into(),
            id: id.into(),
            data,
            mode,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Document),
    /// Another writer got there first. Carries the stored document.
    Existing(Document),
}

impl CreateOutcome {
    pub fn into_document(self) -> Document {
        match self {
            CreateOutcome::Created(doc) | CreateOutcome::Existing(doc) => doc,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════════════

/// Full, ordered result set of a subscribed query after one change.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

/// Stream of snapshots. The first item is the state at attach time.
/// Dropping the receiver detaches the subscription.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>;

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Precondition failed on {collection}/{id}.{field}")]
    PreconditionFailed {
        collection: String,
        id: String,
        field: String,
    },

    #[error("Query requires missing index {index}")]
    MissingIndex { index: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => CoreError::not_found("Document", id),
            StoreError::PreconditionFailed { .. } => CoreError::invalid_state(err.to_string()),
            StoreError::MissingIndex { .. } | StoreError::Unavailable(_) => {
                CoreError::transient(err.to_string())
            }
            StoreError::Serialization(message) => CoreError::internal(message),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Port
// ════════════════════════════════════════════════════════════════════════════

/// Port for the document database.
///
/// Implementations must ensure:
/// - `create_if_absent` is atomic: of concurrent calls for one id exactly
///   one sees `Created`
/// - `commit` checks every precondition and applies every write as one
///   atomic step
/// - snapshots for one subscription are delivered in commit order
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn put(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
        mode: WriteMode,
    ) -> Result<(), StoreError>;

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        data: JsonValue,
    ) -> Result<CreateOutcome, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    async fn fetch(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn subscribe(&self, query: Query) -> Result<SnapshotReceiver, StoreError>;
}
