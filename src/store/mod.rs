//! Backend storage seams: a document store for structured content, a realtime
//! JSON tree used as the secondary message store, and blob storage for images.
//!
//! Each seam is a trait with a production implementation and an in-memory one.
//! The server picks implementations once at startup and hands them to the
//! handlers through `AppState`.

pub mod blob;
pub mod memory;
pub mod realtime;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{cmp::Ordering, time::Duration};

pub use blob::{Blob, BlobStore, LocalBlobStore, MemoryBlobStore, ProgressCallback, UploadProgress};
pub use memory::MemoryDocumentStore;
pub use realtime::{HttpRealtimeStore, MemoryRealtimeStore, RealtimeStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status} for {path}")]
    Upstream { status: u16, path: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    Unavailable(String),
}

/// A stored document: its id plus a JSON object of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn into_record<T: DeserializeOwned>(self) -> Result<Stored<T>, StoreError> {
        Ok(Stored {
            id: self.id,
            record: serde_json::from_value(self.data)?,
        })
    }

    /// Top-level field lookup, `None` when absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Equality filters, one optional ordering and an optional limit. Documents
/// missing the order field sort after all others in either direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters
            .iter()
            .all(|f| data.get(&f.field).is_some_and(|v| json_eq(v, &f.value)))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. With `id == None` the store generates one.
    /// An existing document with the same id is replaced.
    async fn insert(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<String, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Shallow-merge `patch` into the document. Returns `false` when it does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<bool, StoreError>;

    /// Returns `false` when the document did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filters: &[Filter]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<Duration, StoreError>;
}

/// A serde type that lives in a named collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
}

/// A record together with its document id, serialized flat.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

impl dyn DocumentStore {
    pub async fn insert_record<T: Record>(&self, record: &T) -> Result<String, StoreError> {
        let data = serde_json::to_value(record)?;
        self.insert(T::COLLECTION, None, data).await
    }

    pub async fn get_record<T: Record>(&self, id: &str) -> Result<Option<Stored<T>>, StoreError> {
        match self.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(doc.into_record()?)),
            None => Ok(None),
        }
    }

    pub async fn list_records<T: Record>(
        &self,
        query: &Query,
    ) -> Result<Vec<Stored<T>>, StoreError> {
        let records = self
            .query(T::COLLECTION, query)
            .await?
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                doc.into_record()
                    .inspect_err(|e| {
                        tracing::warn!(
                            collection = T::COLLECTION,
                            id = %id,
                            "Skipping malformed document: {}",
                            e
                        )
                    })
                    .ok()
            })
            .collect();
        Ok(records)
    }

    pub async fn update_record<T: Record>(
        &self,
        id: &str,
        patch: Value,
    ) -> Result<Option<Stored<T>>, StoreError> {
        if !self.update(T::COLLECTION, id, patch).await? {
            return Ok(None);
        }
        self.get_record(id).await
    }
}

/// Equality used by filters: numbers compare by value so `2` matches `2.0`.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order over JSON scalars used for sorting. Values of different kinds
/// order as null < bool < number < string < array < object.
pub fn json_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Sort documents in place per `order`, keeping documents without the field last.
pub fn sort_documents(docs: &mut [Document], order: &OrderBy) {
    docs.sort_by(|a, b| match (a.field(&order.field), b.field(&order.field)) {
        (Some(x), Some(y)) => match order.direction {
            Direction::Asc => json_cmp(x, y),
            Direction::Desc => json_cmp(y, x),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            data,
        }
    }

    #[test]
    fn test_query_matches_equality_filters() {
        let q = Query::new().filter("ip", "1.2.3.4").filter("read", false);
        assert!(q.matches(&json!({ "ip": "1.2.3.4", "read": false, "name": "x" })));
        assert!(!q.matches(&json!({ "ip": "1.2.3.4", "read": true })));
        assert!(!q.matches(&json!({ "read": false })));
    }

    #[test]
    fn test_numbers_match_across_representations() {
        assert!(json_eq(&json!(2), &json!(2.0)));
        assert!(!json_eq(&json!(2), &json!("2")));
    }

    #[test]
    fn test_sort_documents_puts_missing_fields_last() {
        let mut docs = vec![
            doc("a", json!({ "order": 3 })),
            doc("b", json!({})),
            doc("c", json!({ "order": 1 })),
        ];
        sort_documents(
            &mut docs,
            &OrderBy {
                field: "order".to_string(),
                direction: Direction::Asc,
            },
        );
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        sort_documents(
            &mut docs,
            &OrderBy {
                field: "order".to_string(),
                direction: Direction::Desc,
            },
        );
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }
}
