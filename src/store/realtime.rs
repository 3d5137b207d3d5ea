//! Realtime JSON tree used as the secondary message store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::StoreError;

#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge the fields of `patch` into the object at `path`, creating it if needed.
    async fn update(&self, path: &str, patch: Value) -> Result<(), StoreError>;

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<Duration, StoreError>;
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

// ============================================================================
// HTTP-backed tree
// ============================================================================

/// A JSON tree exposed over REST: `{base}/{path}.json` with PUT, PATCH, GET
/// and DELETE, optionally authenticated with an `auth` query parameter.
pub struct HttpRealtimeStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
}

impl HttpRealtimeStore {
    pub fn new(base_url: &str, auth: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, segments(path).join("/"))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header("Accept", "application/json");
        match &self.auth {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }

    async fn send(
        &self,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, StoreError> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(path = %path, error = %e, "realtime store request failed");
            StoreError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path = %path, status = %status, "realtime store returned error");
            return Err(StoreError::Upstream {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RealtimeStore for HttpRealtimeStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let builder = self.request(reqwest::Method::PUT, path).json(&value);
        self.send(path, builder).await?;
        Ok(())
    }

    async fn update(&self, path: &str, patch: Value) -> Result<(), StoreError> {
        let builder = self.request(reqwest::Method::PATCH, path).json(&patch);
        self.send(path, builder).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let builder = self.request(reqwest::Method::GET, path);
        let value: Value = self.send(path, builder).await?.json().await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let builder = self.request(reqwest::Method::DELETE, path);
        self.send(path, builder).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let builder = self
            .request(reqwest::Method::GET, "")
            .query(&[("shallow", "true")]);
        self.send("/", builder).await?;
        Ok(start.elapsed())
    }
}

// ============================================================================
// In-memory tree
// ============================================================================

#[derive(Debug)]
pub struct MemoryRealtimeStore {
    root: RwLock<Value>,
}

impl Default for MemoryRealtimeStore {
    fn default() -> Self {
        Self {
            root: RwLock::new(Value::Object(Map::new())),
        }
    }
}

impl MemoryRealtimeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Walk to the node at `path`, creating intermediate objects.
fn node_mut<'a>(root: &'a mut Value, path: &[&str]) -> &'a mut Value {
    path.iter().fold(root, |node, key| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
            _ => unreachable!("node was just made an object"),
        }
    })
}

#[async_trait]
impl RealtimeStore for MemoryRealtimeStore {
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        if value.is_null() {
            return self.remove(path).await;
        }
        let mut root = self.root.write().await;
        *node_mut(&mut root, &segments(path)) = value;
        Ok(())
    }

    async fn update(&self, path: &str, patch: Value) -> Result<(), StoreError> {
        let patch = match patch {
            Value::Object(fields) => fields,
            other => return self.set(path, other).await,
        };
        let mut root = self.root.write().await;
        let node = node_mut(&mut root, &segments(path));
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        if let Value::Object(fields) = node {
            fields.extend(patch);
        }
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let root = self.root.read().await;
        let found = segments(path)
            .iter()
            .try_fold(&*root, |node, key| node.get(*key));
        Ok(found.filter(|v| !v.is_null()).cloned())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let parts = segments(path);
        let mut root = self.root.write().await;
        let Some((last, parents)) = parts.split_last() else {
            *root = Value::Object(Map::new());
            return Ok(());
        };
        let parent = parents
            .iter()
            .try_fold(&mut *root, |node, key| node.get_mut(*key));
        if let Some(Value::Object(map)) = parent {
            map.remove(*last);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let _ = self.root.read().await;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_store_builds_json_urls() {
        let store = HttpRealtimeStore::new("https://example-rtdb.test/", None);
        assert_eq!(
            store.url("messages/abc"),
            "https://example-rtdb.test/messages/abc.json"
        );
        assert_eq!(store.url("/messages/"), "https://example-rtdb.test/messages.json");
    }

    #[tokio::test]
    async fn test_memory_set_get_and_nested_listing() {
        let store = MemoryRealtimeStore::new();
        store
            .set("messages/a", json!({ "name": "Ann", "read": false }))
            .await
            .unwrap();
        store
            .set("messages/b", json!({ "name": "Bob", "read": false }))
            .await
            .unwrap();

        let one = store.get("messages/a").await.unwrap().unwrap();
        assert_eq!(one["name"], "Ann");

        let all = store.get("messages").await.unwrap().unwrap();
        assert_eq!(all.as_object().unwrap().len(), 2);
        assert!(store.get("contacts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_update_merges_and_remove_deletes() {
        let store = MemoryRealtimeStore::new();
        store
            .set("messages/a", json!({ "name": "Ann", "read": false }))
            .await
            .unwrap();
        store
            .update("messages/a", json!({ "read": true }))
            .await
            .unwrap();
        assert_eq!(
            store.get("messages/a").await.unwrap().unwrap(),
            json!({ "name": "Ann", "read": true })
        );

        store.remove("messages/a").await.unwrap();
        assert!(store.get("messages/a").await.unwrap().is_none());
        // Removing something absent is not an error
        store.remove("messages/zzz/deep").await.unwrap();
    }
}
