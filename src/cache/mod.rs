//! In-memory normalized response cache.
//!
//! Unbounded: entries live until evicted or the cache is reset. Query
//! results are stored under the `ROOT_QUERY` record keyed by document and
//! variables; identifiable objects are stored once and shared between
//! results. Each result also keeps the response keys it held, so a read
//! returns the shape that was written.

pub mod normalize;

pub use normalize::{identify, Entities, REF_KEY};

use crate::operation::Operation;
use async_lock::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Record holding root query results.
pub const ROOT_QUERY: &str = "ROOT_QUERY";

const RESULT_KEY: &str = "result";
const SELECTION_KEY: &str = "selection";

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Fields tried, in order, as the object id next to `__typename`.
    pub id_fields: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            id_fields: vec!["id".to_string(), "_id".to_string()],
        }
    }
}

/// Normalized in-memory cache. Clones share the same store.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<Entities>>,
    config: Arc<CacheConfig>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            store: Arc::default(),
            config: Arc::new(config),
        }
    }

    /// Cache id of an object, e.g. `"Project:p1"`.
    pub fn identify(&self, value: &Value) -> Option<String> {
        identify(value, &self.config.id_fields)
    }

    /// Store the result `data` of `operation`.
    pub async fn write_query(&self, operation: &Operation, data: &Value) {
        if !data.is_object() {
            return;
        }
        let key = query_key(operation);
        let mut store = self.store.write().await;
        let root = normalize::normalize(data, &self.config.id_fields, &mut store);
        let mut entry = Map::new();
        entry.insert(RESULT_KEY.to_string(), root);
        entry.insert(SELECTION_KEY.to_string(), normalize::selection(data));
        store
            .entry(ROOT_QUERY.to_string())
            .or_default()
            .insert(key.clone(), Value::Object(entry));
        tracing::trace!(key = %key, entities = store.len(), "Cache write");
    }

    /// Read the result of `operation`, if every part of it is cached.
    ///
    /// Entities are read back with the fields this result held, however
    /// many other results have written to them since.
    pub async fn read_query(&self, operation: &Operation) -> Option<Value> {
        let key = query_key(operation);
        let store = self.store.read().await;
        let entry = store.get(ROOT_QUERY)?.get(&key)?;
        let result =
            normalize::project(entry.get(RESULT_KEY)?, entry.get(SELECTION_KEY)?, &store);
        tracing::trace!(key = %key, hit = result.is_some(), "Cache read");
        result
    }

    /// Read one entity with its references resolved.
    pub async fn read_entity(&self, id: &str) -> Option<Value> {
        let store = self.store.read().await;
        normalize::denormalize(&normalize::reference(id), &store, &mut Vec::new())
    }

    /// Remove one record. Results that reference it become misses.
    pub async fn evict(&self, id: &str) -> bool {
        self.store.write().await.remove(id).is_some()
    }

    /// Serializable snapshot of the whole store.
    pub async fn extract(&self) -> Value {
        let store = self.store.read().await;
        let snapshot: Map<String, Value> = store
            .iter()
            .map(|(id, fields)| (id.clone(), Value::Object(fields.clone())))
            .collect();
        Value::Object(snapshot)
    }

    /// Replace the store with a snapshot from [`extract`](Self::extract).
    pub async fn restore(&self, snapshot: Value) -> Result<(), serde_json::Error> {
        let entities: Entities = serde_json::from_value(snapshot)?;
        *self.store.write().await = entities;
        Ok(())
    }

    /// Drop everything.
    pub async fn reset(&self) {
        self.store.write().await.clear();
    }

    /// Number of records, `ROOT_QUERY` included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

/// Root field key for an operation: document plus variables.
fn query_key(operation: &Operation) -> String {
    format!("{}({})", operation.query.trim(), operation.variables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn projects_query() -> Operation {
        Operation::new("query Projects { projects { __typename id name } }")
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let cache = InMemoryCache::new();
        let data = json!({"projects": [{"__typename": "Project", "id": "p1", "name": "a"}]});
        cache.write_query(&projects_query(), &data).await;
        assert_eq!(cache.read_query(&projects_query()).await, Some(data));
    }

    #[tokio::test]
    async fn test_variables_are_part_of_the_key() {
        let cache = InMemoryCache::new();
        let q = "query P($id: ID!) { project(id: $id) { __typename id name } }";
        let op1 = Operation::new(q).with_variables(json!({"id": "p1"}));
        let op2 = Operation::new(q).with_variables(json!({"id": "p2"}));
        cache
            .write_query(&op1, &json!({"project": {"__typename": "Project", "id": "p1", "name": "a"}}))
            .await;
        assert!(cache.read_query(&op1).await.is_some());
        assert!(cache.read_query(&op2).await.is_none());
    }

    #[tokio::test]
    async fn test_entity_shared_between_results() {
        let cache = InMemoryCache::new();
        cache
            .write_query(
                &projects_query(),
                &json!({"projects": [{"__typename": "Project", "id": "p1", "name": "a"}]}),
            )
            .await;

        let rename = Operation::new("mutation { rename { __typename id name } }");
        cache
            .write_query(
                &rename,
                &json!({"rename": {"__typename": "Project", "id": "p1", "name": "b"}}),
            )
            .await;

        let read = cache.read_query(&projects_query()).await.unwrap();
        assert_eq!(read["projects"][0]["name"], "b");
        assert_eq!(
            cache.read_entity("Project:p1").await.unwrap()["name"],
            "b"
        );
    }

    #[tokio::test]
    async fn test_overlapping_writes_keep_query_shape() {
        let cache = InMemoryCache::new();
        let names = Operation::new("query Names { project { __typename id name } }");
        let data = json!({"project": {"__typename": "Project", "id": "p1", "name": "a"}});
        cache.write_query(&names, &data).await;

        let update = Operation::new("mutation { update { __typename id status secret } }");
        cache
            .write_query(
                &update,
                &json!({"update": {"__typename": "Project", "id": "p1", "status": "open", "secret": "x"}}),
            )
            .await;

        assert_eq!(cache.read_query(&names).await, Some(data));
        let entity = cache.read_entity("Project:p1").await.unwrap();
        assert_eq!(entity["status"], "open");
        assert_eq!(entity["name"], "a");
    }

    #[tokio::test]
    async fn test_evict_turns_result_into_miss() {
        let cache = InMemoryCache::new();
        cache
            .write_query(
                &projects_query(),
                &json!({"projects": [{"__typename": "Project", "id": "p1", "name": "a"}]}),
            )
            .await;
        assert!(cache.evict("Project:p1").await);
        assert!(!cache.evict("Project:p1").await);
        assert_eq!(cache.read_query(&projects_query()).await, None);
    }

    #[tokio::test]
    async fn test_extract_restore_and_reset() {
        let cache = InMemoryCache::new();
        let data = json!({"projects": [{"__typename": "Project", "id": "p1", "name": "a"}]});
        cache.write_query(&projects_query(), &data).await;
        let snapshot = cache.extract().await;
        assert_eq!(snapshot["Project:p1"]["name"], "a");
        assert!(snapshot[ROOT_QUERY].is_object());

        let other = InMemoryCache::new();
        other.restore(snapshot).await.unwrap();
        assert_eq!(other.read_query(&projects_query()).await, Some(data));

        other.reset().await;
        assert!(other.is_empty().await);
        assert!(other.restore(json!([1, 2])).await.is_err());
    }

    #[tokio::test]
    async fn test_null_data_not_written() {
        let cache = InMemoryCache::new();
        cache.write_query(&projects_query(), &Value::Null).await;
        assert_eq!(cache.len().await, 0);
    }

    #[test]
    fn test_identify_uses_config() {
        let cache = InMemoryCache::with_config(CacheConfig {
            id_fields: vec!["key".into()],
        });
        assert_eq!(
            cache.identify(&json!({"__typename": "Plugin", "key": "vue"})),
            Some("Plugin:vue".into())
        );
        assert_eq!(cache.identify(&json!({"__typename": "Plugin", "id": "vue"})), None);
    }
}
