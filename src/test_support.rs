//! Test doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Notify;

use crate::api::Transport;
use crate::db::{KeyValueStore, MemoryStore, StoredValue};
use crate::errors::{CacheError, TransportError};
use crate::models::EntityId;

/// In-memory JSON backend with the same routes as the real one.
pub struct FakeTransport {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    online: AtomicBool,
    nested_routes: AtomicBool,
    next_id: AtomicI64,
    requests: Mutex<Vec<String>>,
    post_gate: Mutex<Option<Arc<Notify>>>,
    fixed_post_id: Mutex<Option<i64>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            nested_routes: AtomicBool::new(true),
            next_id: AtomicI64::new(100),
            requests: Mutex::new(Vec::new()),
            post_gate: Mutex::new(None),
            fixed_post_id: Mutex::new(None),
        }
    }

    pub fn seed(&self, collection: &str, items: Vec<Value>) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), items);
    }

    pub fn items(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn remove(&self, collection: &str, id: i64) {
        let id = EntityId::number(id);
        if let Some(items) = self.collections.lock().unwrap().get_mut(collection) {
            items.retain(|item| !matches_id(item, &id));
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make `/images/:id/annotations` answer 404, like backends without nested routes.
    pub fn disable_nested_routes(&self) {
        self.nested_routes.store(false, Ordering::SeqCst);
    }

    /// Hold every POST until the returned handle is notified once per request.
    pub fn gate_posts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.post_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Answer every POST with `id` and store nothing, like a read-only mock server.
    pub fn answer_posts_with(&self, id: i64) {
        *self.fixed_post_id.lock().unwrap() = Some(id);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn begin(&self, method: &str, path: &str) -> Result<(), TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", method, path));
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::new("network unreachable"))
        }
    }

    fn not_found(path: &str) -> TransportError {
        TransportError::with_status(404, format!("{} not found", path))
    }
}

fn id_of(item: &Value) -> Option<EntityId> {
    serde_json::from_value(item.get("id")?.clone()).ok()
}

fn matches_id(item: &Value, id: &EntityId) -> bool {
    id_of(item).is_some_and(|item_id| item_id.same_as(id))
}

fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.begin("GET", path)?;
        let collections = self.collections.lock().unwrap();
        match segments(path).as_slice() {
            [collection] => Ok(Value::Array(
                collections.get(*collection).cloned().unwrap_or_default(),
            )),
            [collection, id] => {
                let id: EntityId = id.parse().unwrap();
                collections
                    .get(*collection)
                    .and_then(|items| items.iter().find(|item| matches_id(item, &id)))
                    .cloned()
                    .ok_or_else(|| Self::not_found(path))
            }
            ["images", image_id, "annotations"] if self.nested_routes.load(Ordering::SeqCst) => {
                let image_id: EntityId = image_id.parse().unwrap();
                let items = collections
                    .get("annotations")
                    .map(|items| {
                        items
                            .iter()
                            .filter(|item| {
                                item.get("imageId")
                                    .and_then(|v| EntityId::deserialize(v).ok())
                                    .is_some_and(|id| id.same_as(&image_id))
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Value::Array(items))
            }
            _ => Err(Self::not_found(path)),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.begin("POST", path)?;
        let gate = self.post_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut item = body.clone();
        let fixed = *self.fixed_post_id.lock().unwrap();
        let id = fixed.unwrap_or_else(|| self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Value::Object(fields) = &mut item {
            fields.insert("id".to_string(), Value::from(id));
        }
        if fixed.is_some() {
            return Ok(item);
        }
        self.collections
            .lock()
            .unwrap()
            .entry(path.trim_matches('/').to_string())
            .or_default()
            .push(item.clone());
        Ok(item)
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.begin("PUT", path)?;
        let segments = segments(path);
        let [collection, id] = segments.as_slice() else {
            return Err(Self::not_found(path));
        };
        let id: EntityId = id.parse().unwrap();
        let mut collections = self.collections.lock().unwrap();
        let entry = collections
            .get_mut(*collection)
            .and_then(|items| items.iter_mut().find(|item| matches_id(item, &id)))
            .ok_or_else(|| Self::not_found(path))?;
        *entry = body.clone();
        Ok(body.clone())
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.begin("DELETE", path)?;
        let segments = segments(path);
        let [collection, id] = segments.as_slice() else {
            return Err(Self::not_found(path));
        };
        let id: EntityId = id.parse().unwrap();
        let mut collections = self.collections.lock().unwrap();
        let items = collections
            .get_mut(*collection)
            .ok_or_else(|| Self::not_found(path))?;
        let before = items.len();
        items.retain(|item| !matches_id(item, &id));
        if items.len() == before {
            return Err(Self::not_found(path));
        }
        Ok(())
    }
}

/// Memory store that yields after every read, so concurrent read-modify-write
/// sequences interleave deterministically under `tokio::join!`.
pub struct YieldingStore {
    inner: MemoryStore,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
        }
    }
}

#[async_trait]
impl KeyValueStore for YieldingStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, CacheError> {
        let value = self.inner.get(key).await;
        tokio::task::yield_now().await;
        value
    }

    async fn put(&self, key: &str, value: &str) -> Result<i64, CacheError> {
        self.inner.put(key, value).await
    }

    async fn put_if_version(
        &self,
        key: &str,
        value: &str,
        expected: i64,
    ) -> Result<i64, CacheError> {
        self.inner.put_if_version(key, value, expected).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.inner.remove(key).await
    }
}
