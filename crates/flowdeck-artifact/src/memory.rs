use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::{ByteStream, Error, Store, bytes_stream, read_to_bytes, validate_key};

/// In-memory object store.
///
/// Useful for tests and for sessions that never persist bundles. Clones share
/// the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  objects: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of stored objects.
  pub async fn len(&self) -> usize {
    self.objects.read().await.len()
  }

  pub async fn is_empty(&self) -> bool {
    self.objects.read().await.is_empty()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn get(&self, key: &str) -> Result<ByteStream, Error> {
    let objects = self.objects.read().await;
    let data = objects
      .get(key)
      .cloned()
      .ok_or_else(|| Error::NotFound(key.to_string()))?;
    Ok(bytes_stream(data))
  }

  async fn put(&self, key: &str, data: ByteStream, _content_type: &str) -> Result<(), Error> {
    validate_key(key)?;
    let data = read_to_bytes(data).await?;
    self.objects.write().await.insert(key.to_string(), data);
    Ok(())
  }

  async fn delete(&self, key: &str) -> Result<(), Error> {
    self
      .objects
      .write()
      .await
      .remove(key)
      .map(|_| ())
      .ok_or_else(|| Error::NotFound(key.to_string()))
  }

  async fn list(&self, prefix: &str) -> Result<Vec<String>, Error> {
    let objects = self.objects.read().await;
    Ok(
      objects
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect(),
    )
  }
}
