//! Flowdeck Artifact
//!
//! This crate provides the object store trait and implementations that hold
//! flow code bundles. Bundles are sets of source files stored under a common
//! key prefix; the console never interprets their contents.
//!
//! The [`Store`] trait defines the platform/backend layer for object storage.
//! Implementations handle the actual storage (filesystem, memory, S3, etc.)
//! while the bundle resolver translates flows to key prefixes.
//!
//! The trait uses async streaming for efficient handling of large files;
//! [`read_to_bytes`] and [`bytes_stream`] bridge to whole-buffer callers.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// A boxed stream of bytes for object data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Error type for object storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested object was not found.
  #[error("object not found: {0}")]
  NotFound(String),

  /// The key cannot be stored (absolute, empty, or escaping the store root).
  #[error("invalid key: {0}")]
  InvalidKey(String),

  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Object storage trait.
///
/// Keys are `/`-separated relative paths such as `flows/abc/tasks/clean.py`.
#[async_trait]
pub trait Store: Send + Sync {
  /// Retrieve an object by key.
  async fn get(&self, key: &str) -> Result<ByteStream, Error>;

  /// Store an object, replacing any previous content.
  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), Error>;

  /// Delete an object by key.
  async fn delete(&self, key: &str) -> Result<(), Error>;

  /// List every key that starts with `prefix`, sorted.
  async fn list(&self, prefix: &str) -> Result<Vec<String>, Error>;
}

/// Wrap a buffer as a single-chunk [`ByteStream`].
pub fn bytes_stream(data: impl Into<Bytes>) -> ByteStream {
  let data = data.into();
  Box::pin(futures::stream::once(async move { Ok::<_, Error>(data) }))
}

/// Drain a [`ByteStream`] into one buffer.
pub async fn read_to_bytes(mut stream: ByteStream) -> Result<Bytes, Error> {
  let mut buf = BytesMut::new();
  while let Some(chunk) = stream.next().await {
    buf.extend_from_slice(&chunk?);
  }
  Ok(buf.freeze())
}

/// Reject keys that are empty, absolute, or contain `.`/`..` segments.
pub(crate) fn validate_key(key: &str) -> Result<(), Error> {
  let invalid = key.is_empty()
    || key.starts_with('/')
    || key.contains('\\')
    || key
      .split('/')
      .any(|segment| segment.is_empty() || segment == "." || segment == "..");

  if invalid {
    return Err(Error::InvalidKey(key.to_string()));
  }
  Ok(())
}
