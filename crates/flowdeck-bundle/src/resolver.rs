use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use flowdeck_artifact::{Store, bytes_stream, read_to_bytes};
use flowdeck_client::{FlowCodeUpdate, FlowFile, FlowsApi};
use flowdeck_config::{BundleConfig, StoreConfig};
use tracing::{debug, info, instrument, warn};

use crate::bundle::{CodeBundle, SaveReport, validate_files};
use crate::entrypoint::module_path;
use crate::error::BundleError;

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Resolves flows to their code bundles and back.
#[async_trait]
pub trait Resolver: Send + Sync {
  /// Load every file of the flow's bundle and locate its entry module.
  async fn load_bundle(&self, flow_id: &str) -> Result<CodeBundle, BundleError>;

  /// Write the files under `base_prefix` (or the flow's default prefix).
  /// Either the prefix ends up holding exactly `files`, or it keeps the
  /// content it had before the call.
  async fn save_bundle(
    &self,
    flow_id: &str,
    files: &[FlowFile],
    base_prefix: Option<&str>,
  ) -> Result<SaveReport, BundleError>;

  /// Save the files, then point the engine's flow code record at them.
  async fn publish_bundle(
    &self,
    flow_id: &str,
    files: &[FlowFile],
    base_prefix: Option<&str>,
  ) -> Result<CodeBundle, BundleError>;
}

/// Resolver backed by the engine's flow code records and an object store.
pub struct BundleResolver<F: FlowsApi, S: Store> {
  engine: F,
  store: S,
  flows_prefix: String,
  module_extension: String,
}

impl<F: FlowsApi, S: Store> BundleResolver<F, S> {
  pub fn new(engine: F, store: S, store_config: &StoreConfig, bundle_config: &BundleConfig) -> Self {
    Self {
      engine,
      store,
      flows_prefix: store_config.flows_prefix.trim_matches('/').to_string(),
      module_extension: bundle_config.module_extension.clone(),
    }
  }

  pub fn engine(&self) -> &F {
    &self.engine
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// `<flows_prefix>/<flow_id>/`
  pub fn default_prefix(&self, flow_id: &str) -> String {
    if self.flows_prefix.is_empty() {
      format!("{flow_id}/")
    } else {
      format!("{}/{flow_id}/", self.flows_prefix)
    }
  }

  fn prefix_for(&self, flow_id: &str, base_prefix: Option<&str>) -> String {
    match base_prefix.map(|p| p.trim_matches('/')) {
      Some(p) if !p.is_empty() => format!("{p}/"),
      _ => self.default_prefix(flow_id),
    }
  }

  /// Relative path of the entry module among `files`, if the entrypoint maps
  /// to one of them.
  fn locate_entry(&self, entrypoint: Option<&str>, files: &[FlowFile]) -> Option<String> {
    let path = module_path(entrypoint?, &self.module_extension)?;
    files
      .iter()
      .any(|f| f.relative_path == path)
      .then_some(path)
  }

  async fn read_file(&self, key: &str) -> Result<String, BundleError> {
    let store_err = |source: flowdeck_artifact::Error| BundleError::Store {
      key: key.to_string(),
      source,
    };
    let stream = self.store.get(key).await.map_err(store_err)?;
    let bytes = read_to_bytes(stream).await.map_err(store_err)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| BundleError::NotText {
      key: key.to_string(),
    })
  }

  async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, BundleError> {
    self
      .store
      .list(prefix)
      .await
      .map_err(|source| BundleError::Store {
        key: prefix.to_string(),
        source,
      })
  }

  /// Current content of each target key that already exists.
  async fn snapshot(
    &self,
    targets: &[String],
    existing: &[String],
  ) -> Result<HashMap<String, Bytes>, BundleError> {
    let mut previous = HashMap::new();
    for key in targets.iter().filter(|k| existing.contains(*k)) {
      let store_err = |source: flowdeck_artifact::Error| BundleError::Store {
        key: key.clone(),
        source,
      };
      let stream = self.store.get(key).await.map_err(store_err)?;
      let data = read_to_bytes(stream).await.map_err(store_err)?;
      previous.insert(key.clone(), data);
    }
    Ok(previous)
  }

  /// Undo `written`: restore overwritten objects, delete new ones.
  async fn rollback(&self, written: &[String], previous: &HashMap<String, Bytes>) {
    for key in written.iter().rev() {
      let result = match previous.get(key) {
        Some(data) => {
          self
            .store
            .put(key, bytes_stream(data.clone()), CONTENT_TYPE)
            .await
        }
        None => self.store.delete(key).await,
      };
      if let Err(e) = result {
        warn!(key = %key, error = %e, "failed to roll back bundle file");
      }
    }
  }

  /// Delete keys under the prefix that the new file set no longer has.
  async fn prune(&self, existing: &[String], kept: &[String]) -> Vec<String> {
    let mut removed = Vec::new();
    for key in existing.iter().filter(|k| !kept.contains(*k)) {
      match self.store.delete(key).await {
        Ok(()) => removed.push(key.clone()),
        Err(e) => warn!(key = %key, error = %e, "failed to remove stale bundle file"),
      }
    }
    removed
  }
}

#[async_trait]
impl<F: FlowsApi, S: Store> Resolver for BundleResolver<F, S> {
  #[instrument(skip(self))]
  async fn load_bundle(&self, flow_id: &str) -> Result<CodeBundle, BundleError> {
    let code = self.engine.get_flow_code(flow_id).await?;
    let prefix = self.prefix_for(flow_id, code.prefix.as_deref());

    let keys = self.list_prefix(&prefix).await?;

    let mut files = Vec::with_capacity(keys.len());
    for key in &keys {
      let Some(relative_path) = key.strip_prefix(&prefix).filter(|p| !p.is_empty()) else {
        continue;
      };
      files.push(FlowFile {
        relative_path: relative_path.to_string(),
        code: self.read_file(key).await?,
      });
    }

    if files.is_empty() {
      if let Some(inline) = code.code {
        let relative_path = code
          .entrypoint
          .as_deref()
          .and_then(|e| module_path(e, &self.module_extension))
          .unwrap_or_else(|| format!("main.{}", self.module_extension));
        debug!(flow_id, %relative_path, "store empty, using inline code");
        files.push(FlowFile {
          relative_path,
          code: inline,
        });
      }
    }

    let main_relative_path = self.locate_entry(code.entrypoint.as_deref(), &files);
    if main_relative_path.is_none() && files.len() > 1 {
      warn!(
        flow_id,
        entrypoint = ?code.entrypoint,
        files = files.len(),
        "entrypoint does not match any bundle file"
      );
    }

    Ok(CodeBundle {
      flow_id: flow_id.to_string(),
      files,
      prefix,
      entrypoint: code.entrypoint,
      main_relative_path,
    })
  }

  #[instrument(skip(self, files), fields(files = files.len()))]
  async fn save_bundle(
    &self,
    flow_id: &str,
    files: &[FlowFile],
    base_prefix: Option<&str>,
  ) -> Result<SaveReport, BundleError> {
    validate_files(files)?;
    let prefix = self.prefix_for(flow_id, base_prefix);

    let targets: Vec<String> = files
      .iter()
      .map(|f| format!("{prefix}{}", f.relative_path))
      .collect();
    let existing = self.list_prefix(&prefix).await?;
    let previous = self.snapshot(&targets, &existing).await?;

    let mut written: Vec<String> = Vec::with_capacity(files.len());
    for (file, key) in files.iter().zip(&targets) {
      let data = bytes_stream(file.code.clone());
      if let Err(source) = self.store.put(key, data, CONTENT_TYPE).await {
        warn!(key = %key, error = %source, "bundle write failed, rolling back");
        self.rollback(&written, &previous).await;
        return Err(BundleError::SaveFailed {
          key: key.clone(),
          rolled_back: written.len(),
          source,
        });
      }
      written.push(key.clone());
    }

    let removed = self.prune(&existing, &written).await;
    info!(
      flow_id,
      prefix = %prefix,
      uploaded = written.len(),
      removed = removed.len(),
      "bundle saved"
    );
    Ok(SaveReport {
      uploaded_count: written.len(),
      keys: written,
      removed,
    })
  }

  #[instrument(skip(self, files), fields(files = files.len()))]
  async fn publish_bundle(
    &self,
    flow_id: &str,
    files: &[FlowFile],
    base_prefix: Option<&str>,
  ) -> Result<CodeBundle, BundleError> {
    validate_files(files)?;
    let current = self.engine.get_flow_code(flow_id).await?;

    let bundle = CodeBundle {
      flow_id: flow_id.to_string(),
      files: files.to_vec(),
      prefix: self.prefix_for(flow_id, base_prefix),
      main_relative_path: self.locate_entry(current.entrypoint.as_deref(), files),
      entrypoint: current.entrypoint,
    };
    // The entry must resolve before anything is written.
    let entry_code = bundle.entry()?.code.clone();

    self.save_bundle(flow_id, files, Some(&bundle.prefix)).await?;

    let update = FlowCodeUpdate {
      code: entry_code,
      entrypoint: bundle.entrypoint.clone(),
      prefix: Some(bundle.prefix.clone()),
    };
    self.engine.update_flow_code(flow_id, &update).await?;

    info!(flow_id, prefix = %bundle.prefix, "bundle published");
    Ok(bundle)
  }
}
