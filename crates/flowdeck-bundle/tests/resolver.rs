use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use flowdeck_artifact::{
  ByteStream, Error as StoreError, MemoryStore, Store, bytes_stream, read_to_bytes,
};
use flowdeck_bundle::{BundleError, BundleResolver, Resolver};
use flowdeck_client::{
  BatchRegisterResult, ClientError, FlowCode, FlowCodeUpdate, FlowFile, FlowRegistration,
  FlowUpdate, FlowsApi, RawFlow, UploadedFiles,
};
use flowdeck_config::{BundleConfig, StoreConfig};

/// Engine stand-in that serves one flow code record and records updates.
struct MockEngine {
  code: FlowCode,
  updates: Mutex<Vec<(String, FlowCodeUpdate)>>,
}

impl MockEngine {
  fn new(entrypoint: Option<&str>, prefix: Option<&str>, code: Option<&str>) -> Self {
    Self {
      code: FlowCode {
        entrypoint: entrypoint.map(str::to_string),
        prefix: prefix.map(str::to_string),
        code: code.map(str::to_string),
      },
      updates: Mutex::new(Vec::new()),
    }
  }
}

#[async_trait]
impl FlowsApi for MockEngine {
  async fn list_flows(&self) -> Result<Vec<RawFlow>, ClientError> {
    unimplemented!("not needed for tests")
  }

  async fn create_flow(&self, _registration: &FlowRegistration) -> Result<RawFlow, ClientError> {
    unimplemented!("not needed for tests")
  }

  async fn update_flow(&self, _flow_id: &str, _update: &FlowUpdate) -> Result<RawFlow, ClientError> {
    unimplemented!("not needed for tests")
  }

  async fn delete_flow(&self, _flow_id: &str) -> Result<(), ClientError> {
    unimplemented!("not needed for tests")
  }

  async fn get_flow_code(&self, _flow_id: &str) -> Result<FlowCode, ClientError> {
    Ok(self.code.clone())
  }

  async fn update_flow_code(&self, flow_id: &str, code: &FlowCodeUpdate) -> Result<(), ClientError> {
    self
      .updates
      .lock()
      .unwrap()
      .push((flow_id.to_string(), code.clone()));
    Ok(())
  }

  async fn batch_register(
    &self,
    _registrations: &[FlowRegistration],
  ) -> Result<BatchRegisterResult, ClientError> {
    unimplemented!("not needed for tests")
  }

  async fn upload_flow_files(
    &self,
    _prefix: &str,
    _files: &[FlowFile],
  ) -> Result<UploadedFiles, ClientError> {
    unimplemented!("not needed for tests")
  }
}

/// Memory store that refuses writes to one key.
#[derive(Clone)]
struct FailingStore {
  inner: MemoryStore,
  fail_on: String,
}

#[async_trait]
impl Store for FailingStore {
  async fn get(&self, key: &str) -> Result<ByteStream, StoreError> {
    self.inner.get(key).await
  }

  async fn put(&self, key: &str, data: ByteStream, content_type: &str) -> Result<(), StoreError> {
    if key == self.fail_on {
      return Err(StoreError::Io(std::io::Error::other("disk full")));
    }
    self.inner.put(key, data, content_type).await
  }

  async fn delete(&self, key: &str) -> Result<(), StoreError> {
    self.inner.delete(key).await
  }

  async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
    self.inner.list(prefix).await
  }
}

fn file(path: &str, code: &str) -> FlowFile {
  FlowFile {
    relative_path: path.to_string(),
    code: code.to_string(),
  }
}

fn etl_files() -> Vec<FlowFile> {
  vec![
    file("docs/flows/main.py", "def dataset_etl_flow(): ..."),
    file("docs/flows/tasks/clean_data.py", "def clean_data(): ..."),
    file("docs/flows/utils/s3_utils.py", "def list_files(): ..."),
  ]
}

fn resolver<S: Store>(engine: MockEngine, store: S) -> BundleResolver<MockEngine, S> {
  BundleResolver::new(
    engine,
    store,
    &StoreConfig::default(),
    &BundleConfig::default(),
  )
}

async fn read(store: &MemoryStore, key: &str) -> String {
  let data = read_to_bytes(store.get(key).await.unwrap()).await.unwrap();
  String::from_utf8(data.to_vec()).unwrap()
}

async fn seed(store: &MemoryStore, prefix: &str, files: &[FlowFile]) {
  for f in files {
    store
      .put(
        &format!("{prefix}{}", f.relative_path),
        bytes_stream(Bytes::from(f.code.clone())),
        "text/plain",
      )
      .await
      .unwrap();
  }
}

#[tokio::test]
async fn test_load_multi_file_bundle_maps_entrypoint() {
  let engine = MockEngine::new(
    Some("docs.flows.main:dataset_etl_flow"),
    Some("flows/etl"),
    None,
  );
  let store = MemoryStore::new();
  seed(&store, "flows/etl/", &etl_files()).await;
  // Outside the prefix; must not be picked up.
  seed(&store, "flows/other/", &[file("main.py", "x")]).await;

  let bundle = resolver(engine, store).load_bundle("f-etl").await.unwrap();

  assert_eq!(bundle.prefix, "flows/etl/");
  assert_eq!(bundle.files.len(), 3);
  assert_eq!(bundle.main_relative_path.as_deref(), Some("docs/flows/main.py"));
  assert_eq!(bundle.entry().unwrap().code, "def dataset_etl_flow(): ...");
  assert_eq!(
    bundle.file("docs/flows/tasks/clean_data.py").unwrap().code,
    "def clean_data(): ..."
  );
}

#[tokio::test]
async fn test_load_unmapped_entrypoint_is_incomplete() {
  let engine = MockEngine::new(Some("docs.flows.missing:flow"), Some("flows/etl/"), None);
  let store = MemoryStore::new();
  seed(&store, "flows/etl/", &etl_files()).await;

  let bundle = resolver(engine, store).load_bundle("f-etl").await.unwrap();

  assert_eq!(bundle.main_relative_path, None);
  assert!(matches!(
    bundle.entry(),
    Err(BundleError::Incomplete { flow_id, .. }) if flow_id == "f-etl"
  ));
}

#[tokio::test]
async fn test_load_falls_back_to_inline_code() {
  let engine = MockEngine::new(
    Some("docs.flows.main:list_files_flow"),
    None,
    Some("def list_files_flow(): ..."),
  );

  let bundle = resolver(engine, MemoryStore::new())
    .load_bundle("f-list")
    .await
    .unwrap();

  assert_eq!(bundle.prefix, "flows/f-list/");
  assert!(bundle.is_single_file());
  assert_eq!(bundle.main_relative_path.as_deref(), Some("docs/flows/main.py"));
  assert_eq!(bundle.entry().unwrap().code, "def list_files_flow(): ...");
}

#[tokio::test]
async fn test_save_writes_under_default_prefix() {
  let engine = MockEngine::new(None, None, None);
  let store = MemoryStore::new();
  let resolver = resolver(engine, store.clone());

  let report = resolver.save_bundle("f-etl", &etl_files(), None).await.unwrap();

  assert_eq!(report.uploaded_count, 3);
  assert_eq!(
    report.keys,
    vec![
      "flows/f-etl/docs/flows/main.py",
      "flows/f-etl/docs/flows/tasks/clean_data.py",
      "flows/f-etl/docs/flows/utils/s3_utils.py",
    ]
  );
  assert_eq!(store.list("flows/f-etl/").await.unwrap(), report.keys);
  assert!(report.removed.is_empty());
}

#[tokio::test]
async fn test_save_rolls_back_on_failure() {
  let engine = MockEngine::new(None, None, None);
  let inner = MemoryStore::new();
  let store = FailingStore {
    inner: inner.clone(),
    fail_on: "custom/root/docs/flows/utils/s3_utils.py".to_string(),
  };

  let err = resolver(engine, store)
    .save_bundle("f-etl", &etl_files(), Some("/custom/root/"))
    .await
    .unwrap_err();

  match err {
    BundleError::SaveFailed {
      key, rolled_back, ..
    } => {
      assert_eq!(key, "custom/root/docs/flows/utils/s3_utils.py");
      assert_eq!(rolled_back, 2);
    }
    other => panic!("expected SaveFailed, got {other:?}"),
  }
  assert!(inner.is_empty().await);
}

#[tokio::test]
async fn test_failed_save_restores_previous_bundle() {
  let engine = MockEngine::new(None, None, None);
  let inner = MemoryStore::new();
  seed(
    &inner,
    "flows/f-1/",
    &[file("main.py", "v1 main"), file("util.py", "v1 util")],
  )
  .await;
  let store = FailingStore {
    inner: inner.clone(),
    fail_on: "flows/f-1/util.py".to_string(),
  };

  let err = resolver(engine, store)
    .save_bundle(
      "f-1",
      &[
        file("main.py", "v2 main"),
        file("util.py", "v2 util"),
        file("extra.py", "v2 extra"),
      ],
      None,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, BundleError::SaveFailed { rolled_back: 1, .. }));
  assert_eq!(
    inner.list("flows/f-1/").await.unwrap(),
    vec!["flows/f-1/main.py", "flows/f-1/util.py"]
  );
  assert_eq!(read(&inner, "flows/f-1/main.py").await, "v1 main");
  assert_eq!(read(&inner, "flows/f-1/util.py").await, "v1 util");
}

#[tokio::test]
async fn test_resave_removes_files_missing_from_new_set() {
  let store = MemoryStore::new();
  let resolver = resolver(
    MockEngine::new(Some("main:flow"), None, None),
    store.clone(),
  );

  resolver
    .save_bundle(
      "f-1",
      &[file("main.py", "v1"), file("old_helper.py", "old")],
      None,
    )
    .await
    .unwrap();
  let report = resolver
    .save_bundle(
      "f-1",
      &[file("main.py", "v2"), file("new_helper.py", "new")],
      None,
    )
    .await
    .unwrap();

  assert_eq!(report.removed, vec!["flows/f-1/old_helper.py"]);

  let bundle = resolver.load_bundle("f-1").await.unwrap();
  let paths: Vec<&str> = bundle
    .files
    .iter()
    .map(|f| f.relative_path.as_str())
    .collect();
  assert_eq!(paths, vec!["main.py", "new_helper.py"]);
  assert_eq!(bundle.entry().unwrap().code, "v2");
}

#[tokio::test]
async fn test_save_rejects_invalid_paths_without_writing() {
  let engine = MockEngine::new(None, None, None);
  let store = MemoryStore::new();

  let err = resolver(engine, store.clone())
    .save_bundle(
      "f-etl",
      &[file("main.py", "a"), file("../secrets.py", "b")],
      None,
    )
    .await
    .unwrap_err();

  assert!(matches!(err, BundleError::InvalidPath { .. }));
  assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_publish_updates_engine_code_record() {
  let engine = MockEngine::new(Some("docs.flows.main:dataset_etl_flow"), None, None);
  let store = MemoryStore::new();

  let resolver = resolver(engine, store.clone());
  let bundle = resolver
    .publish_bundle("f-etl", &etl_files(), None)
    .await
    .unwrap();

  assert_eq!(bundle.main_relative_path.as_deref(), Some("docs/flows/main.py"));
  assert_eq!(store.len().await, 3);

  let updates = resolver.engine().updates.lock().unwrap();
  assert_eq!(updates.len(), 1);
  let (flow_id, update) = &updates[0];
  assert_eq!(flow_id, "f-etl");
  assert_eq!(update.code, "def dataset_etl_flow(): ...");
  assert_eq!(update.prefix.as_deref(), Some("flows/f-etl/"));
  assert_eq!(
    update.entrypoint.as_deref(),
    Some("docs.flows.main:dataset_etl_flow")
  );
}

#[tokio::test]
async fn test_publish_incomplete_bundle_writes_nothing() {
  let engine = MockEngine::new(Some("docs.flows.elsewhere:flow"), None, None);
  let store = MemoryStore::new();

  let resolver = resolver(engine, store.clone());
  let err = resolver
    .publish_bundle("f-etl", &etl_files(), None)
    .await
    .unwrap_err();

  assert!(matches!(err, BundleError::Incomplete { .. }));
  assert!(store.is_empty().await);
  assert!(resolver.engine().updates.lock().unwrap().is_empty());
}
