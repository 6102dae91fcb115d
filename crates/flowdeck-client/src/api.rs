use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ClientError;
use crate::types::{
  BatchRegisterResult, FlowCode, FlowCodeUpdate, FlowFile, FlowUpdate, LogPage, RawFlow,
  RunAccepted, RunRecord, RunRequest, UploadedFiles,
};
use flowdeck_config::FlowRegistration;

/// Flow records and flow code held by the engine.
#[async_trait]
pub trait FlowsApi: Send + Sync {
  async fn list_flows(&self) -> Result<Vec<RawFlow>, ClientError>;

  async fn create_flow(&self, registration: &FlowRegistration) -> Result<RawFlow, ClientError>;

  async fn update_flow(&self, flow_id: &str, update: &FlowUpdate) -> Result<RawFlow, ClientError>;

  async fn delete_flow(&self, flow_id: &str) -> Result<(), ClientError>;

  async fn get_flow_code(&self, flow_id: &str) -> Result<FlowCode, ClientError>;

  async fn update_flow_code(&self, flow_id: &str, code: &FlowCodeUpdate)
  -> Result<(), ClientError>;

  async fn batch_register(
    &self,
    registrations: &[FlowRegistration],
  ) -> Result<BatchRegisterResult, ClientError>;

  /// Upload files through the engine's own file endpoint.
  async fn upload_flow_files(
    &self,
    prefix: &str,
    files: &[FlowFile],
  ) -> Result<UploadedFiles, ClientError>;
}

/// Run submission and observation.
#[async_trait]
pub trait RunsApi: Send + Sync {
  /// Start a run or test run. Issues exactly one call.
  async fn submit_run(&self, request: &RunRequest) -> Result<RunAccepted, ClientError>;

  async fn resume_run(&self, run_id: &str) -> Result<(), ClientError>;

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, ClientError>;

  async fn get_run_logs(&self, run_id: &str, limit: u32, offset: u64)
  -> Result<LogPage, ClientError>;

  /// Complete log artifact from the engine's bulk endpoint.
  async fn download_run_logs(&self, run_id: &str) -> Result<Bytes, ClientError>;
}
