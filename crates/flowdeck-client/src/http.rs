use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use flowdeck_config::{EngineAuth, EngineConfig, FlowRegistration};

use crate::api::{FlowsApi, RunsApi};
use crate::auth::{LogSignIn, SignInBoundary};
use crate::error::ClientError;
use crate::types::{
  BatchRegisterResult, FlowCode, FlowCodeUpdate, FlowFile, FlowUpdate, LogPage, RawFlow,
  RunAccepted, RunRecord, RunRequest, UploadedFiles,
};

/// Engine client over HTTP.
#[derive(Clone)]
pub struct HttpEngineClient {
  client: Client,
  base_url: Url,
  auth: Option<EngineAuth>,
  sign_in: Arc<dyn SignInBoundary>,
}

impl HttpEngineClient {
  /// Create a client from configuration, logging auth redirects.
  pub fn new(config: &EngineConfig) -> Result<Self, ClientError> {
    Self::with_sign_in(config, Arc::new(LogSignIn))
  }

  /// Create a client that hands auth failures to the given boundary.
  pub fn with_sign_in(
    config: &EngineConfig,
    sign_in: Arc<dyn SignInBoundary>,
  ) -> Result<Self, ClientError> {
    let base_url = Url::parse(&config.base_url).map_err(|e| ClientError::InvalidBaseUrl {
      url: config.base_url.clone(),
      message: e.to_string(),
    })?;
    if base_url.cannot_be_a_base() {
      return Err(ClientError::InvalidBaseUrl {
        url: config.base_url.clone(),
        message: "url cannot be used as a base".to_string(),
      });
    }

    let client = Client::builder()
      .timeout(config.request_timeout())
      .build()?;

    Ok(Self {
      client,
      base_url,
      auth: config.auth.clone(),
      sign_in,
    })
  }

  /// Build an endpoint URL from path segments. Segments are percent-encoded.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    let request = self.client.request(method, url);
    match &self.auth {
      Some(EngineAuth::Basic { username, password }) => {
        request.basic_auth(username, Some(password))
      }
      Some(EngineAuth::Bearer { token }) => request.bearer_auth(token),
      None => request,
    }
  }

  /// Send a request and apply the shared status contract.
  async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
      self.sign_in.redirect(status.as_u16());
      return Err(ClientError::AuthRequired {
        status: status.as_u16(),
      });
    }

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(ClientError::Status {
        status: status.as_u16(),
        body,
      });
    }

    Ok(response)
  }

  async fn send_json<T: DeserializeOwned>(
    &self,
    request: RequestBuilder,
    endpoint: &str,
  ) -> Result<T, ClientError> {
    let response = self.send(request).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
      endpoint: endpoint.to_string(),
      message: e.to_string(),
    })
  }
}

#[async_trait]
impl FlowsApi for HttpEngineClient {
  async fn list_flows(&self) -> Result<Vec<RawFlow>, ClientError> {
    let url = self.endpoint(&["flows"]);
    self
      .send_json(self.request(Method::GET, url), "list flows")
      .await
  }

  #[instrument(skip(self, registration), fields(name = %registration.name))]
  async fn create_flow(&self, registration: &FlowRegistration) -> Result<RawFlow, ClientError> {
    let url = self.endpoint(&["flows"]);
    self
      .send_json(
        self.request(Method::POST, url).json(registration),
        "create flow",
      )
      .await
  }

  async fn update_flow(&self, flow_id: &str, update: &FlowUpdate) -> Result<RawFlow, ClientError> {
    let url = self.endpoint(&["flows", flow_id]);
    self
      .send_json(self.request(Method::PATCH, url).json(update), "update flow")
      .await
  }

  async fn delete_flow(&self, flow_id: &str) -> Result<(), ClientError> {
    let url = self.endpoint(&["flows", flow_id]);
    self.send(self.request(Method::DELETE, url)).await?;
    Ok(())
  }

  async fn get_flow_code(&self, flow_id: &str) -> Result<FlowCode, ClientError> {
    let url = self.endpoint(&["flows", flow_id, "code"]);
    self
      .send_json(self.request(Method::GET, url), "get flow code")
      .await
  }

  async fn update_flow_code(
    &self,
    flow_id: &str,
    code: &FlowCodeUpdate,
  ) -> Result<(), ClientError> {
    let url = self.endpoint(&["flows", flow_id, "code"]);
    self.send(self.request(Method::PUT, url).json(code)).await?;
    Ok(())
  }

  #[instrument(skip_all, fields(count = registrations.len()))]
  async fn batch_register(
    &self,
    registrations: &[FlowRegistration],
  ) -> Result<BatchRegisterResult, ClientError> {
    let url = self.endpoint(&["flows", "batch-register"]);
    let body = serde_json::json!({ "flows": registrations });
    self
      .send_json(self.request(Method::POST, url).json(&body), "batch register")
      .await
  }

  async fn upload_flow_files(
    &self,
    prefix: &str,
    files: &[FlowFile],
  ) -> Result<UploadedFiles, ClientError> {
    let url = self.endpoint(&["flows", "files"]);
    let body = serde_json::json!({ "prefix": prefix, "files": files });
    self
      .send_json(self.request(Method::POST, url).json(&body), "upload flow files")
      .await
  }
}

#[async_trait]
impl RunsApi for HttpEngineClient {
  #[instrument(skip(self, request), fields(flow_id = %request.flow_id, mode = %request.mode))]
  async fn submit_run(&self, request: &RunRequest) -> Result<RunAccepted, ClientError> {
    let url = self.endpoint(&["flows", &request.flow_id, request.mode.as_str()]);
    let accepted: RunAccepted = self
      .send_json(
        self.request(Method::POST, url).json(&request.body()),
        "submit run",
      )
      .await?;
    debug!(run_id = %accepted.flow_run_id, "run accepted");
    Ok(accepted)
  }

  async fn resume_run(&self, run_id: &str) -> Result<(), ClientError> {
    let url = self.endpoint(&["flow-runs", run_id, "resume"]);
    self.send(self.request(Method::POST, url)).await?;
    Ok(())
  }

  async fn get_run(&self, run_id: &str) -> Result<RunRecord, ClientError> {
    let url = self.endpoint(&["flow-runs", run_id]);
    self
      .send_json(self.request(Method::GET, url), "get run")
      .await
  }

  async fn get_run_logs(
    &self,
    run_id: &str,
    limit: u32,
    offset: u64,
  ) -> Result<LogPage, ClientError> {
    let url = self.endpoint(&["flow-runs", run_id, "logs"]);
    let request = self
      .request(Method::GET, url)
      .query(&[("limit", limit as u64), ("offset", offset)]);
    self.send_json(request, "get run logs").await
  }

  async fn download_run_logs(&self, run_id: &str) -> Result<Bytes, ClientError> {
    let url = self.endpoint(&["flow-runs", run_id, "logs", "download"]);
    let response = self.send(self.request(Method::GET, url)).await?;
    Ok(response.bytes().await?)
  }
}
