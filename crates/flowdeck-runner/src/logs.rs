use bytes::Bytes;
use flowdeck_client::{ClientError, LogPage, RunsApi};
use flowdeck_config::LogsConfig;
use thiserror::Error;
use tracing::{debug, instrument};

/// Largest page the engine serves in one request.
pub const MAX_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum LogFetchError {
  #[error("page limit {limit} out of range 1..={max}", max = MAX_PAGE_LIMIT)]
  InvalidLimit { limit: u32 },

  #[error("fetching logs of run '{run_id}' at offset {offset} failed: {source}")]
  Page {
    run_id: String,
    offset: u64,
    #[source]
    source: ClientError,
  },

  #[error("downloading logs of run '{run_id}' failed: {source}")]
  Download {
    run_id: String,
    #[source]
    source: ClientError,
  },
}

impl LogFetchError {
  pub fn is_auth(&self) -> bool {
    match self {
      LogFetchError::Page { source, .. } | LogFetchError::Download { source, .. } => {
        source.is_auth()
      }
      LogFetchError::InvalidLimit { .. } => false,
    }
  }
}

/// Pages through a run's logs.
///
/// Nothing is cached: pages of an active run may change between calls, so
/// every fetch goes to the engine.
pub struct LogPager<R: RunsApi> {
  api: R,
  page_size: u32,
}

impl<R: RunsApi> LogPager<R> {
  pub fn new(api: R, config: &LogsConfig) -> Self {
    Self {
      api,
      page_size: config.page_size.clamp(1, MAX_PAGE_LIMIT),
    }
  }

  pub fn api(&self) -> &R {
    &self.api
  }

  pub fn page_size(&self) -> u32 {
    self.page_size
  }

  /// Fetch exactly `limit` entries starting at `offset`. Extra entries from
  /// the engine are dropped.
  #[instrument(skip(self))]
  pub async fn fetch_page(
    &self,
    run_id: &str,
    limit: u32,
    offset: u64,
  ) -> Result<LogPage, LogFetchError> {
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
      return Err(LogFetchError::InvalidLimit { limit });
    }

    let mut page = self
      .api
      .get_run_logs(run_id, limit, offset)
      .await
      .map_err(|source| LogFetchError::Page {
        run_id: run_id.to_string(),
        offset,
        source,
      })?;

    if page.logs.len() > limit as usize {
      debug!(
        returned = page.logs.len(),
        limit, "engine returned more entries than asked, truncating"
      );
      page.logs.truncate(limit as usize);
    }
    Ok(page)
  }

  /// The most recent page of logs.
  ///
  /// Reads the first page to learn the total, then the tail if the total does
  /// not fit in one page.
  pub async fn last_page(&self, run_id: &str) -> Result<LogPage, LogFetchError> {
    let first = self.fetch_page(run_id, self.page_size, 0).await?;
    let page_size = u64::from(self.page_size);
    if first.total <= page_size {
      return Ok(first);
    }
    self
      .fetch_page(run_id, self.page_size, first.total - page_size)
      .await
  }

  /// The full log artifact from the engine's bulk endpoint.
  #[instrument(skip(self))]
  pub async fn download_all(&self, run_id: &str) -> Result<Bytes, LogFetchError> {
    self
      .api
      .download_run_logs(run_id)
      .await
      .map_err(|source| LogFetchError::Download {
        run_id: run_id.to_string(),
        source,
      })
  }
}
