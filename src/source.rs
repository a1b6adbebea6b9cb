use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::domain::{RVConfig, RVError, Record};

pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch data. Please try again.";

/// Failure of a single page request. The message is shown to the user as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::new(err.to_string())
    }
}

/// One remote page, trimmed to the page size.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResult {
    pub records: Vec<Record>,
    pub has_more: bool,
}

impl FetchResult {
    /// Builds the result from an over-fetched batch of `page_size + LOOKAHEAD_COUNT` records.
    pub fn from_lookahead(mut records: Vec<Record>, page_size: usize) -> Self {
        let has_more = records.len() > page_size;
        records.truncate(page_size);
        Self { records, has_more }
    }
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetches the 1-based remote page `page`.
    async fn fetch_page(&self, page: usize) -> Result<FetchResult, FetchError>;
}

pub struct HttpRecordSource {
    client: Client,
    endpoint: Url,
    page_size: usize,
    limit: usize,
    timeout: Option<Duration>,
}

impl HttpRecordSource {
    pub fn new(cfg: &RVConfig) -> Result<Self, RVError> {
        let endpoint = Url::parse(&cfg.endpoint)
            .map_err(|e| RVError::InvalidConfig(format!("endpoint {}: {e}", cfg.endpoint)))?;
        let client = Client::builder()
            .build()
            .map_err(|e| RVError::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            page_size: cfg.page_size,
            limit: cfg.request_size(),
            timeout: cfg.timeout,
        })
    }

    pub fn page_url(&self, page: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("_page", &page.to_string())
            .append_pair("_limit", &self.limit.to_string());
        url
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    #[instrument(skip(self))]
    async fn fetch_page(&self, page: usize) -> Result<FetchResult, FetchError> {
        let url = self.page_url(page);
        debug!("GET {url}");

        let mut request = self.client.get(url);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            warn!("Page {page} request failed with status {}", response.status());
            return Err(FetchError::new(FETCH_FAILED_MESSAGE));
        }

        let records: Vec<Record> = response.json().await?;
        debug!("Received {} records for page {page}", records.len());
        Ok(FetchResult::from_lookahead(records, self.page_size))
    }
}

/// Serves pages from records held in memory.
#[cfg(test)]
pub struct MemorySource {
    records: Vec<Record>,
    page_size: usize,
}

#[cfg(test)]
impl MemorySource {
    pub fn new(records: Vec<Record>, page_size: usize) -> Self {
        Self { records, page_size }
    }
}

#[cfg(test)]
#[async_trait]
impl RecordSource for MemorySource {
    async fn fetch_page(&self, page: usize) -> Result<FetchResult, FetchError> {
        let begin = std::cmp::min((page.max(1) - 1) * self.page_size, self.records.len());
        let end = std::cmp::min(begin + self.page_size + crate::domain::LOOKAHEAD_COUNT, self.records.len());
        Ok(FetchResult::from_lookahead(
            self.records[begin..end].to_vec(),
            self.page_size,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn users(n: u64) -> Vec<Record> {
        (1..=n)
            .map(|id| Record {
                id,
                name: format!("User {id}"),
                username: format!("user{id}"),
                email: format!("user{id}@example.com"),
            })
            .collect()
    }

    // Serves exactly one request with the given status line and body.
    async fn serve_once(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/users")
    }

    fn source_for(endpoint: String) -> HttpRecordSource {
        HttpRecordSource::new(&RVConfig::default().with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn lookahead_sets_has_more() {
        let full = FetchResult::from_lookahead(users(6), 5);
        assert_eq!(full.records.len(), 5);
        assert!(full.has_more);
        assert_eq!(full.records.last().unwrap().id, 5);

        let exact = FetchResult::from_lookahead(users(5), 5);
        assert_eq!(exact.records.len(), 5);
        assert!(!exact.has_more);

        let empty = FetchResult::from_lookahead(Vec::new(), 5);
        assert!(empty.records.is_empty());
        assert!(!empty.has_more);
    }

    #[test]
    fn page_url_requests_one_extra_record() {
        let source = source_for("https://example.com/users".into());
        assert_eq!(
            source.page_url(3).as_str(),
            "https://example.com/users?_page=3&_limit=6"
        );
    }

    #[tokio::test]
    async fn fetches_and_trims_page() {
        let body = serde_json::to_string(&users(6)).unwrap();
        let source = source_for(serve_once("200 OK", body).await);

        let result = source.fetch_page(1).await.unwrap();
        assert_eq!(result.records, users(5));
        assert!(result.has_more);
    }

    #[tokio::test]
    async fn ignores_unknown_fields() {
        let body = r#"[{"id":1,"name":"Leanne Graham","username":"Bret","email":"Sincere@april.biz","phone":"1-770"}]"#;
        let source = source_for(serve_once("200 OK", body.to_string()).await);

        let result = source.fetch_page(2).await.unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].username, "Bret");
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_error() {
        let source = source_for(serve_once("500 Internal Server Error", "{}".into()).await);

        let err = source.fetch_page(1).await.unwrap_err();
        assert_eq!(err.message, FETCH_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn malformed_body_is_fetch_error() {
        let source = source_for(serve_once("200 OK", "not json".into()).await);
        assert!(source.fetch_page(1).await.is_err());
    }
}
