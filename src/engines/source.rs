//! Credential-bound engine driving provider pagination

use super::traits::{Cursor, Engine, Page};
use crate::config::{Credential, CredentialStore};
use crate::error::{Error, Result, SourceError};
use crate::network::Session;
use crate::results::Record;
use crate::search::SearchKeys;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// One provider ready to run: an engine plus the credentials to pick from
#[derive(Clone)]
pub struct Source {
    engine: Arc<dyn Engine>,
    credentials: Arc<CredentialStore>,
    deadline: Duration,
}

impl Source {
    /// Create a source with the default 10 minute query deadline
    pub fn new(engine: Arc<dyn Engine>, credentials: Arc<CredentialStore>) -> Self {
        Self {
            engine,
            credentials,
            deadline: Duration::from_secs(crate::DEFAULT_QUERY_DEADLINE),
        }
    }

    /// Set the wall-clock ceiling for one invocation
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Provider name
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Start paginating every key through the session.
    ///
    /// Fails before any I/O when no usable credential is configured. The
    /// returned stream is driven by a background task that ends when all
    /// keys are done, the deadline passes, or the stream is dropped.
    pub fn query(&self, session: Arc<Session>, keys: Arc<SearchKeys>) -> Result<RecordStream> {
        let credential = self
            .credentials
            .random(self.name(), |raw| self.engine.parse_credential(raw))
            .ok_or_else(|| Error::MissingCredential(self.name().to_string()))?;

        let (tx, rx) = mpsc::channel(1);
        let pagination = Pagination {
            engine: self.engine.clone(),
            session,
            credential,
            deadline: Instant::now() + self.deadline,
        };
        let task = tokio::spawn(pagination.run(keys, tx));

        Ok(RecordStream {
            source: self.name().to_string(),
            rx,
            task,
        })
    }
}

/// Lazy, single-use sequence of records from one source.
///
/// Dropping the stream stops the pagination task behind it.
pub struct RecordStream {
    source: String,
    rx: mpsc::Receiver<Record>,
    task: JoinHandle<()>,
}

impl RecordStream {
    /// Provider name
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Receive the next record, `None` once the source is exhausted
    pub async fn recv(&mut self) -> Option<Record> {
        self.rx.recv().await
    }
}

impl Stream for RecordStream {
    type Item = Record;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Record>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Flow {
    Continue,
    Closed,
}

struct Pagination {
    engine: Arc<dyn Engine>,
    session: Arc<Session>,
    credential: Credential,
    deadline: Instant,
}

impl Pagination {
    async fn run(self, keys: Arc<SearchKeys>, tx: mpsc::Sender<Record>) {
        let name = self.engine.name();
        for key in keys.keys() {
            let Some(query) = self.engine.build_query(&key) else {
                continue;
            };
            if Instant::now() >= self.deadline {
                warn!("[{}] query deadline reached, skipping {}", name, query);
                continue;
            }

            info!("[{}] searching {}", name, query);
            if let Flow::Closed = self.paginate(&query, &tx).await {
                debug!("[{}] consumer gone, stopping", name);
                return;
            }
        }
        debug!("[{}] all keys done", name);
    }

    /// Fetch pages for one query until the engine's stopping rule, an error, or the deadline
    async fn paginate(&self, query: &str, tx: &mpsc::Sender<Record>) -> Flow {
        let name = self.engine.name();
        let mut cursor = Cursor::first();

        loop {
            let page = match self.fetch(query, &cursor).await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    warn!("[{}] query deadline reached during {}", name, query);
                    return Flow::Continue;
                }
                Err(error) => {
                    warn!("[{}] {}: {}", name, query, error);
                    return match tx.send(Record::failure(name, error)).await {
                        Ok(()) => Flow::Continue,
                        Err(_) => Flow::Closed,
                    };
                }
            };

            debug!(
                "[{}] page {} returned {} items",
                name, cursor.page, page.returned
            );
            let next = self.engine.next_cursor(&cursor, &page);
            for record in page.records {
                if tx.send(record).await.is_err() {
                    return Flow::Closed;
                }
            }

            match next {
                Some(next) if Instant::now() < self.deadline => cursor = next,
                _ => return Flow::Continue,
            }
        }
    }

    /// One page request; `Ok(None)` when the deadline passes first
    async fn fetch(
        &self,
        query: &str,
        cursor: &Cursor,
    ) -> std::result::Result<Option<Page>, SourceError> {
        let request = self.engine.request(&self.credential, query, cursor)?;
        let response = match timeout_at(
            self.deadline,
            self.session.execute(request, self.engine.name()),
        )
        .await
        {
            Ok(response) => response?,
            Err(_) => return Ok(None),
        };
        self.engine.response(response, query).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkSettings, ProviderConfig, RateLimitSettings};
    use crate::engines::hunter::Hunter;
    use crate::engines::quake::Quake;
    use base64::Engine as _;
    use futures::StreamExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Arc<Session> {
        let settings = NetworkSettings {
            rate_limit: RateLimitSettings {
                requests: 100,
                per_seconds: 1,
            },
            ..Default::default()
        };
        Arc::new(Session::new(&settings).unwrap())
    }

    fn hunter_source(server: &MockServer, page_size: u32) -> Source {
        let mut hunter = Hunter::new();
        hunter.init(&ProviderConfig {
            base_url: Some(server.uri()),
            page_size: Some(page_size),
            ..Default::default()
        });
        let mut credentials = CredentialStore::new();
        credentials.insert("hunter", "test-key");
        Source::new(Arc::new(hunter), Arc::new(credentials))
    }

    fn hunter_page(ips: &[&str], total: u64) -> ResponseTemplate {
        let arr: Vec<serde_json::Value> = ips
            .iter()
            .map(|ip| {
                serde_json::json!({
                    "ip": ip, "port": 80, "domain": "", "base_protocol": "tcp",
                    "protocol": "http", "updated_at": "2024-01-01",
                    "url": format!("http://{}", ip), "web_title": ""
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 200,
            "message": "success",
            "data": {"total": total, "arr": arr}
        }))
    }

    fn encoded(query: &str) -> String {
        base64::engine::general_purpose::URL_SAFE.encode(query)
    }

    #[tokio::test]
    async fn test_full_page_then_empty_page_requests_twice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openApi/search"))
            .and(query_param("page", "1"))
            .respond_with(hunter_page(&["10.0.0.1", "10.0.0.2"], 5))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/openApi/search"))
            .and(query_param("page", "2"))
            .respond_with(hunter_page(&[], 5))
            .expect(1)
            .mount(&server)
            .await;

        let source = hunter_source(&server, 2);
        let keys = Arc::new(SearchKeys::new().with_ip("10.0.0.0/24"));
        let records: Vec<Record> = source.query(session(), keys).unwrap().collect().await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source == "hunter" && !r.is_error()));
        assert_eq!(records[0].prompt, r#"ip="10.0.0.0/24""#);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_total_requests_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openApi/search"))
            .respond_with(hunter_page(&["10.0.0.1", "10.0.0.2"], 0))
            .expect(1)
            .mount(&server)
            .await;

        let source = hunter_source(&server, 2);
        let keys = Arc::new(SearchKeys::new().with_ip("10.0.0.1"));
        let records: Vec<Record> = source.query(session(), keys).unwrap().collect().await;

        assert_eq!(records.len(), 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quake_full_page_without_total_requests_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/search/quake_service"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "message": "Successful.",
                "data": [
                    {"ip": "10.0.0.1", "port": 22, "transport": "tcp", "service": {"name": "ssh"}},
                    {"ip": "10.0.0.2", "port": 22, "transport": "tcp", "service": {"name": "ssh"}}
                ],
                "meta": {"pagination": {"count": 2, "page_index": 1, "page_size": 2, "total": 0}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut quake = Quake::new();
        quake.init(&ProviderConfig {
            base_url: Some(server.uri()),
            page_size: Some(2),
            ..Default::default()
        });
        let mut credentials = CredentialStore::new();
        credentials.insert("quake", "test-key");
        let source = Source::new(Arc::new(quake), Arc::new(credentials));

        let keys = Arc::new(SearchKeys::new().with_ip("10.0.0.1"));
        let records: Vec<Record> = source.query(session(), keys).unwrap().collect().await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.is_error()));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_stops_only_that_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search", encoded(r#"ip="10.0.0.1""#)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 40204, "message": "积分不足"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("search", encoded(r#"domain.suffix="example.com""#)))
            .respond_with(hunter_page(&["10.0.0.9"], 1))
            .expect(1)
            .mount(&server)
            .await;

        let source = hunter_source(&server, 100);
        let keys = Arc::new(
            SearchKeys::new()
                .with_ip("10.0.0.1")
                .with_domain("example.com"),
        );
        let records: Vec<Record> = source.query(session(), keys).unwrap().collect().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].error, Some(SourceError::Api("积分不足".to_string())));
        assert_eq!(records[0].source, "hunter");
        assert!(records[0].ip.is_empty());
        assert_eq!(records[1].ip, "10.0.0.9");
    }

    #[tokio::test]
    async fn test_http_failure_becomes_error_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let source = hunter_source(&server, 100);
        let keys = Arc::new(SearchKeys::new().with_ip("10.0.0.1"));
        let records: Vec<Record> = source.query(session(), keys).unwrap().collect().await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error, Some(SourceError::Http(502)));
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_io() {
        let server = MockServer::start().await;
        let source = Source::new(Arc::new(Hunter::new()), Arc::new(CredentialStore::new()));
        let keys = Arc::new(SearchKeys::new().with_ip("10.0.0.1"));

        let result = source.query(session(), keys);
        assert!(matches!(result, Err(Error::MissingCredential(name)) if name == "hunter"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deadline_stops_pagination_silently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(hunter_page(&["10.0.0.1"], 1).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let source = hunter_source(&server, 100).with_deadline(Duration::from_millis(200));
        let keys = Arc::new(
            SearchKeys::new()
                .with_ip("10.0.0.1")
                .with_domain("example.com"),
        );
        let stream = source.query(session(), keys).unwrap();
        let records: Vec<Record> = tokio::time::timeout(Duration::from_secs(3), stream.collect())
            .await
            .expect("pagination should stop at the deadline");

        assert!(records.is_empty());
        // The second key is skipped once the deadline has passed
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
