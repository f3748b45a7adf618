//! End-to-end run from settings to report against mocked providers

use cmap_rs::{
    results::report, EngineLoader, Record, ResultContainer, Search, SearchKeys, Session,
    Settings,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> Settings {
    let yaml = format!(
        r#"
auth:
  fofa:
    - someone@example.com:fofa-key
  shodan:
    - shodan-key
  hunter:
network:
  rate_limit:
    requests: 50
    per_seconds: 1
providers:
  fofa:
    base_url: {uri}
  shodan:
    base_url: {uri}
  hunter:
    base_url: {uri}
"#,
        uri = server.uri()
    );
    Settings::from_yaml(&yaml).unwrap()
}

async fn mount_providers(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/search/all"))
        .and(query_param("mail", "someone@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": false,
            "size": 2,
            "results": [
                ["1.2.3.4", "443", "tcp", "https", "www.example.com", "https://www.example.com",
                 "Example", "nginx", "2024-01-02 03:04:05"],
                ["1.2.3.4", "22", "tcp", "ssh", "", "1.2.3.4:22",
                 "", "OpenSSH", "2024-01-02 03:04:05"]
            ]
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/shodan/host/search"))
        .and(query_param("key", "shodan-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total": 2,
            "matches": [
                {
                    "ip_str": "1.2.3.4", "port": 443, "transport": "tcp",
                    "hostnames": ["api.example.com"],
                    "http": {"host": "1.2.3.4", "title": "API"},
                    "ssl": {"chain": ["cert"]},
                    "timestamp": "2024-02-01T00:00:00.000000"
                },
                {
                    "ip_str": "1.2.3.4", "port": 8080, "transport": "tcp",
                    "hostnames": [],
                    "timestamp": "2024-02-01T00:00:00.000000"
                }
            ]
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_run_aggregates_and_reports() {
    let server = MockServer::start().await;
    mount_providers(&server).await;

    let settings = settings_for(&server);
    let session = Arc::new(Session::from_settings(&settings).unwrap());
    let registry = EngineLoader::load(&settings);
    // hunter has no credentials and is skipped at start
    let sources = EngineLoader::sources(&settings, &registry, &["fofa", "shodan", "hunter"]);
    assert_eq!(sources.len(), 3);

    let search = Search::new(session, sources, SearchKeys::new().with_ip("1.2.3.4"))
        .with_buffer(settings.search.channel_buffer);

    let mut received: Vec<Record> = Vec::new();
    let mut container = ResultContainer::new();
    search
        .execute_with_callback(CancellationToken::new(), |record| {
            received.push(record.clone());
            container.add(record);
        })
        .await
        .unwrap();

    assert_eq!(received.len(), 4);
    assert!(received.iter().all(|r| !r.is_error() && r.timestamp > 0));
    assert!(received
        .iter()
        .all(|r| r.prompt == r#"ip="1.2.3.4""# || r.prompt == r#"net:"1.2.3.4""#));

    // 443 is reported by both providers
    assert_eq!(container.len(), 3);
    assert_eq!(container.duplicates(), 1);
    assert_eq!(container.ip_count(), 1);

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("result.json");
    report::write(&out, &container).unwrap();
    let workbook = dir.path().join("result.xlsx");
    report::write(&workbook, &container).unwrap();
    assert!(std::fs::read(&workbook).unwrap().starts_with(b"PK"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["services"]["1.2.3.4"].as_array().unwrap().len(), 3);
    let domains: Vec<&str> = report["domains"]["1.2.3.4"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["domain"].as_str().unwrap())
        .collect();
    assert_eq!(domains, vec!["api.example.com", "www.example.com"]);
}

#[tokio::test]
async fn test_provider_error_is_delivered_as_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shodan/host/search"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"error": "Invalid API key"})),
        )
        .mount(&server)
        .await;

    let settings = settings_for(&server);
    let session = Arc::new(Session::from_settings(&settings).unwrap());
    let registry = EngineLoader::load(&settings);
    let sources = EngineLoader::sources(&settings, &registry, &["shodan"]);
    let search = Search::new(
        session,
        sources,
        SearchKeys::new()
            .with_ip("1.2.3.4")
            .with_domain("example.com"),
    );

    let mut rx = search.execute(CancellationToken::new()).unwrap();
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }

    // One error per key, each without asset fields
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.is_error());
        assert_eq!(record.source, "shodan");
        assert!(record.ip.is_empty() && record.port.is_empty());
        assert!(record.timestamp > 0);
    }
    assert_eq!(
        records[0].error.as_ref().map(|e| e.to_string()).as_deref(),
        Some("Invalid API key")
    );
}
