//! Shared fixtures for the integration tests

use lemma_search::config::{Config, ConnectionConfig, OutputConfig, SearchConfig, SiteEntry};
use lemma_search::crawler::HttpTransport;
use lemma_search::storage::SqliteStorage;
use lemma_search::SearchService;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration for the given (root URL, name) pairs with no politeness delay
pub fn create_test_config(sites: &[(&str, &str)]) -> Config {
    Config {
        sites: sites
            .iter()
            .map(|(url, name)| SiteEntry {
                url: url.to_string(),
                name: name.to_string(),
            })
            .collect(),
        connection: ConnectionConfig {
            user_agent: "TestBot/1.0".to_string(),
            timeout_ms: 2000,
            delay_base_ms: 0,
            delay_jitter_ms: 0,
            ..ConnectionConfig::default()
        },
        search: SearchConfig::default(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

/// A service over an in-memory database and a real HTTP transport
pub fn create_service(config: Config) -> SearchService {
    let transport = HttpTransport::new(&config.connection).expect("Failed to build transport");
    let storage = SqliteStorage::open_in_memory().expect("Failed to open database");
    SearchService::with_parts(config, storage, transport).expect("Failed to build service")
}

/// Serves an HTML body at `page_path`
pub async fn mount_page(server: &MockServer, page_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html.to_string(), "text/html"))
        .mount(server)
        .await;
}

/// Waits until the crawl run has finished
pub async fn wait_until_idle(service: &SearchService) {
    for _ in 0..200 {
        if !service.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Indexing did not finish in time");
}
