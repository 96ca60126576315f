//! Integration tests for crawl runs and single-page re-indexing

use crate::common::{create_service, create_test_config, mount_page, wait_until_idle};
use lemma_search::crawler::CONNECTION_FAILED_MESSAGE;
use lemma_search::{SearchError, SiteStatus};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    let base_url = server.uri();

    mount_page(
        &server,
        "/",
        &format!(
            r#"<html><head><title>Home</title></head><body>
            <p>Welcome home</p>
            <a href="/page1">Page 1</a>
            <a href="{}/page2">Page 2</a>
            <a href="https://elsewhere.example/">Away</a>
            </body></html>"#,
            base_url
        ),
    )
    .await;
    mount_page(
        &server,
        "/page1",
        r#"<html><body><p>First page</p><a href="/">Home</a><a href="/page2">Two</a></body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/page2",
        r#"<html><body><p>Second page</p><a href="/page1#top">One</a></body></html>"#,
    )
    .await;

    let service = create_service(create_test_config(&[(base_url.as_str(), "Mock")]));
    service.start_indexing().expect("Failed to start indexing");
    wait_until_idle(&service).await;

    let stats = service.get_statistics().expect("Failed to load statistics");
    assert_eq!(stats.total.sites, 1);
    assert_eq!(stats.total.pages, 3);
    assert!(!stats.total.indexing);
    assert_eq!(stats.detailed[0].status, Some(SiteStatus::Indexed));
    assert_eq!(stats.detailed[0].error, None);

    // Each path is requested once even though several pages link to it
    let requests = server.received_requests().await.unwrap_or_default();
    let page1_requests = requests.iter().filter(|r| r.url.path() == "/page1").count();
    assert_eq!(page1_requests, 1);

    assert!(service.verify().expect("Failed to verify").is_empty());
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html><body>slow</body></html>").await;

    let mut config = create_test_config(&[(server.uri().as_str(), "Mock")]);
    config.connection.delay_base_ms = 10_000;
    let service = create_service(config);

    service.start_indexing().expect("Failed to start indexing");
    assert!(service.is_running());
    assert!(matches!(
        service.start_indexing(),
        Err(SearchError::AlreadyRunning)
    ));

    service.stop_indexing().await.expect("Failed to stop indexing");
    assert!(!service.is_running());

    // Cancelled before the first request finished
    let stats = service.get_statistics().expect("Failed to load statistics");
    assert_eq!(stats.total.pages, 0);
    assert_eq!(stats.detailed[0].status, Some(SiteStatus::Indexing));
}

#[tokio::test]
async fn test_stop_when_idle() {
    let server = MockServer::start().await;
    let service = create_service(create_test_config(&[(server.uri().as_str(), "Mock")]));

    assert!(matches!(
        service.stop_indexing().await,
        Err(SearchError::NotRunning)
    ));
}

#[tokio::test]
async fn test_unreachable_site_does_not_stop_others() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html><body>reachable content</body></html>").await;

    let service = create_service(create_test_config(&[
        ("http://127.0.0.1:1", "Closed"),
        (server.uri().as_str(), "Open"),
    ]));
    service.start_indexing().expect("Failed to start indexing");
    wait_until_idle(&service).await;

    let stats = service.get_statistics().expect("Failed to load statistics");
    let closed = &stats.detailed[0];
    assert_eq!(closed.status, Some(SiteStatus::Failed));
    assert_eq!(closed.error.as_deref(), Some(CONNECTION_FAILED_MESSAGE));
    assert_eq!(closed.pages, 0);

    let open = &stats.detailed[1];
    assert_eq!(open.status, Some(SiteStatus::Indexed));
    assert_eq!(open.pages, 1);
}

#[tokio::test]
async fn test_error_pages_are_stored_without_lemmas() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>apples <a href="/gone">gone</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(
            ResponseTemplate::new(404).set_body_raw("<p>bananas</p>".to_string(), "text/html"),
        )
        .mount(&server)
        .await;

    let service = create_service(create_test_config(&[(server.uri().as_str(), "Mock")]));
    service.start_indexing().expect("Failed to start indexing");
    wait_until_idle(&service).await;

    let stats = service.get_statistics().expect("Failed to load statistics");
    assert_eq!(stats.total.pages, 2);

    let results = service
        .search("bananas", None, None, None)
        .expect("Search failed");
    assert_eq!(results.count, 0);
}

#[tokio::test]
async fn test_non_html_links_are_skipped() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body><a href="/data">data</a></body></html>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#.to_string(), "application/json"),
        )
        .mount(&server)
        .await;

    let service = create_service(create_test_config(&[(server.uri().as_str(), "Mock")]));
    service.start_indexing().expect("Failed to start indexing");
    wait_until_idle(&service).await;

    let stats = service.get_statistics().expect("Failed to load statistics");
    assert_eq!(stats.total.pages, 1);
    assert_eq!(stats.detailed[0].status, Some(SiteStatus::Indexed));
}

#[tokio::test]
async fn test_index_page_is_idempotent() {
    let server = MockServer::start().await;
    let base_url = server.uri();
    mount_page(&server, "/about", "<html><body>river stones river</body></html>").await;

    let service = create_service(create_test_config(&[(base_url.as_str(), "Mock")]));
    let url = format!("{}/about", base_url);

    let first = service.index_page(&url).await.expect("First re-index failed");
    let second = service.index_page(&url).await.expect("Second re-index failed");
    assert_eq!(first.path, "/about");
    assert_eq!(first.lemma_count, second.lemma_count);

    let stats = service.get_statistics().expect("Failed to load statistics");
    assert_eq!(stats.total.pages, 1);
    assert_eq!(stats.total.lemmas, 2);
    assert_eq!(stats.detailed[0].status, Some(SiteStatus::Indexed));
    assert!(service.verify().expect("Failed to verify").is_empty());
}

#[tokio::test]
async fn test_index_page_rejects_foreign_urls() {
    let server = MockServer::start().await;
    let service = create_service(create_test_config(&[(server.uri().as_str(), "Mock")]));

    assert!(matches!(
        service.index_page("https://not-configured.example/page").await,
        Err(SearchError::OutOfScope { .. })
    ));
    assert!(matches!(
        service.index_page("not a url").await,
        Err(SearchError::OutOfScope { .. })
    ));
}

#[tokio::test]
async fn test_index_page_rejected_during_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body>slow</body></html>".to_string(), "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let service = create_service(create_test_config(&[(server.uri().as_str(), "Mock")]));
    service.start_indexing().expect("Failed to start indexing");

    assert!(matches!(
        service.index_page(&format!("{}/", server.uri())).await,
        Err(SearchError::AlreadyRunning)
    ));

    wait_until_idle(&service).await;
}

#[tokio::test]
async fn test_delete_page_and_recrawl() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>harbor <a href="/boats">boats</a></body></html>"#,
    )
    .await;
    mount_page(&server, "/boats", "<html><body>sailing boats</body></html>").await;

    let service = create_service(create_test_config(&[(server.uri().as_str(), "Mock")]));
    service.start_indexing().expect("Failed to start indexing");
    wait_until_idle(&service).await;

    let boats = format!("{}/boats", server.uri());
    assert!(service.delete_page(&boats).expect("Delete failed"));
    assert!(!service.delete_page(&boats).expect("Second delete failed"));
    assert_eq!(
        service.search("sailing", None, None, None).expect("Search failed").count,
        0
    );
    assert!(service.verify().expect("Failed to verify").is_empty());

    // A new run starts from a clean slate and finds the page again
    service.start_indexing().expect("Failed to restart indexing");
    wait_until_idle(&service).await;

    let stats = service.get_statistics().expect("Failed to load statistics");
    assert_eq!(stats.total.pages, 2);
    assert_eq!(
        service.search("sailing", None, None, None).expect("Search failed").count,
        1
    );
}
