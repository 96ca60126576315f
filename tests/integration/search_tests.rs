//! Integration tests for ranked search over crawled sites

use crate::common::{create_service, create_test_config, mount_page, wait_until_idle};
use lemma_search::{SearchError, SearchService};
use wiremock::MockServer;

async fn crawl(sites: &[(&str, &str)]) -> SearchService {
    let service = create_service(create_test_config(sites));
    service.start_indexing().expect("Failed to start indexing");
    wait_until_idle(&service).await;
    service
}

#[tokio::test]
async fn test_single_page_cat_dog() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<html><body><p>cat dog cat</p></body></html>").await;
    let service = crawl(&[(server.uri().as_str(), "Pets")]).await;

    let cats = service.search("cat", None, None, None).expect("Search failed");
    assert_eq!(cats.count, 1);
    assert_eq!(cats.items[0].uri, "/");
    assert_eq!(cats.items[0].site_name, "Pets");
    assert_eq!(cats.items[0].relevance, 1.0);
    assert!(cats.items[0].snippet.contains("<b>cat</b>"));

    let both = service.search("cat dog", None, None, None).expect("Search failed");
    assert_eq!(both.count, 1);

    let fish = service.search("fish", None, None, None).expect("Search failed");
    assert_eq!(fish.count, 0);
    assert!(fish.items.is_empty());
}

#[tokio::test]
async fn test_all_words_required_and_ranked() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>Garden</title></head><body>
        <p>roses tulips roses</p>
        <a href="/tulips">t</a> <a href="/both">b</a> <a href="/plain">p</a>
        </body></html>"#,
    )
    .await;
    mount_page(&server, "/tulips", "<html><body><p>tulips only</p></body></html>").await;
    mount_page(
        &server,
        "/both",
        "<html><body><p>roses and tulips</p></body></html>",
    )
    .await;
    mount_page(&server, "/plain", "<html><body><p>nothing here</p></body></html>").await;
    let service = crawl(&[(server.uri().as_str(), "Garden")]).await;

    let results = service
        .search("roses tulips", None, None, None)
        .expect("Search failed");
    assert_eq!(results.count, 2);
    assert_eq!(results.items[0].uri, "/");
    assert_eq!(results.items[0].title, "Garden");
    assert_eq!(results.items[0].relevance, 1.0);
    assert_eq!(results.items[1].uri, "/both");
    assert!(results.items[1].relevance > 0.0 && results.items[1].relevance < 1.0);
}

#[tokio::test]
async fn test_pagination_keeps_total_count() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><body>lantern lantern lantern lantern
        <a href="/a">a</a> <a href="/b">b</a> <a href="/c">c</a></body></html>"#,
    )
    .await;
    mount_page(&server, "/a", "<html><body>lantern lantern lantern</body></html>").await;
    mount_page(&server, "/b", "<html><body>lantern lantern</body></html>").await;
    mount_page(&server, "/c", "<html><body>lantern</body></html>").await;
    let service = crawl(&[(server.uri().as_str(), "Lights")]).await;

    let first = service
        .search("lantern", None, Some(0), Some(2))
        .expect("Search failed");
    assert_eq!(first.count, 4);
    let uris: Vec<_> = first.items.iter().map(|item| item.uri.as_str()).collect();
    assert_eq!(uris, ["/", "/a"]);

    let second = service
        .search("lantern", None, Some(2), Some(2))
        .expect("Search failed");
    assert_eq!(second.count, 4);
    let uris: Vec<_> = second.items.iter().map(|item| item.uri.as_str()).collect();
    assert_eq!(uris, ["/b", "/c"]);

    let past_end = service
        .search("lantern", None, Some(10), Some(2))
        .expect("Search failed");
    assert_eq!(past_end.count, 4);
    assert!(past_end.items.is_empty());
}

#[tokio::test]
async fn test_site_filter() {
    let north = MockServer::start().await;
    let south = MockServer::start().await;
    mount_page(&north, "/", "<html><body>penguins north</body></html>").await;
    mount_page(&south, "/", "<html><body>penguins south</body></html>").await;
    let north_url = north.uri();
    let south_url = south.uri();
    let service = crawl(&[(north_url.as_str(), "North"), (south_url.as_str(), "South")]).await;

    let everywhere = service
        .search("penguins", None, None, None)
        .expect("Search failed");
    assert_eq!(everywhere.count, 2);

    let south_only = service
        .search("penguins", Some(&south_url), None, None)
        .expect("Search failed");
    assert_eq!(south_only.count, 1);
    assert_eq!(south_only.items[0].site_name, "South");

    assert!(matches!(
        service.search("penguins", Some("https://unknown.example"), None, None),
        Err(SearchError::OutOfScope { .. })
    ));
}

#[tokio::test]
async fn test_invalid_requests() {
    let server = MockServer::start().await;
    let service = create_service(create_test_config(&[(server.uri().as_str(), "Empty")]));

    assert!(matches!(
        service.search("   ", None, None, None),
        Err(SearchError::InvalidQuery(_))
    ));
    assert!(matches!(
        service.search("word", None, Some(-5), None),
        Err(SearchError::InvalidQuery(_))
    ));
    assert!(matches!(
        service.search("word", None, None, Some(0)),
        Err(SearchError::InvalidQuery(_))
    ));
}
