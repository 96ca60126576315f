//! End-to-end tests against wiremock servers

mod common;
mod crawl_tests;
mod search_tests;
