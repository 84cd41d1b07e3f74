#![allow(dead_code)]

use dbrx_api_tool::config::Config;
use dbrx_api_tool::WorkspaceClient;
use mockito::{Matcher, Mock, ServerGuard};

pub const TEST_TOKEN: &str = "dapi-test-token";

pub mod test_helpers {
    use super::*;

    pub async fn setup_test_server() -> ServerGuard {
        mockito::Server::new_async().await
    }

    /// Config pointing at the mock server with fast retries and no status cache
    pub fn create_test_config(server: &ServerGuard) -> Config {
        let mut config = Config::new(server.url(), TEST_TOKEN);
        config.retry_delay_ms = 1;
        config.status_cache_ttl_secs = 0;
        config
    }

    pub fn create_test_client(server: &ServerGuard) -> WorkspaceClient {
        WorkspaceClient::from_config(&create_test_config(server)).expect("valid test config")
    }

    pub fn bearer() -> String {
        format!("Bearer {}", TEST_TOKEN)
    }

    /// GET mock on a workspace endpoint matching the `path` query parameter
    pub async fn mock_get(
        server: &mut ServerGuard,
        endpoint: &str,
        path: &str,
        status: usize,
        body: &str,
    ) -> Mock {
        mock_get_hits(server, endpoint, path, status, body, 1).await
    }

    /// Like [`mock_get`] but expecting exactly `hits` requests
    pub async fn mock_get_hits(
        server: &mut ServerGuard,
        endpoint: &str,
        path: &str,
        status: usize,
        body: &str,
        hits: usize,
    ) -> Mock {
        server
            .mock("GET", format!("/api/2.0/workspace/{}", endpoint).as_str())
            .match_query(Matcher::UrlEncoded("path".into(), path.into()))
            .match_header("authorization", bearer().as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    /// POST mock on a workspace endpoint matching the exact JSON body
    pub async fn mock_post(server: &mut ServerGuard, endpoint: &str, body: serde_json::Value) -> Mock {
        server
            .mock("POST", format!("/api/2.0/workspace/{}", endpoint).as_str())
            .match_header("authorization", bearer().as_str())
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(body))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await
    }

    pub fn setup_test_logger() {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    }
}
