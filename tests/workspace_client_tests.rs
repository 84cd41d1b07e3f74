use dbrx_api_tool::error::WorkspaceError;
use dbrx_api_tool::workspace::{
    AccessControlRequest, ExportFormat, ImportRequest, Language, ObjectType, PermissionLevel,
    WorkspaceApi, WorkspaceClient,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

mod common;
use common::test_helpers::*;
use common::TEST_TOKEN;

#[tokio::test]
async fn test_list_contents() {
    setup_test_logger();
    let mut server = setup_test_server().await;
    let body = json!({
        "objects": [
            {"object_type": "DIRECTORY", "path": "/Shared/etl", "object_id": 11},
            {"object_type": "NOTEBOOK", "path": "/Shared/report", "language": "SQL", "object_id": 12}
        ]
    })
    .to_string();
    let m = mock_get(&mut server, "list", "/Shared", 200, &body).await;

    let client = create_test_client(&server);
    let objects = client.list_contents("/Shared/").await.unwrap();

    m.assert_async().await;
    assert_eq!(objects.len(), 2);
    assert_eq!(objects[0].object_type, ObjectType::Directory);
    assert_eq!(objects[1].language, Some(Language::Sql));
}

#[tokio::test]
async fn test_list_empty_directory() {
    let mut server = setup_test_server().await;
    let _m = mock_get(&mut server, "list", "/Users/empty", 200, "{}").await;

    let client = create_test_client(&server);
    assert!(client.list_contents("/Users/empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_recursive_walks_directories() {
    let mut server = setup_test_server().await;
    let root = json!({"objects": [
        {"object_type": "DIRECTORY", "path": "/p/sub"},
        {"object_type": "NOTEBOOK", "path": "/p/a", "language": "PYTHON"}
    ]})
    .to_string();
    let sub = json!({"objects": [{"object_type": "FILE", "path": "/p/sub/data.csv", "size": 10}]}).to_string();
    let _m1 = mock_get(&mut server, "list", "/p", 200, &root).await;
    let _m2 = mock_get(&mut server, "list", "/p/sub", 200, &sub).await;

    let client = create_test_client(&server);
    let paths: Vec<String> = client
        .list_recursive("/p")
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.path)
        .collect();
    assert_eq!(paths, vec!["/p/a", "/p/sub", "/p/sub/data.csv"]);
}

#[tokio::test]
async fn test_get_status_and_not_found() {
    let mut server = setup_test_server().await;
    let _ok = mock_get(
        &mut server,
        "get-status",
        "/Shared/job",
        200,
        r#"{"object_type":"NOTEBOOK","path":"/Shared/job","language":"SCALA","object_id":7}"#,
    )
    .await;
    let _missing = mock_get(
        &mut server,
        "get-status",
        "/Shared/missing",
        404,
        r#"{"error_code":"RESOURCE_DOES_NOT_EXIST","message":"Path (/Shared/missing) doesn't exist."}"#,
    )
    .await;

    let client = create_test_client(&server);
    let info = client.get_status("/Shared/job").await.unwrap();
    assert_eq!(info.language, Some(Language::Scala));
    assert_eq!(info.object_id, Some(7));

    let err = client.get_status("/Shared/missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!client.exists("/Shared/missing").await.unwrap());
}

#[tokio::test]
async fn test_status_is_cached_until_mutation() {
    let mut server = setup_test_server().await;
    let status = mock_get_hits(
        &mut server,
        "get-status",
        "/Shared/job",
        200,
        r#"{"object_type":"NOTEBOOK","path":"/Shared/job"}"#,
        2,
    )
    .await;
    let delete = mock_post(&mut server, "delete", json!({"path": "/Shared/job", "recursive": false})).await;

    let mut config = create_test_config(&server);
    config.status_cache_ttl_secs = 60;
    let client = WorkspaceClient::from_config(&config).unwrap();

    client.get_status("/Shared/job").await.unwrap();
    client.get_status("/Shared/job").await.unwrap();
    assert!(client.delete("/Shared/job", false).await.unwrap());
    client.get_status("/Shared/job").await.unwrap();

    status.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_delete_and_mkdirs_bodies() {
    let mut server = setup_test_server().await;
    let delete = mock_post(&mut server, "delete", json!({"path": "/Shared/old", "recursive": true})).await;
    let mkdirs = mock_post(&mut server, "mkdirs", json!({"path": "/Shared/new/nested"})).await;

    let client = create_test_client(&server);
    assert!(client.delete("/Shared/old", true).await.unwrap());
    assert!(client.create_directory("/Shared/new/nested").await.unwrap());

    delete.assert_async().await;
    mkdirs.assert_async().await;
}

#[tokio::test]
async fn test_import_notebook_encodes_content() {
    let mut server = setup_test_server().await;
    let m = mock_post(
        &mut server,
        "import",
        json!({
            "path": "/Shared/hello",
            "language": "PYTHON",
            "content": "cHJpbnQoJ2hpJyk=",
            "format": "SOURCE"
        }),
    )
    .await;

    let client = create_test_client(&server);
    let ok = client
        .import_notebook("/Shared/hello", Language::Python, "print('hi')", ExportFormat::Source)
        .await
        .unwrap();

    assert!(ok);
    m.assert_async().await;
}

#[tokio::test]
async fn test_import_with_overwrite_flag() {
    let mut server = setup_test_server().await;
    let m = mock_post(
        &mut server,
        "import",
        json!({
            "path": "/Shared/q",
            "language": "SQL",
            "content": "c2VsZWN0IDE=",
            "format": "SOURCE",
            "overwrite": true
        }),
    )
    .await;

    let client = create_test_client(&server);
    client
        .import(ImportRequest::notebook("/Shared/q", Language::Sql, "select 1").with_overwrite(true))
        .await
        .unwrap();
    m.assert_async().await;
}

#[tokio::test]
async fn test_import_source_without_language_is_rejected() {
    let server = setup_test_server().await;
    let client = create_test_client(&server);

    let mut request = ImportRequest::notebook("/Shared/q", Language::Sql, "select 1");
    request.language = None;
    assert!(matches!(client.import(request).await, Err(WorkspaceError::Validation(_))));
}

#[tokio::test]
async fn test_export_notebook_decodes_content() {
    let mut server = setup_test_server().await;
    let m = server
        .mock("GET", "/api/2.0/workspace/export")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("path".into(), "/Shared/hello".into()),
            Matcher::UrlEncoded("format".into(), "SOURCE".into()),
        ]))
        .match_header("authorization", bearer().as_str())
        .with_status(200)
        .with_body(r#"{"content":"IyBEYXRhYnJpY2tzIG5vdGVib29rIHNvdXJjZQpwcmludCgxKQ==","file_type":"py"}"#)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let text = client.export_notebook("/Shared/hello", ExportFormat::Source).await.unwrap();

    m.assert_async().await;
    assert_eq!(text, "# Databricks notebook source\nprint(1)");
}

#[tokio::test]
async fn test_export_without_content_fails() {
    let mut server = setup_test_server().await;
    let _m = server
        .mock("GET", "/api/2.0/workspace/export")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;

    let client = create_test_client(&server);
    let err = client.export_bytes("/Shared/hello", ExportFormat::Dbc).await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Processing(_)));
}

#[tokio::test]
async fn test_permissions_roundtrip() {
    let mut server = setup_test_server().await;
    let response = json!({
        "object_id": "/directories/11",
        "object_type": "directory",
        "access_control_list": [
            {"group_name": "data-eng", "all_permissions": [{"permission_level": "CAN_EDIT", "inherited": false}]}
        ]
    })
    .to_string();
    let get = mock_get(&mut server, "permissions", "/Shared/etl", 200, &response).await;
    let patch = server
        .mock("PATCH", "/api/2.0/workspace/permissions")
        .match_query(Matcher::UrlEncoded("path".into(), "/Shared/etl".into()))
        .match_header("authorization", bearer().as_str())
        .match_body(Matcher::Json(json!({
            "access_control_list": [{"group_name": "data-eng", "permission_level": "CAN_EDIT"}]
        })))
        .with_status(200)
        .with_body(&response)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let current = client.get_permissions("/Shared/etl").await.unwrap();
    assert_eq!(current.access_control_list[0].principal(), Some("data-eng"));

    let updated = client
        .update_permissions(
            "/Shared/etl",
            &[AccessControlRequest::for_group("data-eng", PermissionLevel::CanEdit)],
        )
        .await
        .unwrap();
    assert_eq!(updated, current);

    get.assert_async().await;
    patch.assert_async().await;
}

#[tokio::test]
async fn test_update_permissions_validates_entries() {
    let server = setup_test_server().await;
    let client = create_test_client(&server);

    assert!(matches!(
        client.update_permissions("/Shared", &[]).await,
        Err(WorkspaceError::Validation(_))
    ));

    let mut entry = AccessControlRequest::for_user("a@example.com", PermissionLevel::CanRead);
    entry.group_name = Some("users".into());
    assert!(matches!(
        client.update_permissions("/Shared", &[entry]).await,
        Err(WorkspaceError::Validation(_))
    ));
}

#[tokio::test]
async fn test_move_object() {
    let mut server = setup_test_server().await;
    let m = mock_post(
        &mut server,
        "move",
        json!({"source_path": "/Shared/a", "destination_path": "/Shared/archive/a"}),
    )
    .await;

    let client = create_test_client(&server);
    assert!(client.move_object("/Shared/a", "/Shared/archive/a").await.unwrap());
    m.assert_async().await;

    let into_itself = client.move_object("/Shared/a", "/Shared/a/b").await;
    assert!(matches!(into_itself, Err(WorkspaceError::Validation(_))));
}

#[tokio::test]
async fn test_relative_paths_are_rejected() {
    let server = setup_test_server().await;
    let client = create_test_client(&server);

    assert!(matches!(client.list_contents("Shared").await, Err(WorkspaceError::Validation(_))));
    assert!(matches!(client.get_status("/a/../b").await, Err(WorkspaceError::Validation(_))));
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let mut server = setup_test_server().await;
    let m = mock_get_hits(&mut server, "get-status", "/Shared/flaky", 503, "temporarily unavailable", 3).await;

    let client = create_test_client(&server);
    let err = client.get_status("/Shared/flaky").await.unwrap_err();

    m.assert_async().await;
    assert!(matches!(err, WorkspaceError::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mut server = setup_test_server().await;
    let m = mock_get(
        &mut server,
        "list",
        "/Shared",
        400,
        r#"{"error_code":"INVALID_PARAMETER_VALUE","message":"bad request"}"#,
    )
    .await;

    let client = create_test_client(&server);
    let err = client.list_contents("/Shared").await.unwrap_err();

    m.assert_async().await;
    match err {
        WorkspaceError::Api { status, error_code, message } => {
            assert_eq!(status, 400);
            assert_eq!(error_code, "INVALID_PARAMETER_VALUE");
            assert_eq!(message, "bad request");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let mut server = setup_test_server().await;
    let _m = mock_get(
        &mut server,
        "list",
        "/",
        401,
        r#"{"error_code":"UNAUTHENTICATED","message":"Invalid access token."}"#,
    )
    .await;

    let client = create_test_client(&server);
    assert!(matches!(client.list_contents("/").await, Err(WorkspaceError::Auth(_))));
}

#[tokio::test]
async fn test_export_with_invalid_base64_fails() {
    let mut server = setup_test_server().await;
    let _m = server
        .mock("GET", "/api/2.0/workspace/export")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"content":"not*base64!"}"#)
        .create_async()
        .await;

    let client = create_test_client(&server);
    let err = client.export_bytes("/Shared/hello", ExportFormat::Source).await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Decode(_)));
}

#[tokio::test]
async fn test_export_notebook_rejects_non_utf8() {
    let mut server = setup_test_server().await;
    let _m = server
        .mock("GET", "/api/2.0/workspace/export")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"content":"//4="}"#)
        .create_async()
        .await;

    let client = create_test_client(&server);
    assert_eq!(
        client.export_bytes("/Shared/bin", ExportFormat::Dbc).await.unwrap(),
        vec![0xff, 0xfe]
    );
    let err = client.export_notebook("/Shared/bin", ExportFormat::Source).await.unwrap_err();
    assert!(matches!(err, WorkspaceError::Utf8(_)));
}

#[tokio::test]
async fn test_requests_are_paced_by_rate_limit() {
    let mut server = setup_test_server().await;
    let listing = mock_get_hits(&mut server, "list", "/Shared", 200, "{}", 2).await;

    let mut config = create_test_config(&server);
    config.requests_per_minute = 2;
    let client = WorkspaceClient::from_config(&config).unwrap();

    client.list_contents("/Shared").await.unwrap();
    client.list_contents("/Shared").await.unwrap();
    assert_eq!(client.requests_in_window().await, 2);

    let third = tokio::time::timeout(Duration::from_millis(200), client.list_contents("/Shared")).await;
    assert!(third.is_err());
    listing.assert_async().await;
}

/// Serves `get-status` after `delay` and answers every POST immediately
async fn spawn_delayed_status_server(delay: Duration, gets: Arc<AtomicUsize>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve_connection(socket, delay, Arc::clone(&gets)));
        }
    });
    format!("http://{}", addr)
}

async fn serve_connection(socket: TcpStream, delay: Duration, gets: Arc<AtomicUsize>) {
    let mut reader = BufReader::new(socket);
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
            return;
        }

        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                return;
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut body = vec![0; content_length];
        if reader.read_exact(&mut body).await.is_err() {
            return;
        }

        let response_body = if request_line.starts_with("GET") {
            gets.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            r#"{"object_type":"NOTEBOOK","path":"/Shared/a"}"#
        } else {
            "{}"
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{}",
            response_body.len(),
            response_body
        );
        if reader.get_mut().write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

#[tokio::test]
async fn test_status_fetched_during_delete_is_not_cached() {
    let gets = Arc::new(AtomicUsize::new(0));
    let url = spawn_delayed_status_server(Duration::from_millis(300), Arc::clone(&gets)).await;

    let mut config = dbrx_api_tool::Config::new(url, TEST_TOKEN);
    config.status_cache_ttl_secs = 60;
    let client = Arc::new(WorkspaceClient::from_config(&config).unwrap());

    let in_flight = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.get_status("/Shared/a").await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(gets.load(Ordering::SeqCst), 1);

    assert!(client.delete("/Shared/a", false).await.unwrap());
    in_flight.await.unwrap().unwrap();

    client.get_status("/Shared/a").await.unwrap();
    assert_eq!(gets.load(Ordering::SeqCst), 2);
}
