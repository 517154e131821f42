use duelroom_web::{AppContext, AppSettings, ServerConfig, ServerError, WebServer};
use std::fs;
use std::path::Path;
use std::time::Duration;
use warp::http::StatusCode;
use warp::hyper::{self, Client as HyperClient};

fn context(static_dir: &Path) -> AppContext {
    AppContext::new(
        ServerConfig::new("127.0.0.1", 0, static_dir),
        AppSettings::default(),
    )
    .expect("context")
}

#[tokio::test]
async fn health_reports_counts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let routes = WebServer::routes(&context(dir.path()));

    let response = warp::test::request()
        .method("GET")
        .path("/health")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(response.body()).expect("json");
    assert_eq!(
        body,
        serde_json::json!({ "status": "ok", "players": 0, "rooms": 0, "connections": 0 })
    );
}

#[tokio::test]
async fn static_root_serves_index_and_assets() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("index.html"), "<h1>duel</h1>").expect("write index");
    fs::create_dir_all(dir.path().join("css")).expect("mkdir");
    fs::write(dir.path().join("css").join("board.css"), "td{}").expect("write css");
    let routes = WebServer::routes(&context(dir.path()));

    let index = warp::test::request().path("/").reply(&routes).await;
    assert_eq!(index.status(), StatusCode::OK);
    assert_eq!(index.body().as_ref(), b"<h1>duel</h1>");

    let css = warp::test::request().path("/css/board.css").reply(&routes).await;
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(css.headers()["content-type"], "text/css; charset=utf-8");
}

#[tokio::test]
async fn unknown_paths_negotiate_404_body() {
    let dir = tempfile::tempdir().expect("tempdir");
    let routes = WebServer::routes(&context(dir.path()));

    let json = warp::test::request()
        .path("/nowhere")
        .header("accept", "application/json")
        .reply(&routes)
        .await;
    assert_eq!(json.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(json.body()).expect("json");
    assert_eq!(
        body,
        serde_json::json!({ "error": "Error 404: The page not found" })
    );

    let text = warp::test::request()
        .path("/nowhere")
        .header("accept", "text/plain")
        .reply(&routes)
        .await;
    assert_eq!(text.status(), StatusCode::NOT_FOUND);
    assert_eq!(text.body().as_ref(), b"Error 404: The page not found");

    let html = warp::test::request()
        .path("/nowhere")
        .header("accept", "text/html")
        .reply(&routes)
        .await;
    assert_eq!(html.status(), StatusCode::NOT_FOUND);
    assert_eq!(html.headers()["content-type"], "text/html; charset=utf-8");
}

#[tokio::test]
async fn custom_404_page_and_non_get_methods() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("404.html"), "<p>no such page</p>").expect("write 404");
    let routes = WebServer::routes(&context(dir.path()));

    let response = warp::test::request()
        .method("POST")
        .path("/health")
        .reply(&routes)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.body().as_ref(), b"<p>no such page</p>");
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = AppSettings {
        outbound_buffer: 0,
        ..AppSettings::default()
    };

    let result = AppContext::new(ServerConfig::new("127.0.0.1", 0, dir.path()), settings);
    assert!(matches!(result, Err(ServerError::Settings(_))));
}

#[tokio::test]
async fn web_server_serves_health_endpoint() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = WebServer::from_context(context(dir.path()));
    let handle = server.start().await.expect("start server");
    let address = handle.address();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let uri: hyper::Uri = format!("http://{address}/health")
        .parse()
        .expect("parse uri");
    let response = HyperClient::new()
        .get(uri)
        .await
        .expect("request /health succeeded");
    assert_eq!(response.status(), hyper::StatusCode::OK);

    let coordinator = handle.context().coordinator();
    handle.shutdown().await.expect("shutdown");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(coordinator.status().await.is_err());
}
