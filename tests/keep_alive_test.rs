//! 保活流程集成测试
//!
//! 使用 mockito 模拟控制库和目标项目，通过路由驱动完整的一次运行

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use clap::Parser;
use db_keepalive::cli::{load_config, Args};
use db_keepalive::config::{ControlStoreConfig, ProbeConfig};
use db_keepalive::orchestrator::RunOrchestrator;
use db_keepalive::probe::ProbeStrategy;
use db_keepalive::registry::RestRegistry;
use db_keepalive::web::{router, WebAppState, KEEP_ALIVE_PATH};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "cron-secret";
const CONTROL_KEY: &str = "control-key";

fn app(control_url: Option<String>) -> Router {
    let probe = ProbeConfig {
        target_timeout_seconds: 5,
        ..Default::default()
    };
    let control = ControlStoreConfig {
        url: control_url,
        api_key: Some(CONTROL_KEY.to_string()),
        ..Default::default()
    };

    let registry = RestRegistry::new(&control).unwrap();
    let strategy = ProbeStrategy::from_config(&probe).unwrap();
    let orchestrator = RunOrchestrator::new(Arc::new(registry), Arc::new(strategy), &probe);
    router(WebAppState::new(
        Arc::new(orchestrator),
        Some(SECRET.to_string()),
    ))
}

async fn trigger(app: Router, authorization: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(KEEP_ALIVE_PATH);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    let response = app
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn mock_project_list(control: &mut ServerGuard, rows: Value) -> mockito::Mock {
    control
        .mock("GET", "/rest/v1/projects")
        .match_query(Matcher::UrlEncoded("select".into(), "*".into()))
        .match_header("apikey", CONTROL_KEY)
        .match_header("authorization", format!("Bearer {}", CONTROL_KEY).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rows.to_string())
        .expect(1)
        .create_async()
        .await
}

async fn mock_stamp(control: &mut ServerGuard, id: &str, status: usize, hits: usize) -> mockito::Mock {
    control
        .mock("PATCH", "/rest/v1/projects")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), format!("eq.{}", id)),
            Matcher::Regex(r"last_ping\.is\.null".into()),
        ]))
        .match_body(Matcher::Regex(
            r#""last_ping":"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z""#.into(),
        ))
        .with_status(status)
        .expect(hits)
        .create_async()
        .await
}

/// 主检查查询 `<resource>?select=*`，回退检查 `_realtime?select=*&limit=0`
async fn mock_head(
    targets: &mut ServerGuard,
    base: &str,
    resource: &str,
    status: usize,
) -> mockito::Mock {
    let select = Matcher::UrlEncoded("select".into(), "*".into());
    let query = if resource == "_realtime" {
        Matcher::AllOf(vec![select, Matcher::UrlEncoded("limit".into(), "0".into())])
    } else {
        select
    };

    targets
        .mock("HEAD", format!("/{}/rest/v1/{}", base, resource).as_str())
        .match_query(query)
        .match_header("apikey", "anon")
        .match_header("authorization", "Bearer anon")
        .match_header("prefer", "count=exact")
        .with_status(status)
        .expect(1)
        .create_async()
        .await
}

#[tokio::test]
async fn test_full_run_classifies_each_target() {
    let mut control = Server::new_async().await;
    let mut targets = Server::new_async().await;

    let rows = json!([
        { "id": 1, "name": "Blog", "url": format!("{}/blog", targets.url()), "api_key": "anon", "last_ping": null },
        { "id": 2, "name": "Shop", "url": format!("{}/shop", targets.url()), "api_key": "anon", "last_ping": "2024-01-01T00:00:00.000Z" },
        { "id": 3, "name": "Wiki", "url": format!("{}/wiki", targets.url()), "api_key": "anon", "last_ping": null, "created_at": "2023-12-01" },
        { "id": 4, "name": "Gone", "url": "http://127.0.0.1:1", "api_key": "anon", "last_ping": null }
    ]);
    let list = mock_project_list(&mut control, rows).await;

    let heads = vec![
        mock_head(&mut targets, "blog", "projects", 200).await,
        mock_head(&mut targets, "shop", "projects", 404).await,
        mock_head(&mut targets, "shop", "_realtime", 200).await,
        mock_head(&mut targets, "wiki", "projects", 404).await,
        mock_head(&mut targets, "wiki", "_realtime", 401).await,
    ];

    let stamp_blog = mock_stamp(&mut control, "1", 204, 1).await;
    let stamp_shop = mock_stamp(&mut control, "2", 204, 1).await;
    let stamp_wiki = mock_stamp(&mut control, "3", 204, 1).await;
    let stamp_gone = mock_stamp(&mut control, "4", 204, 0).await;

    let (status, body) = trigger(app(Some(control.url())), Some("Bearer cron-secret")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Keep-alive completed");
    assert_eq!(body["summary"], json!({ "total": 4, "success": 3, "errors": 1 }));

    let results = body["results"].as_array().unwrap();
    let projects: Vec<&str> = results.iter().map(|r| r["project"].as_str().unwrap()).collect();
    assert_eq!(projects, vec!["Blog", "Shop", "Wiki", "Gone"]);

    assert_eq!(results[0]["status"], "success");
    assert_eq!(results[0]["message"], "primary check succeeded");
    assert_eq!(results[1]["status"], "success");
    assert_eq!(results[1]["message"], "fallback check succeeded");
    assert_eq!(results[2]["status"], "success");
    assert_eq!(
        results[2]["message"],
        "connection established, no verifiable resource"
    );
    assert_eq!(results[3]["status"], "error");
    assert!(!results[3]["message"].as_str().unwrap().is_empty());

    for result in results {
        assert_eq!(result["timestamp"], body["timestamp"]);
    }

    list.assert_async().await;
    for head in &heads {
        head.assert_async().await;
    }
    stamp_blog.assert_async().await;
    stamp_shop.assert_async().await;
    stamp_wiki.assert_async().await;
    stamp_gone.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized_request_never_reaches_control_store() {
    let mut control = Server::new_async().await;
    let list = control
        .mock("GET", "/rest/v1/projects")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .expect(0)
        .create_async()
        .await;

    for header in [None, Some("Bearer wrong"), Some("cron-secret")] {
        let (status, body) = trigger(app(Some(control.url())), header).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Unauthorized" }));
    }

    list.assert_async().await;
}

#[tokio::test]
async fn test_empty_project_list() {
    let mut control = Server::new_async().await;
    let list = mock_project_list(&mut control, json!([])).await;

    let (status, body) = trigger(app(Some(control.url())), Some("Bearer cron-secret")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No projects to ping");
    assert_eq!(body["results"], json!([]));
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    list.assert_async().await;
}

#[tokio::test]
async fn test_missing_control_configuration() {
    let (status, body) = trigger(app(None), Some("Bearer cron-secret")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Missing control database configuration" })
    );
}

#[tokio::test]
async fn test_control_store_rejection() {
    let mut control = Server::new_async().await;
    let _list = control
        .mock("GET", "/rest/v1/projects")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"message":"Invalid API key","hint":null}"#)
        .create_async()
        .await;
    let stamp = control
        .mock("PATCH", "/rest/v1/projects")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (status, body) = trigger(app(Some(control.url())), Some("Bearer cron-secret")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Failed to fetch projects", "details": "Invalid API key" })
    );
    stamp.assert_async().await;
}

#[tokio::test]
async fn test_stamp_failure_keeps_success_outcome() {
    let mut control = Server::new_async().await;
    let mut targets = Server::new_async().await;

    let rows = json!([
        { "id": "a1", "name": "Blog", "url": format!("{}/blog", targets.url()), "api_key": "anon" }
    ]);
    let _list = mock_project_list(&mut control, rows).await;
    let _blog = mock_head(&mut targets, "blog", "projects", 200).await;
    let stamp = mock_stamp(&mut control, "a1", 500, 1).await;

    let (status, body) = trigger(app(Some(control.url())), Some("Bearer cron-secret")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], json!({ "total": 1, "success": 1, "errors": 0 }));
    assert_eq!(body["results"][0]["status"], "success");
    assert!(body.get("write_failures").is_none());
    stamp.assert_async().await;
}

#[tokio::test]
async fn test_explicit_missing_config_file_is_an_error() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");
    let args = Args::try_parse_from([
        "db-keepalive",
        "--config",
        missing.to_str().unwrap(),
        "serve",
    ])
    .unwrap();

    assert!(load_config(&args).await.is_err());
}
