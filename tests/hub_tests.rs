//! End-to-end tests for the integration hub
//!
//! Every provider is pointed at one wiremock server, so these tests exercise
//! the hub operations, the adapters and the HTTP front door together.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use integration_hub::config::{IntegrationConfig, ProviderEndpoints, ServerConfig};
use integration_hub::integrations::github::FileChange;
use integration_hub::integrations::{
    create_router, AppState, IntegrationHub, LoggingHandler, SyncResult, SyncStatus,
    WebhookPayload, WorkflowRecord,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn hub_for(server: &MockServer) -> IntegrationHub {
    IntegrationHub::new().with_endpoints(ProviderEndpoints::rooted_at(&server.uri()))
}

fn workflows(count: usize) -> Vec<WorkflowRecord> {
    (0..count)
        .map(|i| {
            let mut workflow = WorkflowRecord::new(format!("wf-{}", i));
            workflow.node_count = i as i64;
            workflow
        })
        .collect()
}

async fn read_envelope(response: axum::response::Response) -> SyncResult {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Registry and dispatch
// ============================================================================

#[tokio::test]
async fn test_registration_is_last_write_wins() {
    let hub = IntegrationHub::new();
    hub.register(IntegrationConfig::new("notion", "first", "")).await;
    hub.register(IntegrationConfig::new("notion", "second", "https://api.notion.com/v1"))
        .await;

    let stored = hub.integration("notion").await.unwrap();
    assert_eq!(stored.credential, "second");
    assert_eq!(stored.base_url, "https://api.notion.com/v1");
    assert_eq!(hub.status().await.integrations, vec!["notion"]);
}

#[tokio::test]
async fn test_dispatch_to_unregistered_endpoint() {
    let hub = IntegrationHub::new();
    hub.register_webhook("workflow-update", Arc::new(LoggingHandler::new("workflow-update")))
        .await;

    let result = hub
        .dispatch("error-report", WebhookPayload::new("failed", Map::new()))
        .await;
    assert_eq!(result.status, SyncStatus::Error);
    assert_eq!(result.message, "Webhook endpoint not found");
}

// ============================================================================
// Linear
// ============================================================================

#[tokio::test]
async fn test_linear_sync_filters_by_team_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("Authorization", "lin_api_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"issues": {"nodes": [
                {"id": "a", "identifier": "KOS-1", "title": "A", "url": "u", "team": {"key": "KOS"}},
                {"id": "b", "identifier": "ENG-1", "title": "B", "url": "u", "team": {"key": "ENG"}},
                {"id": "c", "identifier": "KOS-2", "title": "C", "url": "u", "team": {"key": "KOS"}},
                {"id": "d", "identifier": "X-1", "title": "D", "url": "u"}
            ]}}
        })))
        .mount(&server)
        .await;

    let hub = hub_for(&server);
    let result = hub.sync_with_linear("lin_api_key", Some("KOS")).await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.message, "Successfully fetched 2 active issues from Linear");
    assert_eq!(result.get("count"), Some(&json!(2)));
    let ids: Vec<&str> = result.get("issues").unwrap().as_array().unwrap()
        .iter()
        .map(|issue| issue["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "c"]);

    let everything = hub.sync_with_linear("lin_api_key", None).await;
    assert_eq!(everything.get("count"), Some(&json!(4)));
}

#[tokio::test]
async fn test_linear_graphql_errors_become_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Authentication required"}]
        })))
        .mount(&server)
        .await;

    let result = hub_for(&server).sync_with_linear("bad", None).await;
    assert!(result.is_error());
    assert!(result.message.starts_with("Linear GraphQL Error"));
    assert!(result.message.contains("Authentication required"));
}

// ============================================================================
// GitHub
// ============================================================================

const REPO_API: &str = "https://api.github.com/repos/acme/auto";

fn github_repository() -> Value {
    json!({
        "id": 1296269,
        "node_id": "MDEwOlJlcG9zaXRvcnkxMjk2MjY5",
        "name": "auto",
        "full_name": "acme/auto",
        "private": false,
        "html_url": "https://github.com/acme/auto",
        "fork": false,
        "url": REPO_API,
        "default_branch": "main"
    })
}

fn github_content(item_path: &str) -> Value {
    let name = item_path.rsplit('/').next().unwrap_or(item_path);
    let url = format!("{}/contents/{}", REPO_API, item_path);
    let git_url = format!("{}/git/blobs/3d21ec53a331a6f037a91c368710b99387d012c1", REPO_API);
    let html_url = format!("https://github.com/acme/auto/blob/main/{}", item_path);
    json!({
        "type": "file",
        "size": 42,
        "name": name,
        "path": item_path,
        "sha": "3d21ec53a331a6f037a91c368710b99387d012c1",
        "url": url,
        "git_url": git_url,
        "html_url": html_url,
        "download_url": format!("https://raw.githubusercontent.com/acme/auto/main/{}", item_path),
        "_links": {"self": url, "git": git_url, "html": html_url}
    })
}

fn github_file_update(item_path: &str) -> Value {
    let commit_url = format!("{}/git/commits/7638417db6d59f3c431d3e1f261cc637155684cd", REPO_API);
    let author = json!({
        "date": "2024-11-07T22:01:45Z",
        "name": "Automation",
        "email": "automation@example.com"
    });
    json!({
        "content": github_content(item_path),
        "commit": {
            "sha": "7638417db6d59f3c431d3e1f261cc637155684cd",
            "node_id": "MDY6Q29tbWl0NzYzODQxN2RiNmQ1OWYzYzQzMWQzZTFmMjYxY2M2MzcxNTU2ODRjZA==",
            "url": commit_url,
            "html_url": "https://github.com/acme/auto/git/commit/7638417db6d59f3c431d3e1f261cc637155684cd",
            "author": author,
            "committer": author,
            "message": format!("Add {}", item_path),
            "tree": {
                "url": format!("{}/git/trees/691272480426f78a0138979dd3ce63b77f706feb", REPO_API),
                "sha": "691272480426f78a0138979dd3ce63b77f706feb"
            },
            "parents": [{
                "url": format!("{}/git/commits/abc123", REPO_API),
                "html_url": "https://github.com/acme/auto/git/commit/abc123",
                "sha": "abc123"
            }],
            "verification": {
                "verified": false,
                "reason": "unsigned",
                "signature": null,
                "payload": null
            }
        }
    })
}

fn github_pull(number: u64) -> Value {
    json!({
        "url": format!("{}/pulls/{}", REPO_API, number),
        "id": 1347,
        "node_id": "MDExOlB1bGxSZXF1ZXN0MQ==",
        "html_url": format!("https://github.com/acme/auto/pull/{}", number),
        "number": number,
        "state": "open",
        "locked": false,
        "title": "Update workflows",
        "body": "Adds the new workflow",
        "created_at": "2024-11-07T22:01:45Z",
        "updated_at": "2024-11-07T22:01:45Z",
        "head": {"label": "acme:agent/update", "ref": "agent/update", "sha": "7638417db6d59f3c431d3e1f261cc637155684cd"},
        "base": {"label": "acme:main", "ref": "main", "sha": "abc123"}
    })
}

/// Method and decoded path of every request the server saw, in order
async fn request_log(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| format!("{} {}", request.method, request.url.path().replace("%2F", "/")))
        .collect()
}

#[tokio::test]
async fn test_github_sync_lists_only_json_workflows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/auto/contents/workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            github_content("workflows/a.json"),
            github_content("workflows/README.md")
        ])))
        .mount(&server)
        .await;

    let result = hub_for(&server).sync_with_github("acme/auto", "ghp_token").await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.message, "Found 1 workflow files in acme/auto");
    assert_eq!(result.get("repository"), Some(&json!("acme/auto")));
    assert_eq!(result.get("workflow_files"), Some(&json!(1)));
    assert_eq!(result.get("files"), Some(&json!(["a.json"])));
}

#[tokio::test]
async fn test_github_sync_missing_directory_is_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/auto/contents/workflows"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;

    let result = hub_for(&server).sync_with_github("acme/auto", "ghp_token").await;
    assert_eq!(result.status, SyncStatus::Error);
    assert!(!result.message.is_empty());
}

#[tokio::test]
async fn test_github_pr_creates_missing_file_on_existing_branch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(github_repository()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/auto/git/ref/heads/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "node_id": "MDM6UmVmcmVmcy9oZWFkcy9tYWlu",
            "url": format!("{}/git/refs/heads/main", REPO_API),
            "object": {
                "type": "commit",
                "sha": "abc123",
                "url": format!("{}/git/commits/abc123", REPO_API)
            }
        })))
        .mount(&server)
        .await;
    // Branch creation fails; the flow carries on with the existing branch
    Mock::given(method("POST"))
        .and(path("/repos/acme/auto/git/refs"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "message": "Reference already exists",
            "documentation_url": "https://docs.github.com/rest/git/refs"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/repos/acme/auto/contents/workflows(/|%2F)new\.json$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/repos/acme/auto/contents/workflows(/|%2F)new\.json$"))
        .and(body_string_contains("Add workflows/new.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(github_file_update("workflows/new.json")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/auto/pulls"))
        .and(body_string_contains("agent/update-"))
        .respond_with(ResponseTemplate::new(201).set_body_json(github_pull(9)))
        .expect(1)
        .mount(&server)
        .await;

    let files = vec![FileChange {
        path: "workflows/new.json".to_string(),
        content: "{\"nodes\": []}".to_string(),
    }];
    let result = hub_for(&server)
        .create_github_pr("ghp_token", "acme/auto", "Update workflows", Some("Adds the new workflow"), files)
        .await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.message, "Successfully created PR");
    assert_eq!(
        result.get("pr_url"),
        Some(&json!("https://github.com/acme/auto/pull/9"))
    );
    let branch = result.get("branch").and_then(Value::as_str).unwrap();
    assert!(branch.starts_with("agent/update-"), "{}", branch);

    assert_eq!(
        request_log(&server).await,
        vec![
            "GET /repos/acme/auto",
            "GET /repos/acme/auto/git/ref/heads/main",
            "POST /repos/acme/auto/git/refs",
            "GET /repos/acme/auto/contents/workflows/new.json",
            "PUT /repos/acme/auto/contents/workflows/new.json",
            "POST /repos/acme/auto/pulls",
        ]
    );
}

#[tokio::test]
async fn test_github_pr_file_failure_is_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(github_repository()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/auto/git/ref/heads/main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ref": "refs/heads/main",
            "node_id": "MDM6UmVmcmVmcy9oZWFkcy9tYWlu",
            "url": format!("{}/git/refs/heads/main", REPO_API),
            "object": {
                "type": "commit",
                "sha": "abc123",
                "url": format!("{}/git/commits/abc123", REPO_API)
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/auto/git/refs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ref": "refs/heads/agent/update",
            "node_id": "MDM6UmVmcmVmcy9oZWFkcy9mZWF0dXJl",
            "url": format!("{}/git/refs/heads/agent/update", REPO_API),
            "object": {
                "type": "commit",
                "sha": "abc123",
                "url": format!("{}/git/commits/abc123", REPO_API)
            }
        })))
        .mount(&server)
        .await;
    // Lookup, update and create all fail
    Mock::given(path_regex(r"^/repos/acme/auto/contents/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "message": "Resource not accessible by integration",
            "documentation_url": "https://docs.github.com/rest"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/auto/pulls"))
        .respond_with(ResponseTemplate::new(201).set_body_json(github_pull(10)))
        .expect(0)
        .mount(&server)
        .await;

    let files = vec![FileChange {
        path: "workflows/new.json".to_string(),
        content: "{}".to_string(),
    }];
    let result = hub_for(&server)
        .create_github_pr("ghp_token", "acme/auto", "Update workflows", None, files)
        .await;

    assert_eq!(result.status, SyncStatus::Error);
    assert!(result.get("pr_url").is_none());
}

// ============================================================================
// Airtable
// ============================================================================

#[tokio::test]
async fn test_airtable_export_batches_by_ten() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/app123/Workflows"))
        .and(header("Authorization", "Bearer key123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(3)
        .mount(&server)
        .await;

    let result = hub_for(&server)
        .export_to_airtable("app123", "Workflows", "key123", &workflows(23))
        .await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.message, "Exported 23 workflows to Airtable");
    assert_eq!(result.get("created"), Some(&json!(23)));

    let requests = server.received_requests().await.unwrap();
    let sizes: Vec<usize> = requests
        .iter()
        .map(|request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            body["records"].as_array().unwrap().len()
        })
        .collect();
    assert_eq!(sizes, vec![10, 10, 3]);
}

#[tokio::test]
async fn test_airtable_second_batch_failure_reports_created() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/app123/Workflows"))
        .and(body_string_contains("\"wf-10\""))
        .respond_with(ResponseTemplate::new(422).set_body_string("INVALID_VALUE_FOR_COLUMN"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v0/app123/Workflows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;

    let result = hub_for(&server)
        .export_to_airtable("app123", "Workflows", "key123", &workflows(23))
        .await;

    assert!(result.is_error());
    assert_eq!(
        result.message,
        "Failed to create records: INVALID_VALUE_FOR_COLUMN"
    );
    assert_eq!(result.get("created"), Some(&json!(10)));
}

// ============================================================================
// Notion
// ============================================================================

#[tokio::test]
async fn test_notion_sync_creates_one_page_per_workflow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/pages"))
        .and(header("Notion-Version", "2022-06-28"))
        .and(header("Authorization", "Bearer secret_tok"))
        .and(body_string_contains("db-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "page"})))
        .expect(4)
        .mount(&server)
        .await;

    let result = hub_for(&server)
        .sync_with_notion("db-1", "secret_tok", &workflows(4))
        .await;

    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.message, "Synced 4 workflows to Notion");
    assert_eq!(result.get("created"), Some(&json!(4)));
}

// ============================================================================
// Chat webhooks
// ============================================================================

#[tokio::test]
async fn test_slack_success_is_decided_by_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/slack/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/slack/accepted"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let hub = IntegrationHub::new();

    let ok = hub
        .notify_slack(&format!("{}/slack/ok", server.uri()), "deploy finished")
        .await;
    assert!(ok.is_success());
    assert_eq!(ok.message, "Notification sent to Slack");

    let accepted = hub
        .notify_slack(&format!("{}/slack/accepted", server.uri()), "deploy finished")
        .await;
    assert!(accepted.is_error());
    assert_eq!(accepted.message, "Failed to send to Slack");
}

#[tokio::test]
async fn test_discord_requires_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/discord/204"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/discord/200"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let hub = IntegrationHub::new();

    let sent = hub
        .notify_discord(&format!("{}/discord/204", server.uri()), "hello")
        .await;
    assert_eq!(sent.message, "Notification sent to Discord");

    let refused = hub
        .notify_discord(&format!("{}/discord/200", server.uri()), "hello")
        .await;
    assert_eq!(refused.message, "Failed to send to Discord");
}

// ============================================================================
// Supabase
// ============================================================================

#[tokio::test]
async fn test_supabase_health_counts_slow_queries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/proj-1/analytics/query"))
        .and(query_param("sort", "latency"))
        .and(header("Authorization", "Bearer sbp_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"query": "select 1", "latency": 900},
            {"query": "select 2", "latency": 800}
        ])))
        .mount(&server)
        .await;

    let result = hub_for(&server)
        .check_supabase_health("sbp_token", "proj-1")
        .await;

    assert!(result.is_success());
    assert_eq!(result.message, "Supabase Connection Established");
    assert_eq!(result.get("health"), Some(&json!("healthy")));
    assert_eq!(
        result.get("metrics"),
        Some(&json!({"slow_queries_count": 2}))
    );
}

#[tokio::test]
async fn test_supabase_health_survives_probe_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = hub_for(&server)
        .check_supabase_health("sbp_token", "proj-1")
        .await;

    assert!(result.is_success());
    assert_eq!(
        result.get("metrics"),
        Some(&json!({"slow_queries_count": 0}))
    );
}

// ============================================================================
// HTTP front door
// ============================================================================

#[tokio::test]
async fn test_airtable_route_runs_export() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v0/app9/Flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
        .expect(1)
        .mount(&server)
        .await;

    let state = AppState::new(Arc::new(hub_for(&server)), ServerConfig::default());
    let body = json!({
        "base_id": "app9",
        "table_name": "Flows",
        "api_key": "key",
        "workflows": [{"name": "Lead intake", "integrations": ["Slack", "Airtable"]}]
    });

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/integrations/airtable/export")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_envelope(response).await;
    assert_eq!(envelope.message, "Exported 1 workflows to Airtable");
}

#[tokio::test]
async fn test_provider_failure_is_still_ok_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let state = AppState::new(Arc::new(IntegrationHub::new()), ServerConfig::default());
    let body = json!({"webhook_url": format!("{}/hook", server.uri()), "message": "hi"});

    let response = create_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/integrations/slack/notify")
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let envelope = read_envelope(response).await;
    assert_eq!(envelope.status, SyncStatus::Error);
    assert_eq!(envelope.message, "Failed to send to Slack");
}
