//! HTTP API tests against in-process fake scanner, preview, media and AI
//! services. None of these touch the database.

mod helpers;

use a11y_assist::models::demand::{AltTextDemand, DemandContext, ScanDemand};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use helpers::*;
use serde_json::{json, Value};
use std::time::Duration;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

const PREVIEW_HTML: &str = r#"
    <html><body>
    <header>Site</header><nav><a href="/">Home</a></nav>
    <main><h1>Bikes</h1><img src="bike.png"><h3>Details</h3></main>
    <footer>Contact</footer>
    </body></html>
"#;

fn context() -> DemandContext {
    DemandContext {
        user_id: 1,
        page_id: 5,
        language_id: 1,
        workspace_id: 0,
    }
}

async fn fake_scanner() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/scans",
            post(|State(hits): State<Hits>| async move {
                hits.bump();
                (StatusCode::CREATED, r#"{"id":"abc","status":"pending"}"#)
            }),
        )
        .with_state(hits.clone());
    (serve(app).await, hits)
}

async fn fake_site() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/page",
            get(|State(hits): State<Hits>| async move {
                hits.bump();
                axum::response::Html(PREVIEW_HTML)
            }),
        )
        .route(
            "/edited",
            get(|State(hits): State<Hits>| async move {
                // The editor adds the missing alt text after the first render.
                let html = if hits.bump() == 0 {
                    PREVIEW_HTML.to_string()
                } else {
                    PREVIEW_HTML.replace(
                        r#"<img src="bike.png">"#,
                        r#"<img src="bike.png" alt="Bike">"#,
                    )
                };
                axum::response::Html(html)
            }),
        )
        .route("/media.evil/bike.png", get(|| async { PNG_BYTES }))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/media/bike.png", get(|| async { PNG_BYTES }))
        .route("/media/notes.txt", get(|| async { "just text" }))
        .with_state(hits.clone());
    (serve(app).await, hits)
}

async fn fake_ai() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(|State(hits): State<Hits>, Json(body): Json<Value>| async move {
                hits.bump();
                let prompt = body["messages"][0]["content"][0]["text"].as_str().unwrap_or("");
                let text = if prompt.contains("\"de\"") {
                    "Ein rotes Fahrrad"
                } else {
                    "A red bicycle"
                };
                Json(json!({ "choices": [{ "message": { "content": text } }] }))
            }),
        )
        .with_state(hits.clone());
    (format!("{}/v1", serve(app).await), hits)
}

async fn post_json(url: String, body: &Value) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .expect("request failed");
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_tampered_scan_demand_is_rejected_before_scanning() {
    let (scanner, scanner_hits) = fake_scanner().await;
    let app = spawn_app(Remotes {
        scanner: Some(scanner),
        ..Default::default()
    })
    .await;

    let mut demand = serde_json::to_value(ScanDemand::new(&signer(), context(), "https://x/y")).unwrap();
    demand["pageId"] = json!(6);

    let (status, body) = post_json(format!("{app}/api/v1/scans"), &demand).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Demand signature mismatch");
    assert_eq!(scanner_hits.count(), 0);
}

#[tokio::test]
async fn test_demand_from_other_secret_is_rejected() {
    let app = spawn_app(Remotes::default()).await;
    let other = a11y_assist::services::signing::DemandSigner::new("other").unwrap();
    let demand = serde_json::to_value(ScanDemand::new(&other, context(), "https://x/y")).unwrap();

    let (status, _) = post_json(format!("{app}/api/v1/audit"), &demand).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_demands_are_unprocessable() {
    let app = spawn_app(Remotes::default()).await;
    let valid = serde_json::to_value(ScanDemand::new(&signer(), context(), "https://x/y")).unwrap();

    let mut missing = valid.clone();
    missing.as_object_mut().unwrap().remove("signature");
    let (status, _) = post_json(format!("{app}/api/v1/scans"), &missing).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut unknown = valid.clone();
    unknown["isAdmin"] = json!(true);
    let (status, _) = post_json(format!("{app}/api/v1/scans"), &unknown).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let mut short_signature = valid;
    short_signature["signature"] = json!("abc");
    let (status, _) = post_json(format!("{app}/api/v1/scans"), &short_signature).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_scan_without_scanner_is_unavailable() {
    let app = spawn_app(Remotes::default()).await;
    let demand = serde_json::to_value(ScanDemand::new(&signer(), context(), "https://x/y")).unwrap();

    let (status, body) = post_json(format!("{app}/api/v1/scans"), &demand).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Scanner is not configured");
}

fn rules(report: &Value) -> Vec<String> {
    report["findings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["rule"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_audit_fetches_preview_once() {
    let (site, site_hits) = fake_site().await;
    let app = spawn_app(Remotes::default()).await;
    let demand =
        serde_json::to_value(ScanDemand::new(&signer(), context(), format!("{site}/page"))).unwrap();

    for _ in 0..2 {
        let (status, report) = post_json(format!("{app}/api/v1/audit"), &demand).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["images"], 1);
        assert_eq!(report["headings"], json!([1, 3]));
        assert_eq!(rules(&report), vec!["missing-alt", "heading-order"]);
    }

    assert_eq!(site_hits.count(), 1);
}

#[tokio::test]
async fn test_audit_picks_up_edited_preview_after_ttl() {
    let (site, site_hits) = fake_site().await;
    let app = spawn_app(Remotes {
        preview_ttl: Some(Duration::from_millis(300)),
        ..Default::default()
    })
    .await;
    let demand =
        serde_json::to_value(ScanDemand::new(&signer(), context(), format!("{site}/edited")))
            .unwrap();

    let (_, first) = post_json(format!("{app}/api/v1/audit"), &demand).await;
    let (_, cached) = post_json(format!("{app}/api/v1/audit"), &demand).await;
    assert_eq!(rules(&first), vec!["missing-alt", "heading-order"]);
    assert_eq!(rules(&cached), rules(&first));
    assert_eq!(site_hits.count(), 1);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let (status, fresh) = post_json(format!("{app}/api/v1/audit"), &demand).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rules(&fresh), vec!["heading-order"]);
    assert_eq!(site_hits.count(), 2);
}

#[tokio::test]
async fn test_audit_of_broken_preview_is_bad_gateway() {
    let (site, _) = fake_site().await;
    let app = spawn_app(Remotes::default()).await;
    let demand =
        serde_json::to_value(ScanDemand::new(&signer(), context(), format!("{site}/broken")))
            .unwrap();

    let (status, body) = post_json(format!("{app}/api/v1/audit"), &demand).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Remote service failed");
}

#[tokio::test]
async fn test_audit_requires_preview_url() {
    let app = spawn_app(Remotes::default()).await;
    let demand = serde_json::to_value(ScanDemand::new(&signer(), context(), "")).unwrap();

    let (status, _) = post_json(format!("{app}/api/v1/audit"), &demand).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

fn alt_text_request(image_url: String) -> Value {
    let demand = AltTextDemand::new(
        &signer(),
        context(),
        "sys_file_reference",
        12,
        vec!["alternative".to_string(), "title".to_string()],
    );
    json!({ "demand": demand, "imageUrl": image_url })
}

#[tokio::test]
async fn test_generate_alt_text() {
    let (site, _) = fake_site().await;
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        media_base_url: Some(format!("{site}/media/")),
        backend_edit_url: Some("https://cms.example/typo3/record/edit".to_string()),
        ..Default::default()
    })
    .await;

    let request = alt_text_request(format!("{site}/media/bike.png"));
    let (status, body) = post_json(format!("{app}/api/v1/alt-text"), &request).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["altText"], "Ein rotes Fahrrad");
    assert_eq!(
        body["values"],
        json!({ "alternative": "Ein rotes Fahrrad", "title": "Ein rotes Fahrrad" })
    );
    assert_eq!(body["editLink"]["label"], "sys_file_reference:12 (alternative)");
    assert_eq!(ai_hits.count(), 1);
}

#[tokio::test]
async fn test_alt_text_without_ai_is_unavailable() {
    let (site, _) = fake_site().await;
    let app = spawn_app(Remotes::default()).await;

    let request = alt_text_request(format!("{site}/media/bike.png"));
    let (status, _) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_alt_text_image_outside_media_base_is_forbidden() {
    let (site, _) = fake_site().await;
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        media_base_url: Some("https://media.example/".to_string()),
        ..Default::default()
    })
    .await;

    let request = alt_text_request(format!("{site}/media/bike.png"));
    let (status, _) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ai_hits.count(), 0);
}

#[tokio::test]
async fn test_alt_text_image_sharing_base_prefix_is_forbidden() {
    let (site, _) = fake_site().await;
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        media_base_url: Some(format!("{site}/media")),
        ..Default::default()
    })
    .await;

    let request = alt_text_request(format!("{site}/media.evil/bike.png"));
    let (status, _) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ai_hits.count(), 0);
}

#[tokio::test]
async fn test_alt_text_without_media_base_is_unavailable() {
    let (site, _) = fake_site().await;
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        ..Default::default()
    })
    .await;

    let request = alt_text_request(format!("{site}/media/bike.png"));
    let (status, body) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Media base URL is not configured");
    assert_eq!(ai_hits.count(), 0);
}

#[tokio::test]
async fn test_alt_text_image_url_must_be_a_url() {
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        media_base_url: Some("https://media.example/".to_string()),
        ..Default::default()
    })
    .await;

    let request = alt_text_request("media/bike.png".to_string());
    let (status, _) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(ai_hits.count(), 0);
}

#[tokio::test]
async fn test_alt_text_rejects_tampered_demand() {
    let (site, _) = fake_site().await;
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        ..Default::default()
    })
    .await;

    let mut request = alt_text_request(format!("{site}/media/bike.png"));
    request["demand"]["table"] = json!("be_users");

    let (status, _) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(ai_hits.count(), 0);
}

#[tokio::test]
async fn test_alt_text_rejects_non_image() {
    let (site, _) = fake_site().await;
    let (ai, ai_hits) = fake_ai().await;
    let app = spawn_app(Remotes {
        ai: Some(ai),
        media_base_url: Some(format!("{site}/media/")),
        ..Default::default()
    })
    .await;

    let request = alt_text_request(format!("{site}/media/notes.txt"));
    let (status, body) = post_json(format!("{app}/api/v1/alt-text"), &request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Invalid request: Unsupported image format");
    assert_eq!(ai_hits.count(), 0);
}
