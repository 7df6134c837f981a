//! Server API tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::*;
use pocketmate_core::email::MockNotifier;
use pocketmate_core::insights::MockInsights;
use pocketmate_core::models::ParsedReceipt;

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    let app = create_router_with_backends(db.clone(), ServerConfig::default(), None, None);
    (app, db)
}

fn setup_test_app_with_notifier() -> (Router, Database, Arc<MockNotifier>) {
    let db = Database::in_memory().unwrap();
    let notifier = Arc::new(MockNotifier::new());
    let app = create_router_with_backends(
        db.clone(),
        ServerConfig::default(),
        Some(notifier.clone() as Arc<dyn Notifier>),
        None,
    );
    (app, db, notifier)
}

/// GET with identity headers
fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-user-id", "clerk_test")
        .header("x-user-email", "test@example.com")
        .header("x-user-name", "Sam")
        .body(Body::empty())
        .unwrap()
}

/// JSON request with identity headers
fn send_json(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "clerk_test")
        .header("x-user-email", "test@example.com")
        .header("x-user-name", "Sam")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// POST with no body
fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", "clerk_test")
        .header("x-user-email", "test@example.com")
        .body(Body::empty())
        .unwrap()
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_account(app: &Router, name: &str, balance: f64) -> i64 {
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/accounts",
            serde_json::json!({ "name": name, "balance": balance }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    get_body_json(response).await["id"].as_i64().unwrap()
}

// ========== Identity ==========

#[tokio::test]
async fn test_health_requires_no_identity() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_identity_headers_rejected() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/accounts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_provisions_user_once() {
    let (app, db) = setup_test_app();

    let first = get_body_json(app.clone().oneshot(get("/api/me")).await.unwrap()).await;
    let again = get_body_json(app.oneshot(get("/api/me")).await.unwrap()).await;

    assert_eq!(first["id"], again["id"]);
    assert_eq!(first["email"], "test@example.com");
    assert_eq!(first["name"], "Sam");
    assert_eq!(db.list_users().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_currency_preference() {
    let (app, _db) = setup_test_app();

    let before = get_body_json(app.clone().oneshot(get("/api/me/currency")).await.unwrap()).await;
    assert_eq!(before["currency"], "USD");

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/me/currency",
            serde_json::json!({ "currency": "eur" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Stored uppercased and visible on the user row
    let after = get_body_json(app.clone().oneshot(get("/api/me/currency")).await.unwrap()).await;
    assert_eq!(after["currency"], "EUR");
    let me = get_body_json(app.clone().oneshot(get("/api/me")).await.unwrap()).await;
    assert_eq!(me["currency"], "EUR");

    let response = app
        .oneshot(send_json(
            "PUT",
            "/api/me/currency",
            serde_json::json!({ "currency": "euros" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Accounts ==========

#[tokio::test]
async fn test_first_account_is_default() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/accounts",
            serde_json::json!({ "name": "Main", "account_type": "savings", "balance": 50.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["name"], "Main");
    assert_eq!(json["account_type"], "savings");
    assert_eq!(json["is_default"], true);
}

#[tokio::test]
async fn test_account_name_required() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/accounts",
            serde_json::json!({ "name": "  " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_default_account() {
    let (app, _db) = setup_test_app();

    let _a = create_account(&app, "A", 0.0).await;
    let b = create_account(&app, "B", 0.0).await;

    let response = app
        .clone()
        .oneshot(post(&format!("/api/accounts/{}/default", b)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let accounts = get_body_json(app.oneshot(get("/api/accounts")).await.unwrap()).await;
    let defaults: Vec<_> = accounts
        .as_array()
        .unwrap()
        .iter()
        .filter(|a| a["is_default"] == true)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0]["name"], "B");
}

#[tokio::test]
async fn test_get_account_includes_transactions() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 100.0).await;
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 20.0,
                "date": "2024-05-10",
                "description": "groceries",
                "category": "food"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(
        app.oneshot(get(&format!("/api/accounts/{}", account_id)))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(json["balance"], 80.0);
    assert_eq!(json["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(json["transactions"][0]["description"], "groceries");
}

// ========== Transactions ==========

#[tokio::test]
async fn test_recurring_transaction_requires_interval() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 0.0).await;
    let response = app
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 10.0,
                "date": "2024-05-10",
                "description": "rent",
                "is_recurring": true
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_and_delete_transaction_adjust_balance() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 100.0).await;
    let created = get_body_json(
        app.clone()
            .oneshot(send_json(
                "POST",
                "/api/transactions",
                serde_json::json!({
                    "account_id": account_id,
                    "tx_type": "expense",
                    "amount": 30.0,
                    "date": "2024-05-10",
                    "description": "groceries",
                    "category": "food"
                }),
            ))
            .await
            .unwrap(),
    )
    .await;
    let tx_id = created["id"].as_i64().unwrap();

    // Edit the amount: balance moves by the delta
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/transactions/{}", tx_id),
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 50.0,
                "date": "2024-05-10",
                "description": "groceries",
                "category": "food"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let account = get_body_json(
        app.clone()
            .oneshot(get(&format!("/api/accounts/{}", account_id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(account["balance"], 50.0);

    // Delete: the balance effect reverses
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/transactions/{}", tx_id))
                .header("x-user-id", "clerk_test")
                .header("x-user-email", "test@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let account = get_body_json(
        app.oneshot(get(&format!("/api/accounts/{}", account_id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(account["balance"], 100.0);
}

#[tokio::test]
async fn test_list_transactions_filter_by_type() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 0.0).await;
    for (tx_type, amount) in [("income", 100.0), ("expense", 25.0), ("expense", 10.0)] {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/transactions",
                serde_json::json!({
                    "account_id": account_id,
                    "tx_type": tx_type,
                    "amount": amount,
                    "date": "2024-05-10",
                    "description": "entry",
                    "category": "other"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let expenses = get_body_json(
        app.oneshot(get("/api/transactions?tx_type=expense"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(expenses.as_array().unwrap().len(), 2);
}

// ========== Budget ==========

#[tokio::test]
async fn test_budget_get_before_set_is_404() {
    let (app, _db) = setup_test_app();

    let response = app.oneshot(get("/api/budget")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_budget_upsert_and_usage() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 0.0).await;
    let today = chrono::Utc::now().date_naive();
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 40.0,
                "date": today.to_string(),
                "description": "groceries",
                "category": "food"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(
        app.clone()
            .oneshot(send_json(
                "PUT",
                "/api/budget",
                serde_json::json!({ "amount": 200.0 }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(json["budget"]["amount"], 200.0);
    assert_eq!(json["current_expenses"], 40.0);
    assert_eq!(json["percentage_used"], 20.0);

    // Non-positive amounts are rejected
    let response = app
        .oneshot(send_json(
            "PUT",
            "/api/budget",
            serde_json::json!({ "amount": 0.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Stats and dashboard ==========

#[tokio::test]
async fn test_monthly_stats_shape() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 0.0).await;
    for (tx_type, amount, category) in [
        ("income", 500.0, "salary"),
        ("expense", 150.0, "food"),
        ("expense", 30.0, "transportation"),
    ] {
        let response = app
            .clone()
            .oneshot(send_json(
                "POST",
                "/api/transactions",
                serde_json::json!({
                    "account_id": account_id,
                    "tx_type": tx_type,
                    "amount": amount,
                    "date": "2024-05-10",
                    "description": "entry",
                    "category": category
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let json = get_body_json(
        app.oneshot(get("/api/stats/monthly?month=2024-05"))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(json["stats"]["total_income"], 500.0);
    assert_eq!(json["stats"]["total_expenses"], 180.0);
    assert_eq!(json["stats"]["top_category"], "food");
    assert_eq!(json["trend"].as_array().unwrap().len(), 6);
    assert_eq!(json["categories"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_monthly_stats_rejects_bad_month() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(get("/api/stats/monthly?month=May-2024"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_payload() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 100.0).await;
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 5.0,
                "date": "2024-05-10",
                "description": "coffee",
                "category": "food"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(app.oneshot(get("/api/dashboard")).await.unwrap()).await;

    assert_eq!(json["accounts"].as_array().unwrap().len(), 1);
    assert!(json["budget"].is_null());
    assert_eq!(json["recent_transactions"].as_array().unwrap().len(), 1);
}

// ========== Receipts ==========

#[tokio::test]
async fn test_scan_receipt_without_backend_unavailable() {
    let (app, _db) = setup_test_app();

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/receipts/scan",
            serde_json::json!({ "image": "aGVsbG8=", "mime_type": "image/jpeg" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_scan_receipt_with_mock_backend() {
    let db = Database::in_memory().unwrap();
    let insights = Arc::new(MockInsights {
        receipt: Some(ParsedReceipt {
            amount: 12.5,
            date: None,
            description: Some("Lunch".to_string()),
            merchant_name: Some("Cafe".to_string()),
            category: Some("food".to_string()),
        }),
        ..Default::default()
    });
    let app = create_router_with_backends(
        db,
        ServerConfig::default(),
        None,
        Some(insights as Arc<dyn InsightBackend>),
    );

    let encoded = base64::engine::general_purpose::STANDARD.encode(b"fake image bytes");
    let json = get_body_json(
        app.clone()
            .oneshot(send_json(
                "POST",
                "/api/receipts/scan",
                serde_json::json!({ "image": encoded, "mime_type": "image/jpeg" }),
            ))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(json["amount"], 12.5);
    assert_eq!(json["merchant_name"], "Cafe");

    // Garbage base64 is a client error
    let response = app
        .oneshot(send_json(
            "POST",
            "/api/receipts/scan",
            serde_json::json!({ "image": "not!!base64", "mime_type": "image/jpeg" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Jobs ==========

#[tokio::test]
async fn test_recurring_job_applies_due_definitions() {
    let (app, _db) = setup_test_app();

    let account_id = create_account(&app, "Main", 100.0).await;
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 10.0,
                "date": "2024-05-01",
                "description": "rent",
                "category": "housing",
                "is_recurring": true,
                "recurring_interval": "monthly"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let summary = get_body_json(
        app.clone()
            .oneshot(post("/api/jobs/recurring"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(summary["scanned"], 1);
    assert_eq!(summary["applied"], 1);

    // The definition spawned one posted occurrence and moved the balance
    let account = get_body_json(
        app.oneshot(get(&format!("/api/accounts/{}", account_id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(account["balance"], 80.0);
    assert_eq!(account["transactions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_budget_job_without_notifier_unavailable() {
    let (app, _db) = setup_test_app();

    let response = app.oneshot(post("/api/jobs/budgets")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_budget_job_sends_alert() {
    let (app, _db, notifier) = setup_test_app_with_notifier();

    let account_id = create_account(&app, "Main", 0.0).await;
    let today = chrono::Utc::now().date_naive();
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/transactions",
            serde_json::json!({
                "account_id": account_id,
                "tx_type": "expense",
                "amount": 85.0,
                "date": today.to_string(),
                "description": "shopping",
                "category": "other"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/budget",
            serde_json::json!({ "amount": 100.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let summary = get_body_json(app.oneshot(post("/api/jobs/budgets")).await.unwrap()).await;
    assert_eq!(summary["checked"], 1);
    assert_eq!(summary["alerted"], 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "test@example.com");
    assert!(sent[0].subject.contains("Budget Alert"));
}

#[tokio::test]
async fn test_report_job_sends_reports() {
    let (app, _db, notifier) = setup_test_app_with_notifier();

    create_account(&app, "Main", 0.0).await;

    let summary = get_body_json(app.oneshot(post("/api/jobs/reports")).await.unwrap()).await;
    assert_eq!(summary["users"], 1);
    assert_eq!(summary["sent"], 1);

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("Your Monthly Financial Report"));
}
