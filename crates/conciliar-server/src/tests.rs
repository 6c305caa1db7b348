//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use conciliar_core::db::Database;
use conciliar_core::models::{
    ItemFilter, NewInternalRecord, NewStatement, NewStatementLine, RecordCategory,
    RecordDirection,
};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tower::ServiceExt;

fn setup_test_app() -> (Router, Database) {
    let db = Database::in_memory().unwrap();
    (create_router(db.clone()), db)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", "maria")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
}

/// Statement with one payment line (and its record) plus one bank fee line
///
/// Returns (statement_id, payment_item_id, fee_item_id, record_id)
fn seed_statement(db: &Database) -> (i64, i64, i64, i64) {
    let statement_id = db
        .create_statement(&NewStatement {
            company_id: 1,
            account_id: 10,
            period_label: "2026-01".to_string(),
            amount_tolerance_pct: None,
            date_tolerance_days: None,
        })
        .unwrap();
    let ids = db
        .add_statement_items(
            statement_id,
            &[
                NewStatementLine {
                    date: date(10),
                    amount: Some(-1000.0),
                    debit: None,
                    credit: None,
                    reference: Some("PAG-001".to_string()),
                    description: "PAGO PROVEEDOR ACME".to_string(),
                },
                NewStatementLine {
                    date: date(12),
                    amount: Some(-25.0),
                    debit: None,
                    credit: None,
                    reference: None,
                    description: "BANK FEE".to_string(),
                },
            ],
        )
        .unwrap();
    let record_id = db
        .add_internal_record(&NewInternalRecord {
            company_id: 1,
            account_id: 10,
            date: date(10),
            amount: 1000.0,
            direction: RecordDirection::Outflow,
            category: RecordCategory::SupplierPayment,
            document_number: Some("PAG-001".to_string()),
            counterparty_id: Some(5),
            counterparty_name: Some("ACME SA".to_string()),
            description: None,
        })
        .unwrap();
    (statement_id, ids[0], ids[1], record_id)
}

// ========== Statement API Tests ==========

#[tokio::test]
async fn test_create_and_list_statements() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({
        "company_id": 3,
        "account_id": 7,
        "period_label": "2026-02"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/statements", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = get_body_json(response).await;
    assert_eq!(json["period_label"], "2026-02");
    assert_eq!(json["status"], "EN_PROCESO");
    assert_eq!(json["total_items"], 0);

    let response = app
        .clone()
        .oneshot(get("/api/statements?company_id=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get("/api/statements?company_id=4"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_statement_invalid_tolerance() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({
        "company_id": 1,
        "account_id": 1,
        "period_label": "2026-01",
        "amount_tolerance_pct": -5.0
    });
    let response = app
        .oneshot(post_json("/api/statements", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_statement_not_found() {
    let (app, _db) = setup_test_app();

    let response = app.oneshot(get("/api/statements/999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = get_body_json(response).await;
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_add_items_updates_counters() {
    let (app, db) = setup_test_app();
    let (statement_id, _, _, _) = seed_statement(&db);

    let body = serde_json::json!({
        "lines": [
            { "date": "2026-01-20", "credit": 300.0, "description": "ABONO CLIENTE" },
            { "date": "2026-01-21", "debit": 40.0, "reference": "X-1", "description": "PAGO" }
        ]
    });
    let response = app
        .oneshot(post_json(
            &format!("/api/statements/{}/items", statement_id),
            body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = get_body_json(response).await;
    assert_eq!(json["item_ids"].as_array().unwrap().len(), 2);
    assert_eq!(json["statement"]["total_items"], 4);
    assert_eq!(json["statement"]["pending_count"], 4);

    let items = db.list_items(statement_id, ItemFilter::All).unwrap();
    let credit = items.iter().find(|i| i.description == "ABONO CLIENTE").unwrap();
    assert_eq!(credit.amount, 300.0);
}

#[tokio::test]
async fn test_add_items_empty_rejected() {
    let (app, db) = setup_test_app();
    let (statement_id, _, _, _) = seed_statement(&db);

    let response = app
        .oneshot(post_json(
            &format!("/api/statements/{}/items", statement_id),
            serde_json::json!({ "lines": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_items_state_filter() {
    let (app, db) = setup_test_app();
    let (statement_id, _, _, _) = seed_statement(&db);

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/statements/{}/items?state=pending",
            statement_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(get(&format!(
            "/api/statements/{}/items?state=bogus",
            statement_id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auto_match_summary_and_verify() {
    let (app, db) = setup_test_app();
    let (statement_id, payment_id, fee_id, record_id) = seed_statement(&db);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/statements/{}/auto-match", statement_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["matched"], 1);
    assert_eq!(json["suspense"], 1);
    let outcomes = json["items"].as_array().unwrap();
    let payment = outcomes
        .iter()
        .find(|o| o["item_id"] == payment_id)
        .unwrap();
    assert_eq!(payment["outcome"], "matched");
    assert_eq!(payment["record_id"], record_id);
    assert_eq!(payment["match_type"], "EXACT");
    let fee = outcomes.iter().find(|o| o["item_id"] == fee_id).unwrap();
    assert_eq!(fee["outcome"], "suspense");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/statements/{}/summary", statement_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["matched"], 1);
    assert_eq!(json["suspense"], 1);
    assert_eq!(json["by_match_type"]["exact"], 1);

    let response = app
        .oneshot(get(&format!("/api/statements/{}/verify", statement_id)))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["consistent"], true);
}

// ========== Item API Tests ==========

#[tokio::test]
async fn test_suggestions() {
    let (app, db) = setup_test_app();
    let (_, payment_id, _, record_id) = seed_statement(&db);

    let response = app
        .oneshot(get(&format!("/api/items/{}/suggestions", payment_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let candidates = json["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["candidate_id"], record_id);
    assert_eq!(candidates[0]["score"], 100.0);
    assert_eq!(json["auto_reconcileable"], true);
}

#[tokio::test]
async fn test_manual_match_records_user_and_conflicts() {
    let (app, db) = setup_test_app();
    let (_, payment_id, fee_id, record_id) = seed_statement(&db);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/items/{}/match", payment_id),
            serde_json::json!({ "record_id": record_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["item"]["conciliado"], true);
    assert_eq!(json["item"]["conciliado_by"], "maria");
    assert_eq!(json["item"]["match_type"], "MANUAL");
    assert_eq!(json["result"]["score"], 100.0);

    // Record already claimed by the payment line
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/items/{}/match", fee_id),
            serde_json::json!({ "record_id": record_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Unknown record
    let response = app
        .oneshot(post_json(
            &format!("/api/items/{}/match", fee_id),
            serde_json::json!({ "record_id": 9999 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatch() {
    let (app, db) = setup_test_app();
    let (statement_id, payment_id, _, record_id) = seed_statement(&db);
    db.manual_match(payment_id, record_id, "maria").unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/items/{}/unmatch", payment_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["conciliado"], false);
    assert!(json["record_id"].is_null());

    let statement = db.get_statement(statement_id).unwrap().unwrap();
    assert_eq!(statement.matched_count, 0);
    assert_eq!(statement.pending_count, 2);

    // Second unmatch is a conflict
    let response = app
        .oneshot(post_json(
            &format!("/api/items/{}/unmatch", payment_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_resolve_suspense() {
    let (app, db) = setup_test_app();
    let (statement_id, _, fee_id, _) = seed_statement(&db);

    // Not flagged suspense yet
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/items/{}/resolve-suspense", fee_id),
            serde_json::json!({ "notes": "monthly fee" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    db.auto_match_batch(statement_id).unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/api/items/{}/resolve-suspense", fee_id),
            serde_json::json!({ "notes": "monthly fee" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["suspense_resuelto"], true);
    assert_eq!(json["suspense_resuelto_by"], "maria");
    assert_eq!(json["suspense_notas"], "monthly fee");
    assert_eq!(json["conciliado"], false);

    let statement = db.get_statement(statement_id).unwrap().unwrap();
    assert_eq!(statement.suspense_count, 0);
}

#[tokio::test]
async fn test_materialize() {
    let (app, db) = setup_test_app();
    let (statement_id, _, fee_id, _) = seed_statement(&db);
    db.auto_match_batch(statement_id).unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/api/items/{}/materialize", fee_id),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["item"]["conciliado"], true);
    assert_eq!(json["record"]["category"], "fee");
    assert_eq!(json["record"]["amount"], 25.0);
    assert_eq!(json["record"]["source"], "suspense");
    assert_eq!(json["record"]["conciliado_by"], "maria");

    let statement = db.get_statement(statement_id).unwrap().unwrap();
    assert_eq!(statement.status.as_str(), "COMPLETADA");
    assert_eq!(statement.suspense_count, 0);
}

#[tokio::test]
async fn test_default_user_when_header_missing() {
    let (app, db) = setup_test_app();
    let (_, payment_id, _, record_id) = seed_statement(&db);

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/items/{}/match", payment_id))
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "record_id": record_id }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let item = db.get_item(payment_id).unwrap().unwrap();
    assert_eq!(item.conciliado_by.as_deref(), Some(DEFAULT_USER));
}

// ========== Record API Tests ==========

#[tokio::test]
async fn test_create_record() {
    let (app, _db) = setup_test_app();

    let body = serde_json::json!({
        "company_id": 1,
        "account_id": 10,
        "date": "2026-01-15",
        "amount": -480.0,
        "direction": "inflow",
        "category": "client_collection",
        "document_number": "FAC-123"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/records", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = get_body_json(response).await;
    assert_eq!(json["amount"], 480.0);
    assert_eq!(json["conciliado"], false);
    assert_eq!(json["source"], "accounting");

    let id = json["id"].as_i64().unwrap();
    let response = app
        .oneshot(get(&format!("/api/records/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unmatched_records_filters() {
    let (app, db) = setup_test_app();
    seed_statement(&db);
    db.add_internal_record(&NewInternalRecord {
        company_id: 1,
        account_id: 10,
        date: date(20),
        amount: 700.0,
        direction: RecordDirection::Inflow,
        category: RecordCategory::ClientCollection,
        document_number: Some("FAC-77".to_string()),
        counterparty_id: None,
        counterparty_name: None,
        description: None,
    })
    .unwrap();

    let response = app
        .clone()
        .oneshot(get("/api/accounts/10/unmatched-records"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);

    let response = app
        .clone()
        .oneshot(get("/api/accounts/10/unmatched-records?direction=outflow"))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["document_number"], "PAG-001");

    let response = app
        .clone()
        .oneshot(get(
            "/api/accounts/10/unmatched-records?from=2026-01-15&to=2026-01-31",
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);

    let response = app
        .oneshot(get(
            "/api/accounts/10/unmatched-records?from=2026-01-31&to=2026-01-01",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Error Mapping Tests ==========

#[test]
fn test_domain_errors_map_to_status() {
    use conciliar_core::Error as CoreError;

    let cases = [
        (CoreError::NotFound("x".into()), StatusCode::NOT_FOUND),
        (CoreError::AlreadyReconciled("x".into()), StatusCode::CONFLICT),
        (CoreError::NotReconciled("x".into()), StatusCode::CONFLICT),
        (CoreError::NotSuspense("x".into()), StatusCode::CONFLICT),
        (CoreError::PreconditionFailed("x".into()), StatusCode::CONFLICT),
        (CoreError::InvalidData("x".into()), StatusCode::BAD_REQUEST),
        (CoreError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        (
            CoreError::Io(std::io::Error::other("disk full")),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        let app_err = AppError::from(err);
        assert_eq!(app_err.into_response().status(), status);
    }
}

#[test]
fn test_get_user_id() {
    let mut headers = HeaderMap::new();
    assert_eq!(get_user_id(&headers), "system");

    headers.insert("x-user-id", "  ".parse().unwrap());
    assert_eq!(get_user_id(&headers), "system");

    headers.insert("x-user-id", "ana".parse().unwrap());
    assert_eq!(get_user_id(&headers), "ana");
}
