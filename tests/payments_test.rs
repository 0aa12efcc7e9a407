mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use common::*;
use serde_json::{Value, json};
use societyhub::modules::integrations::payment_gateway::{SIGNATURE_HEADER, sign_payload};
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn plan_payload(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Twelve months of membership",
        "priceCents": 12000,
        "currency": "eur",
        "durationDays": 365
    })
}

async fn create_plan(app: &TestApp, token: &str, payload: Value) -> i64 {
    let (status, body) = app
        .send(json_request("POST", "/api/payments/plans", Some(token), payload))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn mock_gateway() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header_matcher("authorization", "Bearer sk_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "url": "https://pay.example.org/cs_test_1"
        })))
        .mount(&server)
        .await;
    server
}

fn webhook_request(body: &Value, secret: &str) -> Request<Body> {
    let payload = serde_json::to_vec(body).unwrap();
    let signature = sign_payload(secret, Utc::now().timestamp(), &payload).unwrap();
    Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(payload))
        .unwrap()
}

fn event(id: &str, event_type: &str, object: Value) -> Value {
    json!({"id": id, "type": event_type, "data": {"object": object}})
}

fn date_in(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}

#[tokio::test]
async fn test_plan_management() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/payments/plans",
            Some(&ada),
            plan_payload("Standard"),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let id = create_plan(&app, &token, plan_payload("Standard")).await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/payments/plans",
            Some(&token),
            json!({"name": "Standard", "priceCents": -1, "currency": "EURO", "durationDays": 0}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = &body["errors"];
    assert!(errors["name"].is_array());
    assert!(errors["priceCents"].is_array());
    assert!(errors["currency"].is_array());
    assert!(errors["durationDays"].is_array());

    let mut endless = plan_payload("Endless");
    endless["durationDays"] = json!(i32::MAX);
    let (status, body) = app
        .send(json_request("POST", "/api/payments/plans", Some(&token), endless))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["durationDays"].is_array());

    let uri = format!("/api/payments/plans/{}", id);
    let (_, body) = app.send(get(&uri, None)).await;
    assert_eq!(body["data"]["currency"], "EUR");
    assert_eq!(body["data"]["priceCents"], 12000);

    let (status, body) = app
        .send(json_request("PATCH", &uri, Some(&token), json!({"isActive": false})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);
    assert_eq!(body["data"]["name"], "Standard");

    // Inactive plans are only listed for admins
    let (_, body) = app.send(get("/api/payments/plans", None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let (_, body) = app.send(get("/api/payments/plans", Some(&token))).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_checkout_opens_a_gateway_session() {
    let server = mock_gateway().await;
    let app = setup_with_gateway(&server.uri()).await;
    let (_, token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let plan_id = create_plan(&app, &token, plan_payload("Standard")).await;

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/payments/checkout",
            None,
            json!({"planId": plan_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/payments/checkout",
            Some(&ada),
            json!({"planId": plan_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["sessionId"], "cs_test_1");
    assert_eq!(body["data"]["checkoutUrl"], "https://pay.example.org/cs_test_1");
    let payment_id = body["data"]["paymentId"].as_i64().unwrap();

    let (_, body) = app
        .send(get(&format!("/api/payments/{}", payment_id), Some(&ada)))
        .await;
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["amountCents"], 12000);
    assert_eq!(body["data"]["planName"], "Standard");

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/payments/checkout",
            Some(&ada),
            json!({"planId": 9999}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["planId"].is_array());

    // A plan with payments cannot be deleted
    let (status, _) = app
        .send(empty_request(
            "DELETE",
            &format!("/api/payments/plans/{}", plan_id),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gateway_failure_marks_payment_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = setup_with_gateway(&server.uri()).await;
    let (_, token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let plan_id = create_plan(&app, &token, plan_payload("Standard")).await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/payments/checkout",
            Some(&ada),
            json!({"planId": plan_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);

    let (_, body) = app.send(get("/api/payments", Some(&ada))).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["status"], "failed");
}

#[tokio::test]
async fn test_webhook_completes_payment_once() {
    let server = mock_gateway().await;
    let app = setup_with_gateway(&server.uri()).await;
    let (_, token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let plan_id = create_plan(&app, &token, plan_payload("Standard")).await;

    app.send(json_request(
        "POST",
        "/api/payments/checkout",
        Some(&ada),
        json!({"planId": plan_id}),
    ))
    .await;

    let (_, body) = app.send(get("/api/payments/membership", Some(&ada))).await;
    assert_eq!(body["data"]["isActive"], false);

    let completed = event(
        "evt_1",
        "checkout.session.completed",
        json!({"id": "cs_test_1", "paymentId": "pi_1"}),
    );
    let (status, body) = app.send(webhook_request(&completed, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"received": true, "duplicate": false}));
    assert_eq!(app.mailer.sent_to("ada@example.org").len(), 1);

    let (_, body) = app.send(get("/api/payments/membership", Some(&ada))).await;
    assert_eq!(body["data"]["isActive"], true);
    assert_eq!(body["data"]["validUntil"], date_in(365));
    assert_eq!(body["data"]["plan"]["name"], "Standard");

    // Replays are acknowledged without being applied again
    let (status, body) = app.send(webhook_request(&completed, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["duplicate"], true);

    // A different event for an already completed payment changes nothing
    let again = event(
        "evt_2",
        "checkout.session.completed",
        json!({"id": "cs_test_1", "paymentId": "pi_1"}),
    );
    let (_, body) = app.send(webhook_request(&again, WEBHOOK_SECRET)).await;
    assert_eq!(body["duplicate"], false);

    let (_, body) = app.send(get("/api/payments/membership", Some(&ada))).await;
    assert_eq!(body["data"]["validUntil"], date_in(365));
    assert_eq!(app.mailer.sent_to("ada@example.org").len(), 1);

    let (_, body) = app.send(get("/api/payments", Some(&ada))).await;
    assert_eq!(body["data"]["results"][0]["status"], "completed");
    assert!(body["data"]["results"][0]["completedAt"].is_string());
}

#[tokio::test]
async fn test_webhook_rejects_bad_signatures() {
    let app = setup().await;
    let body = event("evt_1", "checkout.session.completed", json!({"id": "cs_x"}));

    let (status, _) = app.send(webhook_request(&body, "whsec_wrong")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unsigned = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let (status, _) = app.send(unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Validly signed events for unknown sessions are still acknowledged
    let (status, body) = app.send(webhook_request(&body, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["received"], true);
}

#[tokio::test]
async fn test_intent_events_match_by_their_own_id() {
    let server = mock_gateway().await;
    let app = setup_with_gateway(&server.uri()).await;
    let (_, token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let plan_id = create_plan(&app, &token, plan_payload("Standard")).await;

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/payments/checkout",
            Some(&ada),
            json!({"planId": plan_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let completed = event(
        "evt_1",
        "checkout.session.completed",
        json!({"id": "cs_test_1", "paymentId": "pi_7"}),
    );
    app.send(webhook_request(&completed, WEBHOOK_SECRET)).await;

    // No paymentId field: the intent's own id is the provider payment id
    let refunded = event("evt_2", "charge.refunded", json!({"id": "pi_7"}));
    let (status, _) = app.send(webhook_request(&refunded, WEBHOOK_SECRET)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(get("/api/payments", Some(&ada))).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["status"], "refunded");
}

#[tokio::test]
async fn test_refund_and_analytics() {
    let server = mock_gateway().await;
    let app = setup_with_gateway(&server.uri()).await;
    let (_, token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let plan_id = create_plan(&app, &token, plan_payload("Standard")).await;

    let (_, body) = app
        .send(json_request(
            "POST",
            "/api/payments/checkout",
            Some(&ada),
            json!({"planId": plan_id}),
        ))
        .await;
    let reference = body["data"]["reference"].as_str().unwrap().to_string();

    // Matched through the reference metadata
    let completed = event(
        "evt_1",
        "checkout.session.completed",
        json!({"id": "cs_other", "paymentId": "pi_9", "metadata": {"reference": reference}}),
    );
    app.send(webhook_request(&completed, WEBHOOK_SECRET)).await;

    let (status, body) = app
        .send(get("/api/payments/analytics", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revenueCents"], 12000);
    assert_eq!(body["data"]["byStatus"]["completed"], 1);
    assert_eq!(body["data"]["activeMemberships"], 1);
    assert_eq!(body["data"]["revenueByPlan"][0]["planName"], "Standard");

    let refunded = event("evt_2", "charge.refunded", json!({"id": "ch_1", "paymentId": "pi_9"}));
    app.send(webhook_request(&refunded, WEBHOOK_SECRET)).await;

    let (_, body) = app
        .send(get("/api/payments/analytics", Some(&token)))
        .await;
    assert_eq!(body["data"]["revenueCents"], 0);
    assert_eq!(body["data"]["byStatus"]["refunded"], 1);
    assert_eq!(body["data"]["byStatus"]["pending"], 0);

    let (status, _) = app.send(get("/api/payments/analytics", Some(&ada))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Members only see their own payments
    let (_, bob) = member(app.db(), "bob@example.org").await;
    let (_, body) = app.send(get("/api/payments", Some(&bob))).await;
    assert_eq!(body["data"]["count"], 0);
}
