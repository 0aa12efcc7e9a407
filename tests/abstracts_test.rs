mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{Value, json};

fn abstract_payload(title: &str) -> Value {
    json!({
        "title": title,
        "content": "Background and methods of a small cohort study on renal outcomes.",
        "authors": [{"name": "Ada Lovelace", "affiliation": "Analytical Society"}],
        "keywords": ["renal", "cohort"],
        "category": "research",
        "presentationType": "poster"
    })
}

async fn create_abstract(app: &TestApp, token: &str, title: &str) -> i64 {
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/abstracts",
            Some(token),
            abstract_payload(title),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_abstracts_require_authentication() {
    let app = setup().await;
    let (status, body) = app.send(get("/api/abstracts", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_create_and_retrieve_abstract() {
    let app = setup().await;
    let (_, token) = member(app.db(), "ada@example.org").await;

    let id = create_abstract(&app, &token, "Renal outcomes").await;

    let (status, body) = app
        .send(get(&format!("/api/abstracts/{}", id), Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["title"], "Renal outcomes");
    assert_eq!(data["status"], "draft");
    assert_eq!(data["category"], "research");
    assert_eq!(data["presentationType"], "poster");
    assert_eq!(data["authors"][0]["name"], "Ada Lovelace");
    assert_eq!(data["keywords"], json!(["renal", "cohort"]));
    assert_eq!(data["reviewCount"], 0);
}

#[tokio::test]
async fn test_invalid_abstract_reports_every_field() {
    let app = setup().await;
    let (_, token) = member(app.db(), "ada@example.org").await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/abstracts",
            Some(&token),
            json!({
                "title": "",
                "authors": [],
                "category": "astrology",
                "presentationType": "poster"
            }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    let errors = &body["errors"];
    assert!(errors["title"].is_array());
    assert!(errors["content"].is_array());
    assert!(errors["authors"].is_array());
    assert!(errors["category"].is_array());
    assert!(errors.get("presentationType").is_none());
}

#[tokio::test]
async fn test_members_only_see_their_own_abstracts() {
    let app = setup().await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let (_, bob) = member(app.db(), "bob@example.org").await;
    let (_, admin_token) = admin(app.db()).await;

    let ada_id = create_abstract(&app, &ada, "Ada's abstract").await;
    create_abstract(&app, &bob, "Bob's abstract").await;

    let (_, body) = app.send(get("/api/abstracts", Some(&ada))).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["title"], "Ada's abstract");

    let (_, body) = app.send(get("/api/abstracts", Some(&admin_token))).await;
    assert_eq!(body["data"]["count"], 2);

    // Someone else's abstract does not exist as far as Bob is concerned
    let (status, _) = app
        .send(get(&format!("/api/abstracts/{}", ada_id), Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_filter_narrows_results() {
    let app = setup().await;
    let (_, token) = member(app.db(), "ada@example.org").await;
    create_abstract(&app, &token, "Renal outcomes").await;
    create_abstract(&app, &token, "Cardiac imaging").await;

    let (status, body) = app
        .send(get("/api/abstracts?search=Cardiac", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["title"], "Cardiac imaging");

    let (_, body) = app
        .send(get("/api/abstracts?status=submitted", Some(&token)))
        .await;
    assert_eq!(body["data"]["count"], 0);
}

#[tokio::test]
async fn test_submit_review_and_decide() {
    let app = setup().await;
    let (_, author) = member(app.db(), "ada@example.org").await;
    let (_, reviewer) = create_user(app.db(), "rev@example.org", "reviewer").await;
    let (_, admin_token) = admin(app.db()).await;

    let id = create_abstract(&app, &author, "Renal outcomes").await;

    // Drafts cannot be reviewed
    let review = json!({"score": 8, "recommendation": "accept", "comments": "Solid"});
    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/abstracts/{}/reviews", id),
            Some(&reviewer),
            review.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(empty_request(
            "POST",
            &format!("/api/abstracts/{}/submit", id),
            Some(&author),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "submitted");
    assert!(body["data"]["submittedAt"].is_string());
    assert_eq!(app.mailer.sent_to("ada@example.org").len(), 1);

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/abstracts/{}/reviews", id),
            Some(&reviewer),
            review.clone(),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // One review per reviewer
    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/api/abstracts/{}/reviews", id),
            Some(&reviewer),
            review,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["nonFieldErrors"].is_array());

    let (_, body) = app
        .send(get(&format!("/api/abstracts/{}", id), Some(&admin_token)))
        .await;
    assert_eq!(body["data"]["status"], "under_review");
    assert_eq!(body["data"]["reviewCount"], 1);
    assert_eq!(body["data"]["averageScore"], 8.0);

    // Members cannot decide, admins can
    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/abstracts/{}/status", id),
            Some(&author),
            json!({"status": "accepted"}),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/api/abstracts/{}/status", id),
            Some(&admin_token),
            json!({"status": "accepted"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "accepted");
    assert_eq!(app.mailer.sent_to("ada@example.org").len(), 2);

    // Accepted is final
    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/abstracts/{}/status", id),
            Some(&admin_token),
            json!({"status": "under_review"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submitted_abstract_is_locked_for_its_author() {
    let app = setup().await;
    let (_, token) = member(app.db(), "ada@example.org").await;
    let id = create_abstract(&app, &token, "Renal outcomes").await;

    let (status, body) = app
        .send(json_request(
            "PATCH",
            &format!("/api/abstracts/{}", id),
            Some(&token),
            json!({"title": "Renal outcomes, revised"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renal outcomes, revised");
    assert_eq!(body["data"]["category"], "research");

    app.send(empty_request(
        "POST",
        &format!("/api/abstracts/{}/submit", id),
        Some(&token),
    ))
    .await;

    let (status, _) = app
        .send(json_request(
            "PATCH",
            &format!("/api/abstracts/{}", id),
            Some(&token),
            json!({"title": "Too late"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(empty_request(
            "DELETE",
            &format!("/api/abstracts/{}", id),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_abstract_upload_checks_extension() {
    let app = setup().await;
    let (_, token) = member(app.db(), "ada@example.org").await;
    let id = create_abstract(&app, &token, "Renal outcomes").await;
    let uri = format!("/api/abstracts/{}/upload", id);

    let (status, body) = app
        .send(multipart_request(&uri, &token, "slides.exe", b"MZ"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["file"].is_array());

    let (status, body) = app
        .send(multipart_request(&uri, &token, "abstract.PDF", b"%PDF-1.4"))
        .await;
    assert_eq!(status, StatusCode::OK);
    let url = body["data"]["fileUrl"].as_str().unwrap();
    assert!(url.starts_with("http://testserver/media/"));
    assert!(url.ends_with(".pdf"));
}

#[tokio::test]
async fn test_abstract_analytics_is_admin_only() {
    let app = setup().await;
    let (_, token) = member(app.db(), "ada@example.org").await;
    let (_, admin_token) = admin(app.db()).await;
    create_abstract(&app, &token, "Renal outcomes").await;

    let (status, _) = app.send(get("/api/abstracts/analytics", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(get("/api/abstracts/analytics", Some(&admin_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["byStatus"]["draft"], 1);
    assert_eq!(body["data"]["byStatus"]["accepted"], 0);
    assert_eq!(body["data"]["byCategory"]["research"], 1);
}
