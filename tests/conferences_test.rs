mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::{Value, json};

fn conference_payload(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Three days of nephrology sessions.",
        "city": "Lyon",
        "country": "France",
        "startDate": "2099-05-01",
        "endDate": "2099-05-03",
        "abstractDeadline": "2099-03-01",
        "registrationDeadline": "2099-04-01",
        "tags": ["renal", "dialysis"]
    })
}

async fn create_conference(app: &TestApp, token: &str, payload: Value) -> i64 {
    let (status, body) = app
        .send(json_request("POST", "/api/conferences", Some(token), payload))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_only_admins_create_conferences() {
    let app = setup().await;
    let (_, member_token) = member(app.db(), "ada@example.org").await;

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/conferences",
            Some(&member_token),
            conference_payload("Annual Congress"),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/conferences",
            None,
            conference_payload("Annual Congress"),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_generates_unique_slugs() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/conferences",
            Some(&token),
            conference_payload("Annual Congress 2099"),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["slug"], "annual-congress-2099");
    assert_eq!(body["data"]["status"], "upcoming");
    assert_eq!(body["data"]["tags"], json!(["renal", "dialysis"]));
    assert_eq!(body["data"]["isFeatured"], false);

    let (_, body) = app
        .send(json_request(
            "POST",
            "/api/conferences",
            Some(&token),
            conference_payload("Annual Congress 2099"),
        ))
        .await;
    assert_eq!(body["data"]["slug"], "annual-congress-2099-2");
}

#[tokio::test]
async fn test_schedule_validation() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;

    let mut payload = conference_payload("Backwards");
    payload["endDate"] = json!("2099-04-30");
    payload["capacity"] = json!(0);

    let (status, body) = app
        .send(json_request("POST", "/api/conferences", Some(&token), payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["endDate"].is_array());
    assert!(body["errors"]["capacity"].is_array());

    let mut payload = conference_payload("Bad date");
    payload["startDate"] = json!("01/05/2099");
    let (status, body) = app
        .send(json_request("POST", "/api/conferences", Some(&token), payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["startDate"].is_array());
}

#[tokio::test]
async fn test_public_listing_and_filters() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    create_conference(&app, &token, conference_payload("Annual Congress")).await;

    let mut other = conference_payload("Winter School");
    other["country"] = json!("Belgium");
    other["tags"] = json!(["education"]);
    create_conference(&app, &token, other).await;

    let (status, body) = app.send(get("/api/conferences", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);

    let (_, body) = app
        .send(get("/api/conferences?country=Belgium", None))
        .await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["title"], "Winter School");

    let (_, body) = app.send(get("/api/conferences?tag=renal", None)).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"][0]["title"], "Annual Congress");

    let (_, body) = app.send(get("/api/conferences?search=winter", None)).await;
    assert_eq!(body["data"]["count"], 1);

    let (_, body) = app.send(get("/api/conferences?upcoming=true", None)).await;
    assert_eq!(body["data"]["count"], 2);
}

#[tokio::test]
async fn test_out_of_range_page_is_empty() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    create_conference(&app, &token, conference_payload("Annual Congress")).await;

    let (status, body) = app
        .send(get(
            "/api/conferences?page=18446744073709551615&pageSize=100",
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["results"], json!([]));
    assert_eq!(body["data"]["page"], i64::MAX / 100);

    let (status, _) = app
        .send(get("/api/conferences?page=99999999999999999999999", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_retrieve_counts_views() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    let id = create_conference(&app, &token, conference_payload("Annual Congress")).await;
    let uri = format!("/api/conferences/{}", id);

    let (status, body) = app.send(get(&uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["viewCount"], 1);
    assert_eq!(body["data"]["registrationCount"], 0);

    let (_, body) = app.send(get(&uri, None)).await;
    assert_eq!(body["data"]["viewCount"], 2);

    let (status, _) = app.send(get("/api/conferences/9999", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    let id = create_conference(&app, &token, conference_payload("Annual Congress")).await;
    let uri = format!("/api/conferences/{}", id);

    let (status, body) = app
        .send(json_request("PATCH", &uri, Some(&token), json!({"city": "Paris"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["city"], "Paris");
    assert_eq!(body["data"]["country"], "France");

    // The new start date is checked against the stored end date
    let (status, body) = app
        .send(json_request(
            "PATCH",
            &uri,
            Some(&token),
            json!({"startDate": "2099-06-01"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["endDate"].is_array());

    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&token))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(get(&uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_featured() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    let id = create_conference(&app, &token, conference_payload("Annual Congress")).await;
    let uri = format!("/api/conferences/{}/toggle-featured", id);

    let (_, body) = app.send(empty_request("POST", &uri, Some(&token))).await;
    assert_eq!(body["data"]["isFeatured"], true);

    let (_, body) = app.send(get("/api/conferences?featured=true", None)).await;
    assert_eq!(body["data"]["count"], 1);

    let (_, body) = app.send(empty_request("POST", &uri, Some(&token))).await;
    assert_eq!(body["data"]["isFeatured"], false);
}

#[tokio::test]
async fn test_banner_must_be_an_image() {
    let app = setup().await;
    let (_, token) = admin(app.db()).await;
    let id = create_conference(&app, &token, conference_payload("Annual Congress")).await;
    let uri = format!("/api/conferences/{}/banner", id);

    let (status, body) = app
        .send(multipart_request(&uri, &token, "banner.pdf", b"%PDF-1.4"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["file"].is_array());

    let (status, body) = app
        .send(multipart_request(&uri, &token, "banner.png", b"\x89PNG"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["data"]["bannerUrl"]
            .as_str()
            .unwrap()
            .ends_with(".png")
    );
}

#[tokio::test]
async fn test_registration_lifecycle() {
    let app = setup().await;
    let (_, admin_token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let id = create_conference(&app, &admin_token, conference_payload("Annual Congress")).await;
    let uri = format!("/api/conferences/{}/register", id);

    let (status, body) = app
        .send(json_request("POST", &uri, Some(&ada), json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["registrationType"], "member");
    assert_eq!(body["message"], "Registration confirmed.");
    assert_eq!(app.mailer.sent_to("ada@example.org").len(), 1);

    let (status, body) = app
        .send(json_request("POST", &uri, Some(&ada), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["nonFieldErrors"].is_array());

    let (status, body) = app.send(empty_request("DELETE", &uri, Some(&ada))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    // Nothing left to cancel
    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&ada))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(json_request(
            "POST",
            &uri,
            Some(&ada),
            json!({"registrationType": "student"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["registrationType"], "student");

    let (status, body) = app
        .send(get(
            &format!("/api/conferences/{}/registrations", id),
            Some(&admin_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let registrations = body["data"].as_array().unwrap();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0]["userEmail"], "ada@example.org");

    let (status, _) = app
        .send(get(
            &format!("/api/conferences/{}/registrations", id),
            Some(&ada),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_registration_rules() {
    let app = setup().await;
    let (_, admin_token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let (_, bob) = member(app.db(), "bob@example.org").await;

    let mut payload = conference_payload("Small Workshop");
    payload["capacity"] = json!(1);
    let id = create_conference(&app, &admin_token, payload).await;
    let uri = format!("/api/conferences/{}/register", id);

    let (status, _) = app
        .send(json_request(
            "POST",
            &uri,
            Some(&ada),
            json!({"registrationType": "vip"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(json_request("POST", &uri, Some(&ada), json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(json_request("POST", &uri, Some(&bob), json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["nonFieldErrors"].is_array());

    // Closed conferences refuse registrations
    let mut past = conference_payload("Old Meeting");
    past["status"] = json!("completed");
    let past_id = create_conference(&app, &admin_token, past).await;
    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/conferences/{}/register", past_id),
            Some(&bob),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_registrations_respect_capacity() {
    let app = setup().await;
    let (_, admin_token) = admin(app.db()).await;
    let mut payload = conference_payload("Small Workshop");
    payload["capacity"] = json!(1);
    let id = create_conference(&app, &admin_token, payload).await;
    let uri = format!("/api/conferences/{}/register", id);

    let mut tokens = Vec::new();
    for n in 0..5 {
        let (_, token) = member(app.db(), &format!("member{}@example.org", n)).await;
        tokens.push(token);
    }

    let attempts = tokens
        .iter()
        .map(|token| app.send(json_request("POST", &uri, Some(token), json!({}))));
    let statuses: Vec<StatusCode> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|(status, _)| status)
        .collect();

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(),
        4
    );

    let (_, body) = app
        .send(get(&format!("/api/conferences/{}", id), None))
        .await;
    assert_eq!(body["data"]["registrationCount"], 1);
}

#[tokio::test]
async fn test_conference_analytics() {
    let app = setup().await;
    let (_, admin_token) = admin(app.db()).await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let id = create_conference(&app, &admin_token, conference_payload("Annual Congress")).await;
    create_conference(&app, &admin_token, conference_payload("Winter School")).await;

    app.send(json_request(
        "POST",
        &format!("/api/conferences/{}/register", id),
        Some(&ada),
        json!({}),
    ))
    .await;
    app.send(get(&format!("/api/conferences/{}", id), None)).await;

    let (status, _) = app.send(get("/api/conferences/analytics", Some(&ada))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(get("/api/conferences/analytics", Some(&admin_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total"], 2);
    assert_eq!(data["byStatus"]["upcoming"], 2);
    assert_eq!(data["byStatus"]["cancelled"], 0);
    assert_eq!(data["totalViews"], 1);
    assert_eq!(data["confirmedRegistrations"], 1);
    assert_eq!(data["topConferences"][0]["title"], "Annual Congress");
}
