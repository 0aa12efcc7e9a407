mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::*;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message as WsMessage;

async fn start_conversation(app: &TestApp, token: &str, participants: Value) -> (StatusCode, Value) {
    app.send(json_request(
        "POST",
        "/api/messaging/conversations",
        Some(token),
        json!({"participantIds": participants}),
    ))
    .await
}

async fn send_message(app: &TestApp, token: &str, conversation_id: i64, content: &str) -> Value {
    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/api/messaging/conversations/{}/messages", conversation_id),
            Some(token),
            json!({"content": content}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"].clone()
}

#[tokio::test]
async fn test_direct_conversation_is_reused() {
    let app = setup().await;
    let (ada_id, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;

    let (status, body) = start_conversation(&app, &ada, json!([bob_id])).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["isGroup"], false);
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 2);
    let id = body["data"]["id"].clone();

    // Same pair from the other side
    let (status, body) = start_conversation(&app, &bob, json!([ada_id])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let (_, body) = app
        .send(get("/api/messaging/conversations", Some(&ada)))
        .await;
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn test_concurrent_direct_requests_share_one_conversation() {
    let app = setup().await;
    let (ada_id, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;

    let attempts = (0..6).map(|n| {
        let (token, other) = if n % 2 == 0 { (&ada, bob_id) } else { (&bob, ada_id) };
        start_conversation(&app, token, json!([other]))
    });
    let results = futures::future::join_all(attempts).await;

    let created = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    assert_eq!(created, 1);
    let id = results[0].1["data"]["id"].clone();
    assert!(results.iter().all(|(_, body)| body["data"]["id"] == id));

    let (_, body) = app
        .send(get("/api/messaging/conversations", Some(&ada)))
        .await;
    assert_eq!(body["data"]["count"], 1);
}

#[tokio::test]
async fn test_conversation_validation() {
    let app = setup().await;
    let (ada_id, ada) = member(app.db(), "ada@example.org").await;

    let (status, body) = start_conversation(&app, &ada, json!([ada_id])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["participantIds"].is_array());

    let (status, body) = start_conversation(&app, &ada, json!([9999])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["participantIds"].is_array());
}

#[tokio::test]
async fn test_outsiders_cannot_see_conversations() {
    let app = setup().await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, _) = member(app.db(), "bob@example.org").await;
    let (_, eve) = member(app.db(), "eve@example.org").await;

    let (_, body) = start_conversation(&app, &ada, json!([bob_id])).await;
    let id = body["data"]["id"].as_i64().unwrap();
    let message = send_message(&app, &ada, id, "Hello Bob").await;

    let (status, _) = app
        .send(get(&format!("/api/messaging/conversations/{}", id), Some(&eve)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(get(
            &format!("/api/messaging/conversations/{}/messages", id),
            Some(&eve),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(json_request(
            "POST",
            &format!("/api/messaging/messages/{}/reactions", message["id"]),
            Some(&eve),
            json!({"emoji": "👍"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_messages_and_read_receipts() {
    let app = setup().await;
    let (ada_id, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;

    let (_, body) = start_conversation(&app, &ada, json!([bob_id])).await;
    let id = body["data"]["id"].as_i64().unwrap();

    send_message(&app, &ada, id, "First").await;
    let second = send_message(&app, &ada, id, "  Second  ").await;
    assert_eq!(second["content"], "Second");
    assert_eq!(second["senderId"], ada_id);

    let (status, body) = app
        .send(json_request(
            "POST",
            &format!("/api/messaging/conversations/{}/messages", id),
            Some(&ada),
            json!({"content": "   "}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["content"].is_array());

    let (_, body) = app
        .send(get("/api/messaging/unread-count", Some(&bob)))
        .await;
    assert_eq!(body["data"]["unreadCount"], 2);
    let (_, body) = app
        .send(get("/api/messaging/unread-count", Some(&ada)))
        .await;
    assert_eq!(body["data"]["unreadCount"], 0);

    let (_, body) = app
        .send(get(
            &format!("/api/messaging/conversations/{}/messages", id),
            Some(&bob),
        ))
        .await;
    assert_eq!(body["data"]["count"], 2);
    // Chronological within the page
    assert_eq!(body["data"]["results"][0]["content"], "First");
    assert_eq!(body["data"]["results"][1]["content"], "Second");

    let (status, body) = app
        .send(empty_request(
            "POST",
            &format!("/api/messaging/conversations/{}/read", id),
            Some(&bob),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["messageIds"].as_array().unwrap().len(), 2);

    // Marking again has nothing new to record
    let (_, body) = app
        .send(empty_request(
            "POST",
            &format!("/api/messaging/conversations/{}/read", id),
            Some(&bob),
        ))
        .await;
    assert_eq!(body["data"]["messageIds"], json!([]));

    let (_, body) = app
        .send(get("/api/messaging/unread-count", Some(&bob)))
        .await;
    assert_eq!(body["data"]["unreadCount"], 0);

    let (_, body) = app
        .send(get(
            &format!("/api/messaging/conversations/{}/messages", id),
            Some(&ada),
        ))
        .await;
    assert_eq!(body["data"]["results"][1]["readBy"], json!([bob_id]));
}

#[tokio::test]
async fn test_edit_delete_and_react() {
    let app = setup().await;
    let (ada_id, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;

    let (_, body) = start_conversation(&app, &ada, json!([bob_id])).await;
    let id = body["data"]["id"].as_i64().unwrap();
    let message = send_message(&app, &ada, id, "Helo").await;
    let uri = format!("/api/messaging/messages/{}", message["id"]);

    let (status, _) = app
        .send(json_request("PATCH", &uri, Some(&bob), json!({"content": "Hijacked"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(json_request("PATCH", &uri, Some(&ada), json!({"content": "Hello"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "Hello");
    assert_eq!(body["data"]["isEdited"], true);

    let reactions = format!("{}/reactions", uri);
    let (status, body) = app
        .send(json_request("POST", &reactions, Some(&bob), json!({"emoji": "🎉"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["added"], true);
    assert_eq!(body["data"]["message"]["reactions"][0]["emoji"], "🎉");
    assert_eq!(body["data"]["message"]["reactions"][0]["count"], 1);
    assert_eq!(body["data"]["message"]["reactions"][0]["userIds"], json!([bob_id]));

    let (_, body) = app
        .send(json_request("POST", &reactions, Some(&bob), json!({"emoji": "🎉"})))
        .await;
    assert_eq!(body["data"]["added"], false);
    assert_eq!(body["data"]["message"]["reactions"], json!([]));

    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&bob))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.send(empty_request("DELETE", &uri, Some(&ada))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app
        .send(get(
            &format!("/api/messaging/conversations/{}/messages", id),
            Some(&ada),
        ))
        .await;
    let stored = &body["data"]["results"][0];
    assert_eq!(stored["isDeleted"], true);
    assert_eq!(stored["content"], "");
    assert_eq!(stored["senderId"], ada_id);

    let (status, _) = app
        .send(json_request("PATCH", &uri, Some(&ada), json!({"content": "Back"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_group_participants() {
    let app = setup().await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;
    let (carol_id, _) = member(app.db(), "carol@example.org").await;
    let (dan_id, _) = member(app.db(), "dan@example.org").await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/messaging/conversations",
            Some(&ada),
            json!({"participantIds": [bob_id, carol_id], "title": "Board"}),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["isGroup"], true);
    let id = body["data"]["id"].as_i64().unwrap();
    let participants = format!("/api/messaging/conversations/{}/participants", id);

    let (status, body) = app
        .send(json_request("POST", &participants, Some(&bob), json!({"userId": dan_id})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["participants"].as_array().unwrap().len(), 4);

    let (status, body) = app
        .send(json_request("POST", &participants, Some(&bob), json!({"userId": dan_id})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["nonFieldErrors"].is_array());

    // Only the creator removes other people
    let (status, _) = app
        .send(empty_request(
            "DELETE",
            &format!("{}/{}", participants, carol_id),
            Some(&bob),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(empty_request(
            "DELETE",
            &format!("{}/{}", participants, carol_id),
            Some(&ada),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Anyone may leave
    let (status, _) = app
        .send(empty_request(
            "DELETE",
            &format!("{}/{}", participants, bob_id),
            Some(&bob),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(get(&format!("/api/messaging/conversations/{}", id), Some(&bob)))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn next_json<S>(socket: &mut S) -> Value
where
    S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_live_conversation_socket() {
    let app = setup().await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;
    let (_, eve) = member(app.db(), "eve@example.org").await;

    let (_, body) = start_conversation(&app, &ada, json!([bob_id])).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let url = |token: &str| format!("ws://{}/api/ws/conversations/{}?token={}", addr, id, token);

    assert!(tokio_tungstenite::connect_async(url(&eve)).await.is_err());
    assert!(tokio_tungstenite::connect_async(url("garbage")).await.is_err());

    let (mut socket, _) = tokio_tungstenite::connect_async(url(&bob)).await.unwrap();

    // The pong proves the session joined the group
    socket
        .send(WsMessage::Text(json!({"type": "ping"}).to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "pong");
    assert_eq!(app.state.hub.subscriber_count(id as i32), 1);

    socket
        .send(WsMessage::Text("not json".to_string()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "error");

    send_message(&app, &ada, id, "Live hello").await;
    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "message.created");
    assert_eq!(event["message"]["content"], "Live hello");

    socket
        .send(WsMessage::Text(json!({"type": "markRead"}).to_string()))
        .await
        .unwrap();
    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "messages.read");
    assert_eq!(event["userId"], bob_id);

    let (_, body) = app
        .send(get("/api/messaging/unread-count", Some(&bob)))
        .await;
    assert_eq!(body["data"]["unreadCount"], 0);

    socket.close(None).await.unwrap();
}

#[tokio::test]
async fn test_removed_participant_socket_is_closed() {
    let app = setup().await;
    let (_, ada) = member(app.db(), "ada@example.org").await;
    let (bob_id, bob) = member(app.db(), "bob@example.org").await;
    let (carol_id, carol) = member(app.db(), "carol@example.org").await;

    let (_, body) = start_conversation(&app, &ada, json!([bob_id, carol_id])).await;
    let id = body["data"]["id"].as_i64().unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    let url = |token: &str| format!("ws://{}/api/ws/conversations/{}?token={}", addr, id, token);

    let (mut bob_socket, _) = tokio_tungstenite::connect_async(url(&bob)).await.unwrap();
    let (mut carol_socket, _) = tokio_tungstenite::connect_async(url(&carol)).await.unwrap();
    for socket in [&mut bob_socket, &mut carol_socket] {
        socket
            .send(WsMessage::Text(json!({"type": "ping"}).to_string()))
            .await
            .unwrap();
        assert_eq!(next_json(socket).await["type"], "pong");
    }

    let (status, _) = app
        .send(empty_request(
            "DELETE",
            &format!("/api/messaging/conversations/{}/participants/{}", id, bob_id),
            Some(&ada),
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    send_message(&app, &ada, id, "secret board minutes").await;

    // Remaining members see the removal, then the message
    let event = next_json(&mut carol_socket).await;
    assert_eq!(event["type"], "participant.removed");
    assert_eq!(event["userId"], bob_id);
    let event = next_json(&mut carol_socket).await;
    assert_eq!(event["message"]["content"], "secret board minutes");

    // Bob's socket ends without delivering anything further
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), bob_socket.next())
            .await
            .expect("socket was not closed");
        match frame {
            Some(Ok(WsMessage::Text(text))) => {
                panic!("removed participant received {}", text)
            }
            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
            Some(Ok(_)) => {}
        }
    }

    let (status, _) = app
        .send(get(
            &format!("/api/messaging/conversations/{}/messages", id),
            Some(&bob),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
