/*
    HTTP API Integration Tests

    Drives the full router through tower's oneshot with an in-memory
    store behind it:
    - principal header handling (missing, junk base64, anonymous)
    - server creation payloads and validation errors
    - membership gating: outsiders get the same 403 whether or not the
      server exists
    - the invite join flow and invite code visibility by role
    - the message protocol over the wire: replay, conflict, skew and
      cursor pagination
    - moderation: role changes, kicks, edits and deletes
    - account export and deletion
*/

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Duration, SecondsFormat, Utc};
use roundtable_api::{build_router, AppState};
use roundtable_core::{ChatStore, Config};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const ALICE: &str = "alice@example.com";
const BOB: &str = "bob@example.com";
const CAROL: &str = "carol@example.com";

fn app() -> Router {
    let store = Arc::new(ChatStore::memory().unwrap());
    let state = Arc::new(AppState::new(store, &Config::default()));
    build_router(state)
}

/// Encoded principal header for an authenticated user
fn principal(email: &str) -> String {
    principal_with_roles(email, &["anonymous", "authenticated"])
}

fn principal_with_roles(email: &str, roles: &[&str]) -> String {
    let payload = json!({
        "identityProvider": "github",
        "userId": format!("ext-{}", email),
        "userDetails": email,
        "userRoles": roles,
    });
    STANDARD.encode(payload.to_string())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    principal: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(encoded) = principal {
        builder = builder.header("x-client-principal", encoded);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn now_iso(offset_ms: i64) -> String {
    (Utc::now() + Duration::milliseconds(offset_ms))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Message submission body stamped relative to the current server
/// clock. Strictly increasing offsets keep the timeline order
/// deterministic even when posts land in the same millisecond.
fn submission(content: &str, offset_ms: i64, sequence: i64) -> Value {
    json!({
        "clientId": Uuid::new_v4().to_string(),
        "content": content,
        "sentAt": now_iso(offset_ms),
        "sequence": sequence,
    })
}

async fn create_server(app: &Router, owner: &str, name: &str, restricted: bool) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/servers",
        Some(&principal(owner)),
        Some(json!({ "name": name, "isRestricted": restricted })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

async fn join(app: &Router, email: &str, code: &str) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/invites/{}/join", code),
        Some(&principal(email)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn post_message(
    app: &Router,
    email: &str,
    server_id: &str,
    body: Value,
) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/servers/{}/messages", server_id),
        Some(&principal(email)),
        Some(body),
    )
    .await
}

fn member_id_by_email(detail: &Value, email: &str) -> String {
    detail["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["email"] == email)
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string()
}

fn contents(list: &Value) -> Vec<String> {
    list["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_requests_without_a_valid_principal_are_unauthorized() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/servers", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: No valid session");

    // Junk that is not base64 at all
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/servers",
        Some("@@not-base64@@"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: No valid session");

    // A decodable principal without the authenticated role
    let anon = principal_with_roles(CAROL, &["anonymous"]);
    let (status, body) = send(&app, Method::GET, "/api/servers", Some(&anon), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: No valid session");
}

#[tokio::test]
async fn test_create_server_payload_and_validation() {
    let app = app();

    let body = create_server(&app, ALICE, "  The Roundtable  ", false).await;
    assert_eq!(body["name"], "The Roundtable");
    assert_eq!(body["isRestricted"], false);
    assert_eq!(body["inviteCode"].as_str().unwrap().len(), 10);
    assert_eq!(body["owner"]["email"], ALICE);
    let members = body["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "OWNER");
    assert_eq!(members[0]["name"], "alice");

    // The name is required even when the field is absent entirely
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/servers",
        Some(&principal(ALICE)),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Server name is required");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/servers",
        Some(&principal(ALICE)),
        Some(json!({ "name": "x".repeat(101) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Server name must be 100 characters or less");

    // A body that is not JSON at all
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/servers")
        .header("x-client-principal", principal(ALICE))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Invalid JSON body");
}

#[tokio::test]
async fn test_membership_gating_and_invite_join() {
    let app = app();
    let created = create_server(&app, ALICE, "Club", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    let code = created["inviteCode"].as_str().unwrap().to_string();
    let detail_uri = format!("/api/servers/{}", server_id);

    // An outsider is told nothing, and an unknown id looks identical
    let (status, body) = send(&app, Method::GET, &detail_uri, Some(&principal(BOB)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: You are not a member of this server");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/servers/no-such-server",
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: You are not a member of this server");

    // Joining by invite code seats the caller as a guest
    let joined = join(&app, BOB, &code).await;
    assert_eq!(joined["serverId"], server_id);
    assert_eq!(joined["serverName"], "Club");
    assert_eq!(joined["role"], "GUEST");
    assert_eq!(joined["alreadyMember"], false);

    // Members see the detail view; the invite code is withheld from
    // guests and present for the owner
    let (status, body) = send(&app, Method::GET, &detail_uri, Some(&principal(BOB)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("inviteCode").is_none());
    assert_eq!(body["members"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, &detail_uri, Some(&principal(ALICE)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inviteCode"], code);

    // Joining twice reports the existing membership
    let joined = join(&app, BOB, &code).await;
    assert_eq!(joined["alreadyMember"], true);
    assert_eq!(joined["role"], "GUEST");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/invites/WRONGCODE00/join",
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid invite code");
}

#[tokio::test]
async fn test_message_protocol_replay_conflict_and_validation() {
    let app = app();
    let created = create_server(&app, ALICE, "Protocol", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    join(&app, BOB, created["inviteCode"].as_str().unwrap()).await;

    let new = submission("hello", 0, 1);
    let (status, first) = post_message(&app, BOB, &server_id, new.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["content"], "hello");
    assert_eq!(first["clientId"], new["clientId"]);
    assert_eq!(first["serverId"], server_id);
    assert_eq!(first["sequence"], 1);
    assert_eq!(first["member"]["role"], "GUEST");
    assert_eq!(first["member"]["user"]["email"], BOB);

    // Redelivery of the same submission returns the stored message
    let (status, replay) = post_message(&app, BOB, &server_id, new.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(replay["id"], first["id"]);

    // The same client id with different content is a conflict
    let mut tampered = new.clone();
    tampered["content"] = json!("tampered");
    let (status, body) = post_message(&app, BOB, &server_id, tampered).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "client_id already used with a different payload");

    // Field validation happens behind the membership gates
    let (status, body) = post_message(
        &app,
        BOB,
        &server_id,
        json!({ "clientId": "nope", "content": "hi", "sentAt": now_iso(0), "sequence": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid client ID format");

    // A timestamp outside the skew window is rejected with the bound
    let late = submission("late", 10 * 60 * 1000, 2);
    let (status, body) = post_message(&app, BOB, &server_id, late).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Message timestamp too far from server time"));
    assert!(error.contains("exceeds 300000ms"));

    // An outsider gets the membership 403 no matter what they send
    let (status, body) = post_message(&app, CAROL, &server_id, json!({ "whatever": true })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not a member of this server");
}

#[tokio::test]
async fn test_message_pagination_walks_backward() {
    let app = app();
    let created = create_server(&app, ALICE, "History", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    let messages_uri = format!("/api/servers/{}/messages", server_id);

    let mut ids = Vec::new();
    for (i, text) in ["m1", "m2", "m3", "m4", "m5"].iter().enumerate() {
        let (status, posted) = post_message(
            &app,
            ALICE,
            &server_id,
            submission(text, (i as i64) * 10, (i as i64) + 1),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(posted["id"].as_str().unwrap().to_string());
    }

    // The default page is the full history, chronological
    let (status, body) = send(
        &app,
        Method::GET,
        &messages_uri,
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(contents(&body), ["m1", "m2", "m3", "m4", "m5"]);

    // limit takes the latest window
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("{}?limit=2", messages_uri),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(contents(&body), ["m4", "m5"]);

    // Walking backward from the oldest message of each page
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("{}?limit=2&before={}", messages_uri, ids[3]),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(contents(&body), ["m2", "m3"]);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("{}?limit=2&before={}", messages_uri, ids[1]),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(contents(&body), ["m1"]);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("{}?limit=0", messages_uri),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Limit must be at least 1");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("{}?before=not-a-message", messages_uri),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Cursor message not found");
}

#[tokio::test]
async fn test_restricted_server_roles_and_promotion() {
    let app = app();
    let created = create_server(&app, ALICE, "Staff Room", true).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    join(&app, BOB, created["inviteCode"].as_str().unwrap()).await;

    // Guests cannot post in a restricted server
    let (status, body) = post_message(&app, BOB, &server_id, submission("hi", 0, 1)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You do not have permission to post in this server");

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}", server_id),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    let bob_member = member_id_by_email(&detail, BOB);
    let member_uri = format!("/api/servers/{}/members/{}", server_id, bob_member);

    // Only the owner changes roles
    let (status, body) = send(
        &app,
        Method::PATCH,
        &member_uri,
        Some(&principal(BOB)),
        Some(json!({ "role": "MODERATOR" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: Only the server owner can change roles");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &member_uri,
        Some(&principal(ALICE)),
        Some(json!({ "role": "MODERATOR" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["member"]["role"], "MODERATOR");
    assert_eq!(body["member"]["user"]["email"], BOB);

    // Moderators post freely
    let (status, _) = post_message(&app, BOB, &server_id, submission("now i can", 10, 2)).await;
    assert_eq!(status, StatusCode::CREATED);

    // The member list is role-ordered and visible to any member
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}/members", server_id),
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let members = body["members"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0]["role"], "OWNER");
    assert_eq!(members[1]["role"], "MODERATOR");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}/members", server_id),
        Some(&principal(CAROL)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You are not a member of this server");

    // OWNER is not an assignable role
    let (status, body) = send(
        &app,
        Method::PATCH,
        &member_uri,
        Some(&principal(ALICE)),
        Some(json!({ "role": "OWNER" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Role must be MODERATOR or GUEST");

    // The owner membership itself can never be the target
    let alice_member = member_id_by_email(&detail, ALICE);
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/servers/{}/members/{}", server_id, alice_member),
        Some(&principal(ALICE)),
        Some(json!({ "role": "GUEST" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Cannot change the role of the server owner");

    // A target that does not exist is reported to the owner
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/servers/{}/members/no-such-member", server_id),
        Some(&principal(ALICE)),
        Some(json!({ "role": "GUEST" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Member not found");
}

#[tokio::test]
async fn test_moderation_message_delete_and_kick() {
    let app = app();
    let created = create_server(&app, ALICE, "Moderated", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    join(&app, BOB, created["inviteCode"].as_str().unwrap()).await;

    let (_, bob_msg) = post_message(&app, BOB, &server_id, submission("mine", 0, 1)).await;
    let (_, alice_msg) = post_message(&app, ALICE, &server_id, submission("owners", 10, 1)).await;
    let bob_msg_id = bob_msg["id"].as_str().unwrap();
    let alice_msg_id = alice_msg["id"].as_str().unwrap();

    // A guest cannot delete someone else's message
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/servers/{}/messages/{}", server_id, alice_msg_id),
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: You do not have permission to delete this message");

    // Everyone may delete their own
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/servers/{}/messages/{}", server_id, bob_msg_id),
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Message deleted successfully");

    // The owner moderates guest messages away
    let (_, bob_again) = post_message(&app, BOB, &server_id, submission("again", 20, 2)).await;
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!(
            "/api/servers/{}/messages/{}",
            server_id,
            bob_again["id"].as_str().unwrap()
        ),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}", server_id),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    let alice_member = member_id_by_email(&detail, ALICE);
    let bob_member = member_id_by_email(&detail, BOB);

    // A guest cannot kick, least of all the owner
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/servers/{}/members/{}", server_id, alice_member),
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: You do not have permission to kick this member");

    // The owner kicks the guest, who becomes an outsider again
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/servers/{}/members/{}", server_id, bob_member),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Member kicked successfully");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}", server_id),
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_message_edit_is_author_only() {
    let app = app();
    let created = create_server(&app, ALICE, "Edits", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    join(&app, BOB, created["inviteCode"].as_str().unwrap()).await;

    let (_, posted) = post_message(&app, BOB, &server_id, submission("draft", 0, 1)).await;
    let message_uri = format!(
        "/api/servers/{}/messages/{}",
        server_id,
        posted["id"].as_str().unwrap()
    );

    // The author edits; content is trimmed like on creation
    let (status, body) = send(
        &app,
        Method::PATCH,
        &message_uri,
        Some(&principal(BOB)),
        Some(json!({ "content": "  final  " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "final");
    assert_eq!(body["id"], posted["id"]);

    // Not even the owner may edit someone else's message
    let (status, body) = send(
        &app,
        Method::PATCH,
        &message_uri,
        Some(&principal(ALICE)),
        Some(json!({ "content": "hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: You do not have permission to edit this message");

    // Content rules still bind the author
    let (status, body) = send(
        &app,
        Method::PATCH,
        &message_uri,
        Some(&principal(BOB)),
        Some(json!({ "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message cannot be empty");
}

#[tokio::test]
async fn test_account_export_and_deletion() {
    let app = app();
    let created = create_server(&app, ALICE, "Mine", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    join(&app, BOB, created["inviteCode"].as_str().unwrap()).await;

    let (status, _) = post_message(&app, ALICE, &server_id, submission("from alice", 0, 1)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = post_message(&app, BOB, &server_id, submission("from bob", 10, 1)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, export) = send(
        &app,
        Method::GET,
        "/api/account/export",
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(export["exportType"], "GDPR Data Export");
    assert!(export["exportDate"].as_str().is_some());
    assert_eq!(export["user"]["email"], BOB);
    let memberships = export["memberships"].as_array().unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0]["serverName"], "Mine");
    assert_eq!(memberships[0]["role"], "GUEST");
    assert_eq!(memberships[0]["messageCount"], 1);
    assert!(export["ownedServers"].as_array().unwrap().is_empty());
    let messages = export["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "from bob");

    let (_, export) = send(
        &app,
        Method::GET,
        "/api/account/export",
        Some(&principal(ALICE)),
        None,
    )
    .await;
    let owned = export["ownedServers"].as_array().unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0]["memberCount"], 2);
    assert_eq!(owned[0]["messageCount"], 2);

    // Deleting the account cascades; the principal provisions a fresh
    // one on its next request
    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/account",
        Some(&principal(BOB)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deleted successfully");

    let (status, body) = send(&app, Method::GET, "/api/servers", Some(&principal(BOB)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["servers"].as_array().unwrap().is_empty());

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}", server_id),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(detail["members"].as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/servers/{}/messages", server_id),
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(contents(&body), ["from alice"]);
}

#[tokio::test]
async fn test_server_update_and_delete() {
    let app = app();
    let created = create_server(&app, ALICE, "Old Name", false).await;
    let server_id = created["id"].as_str().unwrap().to_string();
    join(&app, BOB, created["inviteCode"].as_str().unwrap()).await;
    let server_uri = format!("/api/servers/{}", server_id);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &server_uri,
        Some(&principal(BOB)),
        Some(json!({ "name": "Taken Over" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: Only the server owner can edit this server");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &server_uri,
        Some(&principal(ALICE)),
        Some(json!({ "name": "New Name", "isRestricted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "New Name");
    assert_eq!(body["isRestricted"], true);

    let (status, body) = send(
        &app,
        Method::PATCH,
        &server_uri,
        Some(&principal(ALICE)),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "At least one field must be provided");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &server_uri,
        Some(&principal(ALICE)),
        Some(json!({ "name": "ab" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Server name must be at least 3 characters");

    let (status, body) = send(&app, Method::DELETE, &server_uri, Some(&principal(BOB)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: Only the server owner can delete this server");

    let (status, body) = send(
        &app,
        Method::DELETE,
        &server_uri,
        Some(&principal(ALICE)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Server deleted successfully");

    // Once deleted, the server is indistinguishable from one that
    // never existed
    let (status, body) = send(&app, Method::GET, &server_uri, Some(&principal(ALICE)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden: You are not a member of this server");
}
