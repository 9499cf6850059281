use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::Json;
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::identity::IdentityProvider;
use crate::profiles::router::{suggest_role_handler, SuggestRoleRequest};
use crate::profiles::storage::FilesystemPhotoStorage;
use crate::profiles::{photo_router, PhotoStorage, ProfileService};

fn multipart_request(token: &str, body: Vec<u8>) -> Request<Body> {
    Request::post("/users/profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

#[tokio::test]
async fn profile_update_accepts_multipart_with_photo() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let router = router_with(service, provider);

    let body = multipart_body(
        &[
            ("name", "Quinn Q"),
            ("hoursPerWeek", "35"),
            ("teamNeeds", r#"{"needsDesigner":"true"}"#),
            ("ideaStatus", "one, set in stone"),
        ],
        Some(("me.png", "image/png", &[0x89, b'P', b'N', b'G'][..])),
    );
    let response = router
        .oneshot(multipart_request(&token, body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let user = &payload["user"];
    assert_eq!(user["name"], "Quinn Q");
    assert_eq!(user["hoursPerWeek"], 35);
    assert_eq!(user["ideaStatus"], "one");
    assert_eq!(user["teamNeeds"]["needsDesigner"], true);
    assert_eq!(user["teamNeeds"]["needsDev"], true);
    assert_eq!(user["photoUrl"], "https://cdn.test/profile-pictures/1.png");
    assert!(user["identityId"].is_string());
}

#[tokio::test]
async fn profile_update_reports_single_and_multiple_failures() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let router = router_with(service, provider);

    let body = multipart_body(&[("hoursPerWeek", "10")], None);
    let response = router
        .clone()
        .oneshot(multipart_request(&token, body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["field"], "hoursPerWeek");
    assert_eq!(payload["error"], "Hours per week must be between 15 and 65");

    let intro = "x".repeat(251);
    let body = multipart_body(&[("hoursPerWeek", "70"), ("intro", &intro)], None);
    let response = router
        .oneshot(multipart_request(&token, body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["errors"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn failed_upload_returns_bad_request() {
    let repository = seeded_repository();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let before = repository.by_name("Quinn");
    let service = ProfileService::new(repository.clone(), Arc::new(FailingStorage));
    let router = router_with(service, provider);

    let body = multipart_body(
        &[("intro", "Never stored")],
        Some(("me.gif", "image/gif", &b"GIF89a"[..])),
    );
    let response = router
        .oneshot(multipart_request(&token, body))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["error"],
        "Photo storage rejected the upload: bucket unavailable"
    );
    assert_eq!(repository.by_name("Quinn"), before);
}

#[tokio::test]
async fn dashboard_requires_a_token() {
    let (service, _, _) = build_service();
    let provider = provider_with_accounts(&[]).await;
    let router = router_with(service, provider);

    let response = router
        .clone()
        .oneshot(get("/users/dashboard", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Not authorized, no token");

    let response = router
        .oneshot(get("/users/dashboard", Some("not-a-jwt")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Not authorized, token failed");
}

#[tokio::test]
async fn dashboard_lists_public_views() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let router = router_with(service, provider);

    let response = router
        .oneshot(get("/users/dashboard?needs=needsPM&sort=hours", Some(&token)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let users = payload["users"].as_array().expect("users array");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["name"], "Avery");
    assert_eq!(users[0]["suggestedRole"], "Developer");
    assert!(users[0].get("identityId").is_none());
    assert!(users[0].get("groups").is_none());
}

#[tokio::test]
async fn dashboard_rejects_unknown_tokens() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let router = router_with(service, provider);

    let response = router
        .oneshot(get("/users/dashboard?hours=10-20", Some(&token)))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(payload["errors"][0]["field"], "hours");
}

#[tokio::test]
async fn profile_lookup_returns_not_found_for_unknown_ids() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let blake = repository.by_name("Blake");
    let router = router_with(service, provider);

    let response = router
        .clone()
        .oneshot(get(&format!("/users/{}", blake.id), Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user"]["suggestedRole"], "Project Manager");

    let response = router
        .oneshot(get("/users/missing", Some(&token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "User not found");
}

#[tokio::test]
async fn admin_roster_requires_admin_group() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn", "Avery"]).await;
    provider
        .add_to_group("avery@example.com", "Admins")
        .await
        .expect("group add");
    let member_token = sign_in(&provider, &repository, "Quinn").await;
    let admin_token = sign_in(&provider, &repository, "Avery").await;
    let router = router_with(service, provider);

    let response = router
        .clone()
        .oneshot(get("/users/admin/roster", Some(&member_token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Not authorized as an admin");

    let response = router
        .oneshot(get("/users/admin/roster", Some(&admin_token)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let users = payload["users"].as_array().expect("users array");
    assert_eq!(users.len(), 4);
    assert!(users.iter().all(|user| user.get("identityId").is_some()));
}

#[tokio::test]
async fn suggest_role_classifies_skills() {
    let response = suggest_role_handler(Ok(Json(SuggestRoleRequest {
        skills: vec!["UI/UX Design".to_string(), "Web Development".to_string()],
    })))
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload, json!({ "suggestedRole": "Designer" }));
}

#[tokio::test]
async fn profile_handler_reports_repository_outage() {
    let service = Arc::new(ProfileService::new(
        Arc::new(UnavailableRepository),
        Arc::new(MemoryStorage::default()),
    ));
    let provider = provider_with_accounts(&["Quinn"]).await;
    let tokens = provider
        .login("quinn@example.com", PASSWORD)
        .await
        .expect("login");
    let user = crate::identity::AuthenticatedUser {
        subject: provider
            .verify_access_token(&tokens.access_token)
            .await
            .expect("verifies")
            .subject,
        username: None,
        groups: Vec::new(),
        access_token: tokens.access_token,
    };

    let response = crate::profiles::router::profile_handler::<UnavailableRepository, MemoryStorage>(
        State(service),
        user,
        axum::extract::Path("abc".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], "Server error");
}

#[tokio::test]
async fn stored_pictures_are_served_back() {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = Arc::new(FilesystemPhotoStorage::new(dir.path(), "http://localhost:7000"));
    let url = storage.upload(png_upload()).await.expect("stored");
    let path = url
        .strip_prefix("http://localhost:7000")
        .expect("public prefix")
        .to_string();
    let router = photo_router(storage);

    let response = router
        .clone()
        .oneshot(get(&path, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"image/png"[..])
    );

    let response = router
        .oneshot(get("/uploads/profile-pictures/missing.png", None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_update_rejects_non_multipart_bodies_as_json() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let router = router_with(service, provider);

    let request = Request::post("/users/profile")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"intro":"json is not accepted here"}"#))
        .expect("request");
    let response = router.oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
        Some(&b"application/json"[..])
    );
    let payload = read_json_body(response).await;
    let message = payload["error"].as_str().expect("error text");
    assert!(message.starts_with("Invalid form data"));
}

#[tokio::test]
async fn a_single_skills_part_is_a_one_item_list() {
    let (service, repository, _) = build_service();
    let provider = provider_with_accounts(&["Quinn"]).await;
    let token = sign_in(&provider, &repository, "Quinn").await;
    let router = router_with(service, provider);

    let body = multipart_body(&[("skills", "Web Development")], None);
    let response = router
        .clone()
        .oneshot(multipart_request(&token, body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["user"]["skills"], json!(["Web Development"]));

    let body = multipart_body(&[("skills", r#"["Finances","Market Research"]"#)], None);
    let response = router
        .oneshot(multipart_request(&token, body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["user"]["skills"],
        json!(["Finances", "Market Research"])
    );
}
