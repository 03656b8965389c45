//! HTTP API tests for stagepass-roles
//!
//! Drives the full router with `tower::ServiceExt::oneshot`.

mod helpers;

use axum::http::StatusCode;
use base64::Engine;
use helpers::{extract_json, get, post_form, post_json, submission, Harness};
use serde_json::json;
use stagepass_roles::workflow::KycDecision;
use tower::ServiceExt;

// =============================================================================
// Health and authentication
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_token() {
    let h = Harness::new().await;
    let response = h.router().oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "stagepass-roles");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let h = Harness::new().await;

    let response = h.router().oneshot(get("/api/me", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

    let response = h
        .router()
        .oneshot(get("/api/me", Some("not-a-real-token")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_reports_role_and_capabilities() {
    let h = Harness::new().await;

    let response = h
        .router()
        .oneshot(get("/api/me", Some(&h.user.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["email"], "fan@example.com");
    assert_eq!(body["role"], "ordinary_user");
    assert_eq!(body["display_role"], "User");
    assert_eq!(body["privilege"], "standard");
    assert_eq!(body["can_create_events"], false);

    let response = h
        .router()
        .oneshot(get("/api/me", Some(&h.admin.token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["role"], "admin");
    assert_eq!(body["privilege"], "elevated");
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_create_request() {
    let h = Harness::new().await;
    let response = h
        .router()
        .oneshot(post_json(
            "/api/role-requests",
            &h.user.token,
            json!({
                "request_type": "to_host",
                "reason": "I run a jazz club",
                "kyc_id_type": "national_id",
                "kyc_id_number": "X-42"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["kyc_status"], "pending");
    assert_eq!(body["request_type"], "to_host");
    assert_eq!(body["account_id"], h.user.account.id);
    assert!(body["kyc_submitted_at"].is_string());
}

#[tokio::test]
async fn test_create_request_validation_and_conflict() {
    let h = Harness::new().await;

    let response = h
        .router()
        .oneshot(post_json(
            "/api/role-requests",
            &h.user.token,
            json!({"request_type": "to_artist", "reason": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let valid = json!({"request_type": "to_artist", "reason": "Producer"});
    let response = h
        .router()
        .oneshot(post_json("/api/role-requests", &h.user.token, valid.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = h
        .router()
        .oneshot(post_json("/api/role-requests", &h.user.token, valid))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_create_request_with_document() {
    let h = Harness::new().await;
    let content = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.7");

    let response = h
        .router()
        .oneshot(post_json(
            "/api/role-requests",
            &h.user.token,
            json!({
                "request_type": "to_artist",
                "reason": "Signed artist",
                "kyc_document": {"filename": "contract.PDF", "content_base64": content}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    let reference = body["kyc_document"].as_str().unwrap();
    assert!(reference.ends_with(".pdf"));
    let stored = std::fs::read(h.documents_root.path().join(reference)).unwrap();
    assert_eq!(stored, b"%PDF-1.7");
}

#[tokio::test]
async fn test_create_request_rejects_bad_base64() {
    let h = Harness::new().await;
    let response = h
        .router()
        .oneshot(post_json(
            "/api/role-requests",
            &h.user.token,
            json!({
                "request_type": "to_artist",
                "reason": "Signed artist",
                "kyc_document": {"filename": "id.png", "content_base64": "!!not base64!!"}
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_my_requests_lists_only_own() {
    let h = Harness::new().await;
    h.workflow
        .submit_request(&h.user.account, submission("to_artist", "mine"))
        .await
        .unwrap();
    h.workflow
        .submit_request(&h.admin.account, submission("to_host", "admin's own"))
        .await
        .unwrap();

    let response = h
        .router()
        .oneshot(get("/api/role-requests/mine", Some(&h.user.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["reason"], "mine");
}

// =============================================================================
// Admin views
// =============================================================================

#[tokio::test]
async fn test_list_requires_admin() {
    let h = Harness::new().await;
    let response = h
        .router()
        .oneshot(get("/api/role-requests", Some(&h.user.token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let h = Harness::new().await;
    let first = h
        .workflow
        .submit_request(&h.user.account, submission("to_artist", "one"))
        .await
        .unwrap();
    h.workflow
        .submit_request(&h.user.account, submission("to_host", "two"))
        .await
        .unwrap();
    h.workflow.cancel_request(&h.user.account, first.id).await.unwrap();

    let response = h
        .router()
        .oneshot(get("/api/role-requests", Some(&h.admin.token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let response = h
        .router()
        .oneshot(get("/api/role-requests?status=pending", Some(&h.admin.token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["reason"], "two");

    let response = h
        .router()
        .oneshot(get("/api/role-requests?status=bogus", Some(&h.admin.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detail_includes_owner_and_audit_log() {
    let h = Harness::new().await;
    let request = h
        .workflow
        .submit_request(&h.user.account, submission("to_host", "Rooftop"))
        .await
        .unwrap();
    h.workflow
        .process_kyc(&h.admin.account, request.id, KycDecision::Verify, "fine")
        .await
        .unwrap();

    let uri = format!("/api/role-requests/{}", request.id);
    let response = h
        .router()
        .oneshot(get(&uri, Some(&h.admin.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["request"]["kyc_status"], "verified");
    assert_eq!(body["owner"]["email"], "fan@example.com");
    let log = body["audit_log"].as_array().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0]["action"], "kyc_verified");
    assert_eq!(log[0]["admin_id"], h.admin.account.id);

    let response = h
        .router()
        .oneshot(get("/api/role-requests/4040", Some(&h.admin.token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Admin actions
// =============================================================================

#[tokio::test]
async fn test_full_flow_over_http() {
    let h = Harness::new().await;
    let request = h
        .workflow
        .submit_request(&h.user.account, submission("to_artist", "Vinyl"))
        .await
        .unwrap();
    let verify_uri = format!("/role-requests/{}/verify-kyc", request.id);
    let process_uri = format!("/role-requests/{}/process", request.id);

    // Approval before KYC is refused in the action-response shape
    let response = h
        .router()
        .oneshot(post_form(&process_uri, &h.admin.token, &[("action", "approve")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        stagepass_roles::models::KYC_NOT_VERIFIED_MESSAGE
    );
    assert!(body["request"].is_null());

    let response = h
        .router()
        .oneshot(post_form(
            &verify_uri,
            &h.admin.token,
            &[("action", "verify"), ("notes", "ID checks out")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], format!("KYC verified for request #{}", request.id));
    assert_eq!(body["request"]["kyc_status"], "verified");
    assert_eq!(body["request"]["admin_notes"], "ID checks out");

    let response = h
        .router()
        .oneshot(post_form(
            &process_uri,
            &h.admin.token,
            &[("action", "approve"), ("notes", "Welcome aboard")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], format!("Request #{} approved", request.id));
    assert_eq!(body["request"]["status"], "approved");

    let response = h
        .router()
        .oneshot(post_form(&process_uri, &h.admin.token, &[("action", "approve")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["message"],
        format!("Request #{} was already processed; nothing changed", request.id)
    );

    let response = h
        .router()
        .oneshot(get("/api/me", Some(&h.user.token)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["role"], "artist");
    assert_eq!(body["can_upload_reels"], true);

    h.drain().await;
    assert_eq!(h.mailer.sent().await.len(), 2);
}

#[tokio::test]
async fn test_action_endpoints_validate_input() {
    let h = Harness::new().await;
    let request = h
        .workflow
        .submit_request(&h.user.account, submission("to_host", "Bar"))
        .await
        .unwrap();

    let uri = format!("/role-requests/{}/verify-kyc", request.id);
    let response = h
        .router()
        .oneshot(post_form(&uri, &h.admin.token, &[("action", "approve")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = h
        .router()
        .oneshot(post_form(&uri, &h.user.token, &[("action", "verify")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .router()
        .oneshot(post_form(
            "/role-requests/777/process",
            &h.admin.token,
            &[("action", "reject")],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reject_over_http() {
    let h = Harness::new().await;
    let request = h
        .workflow
        .submit_request(&h.user.account, submission("to_host", "Warehouse"))
        .await
        .unwrap();

    let uri = format!("/role-requests/{}/process", request.id);
    let response = h
        .router()
        .oneshot(post_form(
            &uri,
            &h.admin.token,
            &[("action", "reject"), ("notes", "Need more detail")],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], format!("Request #{} rejected", request.id));
    assert_eq!(body["request"]["status"], "rejected");
    assert_eq!(body["request"]["admin_notes"], "Need more detail");
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_endpoint() {
    let h = Harness::new().await;
    let request = h
        .workflow
        .submit_request(&h.user.account, submission("to_artist", "Never mind"))
        .await
        .unwrap();
    let uri = format!("/api/role-requests/{}/cancel", request.id);

    let response = h
        .router()
        .oneshot(post_json(&uri, &h.admin.token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .router()
        .oneshot(post_json(&uri, &h.user.token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], format!("Request #{} canceled", request.id));
    assert_eq!(body["request"]["status"], "canceled");

    let response = h
        .router()
        .oneshot(post_json(&uri, &h.user.token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .router()
        .oneshot(post_json("/api/role-requests/9191/cancel", &h.user.token, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
