//! `CognitoUserPool` against a local stub of the user pool JSON protocol.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{temp_dir, Recorded, Stub};
use predict_portal_core::auth::{
    AuthError, CognitoUserPool, CredentialStore, CurrentUser, SessionCache, SignInOutcome,
};
use predict_portal_core::config::CognitoConfig;
use predict_portal_core::mock::{fake_jwt, session_data};

fn pool(stub: &Stub, cache: SessionCache) -> CognitoUserPool {
    let config = CognitoConfig {
        user_pool_id: "us-east-1_pool".to_string(),
        user_pool_client_id: "client-123".to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some(format!("{}/", stub.url)),
        ..CognitoConfig::default()
    };
    CognitoUserPool::new(reqwest::Client::new(), &config, cache)
}

fn tokens(refresh_token: Option<&str>) -> String {
    let exp = Utc::now() + Duration::hours(1);
    let mut result = json!({
        "IdToken": fake_jwt(exp),
        "AccessToken": fake_jwt(exp),
        "ExpiresIn": 3600,
        "TokenType": "Bearer",
    });
    if let Some(token) = refresh_token {
        result["RefreshToken"] = json!(token);
    }
    json!({ "AuthenticationResult": result }).to_string()
}

fn operation_is(request: &Recorded, operation: &str) -> bool {
    request.operation() == Some(operation)
}

#[tokio::test]
async fn test_sign_in_persists_session() {
    let stub = Stub::start(|_| (StatusCode::OK, tokens(Some("refresh-1")))).await;
    let dir = temp_dir("signin");
    let pool = pool(&stub, SessionCache::new(dir.clone()));

    let outcome = pool.authenticate("alice@example.com", "pw").await.unwrap();
    assert!(matches!(outcome, SignInOutcome::SignedIn(ref s) if s.is_valid()));

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].header("x-amz-target"),
        Some("AWSCognitoIdentityProviderService.InitiateAuth")
    );
    assert_eq!(requests[0].header("content-type"), Some("application/x-amz-json-1.1"));
    let body = requests[0].json();
    assert_eq!(body["AuthFlow"], "USER_PASSWORD_AUTH");
    assert_eq!(body["ClientId"], "client-123");
    assert_eq!(body["AuthParameters"]["USERNAME"], "alice@example.com");

    // a fresh pool over the same cache sees the user without network calls
    let reopened = pool_from_cache(&stub, &dir);
    let user = reopened.current_user().unwrap();
    assert_eq!(user.username, "alice@example.com");
    let session = reopened.get_session(&user).await.unwrap();
    assert_eq!(session.refresh_token(), Some("refresh-1"));
    assert_eq!(stub.requests().len(), 1);

    let _ = std::fs::remove_dir_all(dir);
}

fn pool_from_cache(stub: &Stub, dir: &std::path::Path) -> CognitoUserPool {
    pool(stub, SessionCache::new(dir.to_path_buf()))
}

#[tokio::test]
async fn test_expired_session_is_refreshed() {
    let stub = Stub::start(|_| (StatusCode::OK, tokens(None))).await;
    let dir = temp_dir("refresh");
    let cache = SessionCache::new(dir.clone());
    cache
        .save(&session_data("alice", Utc::now() - Duration::minutes(5)))
        .unwrap();
    let pool = pool(&stub, cache.clone());

    let session = pool.get_session(&CurrentUser::new("alice")).await.unwrap();
    assert!(session.is_valid());
    // refresh responses do not repeat the refresh token
    assert_eq!(session.refresh_token(), Some("mock-refresh-token"));

    let requests = stub.requests();
    assert_eq!(requests.len(), 1);
    let body = requests[0].json();
    assert_eq!(body["AuthFlow"], "REFRESH_TOKEN_AUTH");
    assert_eq!(body["AuthParameters"]["REFRESH_TOKEN"], "mock-refresh-token");

    let saved = cache.load().unwrap().unwrap();
    assert_eq!(saved.id_token, session.id_token());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_failed_refresh_is_an_error() {
    let stub = Stub::fixed(
        StatusCode::BAD_REQUEST,
        r#"{"__type":"NotAuthorizedException","message":"Refresh Token has expired"}"#,
    )
    .await;
    let dir = temp_dir("refresh-fail");
    let cache = SessionCache::new(dir.clone());
    cache
        .save(&session_data("alice", Utc::now() - Duration::minutes(5)))
        .unwrap();
    let pool = pool(&stub, cache);

    let err = pool.get_session(&CurrentUser::new("alice")).await.unwrap_err();
    assert!(matches!(err, AuthError::NotAuthorized(ref m) if m == "Refresh Token has expired"));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_new_password_challenge() {
    let stub = Stub::start(|request| {
        if operation_is(request, "InitiateAuth") {
            let challenge = json!({
                "ChallengeName": "NEW_PASSWORD_REQUIRED",
                "Session": "challenge-session",
                "ChallengeParameters": {
                    "USER_ID_FOR_SRP": "7f1c-uuid",
                    "requiredAttributes": "[\"name\"]",
                    "userAttributes": "{}"
                }
            });
            (StatusCode::OK, challenge.to_string())
        } else {
            (StatusCode::OK, tokens(Some("refresh-2")))
        }
    })
    .await;
    let dir = temp_dir("challenge");
    let pool = pool(&stub, SessionCache::new(dir.clone()));

    let challenge = match pool.authenticate("alice@example.com", "temporary").await.unwrap() {
        SignInOutcome::NewPasswordRequired(challenge) => challenge,
        SignInOutcome::SignedIn(_) => panic!("expected a challenge"),
    };
    assert_eq!(challenge.session, "challenge-session");
    assert_eq!(challenge.required_attributes, vec!["name".to_string()]);
    assert!(pool.current_user().is_none());

    let session = pool.complete_new_password(&challenge, "n3w-Password").await.unwrap();
    assert!(session.is_valid());
    assert_eq!(pool.current_user().unwrap().username, "alice@example.com");

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    let body = requests[1].json();
    assert_eq!(body["ChallengeName"], "NEW_PASSWORD_REQUIRED");
    assert_eq!(body["Session"], "challenge-session");
    assert_eq!(body["ChallengeResponses"]["NEW_PASSWORD"], "n3w-Password");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_provider_errors_are_typed() {
    let stub = Stub::fixed(
        StatusCode::BAD_REQUEST,
        r#"{"__type":"com.amazonaws.cognito#UserNotFoundException","message":"User does not exist."}"#,
    )
    .await;
    let dir = temp_dir("errors");
    let pool = pool(&stub, SessionCache::new(dir.clone()));

    let err = pool.authenticate("nobody@example.com", "pw").await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound(ref m) if m == "User does not exist."));
    assert!(pool.current_user().is_none());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_forgot_and_confirm_password() {
    let stub = Stub::start(|request| {
        if operation_is(request, "ForgotPassword") {
            let body = json!({
                "CodeDeliveryDetails": {
                    "Destination": "a***@e***.com",
                    "DeliveryMedium": "EMAIL",
                    "AttributeName": "email"
                }
            });
            (StatusCode::OK, body.to_string())
        } else {
            (StatusCode::OK, String::new())
        }
    })
    .await;
    let dir = temp_dir("reset");
    let pool = pool(&stub, SessionCache::new(dir.clone()));

    let delivery = pool.forgot_password("alice@example.com").await.unwrap();
    assert_eq!(delivery.medium.as_deref(), Some("EMAIL"));
    pool.confirm_password("alice@example.com", "123456", "n3w-Password")
        .await
        .unwrap();

    let requests = stub.requests();
    assert_eq!(requests[1].operation(), Some("ConfirmForgotPassword"));
    let body = requests[1].json();
    assert_eq!(body["ConfirmationCode"], "123456");
    assert_eq!(body["Password"], "n3w-Password");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_sign_out_clears_cache_even_if_revoke_fails() {
    let stub = Stub::start(|request| {
        if operation_is(request, "RevokeToken") {
            (StatusCode::INTERNAL_SERVER_ERROR, "{}".to_string())
        } else {
            (StatusCode::OK, tokens(Some("refresh-3")))
        }
    })
    .await;
    let dir = temp_dir("signout");
    let pool = pool(&stub, SessionCache::new(dir.clone()));
    pool.authenticate("alice@example.com", "pw").await.unwrap();

    let user = pool.current_user().unwrap();
    pool.sign_out(&user).await.unwrap();
    assert!(pool.current_user().is_none());

    let revoke = &stub.requests()[1];
    assert_eq!(revoke.operation(), Some("RevokeToken"));
    assert_eq!(revoke.json()["Token"], "refresh-3");

    let _ = std::fs::remove_dir_all(dir);
}
