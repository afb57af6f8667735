//! In-memory doubles for testing flows without a user pool, a bucket or a
//! terminal.
//!
//! Used by the unit tests in this crate and by the scenarios under `tests/`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};

use crate::auth::{
    AuthError, CodeDelivery, CredentialStore, CurrentUser, NewPasswordChallenge, PasswordPrompter,
    Session, SessionData, SignInOutcome,
};
use crate::models::PredictionDisplay;
use crate::page::Page;
use crate::storage::{ObjectStore, PutObject, StorageCredentials, StorageError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A JWT carrying `claims` with a placeholder signature.
pub fn jwt_with_claims(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.mock-signature", header, payload)
}

/// A JWT whose only meaningful claim is `exp`.
pub fn fake_jwt(expires_at: DateTime<Utc>) -> String {
    jwt_with_claims(serde_json::json!({ "sub": "mock", "exp": expires_at.timestamp() }))
}

/// Session data for `username` with both tokens expiring at `expires_at`.
pub fn session_data(username: &str, expires_at: DateTime<Utc>) -> SessionData {
    SessionData {
        username: username.to_string(),
        id_token: fake_jwt(expires_at),
        access_token: fake_jwt(expires_at),
        refresh_token: Some("mock-refresh-token".to_string()),
        created_at: Utc::now(),
    }
}

pub fn expired_session(username: &str) -> Result<Session, AuthError> {
    Session::from_data(session_data(username, Utc::now() - Duration::minutes(5)))
}

/// What the next `get_session` call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSession {
    Valid,
    /// A session that reports itself invalid
    Expired,
    /// The store rejects the session outright
    InvalidSessionError,
    /// The provider fails, e.g. a refresh request that errors
    ProviderError,
}

/// How `authenticate` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSignIn {
    Success,
    NewPasswordRequired,
    Reject,
}

/// Credential store double. Sessions are handed out from a queue; once it
/// runs dry every session is valid.
pub struct MockCredentialStore {
    user: Mutex<Option<CurrentUser>>,
    sessions: Mutex<VecDeque<MockSession>>,
    sign_in: MockSignIn,
    /// Expiry of every valid session handed out, fixed so tokens are stable
    session_expiry: DateTime<Utc>,
    get_session_calls: AtomicUsize,
    calls: Mutex<Vec<String>>,
    new_password: Mutex<Option<String>>,
    confirmed_reset: Mutex<Option<(String, String, String)>>,
}

impl MockCredentialStore {
    fn with_user(user: Option<CurrentUser>) -> Self {
        Self {
            user: Mutex::new(user),
            sessions: Mutex::new(VecDeque::new()),
            sign_in: MockSignIn::Success,
            session_expiry: Utc::now() + Duration::hours(1),
            get_session_calls: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            new_password: Mutex::new(None),
            confirmed_reset: Mutex::new(None),
        }
    }

    pub fn signed_in(username: &str) -> Self {
        Self::with_user(Some(CurrentUser::new(username)))
    }

    pub fn signed_out() -> Self {
        Self::with_user(None)
    }

    pub fn with_sessions(self, sessions: Vec<MockSession>) -> Self {
        *lock(&self.sessions) = sessions.into();
        self
    }

    pub fn with_sign_in(mut self, sign_in: MockSignIn) -> Self {
        self.sign_in = sign_in;
        self
    }

    /// Id token of the valid sessions this store hands out.
    pub fn id_token(&self, username: &str) -> String {
        session_data(username, self.session_expiry).id_token
    }

    fn valid_session(&self, username: &str) -> Result<Session, AuthError> {
        Session::from_data(session_data(username, self.session_expiry))
    }

    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    /// Mutating calls in order, as `<operation>:<username>`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Password that answered a new password challenge.
    pub fn new_password(&self) -> Option<String> {
        lock(&self.new_password).clone()
    }

    /// `(username, code, new password)` of a confirmed reset.
    pub fn confirmed_reset(&self) -> Option<(String, String, String)> {
        lock(&self.confirmed_reset).clone()
    }

    fn record(&self, operation: &str, username: &str) {
        lock(&self.calls).push(format!("{}:{}", operation, username));
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    fn current_user(&self) -> Option<CurrentUser> {
        lock(&self.user).clone()
    }

    async fn get_session(&self, user: &CurrentUser) -> Result<Session, AuthError> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.sessions).pop_front().unwrap_or(MockSession::Valid);
        match next {
            MockSession::Valid => self.valid_session(&user.username),
            MockSession::Expired => expired_session(&user.username),
            MockSession::InvalidSessionError => Err(AuthError::InvalidSession),
            MockSession::ProviderError => Err(AuthError::Provider {
                code: "InternalErrorException".to_string(),
                message: "mock provider failure".to_string(),
            }),
        }
    }

    async fn sign_out(&self, user: &CurrentUser) -> Result<(), AuthError> {
        self.record("sign_out", &user.username);
        *lock(&self.user) = None;
        Ok(())
    }

    async fn authenticate(&self, username: &str, _password: &str) -> Result<SignInOutcome, AuthError> {
        self.record("authenticate", username);
        match self.sign_in {
            MockSignIn::Success => {
                let session = self.valid_session(username)?;
                *lock(&self.user) = Some(CurrentUser::new(username));
                Ok(SignInOutcome::SignedIn(session))
            }
            MockSignIn::NewPasswordRequired => Ok(SignInOutcome::NewPasswordRequired(NewPasswordChallenge {
                username: username.to_string(),
                session: "mock-challenge-session".to_string(),
                required_attributes: Vec::new(),
            })),
            MockSignIn::Reject => Err(AuthError::NotAuthorized(
                "Incorrect username or password.".to_string(),
            )),
        }
    }

    async fn complete_new_password(
        &self,
        challenge: &NewPasswordChallenge,
        new_password: &str,
    ) -> Result<Session, AuthError> {
        self.record("complete_new_password", &challenge.username);
        let session = self.valid_session(&challenge.username)?;
        *lock(&self.new_password) = Some(new_password.to_string());
        *lock(&self.user) = Some(CurrentUser::new(challenge.username.clone()));
        Ok(session)
    }

    async fn forgot_password(&self, username: &str) -> Result<CodeDelivery, AuthError> {
        self.record("forgot_password", username);
        Ok(CodeDelivery {
            destination: Some("a***@e***.com".to_string()),
            medium: Some("EMAIL".to_string()),
        })
    }

    async fn confirm_password(&self, username: &str, code: &str, new_password: &str) -> Result<(), AuthError> {
        self.record("confirm_password", username);
        *lock(&self.confirmed_reset) = Some((
            username.to_string(),
            code.to_string(),
            new_password.to_string(),
        ));
        Ok(())
    }
}

/// One upload seen by `MockObjectStore`.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub credentials: StorageCredentials,
}

/// Object store double that records uploads, or rejects all of them.
#[derive(Default)]
pub struct MockObjectStore {
    failure: Option<String>,
    uploads: Mutex<Vec<RecordedUpload>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upload is rejected with a 403 carrying `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        lock(&self.uploads).clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(
        &self,
        object: PutObject<'_>,
        credentials: &StorageCredentials,
    ) -> Result<(), StorageError> {
        if let Some(message) = &self.failure {
            return Err(StorageError::Upload {
                status: 403,
                body: message.clone(),
            });
        }
        lock(&self.uploads).push(RecordedUpload {
            key: object.key.to_string(),
            body: object.body.to_vec(),
            content_type: object.content_type.to_string(),
            credentials: credentials.clone(),
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Alert(String),
    Navigate(String),
    RevealContent,
    Processing(bool),
    Prediction(PredictionDisplay),
    DownloadLink(String),
}

/// Page double that records everything rendered through it.
#[derive(Default)]
pub struct RecordingPage {
    events: Mutex<Vec<PageEvent>>,
}

impl RecordingPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PageEvent> {
        lock(&self.events).clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PageEvent::Alert(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PageEvent::Navigate(location) => Some(location),
                _ => None,
            })
            .collect()
    }

    /// Last state of the processing indicator.
    pub fn processing_visible(&self) -> bool {
        self.events()
            .iter()
            .rev()
            .find_map(|e| match e {
                PageEvent::Processing(visible) => Some(*visible),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn push(&self, event: PageEvent) {
        lock(&self.events).push(event);
    }
}

impl Page for RecordingPage {
    fn alert(&self, message: &str) {
        self.push(PageEvent::Alert(message.to_string()));
    }

    fn navigate(&self, location: &str) {
        self.push(PageEvent::Navigate(location.to_string()));
    }

    fn reveal_content(&self) {
        self.push(PageEvent::RevealContent);
    }

    fn set_processing(&self, visible: bool) {
        self.push(PageEvent::Processing(visible));
    }

    fn show_prediction(&self, prediction: &PredictionDisplay) {
        self.push(PageEvent::Prediction(*prediction));
    }

    fn show_download_link(&self, link: &str) {
        self.push(PageEvent::DownloadLink(link.to_string()));
    }
}

/// Prompter that answers from a script, in call order regardless of which
/// prompt is asked. An exhausted script behaves like a cancelled prompt.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<String>>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_answers(answers.into_iter().map(|a| Some(a.into())).collect())
    }

    pub fn from_answers(answers: Vec<Option<String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
        }
    }

    pub fn empty() -> Self {
        Self::from_answers(Vec::new())
    }

    pub fn remaining(&self) -> usize {
        lock(&self.answers).len()
    }

    fn next(&self) -> Option<String> {
        lock(&self.answers).pop_front().flatten()
    }
}

impl PasswordPrompter for ScriptedPrompter {
    fn new_password(&self) -> Option<String> {
        self.next()
    }

    fn confirm_password(&self) -> Option<String> {
        self.next()
    }

    fn verification_code(&self) -> Option<String> {
        self.next()
    }
}
