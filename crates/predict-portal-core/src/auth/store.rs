//! The identity provider seam.
//!
//! `CredentialStore` is everything this crate needs from the user pool. The
//! production implementation is `CognitoUserPool`; tests use
//! `mock::MockCredentialStore`.

use async_trait::async_trait;

use super::{AuthError, Session};

/// Locally cached identity handle. Obtaining it never touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub username: String,
}

impl CurrentUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// State carried between a sign-in that demands a new password and the
/// answer to that challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPasswordChallenge {
    pub username: String,
    pub session: String,
    pub required_attributes: Vec<String>,
}

/// Where a password reset code was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeDelivery {
    pub destination: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SignInOutcome {
    SignedIn(Session),
    NewPasswordRequired(NewPasswordChallenge),
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The user whose session is cached locally, if any.
    fn current_user(&self) -> Option<CurrentUser>;

    /// Produce the user's session, refreshing it over the network if needed.
    async fn get_session(&self, user: &CurrentUser) -> Result<Session, AuthError>;

    /// Invalidate the user's session and forget it locally.
    async fn sign_out(&self, user: &CurrentUser) -> Result<(), AuthError>;

    async fn authenticate(&self, username: &str, password: &str) -> Result<SignInOutcome, AuthError>;

    async fn complete_new_password(
        &self,
        challenge: &NewPasswordChallenge,
        new_password: &str,
    ) -> Result<Session, AuthError>;

    /// Ask the provider to send a password reset code.
    async fn forgot_password(&self, username: &str) -> Result<CodeDelivery, AuthError>;

    async fn confirm_password(
        &self,
        username: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
