//! Uniform "is this user signed in" and "give me the token" checks on top
//! of a `CredentialStore`.
//!
//! Checks that gate a page fail closed and never error. The token fetch that
//! feeds a request payload propagates store errors so the caller can send
//! the user back to sign-in instead of making an unauthenticated call.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::CognitoConfig;
use crate::page::{Page, ENTRY_PAGE};
use crate::storage::StorageCredentials;

use super::{AuthError, AuthToken, CredentialStore, CurrentUser};

const NOT_SIGNED_IN_NOTICE: &str = "You must be signed in to access the page";

#[derive(Clone)]
pub struct SessionAccessor {
    store: Arc<dyn CredentialStore>,
    region: String,
    user_pool_id: String,
    identity_pool_id: String,
}

impl SessionAccessor {
    pub fn new(store: Arc<dyn CredentialStore>, config: &CognitoConfig) -> Self {
        Self {
            store,
            region: config.region.clone(),
            user_pool_id: config.user_pool_id.clone(),
            identity_pool_id: config.identity_pool_id.clone(),
        }
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.store.current_user()
    }

    /// Current username, or an empty string when nobody is signed in.
    pub fn user_name(&self) -> String {
        self.current_user().map(|u| u.username).unwrap_or_default()
    }

    /// Never errors: any store failure counts as signed out.
    pub async fn is_authenticated(&self) -> bool {
        let Some(user) = self.current_user() else {
            return false;
        };

        match self.store.get_session(&user).await {
            Ok(session) if session.is_valid() => true,
            Ok(_) => {
                error!(username = %user.username, "Error checking authentication: session is invalid");
                false
            }
            Err(e) => {
                error!(username = %user.username, error = %e, "Error checking authentication");
                false
            }
        }
    }

    /// `Ok(None)` when signed out. Store errors after a positive check are
    /// returned to the caller.
    pub async fn auth_token(&self) -> Result<Option<AuthToken>, AuthError> {
        if !self.is_authenticated().await {
            return Ok(None);
        }

        let user = self.current_user().ok_or(AuthError::NoCurrentUser)?;
        let session = self.store.get_session(&user).await?;
        if !session.is_valid() {
            return Err(AuthError::InvalidSession);
        }

        AuthToken::new(session.id_token())
            .map(Some)
            .ok_or_else(|| AuthError::MalformedToken("session has an empty id token".to_string()))
    }

    /// Gate for page entry. Returns whether the gated content was revealed.
    pub async fn redirect_if_not_authenticated(&self, page: &dyn Page, target: Option<&str>) -> bool {
        if self.is_authenticated().await {
            page.reveal_content();
            true
        } else {
            page.alert(NOT_SIGNED_IN_NOTICE);
            page.navigate(target.unwrap_or(ENTRY_PAGE));
            false
        }
    }

    /// Identity-pool scoped credentials for a storage operation, bound to
    /// the user's id token. The value is handed to the upload explicitly.
    pub fn set_temporary_credentials(&self, token: &AuthToken) -> StorageCredentials {
        StorageCredentials::for_user_pool(&self.region, &self.user_pool_id, &self.identity_pool_id, token)
    }

    /// Sign the current user out and return to the entry page. No-op when
    /// nobody is signed in.
    pub async fn sign_out(&self, page: &dyn Page) {
        let Some(user) = self.current_user() else {
            debug!("Sign out requested with no current user");
            return;
        };

        if let Err(e) = self.store.sign_out(&user).await {
            warn!(username = %user.username, error = %e, "Sign out failed");
        }
        page.navigate(ENTRY_PAGE);
    }
}
