//! The entry page flows: sign-in (with the forced password change
//! challenge) and forgot-password.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::page::{Page, PREDICT_PAGE};

use super::{enter_confirm_password, AuthError, CredentialStore, PasswordPrompter, Session, SignInOutcome};

pub struct SignInFlow {
    store: Arc<dyn CredentialStore>,
    prompter: Arc<dyn PasswordPrompter>,
    page: Arc<dyn Page>,
}

impl SignInFlow {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        prompter: Arc<dyn PasswordPrompter>,
        page: Arc<dyn Page>,
    ) -> Self {
        Self {
            store,
            prompter,
            page,
        }
    }

    /// Sign in and move on to the prediction page. Any failure is shown on
    /// the page and returned.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        match self.authenticate(email, password).await {
            Ok(session) => {
                info!(username = email, at = %Utc::now().to_rfc3339(), "Successfully logged in");
                self.page.alert("Successfully Logged In");
                self.page.navigate(PREDICT_PAGE);
                Ok(session)
            }
            Err(e) => {
                self.page.alert(&e.to_string());
                Err(e)
            }
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        // one cached user at a time
        if let Some(user) = self.store.current_user() {
            if let Err(e) = self.store.sign_out(&user).await {
                warn!(username = %user.username, error = %e, "Failed to sign out previous user");
            }
        }

        match self.store.authenticate(email, password).await? {
            SignInOutcome::SignedIn(session) => Ok(session),
            SignInOutcome::NewPasswordRequired(challenge) => {
                debug!(username = %challenge.username, "New password required");
                let new_password = enter_confirm_password(self.prompter.as_ref(), self.page.as_ref())
                    .ok_or(AuthError::PasswordNotConfirmed)?;
                self.store.complete_new_password(&challenge, &new_password).await
            }
        }
    }

    /// Reset a forgotten password with an emailed verification code.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        match self.reset_password(email).await {
            Ok(()) => {
                self.page.alert("Password reset, login with new password");
                Ok(())
            }
            Err(e) => {
                self.page.alert(&e.to_string());
                Err(e)
            }
        }
    }

    async fn reset_password(&self, email: &str) -> Result<(), AuthError> {
        let delivery = self.store.forgot_password(email).await?;
        debug!(
            destination = ?delivery.destination,
            medium = ?delivery.medium,
            "Verification code sent"
        );

        let code = self
            .prompter
            .verification_code()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::VerificationCodeMissing)?;
        let new_password = enter_confirm_password(self.prompter.as_ref(), self.page.as_ref())
            .ok_or(AuthError::PasswordNotConfirmed)?;

        self.store.confirm_password(email, &code, &new_password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCredentialStore, MockSignIn, PageEvent, RecordingPage, ScriptedPrompter};

    fn flow(
        store: MockCredentialStore,
        prompter: ScriptedPrompter,
    ) -> (SignInFlow, Arc<MockCredentialStore>, Arc<RecordingPage>) {
        let store = Arc::new(store);
        let page = Arc::new(RecordingPage::new());
        let flow = SignInFlow::new(store.clone(), Arc::new(prompter), page.clone());
        (flow, store, page)
    }

    #[tokio::test]
    async fn test_sign_in_success_navigates_to_predict_page() {
        let (flow, store, page) = flow(MockCredentialStore::signed_out(), ScriptedPrompter::empty());
        flow.sign_in("alice@example.com", "pw").await.unwrap();

        assert_eq!(
            page.events(),
            vec![
                PageEvent::Alert("Successfully Logged In".to_string()),
                PageEvent::Navigate("predict.html".to_string()),
            ]
        );
        assert_eq!(store.current_user().unwrap().username, "alice@example.com");
    }

    #[tokio::test]
    async fn test_sign_in_signs_out_previous_user_first() {
        let (flow, store, _) = flow(MockCredentialStore::signed_in("bob"), ScriptedPrompter::empty());
        flow.sign_in("alice@example.com", "pw").await.unwrap();
        let calls = store.calls();
        assert_eq!(calls[..2], ["sign_out:bob".to_string(), "authenticate:alice@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_sign_in_failure_alerts_error() {
        let (flow, _, page) = flow(
            MockCredentialStore::signed_out().with_sign_in(MockSignIn::Reject),
            ScriptedPrompter::empty(),
        );
        let err = flow.sign_in("alice@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::NotAuthorized(_)));
        assert_eq!(page.alerts(), vec![err.to_string()]);
        assert!(page.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_new_password_challenge_completed() {
        let (flow, store, page) = flow(
            MockCredentialStore::signed_out().with_sign_in(MockSignIn::NewPasswordRequired),
            ScriptedPrompter::new(["n3w-Password", "n3w-Password"]),
        );
        flow.sign_in("alice@example.com", "temporary").await.unwrap();

        assert_eq!(store.new_password().as_deref(), Some("n3w-Password"));
        assert_eq!(page.navigations(), vec!["predict.html".to_string()]);
    }

    #[tokio::test]
    async fn test_new_password_challenge_lockout() {
        let (flow, store, page) = flow(
            MockCredentialStore::signed_out().with_sign_in(MockSignIn::NewPasswordRequired),
            ScriptedPrompter::new(["a", "b", "c", "d", "e", "f"]),
        );
        let err = flow.sign_in("alice@example.com", "temporary").await.unwrap_err();

        assert!(matches!(err, AuthError::PasswordNotConfirmed));
        assert!(store.new_password().is_none());
        assert!(page.navigations().is_empty());
        assert_eq!(page.alerts().last().unwrap(), "New password was not confirmed");
    }

    #[tokio::test]
    async fn test_forgot_password_success() {
        let (flow, store, page) = flow(
            MockCredentialStore::signed_out(),
            ScriptedPrompter::new(["123456", "n3w-Password", "n3w-Password"]),
        );
        flow.forgot_password("alice@example.com").await.unwrap();

        assert_eq!(
            store.confirmed_reset(),
            Some(("alice@example.com".to_string(), "123456".to_string(), "n3w-Password".to_string()))
        );
        assert_eq!(page.alerts(), vec!["Password reset, login with new password".to_string()]);
    }

    #[tokio::test]
    async fn test_forgot_password_without_code() {
        let (flow, store, page) = flow(
            MockCredentialStore::signed_out(),
            ScriptedPrompter::from_answers(vec![Some("  ".to_string())]),
        );
        let err = flow.forgot_password("alice@example.com").await.unwrap_err();
        assert!(matches!(err, AuthError::VerificationCodeMissing));
        assert!(store.confirmed_reset().is_none());
        assert_eq!(page.alerts(), vec!["No verification code was entered".to_string()]);
    }
}
