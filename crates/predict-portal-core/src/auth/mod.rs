//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `CredentialStore`: the identity provider seam, `CognitoUserPool` in production
//! - `Session`, `SessionCache`: issued tokens and their local persistence
//! - `SessionAccessor`: page gating and token retrieval
//! - `SignInFlow`: sign-in, forced password change and password reset
//!
//! Sessions are cached on disk and refreshed with the refresh token once the
//! id or access token expires.

pub mod accessor;
pub mod cognito;
pub mod error;
pub mod prompt;
pub mod session;
pub mod signin;
pub mod store;

pub use accessor::SessionAccessor;
pub use cognito::CognitoUserPool;
pub use error::AuthError;
pub use prompt::{enter_confirm_password, PasswordPrompter, MAX_PASSWORD_ATTEMPTS};
pub use session::{token_expiry, AuthToken, Session, SessionCache, SessionData};
pub use signin::SignInFlow;
pub use store::{CodeDelivery, CredentialStore, CurrentUser, NewPasswordChallenge, SignInOutcome};
