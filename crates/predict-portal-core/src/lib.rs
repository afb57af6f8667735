//! predict-portal core library.
//!
//! Signs a user in against a Cognito user pool, keeps the session cached
//! locally, and submits single records or uploaded batch files to the
//! prediction API. Presentation is abstracted behind [`page::Page`] and
//! [`auth::PasswordPrompter`] so the same flows drive a terminal or a test.

pub mod api;
pub mod auth;
pub mod config;
pub mod dispatcher;
/// In-memory doubles, for this crate's tests and with the `test-util` feature.
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod models;
pub mod page;
pub mod portal;
pub mod storage;

pub use api::{ApiError, PredictionClient};
pub use auth::{
    AuthError, AuthToken, CognitoUserPool, CredentialStore, CurrentUser, PasswordPrompter, Session,
    SessionAccessor, SessionCache, SignInFlow,
};
pub use config::{Config, ConfigError};
pub use dispatcher::{object_key, RequestDispatcher};
pub use models::{BatchFile, Features, Outcome, PredictionDisplay};
pub use page::{Page, ENTRY_PAGE, PREDICT_PAGE};
pub use portal::{PortalError, PredictPortal};
pub use storage::{ObjectStore, S3ObjectStore, StorageCredentials, StorageError};
