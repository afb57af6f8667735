use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No user is signed in")]
    NoCurrentUser,

    #[error("Session is invalid")]
    InvalidSession,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Password reset required: {0}")]
    PasswordResetRequired(String),

    #[error("Invalid verification code: {0}")]
    CodeMismatch(String),

    #[error("Verification code expired: {0}")]
    ExpiredCode(String),

    #[error("Password does not conform to policy: {0}")]
    InvalidPassword(String),

    #[error("Attempt limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("New password was not confirmed")]
    PasswordNotConfirmed,

    #[error("No verification code was entered")]
    VerificationCodeMissing,

    #[error("Identity provider error {code}: {message}")]
    Provider { code: String, message: String },

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Invalid identity provider payload: {0}")]
    InvalidPayload(String),

    #[error("Session cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// Map a Cognito error `__type` to a typed error.
    /// Types may arrive namespaced (`com.amazon...#NotAuthorizedException`).
    pub fn from_provider(error_type: &str, message: String) -> Self {
        let code = error_type.rsplit('#').next().unwrap_or(error_type);
        match code {
            "NotAuthorizedException" => AuthError::NotAuthorized(message),
            "UserNotFoundException" => AuthError::UserNotFound(message),
            "PasswordResetRequiredException" => AuthError::PasswordResetRequired(message),
            "CodeMismatchException" => AuthError::CodeMismatch(message),
            "ExpiredCodeException" => AuthError::ExpiredCode(message),
            "InvalidPasswordException" => AuthError::InvalidPassword(message),
            "LimitExceededException" | "TooManyRequestsException" | "TooManyFailedAttemptsException" => {
                AuthError::LimitExceeded(message)
            }
            _ => AuthError::Provider {
                code: code.to_string(),
                message,
            },
        }
    }
}
