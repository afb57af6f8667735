use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A request that did not complete with a 2xx. Carries the response text,
    /// the status and the error detail verbatim so they can be shown to the user.
    #[error("An error occurred while calculating: {response_text}, {status}, {detail}")]
    Request {
        response_text: String,
        status: String,
        detail: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Token cannot be sent as a header value")]
    InvalidToken,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Maximum length for error response bodies in log lines
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        ApiError::Request {
            response_text: body.to_string(),
            status: status.as_u16().to_string(),
            detail: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// A request that never produced a response.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let status = if err.is_timeout() { "timeout" } else { "error" };
        ApiError::Request {
            response_text: String::new(),
            status: status.to_string(),
            detail: err.to_string(),
        }
    }
}
