//! The prediction page: entry gate, then single and batch submissions.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::api::ApiError;
use crate::auth::{AuthError, AuthToken, SessionAccessor};
use crate::dispatcher::RequestDispatcher;
use crate::models::{download_link, pred_proba, BatchFile, Features, PredictionDisplay};
use crate::page::{Page, ENTRY_PAGE};
use crate::storage::StorageError;

const NO_TOKEN_NOTICE: &str = "No auth token";

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Please select a file to upload first.")]
    MissingFile,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Upload(#[from] StorageError),

    #[error("No download link found in the result.")]
    MissingDownloadLink,
}

pub struct PredictPortal {
    accessor: SessionAccessor,
    dispatcher: RequestDispatcher,
    page: Arc<dyn Page>,
    token: Option<AuthToken>,
}

impl PredictPortal {
    pub fn new(accessor: SessionAccessor, dispatcher: RequestDispatcher, page: Arc<dyn Page>) -> Self {
        Self {
            accessor,
            dispatcher,
            page,
            token: None,
        }
    }

    /// Whether `open` obtained a token for this page.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Gate the page and fetch the token its requests will carry.
    /// Returns whether the page is usable.
    pub async fn open(&mut self) -> bool {
        if !self
            .accessor
            .redirect_if_not_authenticated(self.page.as_ref(), Some(ENTRY_PAGE))
            .await
        {
            return false;
        }

        match self.accessor.auth_token().await {
            Ok(Some(token)) => {
                debug!(username = %self.accessor.user_name(), "Prediction page opened");
                self.token = Some(token);
                true
            }
            Ok(None) => {
                self.page.alert(NO_TOKEN_NOTICE);
                self.page.navigate(ENTRY_PAGE);
                false
            }
            Err(e) => {
                error!(error = %e, "Failed to fetch token");
                self.page.alert(&e.to_string());
                self.page.navigate(ENTRY_PAGE);
                false
            }
        }
    }

    fn require_token(&self) -> Result<&AuthToken, PortalError> {
        match &self.token {
            Some(token) => Ok(token),
            None => {
                self.page.navigate(ENTRY_PAGE);
                Err(PortalError::NotAuthenticated)
            }
        }
    }

    /// Predict one record and show its classification.
    pub async fn submit_single(&self, features: Features) -> Result<PredictionDisplay, PortalError> {
        let token = self.require_token()?;

        let response = match self.dispatcher.predict_single(token, &features).await {
            Ok(response) => response,
            Err(e) => {
                self.page.alert(&format!("Error calculating: {}", e));
                return Err(e.into());
            }
        };

        match pred_proba(&response) {
            Ok(probability) => {
                let prediction = PredictionDisplay::new(probability);
                info!(pred_proba = probability, outcome = %prediction.outcome, "Prediction received");
                self.page.show_prediction(&prediction);
                Ok(prediction)
            }
            Err(e) => {
                self.page.alert(&format!("Error parsing result: {}", e));
                Err(e.into())
            }
        }
    }

    /// Upload a file, score it, and show the link to the scored output.
    pub async fn submit_batch(&self, file: Option<BatchFile>) -> Result<String, PortalError> {
        let Some(file) = file else {
            self.page.alert(&PortalError::MissingFile.to_string());
            return Err(PortalError::MissingFile);
        };
        let token = self.require_token()?;

        self.page.set_processing(true);
        let result = self.run_batch(token, &file).await;
        self.page.set_processing(false);

        match result {
            Ok(link) => {
                self.page.show_download_link(&link);
                Ok(link)
            }
            Err(e) => {
                let message = match &e {
                    PortalError::Upload(inner) => {
                        format!("There was an error uploading your file: {}", inner)
                    }
                    PortalError::Api(inner) => format!("Error calculating: {}", inner),
                    other => other.to_string(),
                };
                self.page.alert(&message);
                Err(e)
            }
        }
    }

    async fn run_batch(&self, token: &AuthToken, file: &BatchFile) -> Result<String, PortalError> {
        let key = self.dispatcher.upload_batch_file(token, file).await?;
        let response = self.dispatcher.predict_batch(token, &key).await?;
        download_link(&response).ok_or(PortalError::MissingDownloadLink)
    }
}
