//! Wires configuration, the user pool, storage and the terminal together
//! and runs one command.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use predict_portal_core::api::build_http_client;
use predict_portal_core::auth::{
    CognitoUserPool, CredentialStore, SessionAccessor, SessionCache, SignInFlow,
};
use predict_portal_core::config::Config;
use predict_portal_core::models::{BatchFile, Features};
use predict_portal_core::page::Page;
use predict_portal_core::{PredictPortal, PredictionClient, RequestDispatcher, S3ObjectStore};
use reqwest::Client;
use tracing::{debug, info};

use crate::terminal::{TerminalPage, TerminalPrompter};

/// Environment variable that supplies the sign-in password non-interactively.
const PASSWORD_ENV: &str = "PREDICT_PORTAL_PASSWORD";

pub struct App {
    config: Config,
    http: Client,
    store: Arc<dyn CredentialStore>,
    page: Arc<dyn Page>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Incomplete configuration")?;

        let cache_dir = config.cache_dir()?;
        debug!(cache_dir = %cache_dir.display(), "Using session cache");

        let http = build_http_client(&config.api).context("Failed to build HTTP client")?;

        let store: Arc<dyn CredentialStore> = Arc::new(CognitoUserPool::new(
            http.clone(),
            &config.cognito,
            SessionCache::new(cache_dir),
        ));

        Ok(Self {
            config,
            http,
            store,
            page: Arc::new(TerminalPage),
        })
    }

    fn accessor(&self) -> SessionAccessor {
        SessionAccessor::new(self.store.clone(), &self.config.cognito)
    }

    fn sign_in_flow(&self) -> SignInFlow {
        SignInFlow::new(self.store.clone(), Arc::new(TerminalPrompter), self.page.clone())
    }

    async fn open_portal(&self) -> Option<PredictPortal> {
        let accessor = self.accessor();
        let dispatcher = RequestDispatcher::new(
            PredictionClient::with_client(self.http.clone(), &self.config.api),
            accessor.clone(),
            Arc::new(S3ObjectStore::new(self.http.clone(), &self.config.s3, &self.config.cognito)),
        );
        let mut portal = PredictPortal::new(accessor, dispatcher, self.page.clone());
        portal.open().await.then_some(portal)
    }

    pub async fn sign_in(&self, email: &str) -> Result<bool> {
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Password: ").context("Failed to read password")?,
        };
        Ok(self.sign_in_flow().sign_in(email, &password).await.is_ok())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<bool> {
        Ok(self.sign_in_flow().forgot_password(email).await.is_ok())
    }

    pub async fn status(&self) -> Result<bool> {
        let accessor = self.accessor();
        let Some(user) = accessor.current_user() else {
            println!("Not signed in");
            return Ok(false);
        };

        if !accessor.is_authenticated().await {
            println!("{}: session expired, sign in again", user.username);
            return Ok(false);
        }

        match self.store.get_session(&user).await {
            Ok(session) => {
                println!(
                    "Signed in as {} (session valid for {} more minutes)",
                    user.username,
                    session.minutes_until_expiry()
                );
                Ok(true)
            }
            Err(e) => {
                println!("{}: {}", user.username, e);
                Ok(false)
            }
        }
    }

    pub async fn predict(&self, features: Features) -> Result<bool> {
        let Some(portal) = self.open_portal().await else {
            return Ok(false);
        };
        Ok(portal.submit_single(features).await.is_ok())
    }

    pub async fn batch(&self, path: &Path) -> Result<bool> {
        let file = BatchFile::from_path(path)?;
        info!(file = %file.name, bytes = file.bytes.len(), "Submitting batch file");

        let Some(portal) = self.open_portal().await else {
            return Ok(false);
        };
        Ok(portal.submit_batch(Some(file)).await.is_ok())
    }

    pub async fn sign_out(&self) -> Result<bool> {
        let accessor = self.accessor();
        if accessor.current_user().is_none() {
            println!("Not signed in");
            return Ok(true);
        }
        accessor.sign_out(self.page.as_ref()).await;
        Ok(true)
    }
}
