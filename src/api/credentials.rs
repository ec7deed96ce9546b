//! Where Sheets API access tokens come from.
//!
//! `gsheets.cred` names either an installed-app client secret, which needs `halogen auth` once,
//! or a service account key, which signs its own token requests and never needs a browser.

use crate::api::files::CredentialFile;
use crate::api::TokenProvider;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use tracing::debug;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

/// A source of access tokens for the Sheets and Drive APIs.
pub enum Credentials {
    /// The token saved by `halogen auth`.
    Installed(TokenProvider),
    ServiceAccount(ServiceAccount),
    /// A fixed access token.
    #[cfg(test)]
    Bearer(String),
}

impl Credentials {
    /// Loads the credentials named by `gsheets.cred`.
    pub async fn load(config: &Config) -> Result<Self> {
        let path = config.client_secret_path();
        let file = CredentialFile::load(&path)
            .await
            .pub_result(ErrorType::Config)?;
        match file {
            CredentialFile::Installed(_) => {
                let provider =
                    TokenProvider::load(path, config.token_path(), &config.gsheets().scope)
                        .await?;
                Ok(Credentials::Installed(provider))
            }
            CredentialFile::ServiceAccount(key) => Ok(Credentials::ServiceAccount(
                ServiceAccount::new(key, &config.gsheets().scope).await?,
            )),
        }
    }

    /// A current access token, refreshed or re-issued when needed.
    pub async fn access_token(&mut self) -> Result<String> {
        match self {
            Credentials::Installed(provider) => {
                Ok(provider.token_with_refresh().await?.to_string())
            }
            Credentials::ServiceAccount(account) => account.token().await,
            #[cfg(test)]
            Credentials::Bearer(token) => Ok(token.clone()),
        }
    }
}

/// Issues tokens for a service account. Tokens are cached in memory and renewed by the
/// authenticator before they expire.
pub struct ServiceAccount {
    email: String,
    scopes: Vec<String>,
    authenticator: DefaultAuthenticator,
}

impl ServiceAccount {
    /// The service account named by `gsheets.cred`, or `None` if the file is an OAuth client
    /// secret.
    pub async fn load(config: &Config) -> Result<Option<Self>> {
        let file = CredentialFile::load(&config.client_secret_path())
            .await
            .pub_result(ErrorType::Config)?;
        match file {
            CredentialFile::Installed(_) => Ok(None),
            CredentialFile::ServiceAccount(key) => {
                Ok(Some(Self::new(key, &config.gsheets().scope).await?))
            }
        }
    }

    pub async fn new(key: ServiceAccountKey, scopes: &[String]) -> Result<Self> {
        let email = key.client_email.clone();
        let authenticator = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .with_context(|| format!("Unable to use the service account key of {email}"))
            .pub_result(ErrorType::Config)?;
        debug!("Using service account {email}");
        Ok(Self {
            email,
            scopes: scopes.to_vec(),
            authenticator,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub async fn token(&self) -> Result<String> {
        let token = self
            .authenticator
            .token(&self.scopes)
            .await
            .with_context(|| format!("Unable to get a token for {}", self.email))
            .pub_result(ErrorType::RemoteService)?;
        token
            .token()
            .map(str::to_string)
            .with_context(|| format!("Google issued no access token for {}", self.email))
            .pub_result(ErrorType::RemoteService)
    }
}
