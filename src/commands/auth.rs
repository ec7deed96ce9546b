//! Authentication command handlers.
//!
//! - `halogen auth` runs the OAuth consent flow
//! - `halogen auth --verify` checks that the credentials can get an access token

use super::Out;
use crate::api::{Credentials, ServiceAccount, TokenProvider};
use crate::{Config, Result};
use anyhow::Context;
use tracing::info;

/// Handles `halogen auth`.
///
/// This is the only command that asks the user to open a browser. It reads the client secret
/// named by `gsheets.cred`, waits for the OAuth callback and saves the token with the scopes in
/// `gsheets.scope`. A service account key needs no consent, so nothing is done for one.
///
/// # Errors
/// Returns an error if the credentials file is missing or the consent flow fails.
pub async fn auth(config: &Config) -> Result<Out<()>> {
    if let Some(account) = ServiceAccount::load(config).await? {
        info!("{} is a service account key", config.client_secret_path().display());
        return Ok(Out::new_message(format!(
            "No authorization needed, halogen signs in as {}",
            account.email()
        )));
    }
    let _ = TokenProvider::initialize(config).await?;
    Ok(Out::new_message("Authorization complete"))
}

/// Handles `halogen auth --verify`.
///
/// Never opens a browser. Refreshes the saved OAuth token, or gets a new token for a service
/// account, which proves the credentials still work.
pub async fn auth_verify(config: &Config) -> Result<Out<()>> {
    let credentials = Credentials::load(config).await.context(
        "Unable to use the credentials in gsheets.cred. \n\n\
        For an OAuth client secret, you should run 'halogen auth' (without the --verify flag).",
    )?;
    match credentials {
        Credentials::Installed(mut provider) => {
            provider
                .refresh()
                .await
                .context("Unable to refresh the token")?;
            Ok(Out::new_message("Your OAuth token is valid!"))
        }
        Credentials::ServiceAccount(account) => {
            account
                .token()
                .await
                .context("Unable to get a token for the service account")?;
            Ok(Out::new_message(format!(
                "The service account {} is valid!",
                account.email()
            )))
        }
        #[cfg(test)]
        Credentials::Bearer(_) => Ok(Out::new_message("Using a fixed access token")),
    }
}
