//! OAuth 2.0 for the Google Sheets API.
//!
//! - `halogen auth` runs the consent flow once: it prints the Google consent URL, waits for the
//!   redirect on a local callback server, exchanges the code and saves `token.json`.
//! - Every other command loads `token.json` and refreshes the access token when it is about to
//!   expire. This never needs a browser, so the bot and the scheduled runner can run headless.

use crate::api::files::{SecretFile, TokenFile, REDIRECT};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::{ensure, Context};
use chrono::{DateTime, TimeDelta, Utc};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use std::convert::Infallible;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};

const OAUTH_CALLBACK_PORT: u16 = 3030;

/// Holds the OAuth token for the Sheets API and refreshes it when needed.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    secret: SecretFile,
    token: TokenFile,
    token_path: PathBuf,
}

impl TokenProvider {
    /// Loads the client secret and a previously saved token. Fails if `halogen auth` has not been
    /// run, or if the token lacks one of the scopes in `gsheets.scope`.
    pub async fn load(
        secret_path: PathBuf,
        token_path: PathBuf,
        scopes: &[String],
    ) -> Result<Self> {
        let secret = SecretFile::load(&secret_path)
            .await
            .pub_result(ErrorType::Config)?;
        let token = TokenFile::load(&token_path, scopes)
            .await
            .context("Unable to load the OAuth token, run 'halogen auth' first")
            .pub_result(ErrorType::Config)?;
        Ok(Self {
            secret,
            token,
            token_path,
        })
    }

    /// Runs the consent flow and saves the resulting token.
    ///
    /// This is the only place that needs a person at a browser.
    pub async fn initialize(config: &Config) -> Result<Self> {
        let secret = SecretFile::load(&config.client_secret_path())
            .await
            .pub_result(ErrorType::Config)?;
        let scopes = config.gsheets().scope.clone();
        let redirect = format!("{REDIRECT}:{OAUTH_CALLBACK_PORT}");

        let client = BasicClient::new(ClientId::new(secret.client_id().to_string()))
            .set_client_secret(ClientSecret::new(secret.client_secret().to_string()))
            .set_auth_uri(AuthUrl::new(secret.auth_uri().to_string())?)
            .set_token_uri(TokenUrl::new(secret.token_uri().to_string())?)
            .set_redirect_uri(RedirectUrl::new(redirect)?);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge)
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");
        for scope in &scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf) = request.url();

        info!("Open this URL in your browser to authorize halogen:\n\n{auth_url}\n");
        info!("Local callback server listening on http://localhost:{OAUTH_CALLBACK_PORT}");
        let callback = wait_for_callback(OAUTH_CALLBACK_PORT).await?;
        ensure!(
            callback.state == *csrf.secret(),
            "The OAuth state did not match, please try again"
        );

        let response = client
            .exchange_code(AuthorizationCode::new(callback.code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client()?)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to exchange the authorization code: {e}"))
            .pub_result(ErrorType::RemoteService)?;

        let refresh_token = response
            .refresh_token()
            .context("Google did not return a refresh token")?
            .secret()
            .to_string();
        let token = TokenFile::new(
            scopes,
            response.access_token().secret().to_string(),
            refresh_token,
            expires_at(response.expires_in()),
        );
        let token_path = config.token_path();
        token.save(&token_path).await?;
        info!("Authorization successful, token saved to {}", token_path.display());

        Ok(Self {
            secret,
            token,
            token_path,
        })
    }

    /// The current access token, which may be expired.
    pub fn token(&self) -> &str {
        self.token.access_token()
    }

    /// The current access token, refreshed first if it expires within five minutes.
    pub async fn token_with_refresh(&mut self) -> Result<&str> {
        if self.token.is_expired() {
            self.refresh().await?;
        }
        Ok(self.token.access_token())
    }

    /// Exchanges the refresh token for a new access token and saves it.
    pub async fn refresh(&mut self) -> Result<()> {
        debug!("Refreshing the OAuth access token");
        let client = BasicClient::new(ClientId::new(self.secret.client_id().to_string()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret().to_string()))
            .set_token_uri(TokenUrl::new(self.secret.token_uri().to_string())?);

        let refresh_token = RefreshToken::new(self.token.refresh_token().to_string());
        let response = client
            .exchange_refresh_token(&refresh_token)
            .request_async(&http_client()?)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to refresh the OAuth token: {e}"))
            .pub_result(ErrorType::RemoteService)?;

        self.token.update(
            response.access_token().secret().to_string(),
            expires_at(response.expires_in()),
            response.refresh_token().map(|t| t.secret().to_string()),
        );
        debug!("Token scopes: {:?}", self.token.scopes());
        self.token.save(&self.token_path).await
    }
}

/// An HTTP client for token exchanges, which must not follow redirects.
fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Unable to build the HTTP client")
}

fn expires_at(expires_in: Option<Duration>) -> DateTime<Utc> {
    let lifetime = expires_in
        .and_then(|d| TimeDelta::from_std(d).ok())
        .unwrap_or_else(|| TimeDelta::hours(1));
    Utc::now() + lifetime
}

/// The query parameters Google sends to the redirect URI.
#[derive(Debug, Clone, Eq, PartialEq)]
struct Callback {
    code: String,
    state: String,
}

fn parse_callback(query: Option<&str>) -> Option<Callback> {
    let mut code = None;
    let mut state = None;
    for (key, value) in url::form_urlencoded::parse(query?.as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(Callback {
        code: code?,
        state: state?,
    })
}

/// Serves HTTP on localhost until a request carrying `code` and `state` arrives.
async fn wait_for_callback(port: u16) -> Result<Callback> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Unable to listen on localhost:{port}"))?;
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Callback>(1);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted.context("Failed to accept a connection")?,
            Some(callback) = rx.recv() => return Ok(callback),
        };

        let tx = tx.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let tx = tx.clone();
                async move {
                    let body = match parse_callback(req.uri().query()) {
                        Some(callback) => {
                            let _ = tx.send(callback).await;
                            "halogen is authorized. You can close this window."
                        }
                        None => "Waiting for the authorization code.",
                    };
                    Ok::<_, Infallible>(Response::new(body.to_string()))
                }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("OAuth callback connection ended with an error: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback() {
        let callback = parse_callback(Some("state=abc%3D&code=4%2F0Ad&scope=x")).unwrap();
        assert_eq!("4/0Ad", callback.code);
        assert_eq!("abc=", callback.state);
    }

    #[test]
    fn test_parse_callback_incomplete() {
        assert!(parse_callback(None).is_none());
        assert!(parse_callback(Some("code=abc")).is_none());
        assert!(parse_callback(Some("error=access_denied&state=s")).is_none());
    }

    #[test]
    fn test_expires_at_defaults_to_an_hour() {
        let at = expires_at(None);
        let delta = at - Utc::now();
        assert!(delta > TimeDelta::minutes(59) && delta <= TimeDelta::hours(1));
    }
}
