//! Serialization and deserialization structures for Google credential files.
//! - `client_secret.json`: OAuth 2.0 client credentials from Google Cloud Console
//! - a service account key, also downloaded from Google Cloud Console
//! - `token.json`: the access and refresh tokens halogen receives from Google

use crate::{utils, Result};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::path::Path;
use yup_oauth2::ServiceAccountKey;

const SERVICE_ACCOUNT: &str = "service_account";

/// This redirect needs to be present in the OAuth credential file, or else OAuth will not work.
pub(super) const REDIRECT: &str = "http://localhost";

/// The file named by `gsheets.cred`. Service account keys are recognised by their
/// `"type": "service_account"` field; anything else must be an installed-app client secret.
pub(super) enum CredentialFile {
    Installed(SecretFile),
    ServiceAccount(ServiceAccountKey),
}

impl CredentialFile {
    pub(super) async fn load(path: &Path) -> Result<Self> {
        let data = utils::read(path).await?;
        let value: serde_json::Value = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse JSON file at {}", path.display()))?;
        if value.get("type").and_then(serde_json::Value::as_str) == Some(SERVICE_ACCOUNT) {
            let key = yup_oauth2::parse_service_account_key(&data)
                .with_context(|| format!("Invalid service account key at {}", path.display()))?;
            return Ok(CredentialFile::ServiceAccount(key));
        }
        let secret = serde_json::from_value(value)
            .context("Unable to read the OAuth client secret file")?;
        Ok(CredentialFile::Installed(secret))
    }
}

/// Represents the structure of the `client_secret.json` file downloaded from Google Cloud Console.
///
/// Example:
/// ```json
/// {
///   "installed": {
///     "client_id": "YOUR_CLIENT_ID.apps.googleusercontent.com",
///     "client_secret": "YOUR_CLIENT_SECRET",
///     "redirect_uris": ["http://localhost"],
///     "auth_uri": "https://accounts.google.com/o/oauth2/auth",
///     "token_uri": "https://oauth2.googleapis.com/token"
///   }
/// }
/// ```
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct SecretFile {
    /// Wrapper containing the installed application credentials
    installed: InstalledCredentials,
}

impl SecretFile {
    /// Loads the OAuth client credentials from `path`.
    pub(super) async fn load(path: &Path) -> Result<SecretFile> {
        utils::deserialize(path)
            .await
            .context("Unable to read the OAuth client secret file")
    }

    pub(super) fn client_id(&self) -> &str {
        &self.installed.client_id
    }

    pub(super) fn client_secret(&self) -> &str {
        &self.installed.client_secret
    }

    pub(super) fn auth_uri(&self) -> &str {
        &self.installed.auth_uri
    }

    pub(super) fn token_uri(&self) -> &str {
        &self.installed.token_uri
    }
}

/// The actual OAuth credentials nested within the `client_secret.json` file.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    /// Must contain "http://localhost" (without a port number)
    redirect_uris: RedirectUris,
    auth_uri: String,
    token_uri: String,
}

#[derive(Default, Debug, Clone)]
struct RedirectUris(Vec<String>);

impl Serialize for RedirectUris {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RedirectUris {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<String>::deserialize(deserializer)?;
        if !vec.iter().any(|s| s == REDIRECT || s == "http://127.0.0.1") {
            return Err(D::Error::custom(format!(
                "At least one of the redirects needs to be {REDIRECT}, but this was not found. \
                When creating the OAuth client in Google Cloud Console, you must include \
                '{REDIRECT}'"
            )));
        }
        Ok(RedirectUris(vec))
    }
}

/// How the OAuth token is saved between runs.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) struct TokenFile {
    scopes: Vec<String>,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenFile {
    pub(super) fn new(
        scopes: Vec<String>,
        access_token: String,
        refresh_token: String,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            scopes,
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Loads the token and checks that it was granted every scope in `required`.
    pub(super) async fn load(p: impl AsRef<Path>, required: &[String]) -> Result<Self> {
        let token_file: Self = utils::deserialize(p.as_ref())
            .await
            .context("Unable to deserialize the token JSON file")?;
        token_file.validate_scopes(required)?;
        Ok(token_file)
    }

    /// Writes the token to `path` with permissions that only allow the owner to read it.
    pub(super) async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize token")?;
        utils::write(path, json).await?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, Permissions::from_mode(0o600))
                .context("Failed to set file permissions")?;
        }

        Ok(())
    }

    fn validate_scopes(&self, required: &[String]) -> Result<()> {
        let found_scopes: HashSet<&str> = self.scopes.iter().map(|s| s.as_str()).collect();
        for required_scope in required {
            if !found_scopes.contains(required_scope.as_str()) {
                bail!("OAuth scope '{required_scope}' is missing.");
            }
        }
        Ok(())
    }

    pub(super) fn access_token(&self) -> &str {
        &self.access_token
    }

    pub(super) fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub(super) fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Check if the token is expired or will expire soon (within 5 minutes)
    pub(super) fn is_expired(&self) -> bool {
        let buffer = chrono::Duration::minutes(5);
        self.expires_at <= Utc::now() + buffer
    }

    /// Update the token with new values
    pub(super) fn update(
        &mut self,
        access_token: String,
        expires_at: DateTime<Utc>,
        refresh_token: Option<String>,
    ) {
        self.access_token = access_token;
        self.expires_at = expires_at;
        if let Some(rt) = refresh_token {
            self.refresh_token = rt;
        }
    }
}
