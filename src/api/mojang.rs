//! Resolves Minecraft player names to UUIDs with the Mojang profile API.

use crate::error::{invalid_input, ErrorType, IntoResult};
use crate::Result;
use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

pub const MOJANG_API: &str = "https://api.mojang.com";

/// Looks up the UUID of a player.
#[async_trait::async_trait]
pub trait ProfileResolver: Send + Sync {
    /// The hyphenated UUID of the player named `name`, e.g.
    /// `069a79f4-44e9-4726-a5be-fca90e38aaf5`.
    async fn uuid(&self, name: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct MojangResolver {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Profile {
    id: String,
}

impl MojangResolver {
    /// A resolver using `base_url` in place of `https://api.mojang.com`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl MojangResolver {
    /// The profile URL of `name`, which is sent as a single escaped path segment.
    fn profile_url(&self, name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Mojang API URL '{}'", self.base_url))
            .pub_result(ErrorType::Config)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid Mojang API URL '{}'", self.base_url))
            .pub_result(ErrorType::Config)?
            .pop_if_empty()
            .extend(["users", "profiles", "minecraft", name]);
        Ok(url)
    }
}

impl Default for MojangResolver {
    fn default() -> Self {
        Self::new(MOJANG_API)
    }
}

#[async_trait::async_trait]
impl ProfileResolver for MojangResolver {
    async fn uuid(&self, name: &str) -> Result<String> {
        let url = self.profile_url(name)?;
        debug!("Resolving the Minecraft UUID of {name}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Unable to reach the Mojang profile API")
            .pub_result(ErrorType::RemoteService)?;

        // Unknown names have been answered with both of these over time.
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT
        ) {
            return Err(invalid_input(format!(
                "There is no Minecraft player named '{name}'"
            )));
        }
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("The Mojang profile API returned {status} for '{name}'"))
                .pub_result(ErrorType::RemoteService);
        }

        let profile: Profile = response
            .json()
            .await
            .context("Unexpected response from the Mojang profile API")
            .pub_result(ErrorType::RemoteService)?;
        let uuid = Uuid::parse_str(&profile.id)
            .with_context(|| format!("Mojang returned an invalid UUID '{}'", profile.id))
            .pub_result(ErrorType::RemoteService)?;
        Ok(uuid.hyphenated().to_string())
    }
}
