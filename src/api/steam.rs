//! Checks Steam IDs against the Steam Web API `GetPlayerSummaries` endpoint.

use crate::config::SteamConfig;
use crate::error::{invalid_input, ErrorType, IntoResult};
use crate::Result;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::debug;

pub const PLAYER_SUMMARIES: &str = "https://api.steampowered.com/ISteamUser/GetPlayerSummaries/v2/";

/// Verifies Steam IDs. Does nothing when no API key is configured.
#[derive(Debug, Clone)]
pub struct SteamProfiles {
    http: reqwest::Client,
    key: String,
    url: String,
}

#[derive(Deserialize)]
struct Summaries {
    response: SummariesResponse,
}

#[derive(Deserialize)]
struct SummariesResponse {
    #[serde(default)]
    players: Vec<Player>,
}

#[derive(Deserialize)]
struct Player {
    steamid: String,
}

impl SteamProfiles {
    pub fn new(config: &SteamConfig) -> Self {
        let url = if config.url.is_empty() {
            PLAYER_SUMMARIES.to_string()
        } else {
            config.url.clone()
        };
        Self {
            http: reqwest::Client::new(),
            key: config.key.clone(),
            url,
        }
    }

    pub fn enabled(&self) -> bool {
        !self.key.is_empty()
    }

    /// Fails with `InvalidInput` if `id` is not a Steam ID with a profile.
    pub async fn verify(&self, id: &str) -> Result<()> {
        if !self.enabled() {
            return Ok(());
        }
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid_input(format!("'{id}' is not a Steam ID")));
        }

        debug!("Verifying Steam ID {id}");
        let response = self
            .http
            .get(&self.url)
            .query(&[("key", self.key.as_str()), ("steamids", id)])
            .send()
            .await
            .context("Unable to reach the Steam Web API")
            .pub_result(ErrorType::RemoteService)?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("The Steam Web API returned {status}"))
                .pub_result(ErrorType::RemoteService);
        }
        let summaries: Summaries = response
            .json()
            .await
            .context("Unexpected response from the Steam Web API")
            .pub_result(ErrorType::RemoteService)?;

        if summaries.response.players.iter().any(|p| p.steamid == id) {
            Ok(())
        } else {
            Err(invalid_input(format!("There is no Steam profile with the ID {id}")))
        }
    }
}
