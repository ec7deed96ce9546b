use super::Out;
use crate::api::{DiscordClient, Mode};
use crate::bot::{Bot, Handler};
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use serenity::http::Http;
use serenity::prelude::GatewayIntents;
use std::sync::Arc;
use tracing::info;

/// Connects to the Discord gateway and handles chat commands until the process is stopped.
pub async fn bot(config: Config, mode: Mode) -> Result<Out<()>> {
    let token = config.discord().token.clone();
    let channel = config.discord().channel.clone();

    let http = Arc::new(Http::new(&token));
    let client = DiscordClient::connect(http, &channel).await?;
    let channel = client.channel();
    let handler = Handler::new(Bot::new(Box::new(client), config, mode), channel);

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut gateway = serenity::Client::builder(&token, intents)
        .event_handler(handler)
        .await
        .context("Unable to create the Discord client")
        .pub_result(ErrorType::Config)?;
    info!("Connecting to the Discord gateway");
    gateway
        .start()
        .await
        .context("Lost the Discord gateway connection")
        .pub_result(ErrorType::RemoteService)?;
    Ok(Out::new_message("The bot has stopped"))
}
