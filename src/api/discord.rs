//! The part of Discord that halogen uses. The bot looks up member roles and replies with embeds
//! through `serenity`. Notifications go through a channel webhook instead, which does not need
//! the bot token.

use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::{anyhow, Context};
use serde::Serialize;
use serenity::builder::{CreateAllowedMentions, CreateEmbed, CreateMessage};
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::sync::Arc;
use tracing::{debug, trace};

/// Embed colour for successful replies.
pub const GREEN: u32 = 0x2ecc71;

/// Embed colour for failed replies.
pub const RED: u32 = 0xe74c3c;

/// Embed colour for pool notifications.
pub const BLUE: u32 = 0x3498db;

/// A message posted in the bot's channel.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub author: Author,
    pub content: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Author {
    pub id: String,
    pub bot: bool,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.to_string(),
            author: Author {
                id: message.author.id.to_string(),
                bot: message.author.bot,
            },
            content: message.content.clone(),
        }
    }
}

/// What the bot needs from a chat service besides the messages themselves.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// The role IDs held by the user `user_id`.
    async fn roles(&self, user_id: &str) -> Result<Vec<String>>;

    /// Replies to `message` with a single embed.
    async fn reply(&self, message: &ChatMessage, embed: Embed) -> Result<()>;
}

/// The REST side of the Discord bot, bound to one channel. Messages arrive over the gateway,
/// see `bot::Handler`.
#[derive(Debug, Clone)]
pub struct DiscordClient {
    http: Arc<Http>,
    guild: GuildId,
    channel: ChannelId,
}

impl DiscordClient {
    /// Creates a client for `channel` and looks up the server the channel belongs to, which is
    /// needed to read member roles.
    pub async fn connect(http: Arc<Http>, channel: &str) -> Result<Self> {
        let channel = ChannelId::new(snowflake(channel).context("Invalid discord.channel")?);
        let guild = channel
            .to_channel(&http)
            .await
            .with_context(|| format!("Unable to read the bot channel {channel}"))
            .pub_result(ErrorType::RemoteService)?
            .guild()
            .map(|c| c.guild_id)
            .ok_or_else(|| anyhow!("Channel {channel} is not part of a server"))
            .pub_result(ErrorType::Config)?;
        debug!("Channel {channel} belongs to guild {guild}");
        Ok(Self {
            http,
            guild,
            channel,
        })
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }
}

#[async_trait::async_trait]
impl ChatClient for DiscordClient {
    async fn roles(&self, user_id: &str) -> Result<Vec<String>> {
        let user = UserId::new(snowflake(user_id)?);
        let member = self
            .guild
            .member(&self.http, user)
            .await
            .with_context(|| format!("Unable to look up member {user}"))
            .pub_result(ErrorType::RemoteService)?;
        Ok(member.roles.iter().map(|role| role.to_string()).collect())
    }

    async fn reply(&self, message: &ChatMessage, embed: Embed) -> Result<()> {
        trace!("Replying to {}", message.id);
        let reference = (self.channel, MessageId::new(snowflake(&message.id)?));
        let reply = CreateMessage::new()
            .embed(embed.into())
            .reference_message(reference)
            .allowed_mentions(CreateAllowedMentions::new());
        self.channel
            .send_message(&self.http, reply)
            .await
            .context("Unable to send the Discord reply")
            .pub_result(ErrorType::RemoteService)?;
        Ok(())
    }
}

/// Parses a Discord ID. Zero is not a valid ID.
fn snowflake(id: &str) -> Result<u64> {
    match id.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("'{id}' is not a Discord ID")).pub_result(ErrorType::Config),
    }
}

async fn check_status(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("Discord returned {status} for {what}: {body}"))
        .pub_result(ErrorType::RemoteService)
}

/// A Discord channel webhook, used to post notifications.
#[derive(Debug, Clone)]
pub struct Webhook {
    http: reqwest::Client,
    url: String,
}

impl Webhook {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Posts `message` to the webhook.
    pub async fn post(&self, message: &WebhookMessage) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(message)
            .send()
            .await
            .context("Unable to post to the Discord webhook")
            .pub_result(ErrorType::RemoteService)?;
        check_status(response, "webhook").await?;
        Ok(())
    }
}

/// The body of a webhook post.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct WebhookMessage {
    pub content: String,
    pub embeds: Vec<Embed>,
}

/// A Discord rich embed.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Embed {
    pub fn new(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            color,
            ..Default::default()
        }
    }

    /// Makes the title a link to `url`. Empty URLs are ignored.
    pub fn url(mut self, url: &str) -> Self {
        if !url.is_empty() {
            self.url = Some(url.to_string());
        }
        self
    }

    /// Empty URLs are ignored.
    pub fn thumbnail(mut self, url: &str) -> Self {
        if !url.is_empty() {
            self.thumbnail = Some(Thumbnail {
                url: url.to_string(),
            });
        }
        self
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        inline: bool,
    ) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

impl From<Embed> for CreateEmbed {
    fn from(embed: Embed) -> Self {
        let mut create = CreateEmbed::new()
            .title(embed.title)
            .description(embed.description)
            .colour(embed.color);
        if let Some(url) = embed.url {
            create = create.url(url);
        }
        if let Some(thumbnail) = embed.thumbnail {
            create = create.thumbnail(thumbnail.url);
        }
        for field in embed.fields {
            create = create.field(field.name, field.value, field.inline);
        }
        create
    }
}
