//! The chat bot front end.
//!
//! Messages arrive as gateway events. The ones in the bot's channel that start with the command
//! prefix are handled one at a time and each gets a green or red embed in reply.

mod command;

use crate::api::{ChatClient, ChatMessage, Embed, Mode, GREEN, RED};
use crate::commands::{self, WhitelistNotUpdated};
use crate::error::{error_type, ErrorType};
use crate::{Config, Result};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::prelude::{Context, EventHandler};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub use command::{help, BotCommand, Permission};

/// Handles chat commands from one channel.
pub struct Bot {
    client: Box<dyn ChatClient>,
    config: Config,
    mode: Mode,
}

impl Bot {
    pub fn new(client: Box<dyn ChatClient>, config: Config, mode: Mode) -> Self {
        Self {
            client,
            config,
            mode,
        }
    }

    /// Handles one message. Returns `false` if the message is not a command or was posted by a
    /// bot.
    pub async fn handle(&self, message: &ChatMessage) -> Result<bool> {
        if message.author.bot {
            return Ok(false);
        }
        let prefix = &self.config.discord().prefix;
        let embed = match BotCommand::parse(prefix, &message.content) {
            Ok(None) => return Ok(false),
            Ok(Some(command)) => {
                info!("{} from {}", message.content.trim(), message.author.id);
                if self.allowed(message, command.permission()).await? {
                    self.execute(&command).await
                } else {
                    warn!("{} may not use {}", message.author.id, command.verb());
                    failure(format!(
                        "You do not have permission to use `{prefix}{}`.",
                        command.verb()
                    ))
                }
            }
            Err(e) => failure(e.to_string()),
        };
        self.client.reply(message, embed).await?;
        Ok(true)
    }

    async fn allowed(&self, message: &ChatMessage, permission: Permission) -> Result<bool> {
        if permission == Permission::Anyone {
            return Ok(true);
        }
        let discord = self.config.discord();
        let roles = self.client.roles(&message.author.id).await?;
        let has = |role: &str| roles.iter().any(|r| r == role);
        Ok(match permission {
            Permission::Anyone => true,
            Permission::Member => has(&discord.role) || has(&discord.mod_role),
            Permission::Moderator => has(&discord.mod_role),
        })
    }

    async fn execute(&self, command: &BotCommand) -> Embed {
        let prefix = &self.config.discord().prefix;
        match command {
            BotCommand::Join { name, id, game } => {
                match commands::join(&self.config, self.mode, name, id, game.as_deref()).await {
                    Ok(out) => success(format!("{}, welcome aboard!", out.message())),
                    Err(e) => self.error_reply(command, e),
                }
            }
            BotCommand::Leave { name, game } => {
                match commands::leave(&self.config, self.mode, name, game.as_deref()).await {
                    Ok(out) => success(format!("{}, sorry to see you go.", out.message())),
                    Err(e) => self.error_reply(command, e),
                }
            }
            BotCommand::Run { task } => match commands::run(&self.config, self.mode, task).await {
                Ok(out) => {
                    let succeeded = out.structure().map(|o| o.success).unwrap_or(false);
                    if succeeded {
                        success(out.message())
                    } else {
                        failure(out.message())
                    }
                }
                Err(e) => self.error_reply(command, e),
            },
            BotCommand::Help => Embed::new("Commands", help(prefix), GREEN),
        }
    }

    /// Chooses what to tell the user about `e`.
    fn error_reply(&self, command: &BotCommand, e: anyhow::Error) -> Embed {
        error!("{} failed: {e:#}", command.verb());
        let prefix = &self.config.discord().prefix;
        if let Some(partial) = e.downcast_ref::<WhitelistNotUpdated>() {
            return failure(format!(
                "{partial}. Ask a moderator to update the whitelist by hand."
            ));
        }
        match (error_type(&e), command) {
            (Some(ErrorType::InvalidInput), _) => failure(classified_message(&e)),
            (Some(ErrorType::NotFound), BotCommand::Leave { name, .. }) => failure(format!(
                "Could not find `{name}` in this month's ledger. Check the spelling and try again."
            )),
            _ => failure(format!(
                "Something went wrong. Use `{prefix}help` to check how to use `{prefix}{}`.",
                command.verb()
            )),
        }
    }
}

/// Feeds the messages of one channel to a [`Bot`].
pub struct Handler {
    bot: Bot,
    channel: ChannelId,
    /// Held while a command runs, so commands never overlap.
    busy: Mutex<()>,
}

impl Handler {
    pub fn new(bot: Bot, channel: ChannelId) -> Self {
        Self {
            bot,
            channel,
            busy: Mutex::new(()),
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!(
            "Connected as {}, listening in channel {}",
            ready.user.name, self.channel
        );
    }

    async fn message(&self, _: Context, message: Message) {
        if message.channel_id != self.channel {
            return;
        }
        let message = ChatMessage::from(&message);
        let _busy = self.busy.lock().await;
        if let Err(e) = self.bot.handle(&message).await {
            error!("Unable to handle message {}: {e:#}", message.id);
        }
    }
}

fn success(description: impl Into<String>) -> Embed {
    Embed::new("Done", description, GREEN)
}

fn failure(description: impl Into<String>) -> Embed {
    Embed::new("Sorry", description, RED)
}

/// The message of the classified error in the chain of `e`, without the context added above it.
fn classified_message(e: &anyhow::Error) -> String {
    e.chain()
        .find(|cause| cause.downcast_ref::<crate::Error>().is_some())
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Author;
    use crate::model::CellRef;
    use crate::test::TestEnv;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const MEMBER: &str = "811001122334455667";
    const MODERATOR: &str = "811001122334455668";

    fn message(id: u64, user: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            author: Author {
                id: user.to_string(),
                bot: user == "bot",
            },
            content: content.to_string(),
        }
    }

    /// A chat channel held in memory.
    #[derive(Default, Clone)]
    struct FakeChat {
        roles: HashMap<String, Vec<String>>,
        replies: Arc<Mutex<Vec<(String, Embed)>>>,
    }

    impl FakeChat {
        fn with_user(mut self, user: &str, roles: &[&str]) -> Self {
            self.roles.insert(
                user.to_string(),
                roles.iter().map(|r| r.to_string()).collect(),
            );
            self
        }

        fn replies(&self) -> Vec<(String, Embed)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatClient for FakeChat {
        async fn roles(&self, user_id: &str) -> Result<Vec<String>> {
            Ok(self.roles.get(user_id).cloned().unwrap_or_default())
        }

        async fn reply(&self, message: &ChatMessage, embed: Embed) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((message.id.clone(), embed));
            Ok(())
        }
    }

    fn bot(env: &TestEnv, chat: &FakeChat) -> Bot {
        Bot::new(Box::new(chat.clone()), env.config(), Mode::Test)
    }

    /// Hands every message to the bot in order and returns how many were commands.
    async fn deliver(bot: &Bot, messages: &[ChatMessage]) -> usize {
        let mut handled = 0;
        for message in messages {
            if bot.handle(message).await.unwrap() {
                handled += 1;
            }
        }
        handled
    }

    #[tokio::test]
    async fn test_ignores_bots_and_chat() {
        let env = TestEnv::new().await;
        let chat = FakeChat::default().with_user("1", &[MEMBER]);
        let bot = bot(&env, &chat);
        let messages = [
            message(10, "bot", "-help"),
            message(11, "1", "hello -help"),
            message(12, "1", "-dance"),
        ];
        assert_eq!(0, deliver(&bot, &messages).await);
        assert!(chat.replies().is_empty());
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let env = TestEnv::new().await;
        let chat = FakeChat::default().with_user("1", &[MEMBER]);
        let bot = bot(&env, &chat);

        let messages = [
            message(11, "1", "-join bob 76561198000000042"),
            message(12, "bot", "-join robot 1"),
            message(13, "1", "just chatting"),
        ];
        assert_eq!(1, deliver(&bot, &messages).await);
        assert_eq!(Some("Bob"), env.get_state().cell("October", CellRef::new(7, 1)));

        let messages = [message(14, "1", "-leave bob"), message(15, "1", "-leave nobody")];
        assert_eq!(2, deliver(&bot, &messages).await);

        let replies = chat.replies();
        assert_eq!(3, replies.len());
        assert_eq!(("11".to_string(), GREEN), (replies[0].0.clone(), replies[0].1.color));
        assert!(replies[0].1.description.contains("Added Bob"));
        assert_eq!(GREEN, replies[1].1.color);
        assert_eq!(RED, replies[2].1.color);
        assert!(replies[2].1.description.contains("Could not find `nobody`"));
        assert_eq!(Some("Charlie"), env.get_state().cell("October", CellRef::new(7, 1)));
    }

    #[tokio::test]
    async fn test_invalid_input_is_shown() {
        let env = TestEnv::new().await;
        let chat = FakeChat::default().with_user("1", &[MEMBER]);
        let bot = bot(&env, &chat);

        let messages = [
            message(11, "1", "-join b0b 1"),
            message(12, "1", "-join alice 1"),
            message(13, "1", "-join"),
        ];
        deliver(&bot, &messages).await;

        let replies = chat.replies();
        assert!(replies.iter().all(|(_, embed)| embed.color == RED));
        assert!(replies[0].1.description.contains("cannot contain numbers"));
        assert!(replies[1].1.description.contains("Alice"));
        assert!(replies[2].1.description.starts_with("Usage"));
    }

    #[tokio::test]
    async fn test_role_gating() {
        let env = TestEnv::new().await;
        let chat = FakeChat::default()
            .with_user("1", &[MEMBER])
            .with_user("2", &[MODERATOR])
            .with_user("3", &[]);
        let bot = bot(&env, &chat);

        let messages = [
            message(11, "3", "-join eve 1"),
            message(12, "1", "-run reset_status"),
            message(13, "2", "-run reset_status"),
            message(14, "3", "-help"),
            message(15, "2", "-run tea"),
        ];
        assert_eq!(5, deliver(&bot, &messages).await);

        let colors: Vec<u32> = chat.replies().iter().map(|(_, e)| e.color).collect();
        assert_eq!(vec![RED, RED, GREEN, GREEN, RED], colors);
        let replies = chat.replies();
        assert!(replies[0].1.description.contains("permission"));
        assert_eq!(
            "Task `reset_status` completed successfully!",
            replies[2].1.description
        );
        assert_eq!("Task `tea` could not be found!", replies[4].1.description);
        assert!(!env.get_state().column_a("October").contains(&"Eve".to_string()));
    }

    #[tokio::test]
    async fn test_leave_with_unconfigured_game() {
        let env = TestEnv::new().await;
        let chat = FakeChat::default().with_user("1", &[MEMBER]);
        let bot = bot(&env, &chat);

        deliver(&bot, &[message(11, "1", "-leave alice factorio")]).await;
        let reply = &chat.replies()[0].1;
        assert_eq!(RED, reply.color);
        assert!(!reply.description.contains("Could not find"));
        assert!(reply
            .description
            .starts_with("Alice was removed from the ledger but not the factorio whitelist"));
        assert!(!env.get_state().column_a("October").contains(&"Alice".to_string()));
    }

    #[tokio::test]
    async fn test_generic_failure_points_to_help() {
        let env = TestEnv::new().await;
        let chat = FakeChat::default();
        let bot = bot(&env, &chat);

        let command = BotCommand::Run {
            task: "open".to_string(),
        };
        let reply = bot.error_reply(&command, anyhow::anyhow!("connection reset"));
        assert_eq!(RED, reply.color);
        assert!(reply.description.contains("`-help`"));
        assert!(reply.description.contains("`-run`"));
    }
}
