use crate::error::invalid_input;
use crate::Result;

/// A command typed into the bot's channel.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BotCommand {
    Join {
        name: String,
        id: String,
        game: Option<String>,
    },
    Leave {
        name: String,
        game: Option<String>,
    },
    Run {
        task: String,
    },
    Help,
}

/// Who may use a command.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub enum Permission {
    Anyone,
    /// Holders of `discord.role` or `discord.modRole`.
    Member,
    /// Holders of `discord.modRole`.
    Moderator,
}

impl BotCommand {
    /// Parses `content`. Returns `Ok(None)` for messages that do not start with `prefix` followed
    /// by a known command, so chat like `-_-` or another bot's commands are left alone.
    pub fn parse(prefix: &str, content: &str) -> Result<Option<Self>> {
        let Some(rest) = content.trim().strip_prefix(prefix) else {
            return Ok(None);
        };
        let mut words = rest.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
            ("join", [name, id]) => BotCommand::Join {
                name: name.clone(),
                id: id.clone(),
                game: None,
            },
            ("join", [name, id, game]) => BotCommand::Join {
                name: name.clone(),
                id: id.clone(),
                game: Some(game.clone()),
            },
            ("join", _) => {
                return Err(invalid_input(format!("Usage: `{prefix}join <name> <id> [game]`")))
            }
            ("leave", [name]) => BotCommand::Leave {
                name: name.clone(),
                game: None,
            },
            ("leave", [name, game]) => BotCommand::Leave {
                name: name.clone(),
                game: Some(game.clone()),
            },
            ("leave", _) => {
                return Err(invalid_input(format!("Usage: `{prefix}leave <name> [game]`")))
            }
            ("run", [task]) => BotCommand::Run { task: task.clone() },
            ("run", _) => return Err(invalid_input(format!("Usage: `{prefix}run <task>`"))),
            ("help", _) => BotCommand::Help,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    /// The command word, e.g. `join`.
    pub fn verb(&self) -> &'static str {
        match self {
            BotCommand::Join { .. } => "join",
            BotCommand::Leave { .. } => "leave",
            BotCommand::Run { .. } => "run",
            BotCommand::Help => "help",
        }
    }

    pub fn permission(&self) -> Permission {
        match self {
            BotCommand::Join { .. } | BotCommand::Leave { .. } => Permission::Member,
            BotCommand::Run { .. } => Permission::Moderator,
            BotCommand::Help => Permission::Anyone,
        }
    }
}

/// The text of the `help` reply.
pub fn help(prefix: &str) -> String {
    format!(
        "`{prefix}join <name> <id> [game]` adds you to this month's ledger, and to the game's \
        whitelist if a game is given.\n\
        `{prefix}leave <name> [game]` removes you again.\n\
        `{prefix}run <task>` runs a scheduled task now (moderators only).\n\
        `{prefix}help` shows this message."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_type, ErrorType};

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Some(BotCommand::Join {
                name: "mary-jane".to_string(),
                id: "76561198000000001".to_string(),
                game: Some("Valheim".to_string()),
            }),
            BotCommand::parse("-", "-join mary-jane 76561198000000001 Valheim").unwrap()
        );
        assert_eq!(
            Some(BotCommand::Leave {
                name: "bob".to_string(),
                game: None,
            }),
            BotCommand::parse("-", "  -LEAVE   bob ").unwrap()
        );
        assert_eq!(
            Some(BotCommand::Run {
                task: "open".to_string()
            }),
            BotCommand::parse("-", "-run open").unwrap()
        );
        assert_eq!(Some(BotCommand::Help), BotCommand::parse("!", "!help me").unwrap());
    }

    #[test]
    fn test_ignore_other_messages() {
        assert_eq!(None, BotCommand::parse("-", "hello there").unwrap());
        assert_eq!(None, BotCommand::parse("-", "-").unwrap());
        assert_eq!(None, BotCommand::parse("!", "-help").unwrap());
    }

    #[test]
    fn test_ignore_unknown_verbs() {
        for content in ["-dance", "-_-", "-1", "-play music now"] {
            assert_eq!(None, BotCommand::parse("-", content).unwrap(), "{content}");
        }
    }

    #[test]
    fn test_bad_arguments() {
        for content in ["-join bob", "-leave", "-run", "-run a b"] {
            let e = BotCommand::parse("-", content).unwrap_err();
            assert_eq!(Some(ErrorType::InvalidInput), error_type(&e), "{content}");
        }
    }

    #[test]
    fn test_permissions() {
        let run = BotCommand::Run {
            task: "open".to_string(),
        };
        assert_eq!(Permission::Moderator, run.permission());
        assert_eq!(Permission::Anyone, BotCommand::Help.permission());
        assert!(Permission::Member < Permission::Moderator);
    }
}
