//! Keeps the per-game whitelist files in step with the payees.
//!
//! Two file formats are supported: a JSON array of `{"name", "uuid"}` records (Minecraft), where
//! the UUID is looked up with the Mojang profile API, and a text file with one identifier per line
//! (Valheim).

use crate::api::{MojangResolver, ProfileResolver};
use crate::config::WhitelistFormat;
use crate::error::{invalid_input, not_found};
use crate::{utils, Config, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// What to do to a whitelist.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    /// Add the new ID.
    Add,
    /// Remove the old ID.
    Remove,
    /// Replace the old ID with the new one.
    Update,
}

serde_plain::derive_display_from_serialize!(Instruction);
serde_plain::derive_fromstr_from_deserialize!(Instruction);

/// The identifiers involved in a whitelist change. Only `new` is used when adding and only `old`
/// when removing.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Ids {
    pub old: String,
    pub new: String,
}

impl Ids {
    pub fn add(new: impl Into<String>) -> Self {
        Self {
            old: String::new(),
            new: new.into(),
        }
    }

    pub fn remove(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: String::new(),
        }
    }

    /// The identifiers that take part in `instruction`.
    fn for_instruction(&self, instruction: Instruction) -> (&str, &str) {
        let old = self.old.trim();
        let new = self.new.trim();
        match instruction {
            Instruction::Add => ("", new),
            Instruction::Remove => (old, ""),
            Instruction::Update => (old, new),
        }
    }
}

/// What `sync` changed.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct SyncOutcome {
    pub game: String,
    pub removed: usize,
    pub added: bool,
    /// `false` when the game's whitelist is not managed.
    pub managed: bool,
}

/// A record of a JSON whitelist.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub name: String,
    pub uuid: String,
}

/// Applies whitelist instructions for the games in the configuration.
pub struct Whitelists {
    config: Config,
    resolver: Box<dyn ProfileResolver>,
}

impl Whitelists {
    pub fn new(config: &Config) -> Self {
        Self::with_resolver(config, Box::new(MojangResolver::default()))
    }

    pub fn with_resolver(config: &Config, resolver: Box<dyn ProfileResolver>) -> Self {
        Self {
            config: config.clone(),
            resolver,
        }
    }

    /// Applies `instruction` to the whitelist of `game` (matched case-insensitively).
    pub async fn sync(
        &self,
        game: &str,
        instruction: Instruction,
        ids: &Ids,
    ) -> Result<SyncOutcome> {
        let game = self
            .config
            .game(game.trim())
            .ok_or_else(|| not_found(format!("The game '{game}' is not configured")))?;
        let mut outcome = SyncOutcome {
            game: game.name.clone(),
            ..Default::default()
        };
        if !game.whitelist {
            info!("The {} whitelist is not managed, nothing to do", game.name);
            return Ok(outcome);
        }
        outcome.managed = true;

        let format = game.whitelist_format().ok_or_else(|| {
            invalid_input(format!(
                "No whitelist format is known for '{}', set 'format' to 'json' or 'text'",
                game.name
            ))
        })?;
        let (old, new) = ids.for_instruction(instruction);
        if old.is_empty() && new.is_empty() {
            return Err(invalid_input(format!(
                "An ID is needed to {instruction} a whitelist entry"
            )));
        }

        let path = self.config.whitelist_path(game);
        debug!("{instruction} on {} ({format}): {old:?} -> {new:?}", path.display());
        let (removed, added) = match format {
            WhitelistFormat::Json => self.sync_json(&path, old, new).await?,
            WhitelistFormat::Text => sync_text(&path, old, new).await?,
        };
        outcome.removed = removed;
        outcome.added = added;
        info!(
            "Updated the {} whitelist: {removed} removed, {} added",
            game.name,
            usize::from(added)
        );
        Ok(outcome)
    }

    async fn sync_json(&self, path: &Path, old: &str, new: &str) -> Result<(usize, bool)> {
        let mut entries: Vec<WhitelistEntry> = if path.is_file() {
            utils::deserialize(path).await?
        } else {
            Vec::new()
        };

        let before = entries.len();
        if !old.is_empty() {
            entries.retain(|e| e.name != old);
        }
        let removed = before - entries.len();

        let added = !new.is_empty() && !entries.iter().any(|e| e.name == new);
        if added {
            let uuid = self.resolver.uuid(new).await?;
            entries.push(WhitelistEntry {
                name: new.to_string(),
                uuid,
            });
        }

        if removed > 0 || added {
            utils::serialize(path, &entries).await?;
        }
        Ok((removed, added))
    }
}

async fn sync_text(path: &Path, old: &str, new: &str) -> Result<(usize, bool)> {
    let content = if path.is_file() {
        utils::read(path).await?
    } else {
        String::new()
    };
    let mut lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();

    let before = lines.len();
    if !old.is_empty() {
        lines.retain(|l| l.trim() != old);
    }
    let removed = before - lines.len();

    let added = !new.is_empty() && !lines.iter().any(|l| l.trim() == new);
    if added {
        lines.push(new);
    }

    if removed > 0 || added {
        let mut data = lines.join("\n");
        data.push('\n');
        utils::write(path, data).await?;
    }
    Ok((removed, added))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{error_type, ErrorType};
    use crate::test::TestEnv;

    /// Resolves every name to a fixed UUID.
    struct FixedResolver;

    #[async_trait::async_trait]
    impl ProfileResolver for FixedResolver {
        async fn uuid(&self, name: &str) -> Result<String> {
            Ok(format!("00000000-0000-0000-0000-{:0>12}", name.len()))
        }
    }

    fn whitelists(env: &TestEnv) -> Whitelists {
        Whitelists::with_resolver(&env.config(), Box::new(FixedResolver))
    }

    #[test]
    fn test_instruction_from_str() {
        assert_eq!(Instruction::Update, "update".parse().unwrap());
        assert_eq!("remove", Instruction::Remove.to_string());
        assert!("delete".parse::<Instruction>().is_err());
    }

    #[tokio::test]
    async fn test_json_update() {
        let env = TestEnv::new().await;
        let path = env.root().join("whitelist.json");
        utils::write(
            &path,
            r#"[{"name": "steve", "uuid": "a"}, {"name": "alex", "uuid": "b"}]"#,
        )
        .await
        .unwrap();

        let ids = Ids {
            old: "steve".to_string(),
            new: "herobrine".to_string(),
        };
        let outcome = whitelists(&env)
            .sync("minecraft", Instruction::Update, &ids)
            .await
            .unwrap();
        assert_eq!(1, outcome.removed);
        assert!(outcome.added);

        let expected = r#"[
    {
        "name": "alex",
        "uuid": "b"
    },
    {
        "name": "herobrine",
        "uuid": "00000000-0000-0000-0000-000000000009"
    }
]"#;
        assert_eq!(expected, utils::read(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_json_add_existing_is_a_no_op() {
        let env = TestEnv::new().await;
        let path = env.root().join("whitelist.json");
        let original = r#"[{"name": "alex", "uuid": "b"}]"#;
        utils::write(&path, original).await.unwrap();

        let outcome = whitelists(&env)
            .sync("Minecraft", Instruction::Add, &Ids::add("alex"))
            .await
            .unwrap();
        assert!(!outcome.added);
        assert_eq!(original, utils::read(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_text_add_and_remove() {
        let env = TestEnv::new().await;
        let path = env.root().join("permittedlist.txt");
        utils::write(&path, "// comment\n76561198000000001\n").await.unwrap();
        let whitelists = whitelists(&env);

        whitelists
            .sync("Valheim", Instruction::Add, &Ids::add("76561198000000002"))
            .await
            .unwrap();
        assert_eq!(
            "// comment\n76561198000000001\n76561198000000002\n",
            utils::read(&path).await.unwrap()
        );

        let outcome = whitelists
            .sync("valheim", Instruction::Remove, &Ids::remove("76561198000000001"))
            .await
            .unwrap();
        assert_eq!(1, outcome.removed);
        assert!(!outcome.added);
        assert_eq!(
            "// comment\n76561198000000002\n",
            utils::read(&path).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_unmanaged_and_unknown_games() {
        let env = TestEnv::new().await;
        let whitelists = whitelists(&env);

        let outcome = whitelists
            .sync("Terraria", Instruction::Add, &Ids::add("x"))
            .await
            .unwrap();
        assert!(!outcome.managed);

        let e = whitelists
            .sync("Factorio", Instruction::Add, &Ids::add("x"))
            .await
            .unwrap_err();
        assert_eq!(Some(ErrorType::NotFound), error_type(&e));
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let env = TestEnv::new().await;
        let e = whitelists(&env)
            .sync("Valheim", Instruction::Remove, &Ids::add("only-new"))
            .await
            .unwrap_err();
        assert_eq!(Some(ErrorType::InvalidInput), error_type(&e));
    }
}
