use super::{workbook, Out};
use crate::api::{Mode, SteamProfiles};
use crate::model::Payee;
use crate::whitelist::{Ids, Instruction, Whitelists};
use crate::{Config, Result};
use anyhow::Context;
use std::fmt::{self, Display, Formatter};
use tracing::{debug, info};

/// Context for a whitelist failure that happened after the ledger had already been changed.
/// The ledger change is not rolled back.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct WhitelistNotUpdated {
    pub name: String,
    pub game: String,
    pub instruction: Instruction,
}

impl Display for WhitelistNotUpdated {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let change = match self.instruction {
            Instruction::Add => "added to",
            Instruction::Remove => "removed from",
            Instruction::Update => "updated in",
        };
        write!(
            f,
            "{} was {change} the ledger but not the {} whitelist",
            self.name, self.game
        )
    }
}

/// Adds a payee to the current worksheet and, when `game` is given, their ID to that game's
/// whitelist.
///
/// When a Steam Web API key is configured and no game is given, the ID is checked against Steam
/// first so that a typo never reaches the ledger.
pub async fn join(
    config: &Config,
    mode: Mode,
    name: &str,
    id: &str,
    game: Option<&str>,
) -> Result<Out<Payee>> {
    let steam = SteamProfiles::new(config.steam());
    if game.is_none() && steam.enabled() {
        steam.verify(id.trim()).await?;
    }

    let mut workbook = workbook(config, mode).await?;
    let payee = workbook.add_payee(name, id).await?;
    info!("Added {} to the ledger", payee.name);

    if let Some(game) = game {
        Whitelists::new(config)
            .sync(game, Instruction::Add, &Ids::add(&payee.id))
            .await
            .with_context(|| WhitelistNotUpdated {
                name: payee.name.to_string(),
                game: game.to_string(),
                instruction: Instruction::Add,
            })?;
    }

    Ok(Out::new(
        format!("Added {} to the ledger", payee.name),
        payee,
    ))
}

/// Removes a payee from the current worksheet and, when `game` is given, their ID from that game's
/// whitelist.
pub async fn leave(
    config: &Config,
    mode: Mode,
    name: &str,
    game: Option<&str>,
) -> Result<Out<Payee>> {
    let mut workbook = workbook(config, mode).await?;
    let payee = workbook.remove_payee(name).await?;
    info!("Removed {} from the ledger", payee.name);

    if let Some(game) = game {
        debug!("Removing {} from the {game} whitelist", payee.id);
        Whitelists::new(config)
            .sync(game, Instruction::Remove, &Ids::remove(&payee.id))
            .await
            .with_context(|| WhitelistNotUpdated {
                name: payee.name.to_string(),
                game: game.to_string(),
                instruction: Instruction::Remove,
            })?;
    }

    Ok(Out::new(
        format!("Removed {} from the ledger", payee.name),
        payee,
    ))
}
