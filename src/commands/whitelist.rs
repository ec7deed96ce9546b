use super::Out;
use crate::whitelist::{Ids, Instruction, SyncOutcome, Whitelists};
use crate::{Config, Result};

/// Applies `instruction` to the whitelist of `game` directly, without touching the ledger.
pub async fn whitelist(
    config: &Config,
    game: &str,
    instruction: Instruction,
    ids: Ids,
) -> Result<Out<SyncOutcome>> {
    let outcome = Whitelists::new(config).sync(game, instruction, &ids).await?;
    let message = if outcome.managed {
        format!(
            "Updated the {} whitelist: {} removed, {} added",
            outcome.game,
            outcome.removed,
            usize::from(outcome.added)
        )
    } else {
        format!("The {} whitelist is not managed", outcome.game)
    };
    Ok(Out::new(message, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_whitelist_command() {
        let env = TestEnv::new().await;
        let out = whitelist(&env.config(), "valheim", Instruction::Add, Ids::add("42"))
            .await
            .unwrap();
        assert_eq!("Updated the Valheim whitelist: 0 removed, 1 added", out.message());

        let out = whitelist(&env.config(), "terraria", Instruction::Add, Ids::add("42"))
            .await
            .unwrap();
        assert_eq!("The Terraria whitelist is not managed", out.message());
    }
}
