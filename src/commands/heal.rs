use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::error::DomainError;
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

const ACTION: &str = "heal";

/// `/heal <ticks> [structure]`. A heal that would overshoot max health is shortened and repriced.
pub async fn heal(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(ticks) = args.int("ticks") else {
        return Err(CommandError::Usage("/heal <ticks> [structure]".into()));
    };
    let registry = &ctx.registry;
    let characters = &registry.services.character;

    let mut character = characters.lock(user_id).await?;
    registry.cooldowns.ensure_ready(&character, ACTION)?;

    let structure = registry
        .services
        .structure
        .get_with_command(&character.location, "/heal", args.text("structure"))?;
    let offer = structure
        .heal
        .as_ref()
        .ok_or_else(|| DomainError::PreconditionFailed(format!("{} cannot heal you.", structure.name)))?;

    let missing = character.missing_health();
    if missing < 1 {
        return Err(DomainError::PreconditionFailed("You are already at full health.".into()).into());
    }
    let quote = offer.quote(ticks, missing).ok_or_else(|| DomainError::Validation {
        field: "ticks",
        message: "Heal for at least one tick.".into(),
    })?;

    character.debit(quote.price)?;
    character.stats.health = (character.stats.health + quote.amount).min(character.stats.health_max);
    characters.publish_stats(&character);
    characters.start_cooldown(&character, ACTION, offer.cooldown_seconds);

    tracing::debug!(%user_id, structure = %structure.id, ticks = quote.ticks, amount = quote.amount, price = quote.price, "healed");
    Ok(success!(format!(
        "{} heals you for {} health over {} ticks. That costs ${}.",
        structure.name, quote.amount, quote.ticks, quote.price
    )))
}
