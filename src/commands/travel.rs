use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::error::DomainError;
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

const ACTION: &str = "travel";

/// `/travel <destination> [structure]`. The fare is taken first and refunded if the move fails, so
/// the character either arrives and pays or stays and keeps the money.
pub async fn travel(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(wanted) = args.word("destination") else {
        return Err(CommandError::Usage("/travel <destination> [structure]".into()));
    };
    let registry = &ctx.registry;
    let characters = &registry.services.character;

    let mut character = characters.lock(user_id).await?;
    registry.cooldowns.ensure_ready(&character, ACTION)?;

    let structure = registry
        .services
        .structure
        .get_with_command(&character.location, "/travel", args.text("structure"))?;
    let destination = structure
        .destination(wanted)
        .ok_or_else(|| DomainError::NotFound(format!("Destination '{wanted}'")))?;
    let to = destination.location();
    if to == character.location {
        return Err(DomainError::PreconditionFailed(format!("You are already at {}.", destination.name)).into());
    }

    character.debit(destination.price)?;
    if let Err(e) = characters.change_location(&mut character, to) {
        character.credit(destination.price);
        tracing::warn!(%user_id, destination = %destination.name, error = %e, "travel failed, fare refunded");
        return Err(e.into());
    }
    characters.publish_stats(&character);
    characters.start_cooldown(&character, ACTION, structure.travel_cooldown_seconds);

    Ok(success!(format!(
        "You travel to {} for ${}.",
        destination.name, destination.price
    )))
}
