use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

const ACTION: &str = "move";

pub async fn go(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(dir) = args.direction("direction") else {
        return Err(CommandError::Usage("/move <direction>".into()));
    };
    let registry = &ctx.registry;
    let characters = &registry.services.character;

    let mut character = characters.lock(user_id).await?;
    registry.cooldowns.ensure_ready(&character, ACTION)?;

    let to = character.location.step(dir);
    characters.change_location(&mut character, to)?;

    let seconds = registry.config.move_cooldown_ms as f64 / 1000.0;
    characters.start_cooldown(&character, ACTION, seconds);
    Ok(success!(format!("You walk {dir}.")))
}
