use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandOutput, CommandResult};
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

pub async fn aim(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let characters = &ctx.registry.services.character;
    let character = characters.lock(user_id).await?;
    if character.hidden {
        return Ok(crate::failure!("You cannot aim while hiding."));
    }

    Ok(match characters.aim(&character, args.word("name"))? {
        Some(target) => success!(format!("You take aim at {target}.")),
        None => success!("You lower your aim."),
    })
}
