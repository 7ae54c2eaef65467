use crate::commands::{CmdCtx, CommandOutput, CommandResult};
use crate::events;
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

/// Resend the grid of the current cell.
pub async fn look(ctx: Arc<CmdCtx>, user_id: UserId) -> CommandResult<CommandOutput> {
    let characters = &ctx.registry.services.character;
    let location = characters.lock(user_id).await?.location.clone();

    let view = characters.grid_view(&location, Some(user_id));
    let description = view.description.clone();
    ctx.output.send(events::grid_join(&view));
    Ok(success!(description))
}
