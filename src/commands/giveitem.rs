use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

/// Dev-mode only.
pub async fn giveitem(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(template) = args.template("item") else {
        return Err(CommandError::Usage("/giveitem <item> [amount]".into()));
    };
    let amount = args.int("amount").map(|n| u32::try_from(n).unwrap_or(1)).unwrap_or(1);
    let characters = &ctx.registry.services.character;

    let mut character = characters.lock(user_id).await?;
    character.give_item(&template, amount, characters.max_slots())?;
    characters.publish_inventory(&character);
    tracing::info!(%user_id, item = %template.id, amount, "items created by command");
    Ok(success!(format!("{amount} x {} appear in your pack.", template.name)))
}
