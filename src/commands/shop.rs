use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandOutput, CommandResult};
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

/// `/shop [name]`. Buying and selling arrive as `shop:buy` and `shop:sell` envelopes.
pub async fn shop(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let shop = ctx.registry.services.shop.open(user_id, args.text("shop")).await?;
    Ok(success!(format!(
        "Welcome to {}. {} items for sale.",
        shop.name,
        shop.sell.len()
    )))
}
