use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::error::DomainError;
use crate::events;
use crate::models::types::UserId;
use crate::net::output::Scope;
use crate::success;
use std::sync::Arc;

/// `/drop <item-or-slot> [amount]`. A stack is dropped whole unless an amount is given.
pub async fn drop(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let Some(selector) = args.item("item") else {
        return Err(CommandError::Usage("/drop <item> [amount]".into()));
    };
    let registry = &ctx.registry;
    let characters = &registry.services.character;
    let catalog = &registry.catalog;

    let mut character = characters.lock(user_id).await?;
    let slot = character
        .find_slot(selector, catalog)
        .ok_or_else(|| DomainError::NotFound(format!("Item '{selector}'")))?;
    let amount = match args.int("amount") {
        Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
        None => character.inventory[slot].durability,
    };

    let dropped = character.drop_item(selector, amount, catalog)?;
    let name = catalog.display_name(&dropped);
    let count = if catalog.is_stackable(&dropped.id) { dropped.durability } else { 1 };
    let location = character.location.clone();

    let ground = registry.services.item.add(&location, dropped);
    characters.publish_inventory(&character);
    registry
        .broadcaster
        .dispatch(Scope::Room(location.clone()), events::grid_items(&location, &ground));
    tracing::debug!(%user_id, item = %name, count, room = %location, "item dropped");

    Ok(success!(format!("You drop {count} x {name}.")))
}
