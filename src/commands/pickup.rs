use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandOutput, CommandResult};
use crate::error::DomainError;
use crate::events;
use crate::models::types::UserId;
use crate::net::output::Scope;
use crate::success;
use std::sync::Arc;

/// `/pickup [item] [amount]`. Without an item the newest thing on the ground is taken, and a
/// stack is taken whole unless an amount is given.
pub async fn pickup(ctx: Arc<CmdCtx>, user_id: UserId, args: Args) -> CommandResult<CommandOutput> {
    let registry = &ctx.registry;
    let characters = &registry.services.character;
    let catalog = &registry.catalog;
    let max_slots = characters.max_slots();

    let name = args.word("item");
    let amount = args.int("amount").map(|n| u32::try_from(n).unwrap_or(u32::MAX));

    let mut character = characters.lock(user_id).await?;
    let location = character.location.clone();

    // The capacity check runs before the ground is touched; the character lock keeps it valid
    // until the item lands in the inventory.
    let (taken, ground) = registry.services.item.remove(&location, name, amount, |item| {
        let template = catalog
            .get(&item.id)
            .ok_or_else(|| DomainError::NotFound(format!("Item template '{}'", item.id)))?;
        let units = if template.stackable { item.durability } else { 1 };
        if character.has_room_for(&template, units, max_slots) {
            Ok(())
        } else {
            Err(DomainError::InsufficientCapacity {
                slots: character.inventory.len(),
            })
        }
    })?;

    let label = catalog.display_name(&taken);
    let count = if catalog.is_stackable(&taken.id) { taken.durability } else { 1 };
    if let Err(e) = character.give_instance(taken.clone(), catalog, max_slots) {
        tracing::error!(%user_id, error = %e, "pickup accepted but could not be stored, returning item to the ground");
        registry.services.item.add(&location, taken);
        return Err(e.into());
    }

    characters.publish_inventory(&character);
    registry
        .broadcaster
        .dispatch(Scope::Room(location.clone()), events::grid_items(&location, &ground));
    Ok(success!(format!("You pick up {count} x {label}.")))
}
