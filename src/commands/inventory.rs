use crate::commands::validate::Args;
use crate::commands::{CmdCtx, CommandError, CommandOutput, CommandResult};
use crate::models::types::UserId;
use crate::success;
use std::sync::Arc;

pub async fn inventory(ctx: Arc<CmdCtx>, user_id: UserId) -> CommandResult<CommandOutput> {
    let characters = &ctx.registry.services.character;
    let catalog = &ctx.registry.catalog;
    let character = characters.lock(user_id).await?;
    characters.publish_inventory(&character);

    if character.inventory.is_empty() {
        return Ok(success!("Your inventory is empty."));
    }
    let mut out = format!("Inventory ({}/{}):\n", character.inventory.len(), characters.max_slots());
    for (slot, item) in character.inventory.iter().enumerate() {
        let name = catalog.display_name(item);
        let stackable = catalog.is_stackable(&item.id);
        let line = match (stackable, item.equipped) {
            (true, _) => format!("  [{slot}] {name} x{}\n", item.durability),
            (false, true) => format!("  [{slot}] {name} (equipped, durability {})\n", item.durability),
            (false, false) => format!("  [{slot}] {name} (durability {})\n", item.durability),
        };
        out.push_str(&line);
    }
    Ok(success!(out.trim_end()))
}

pub async fn equip(ctx: Arc<CmdCtx>, user_id: UserId, args: Args, equipped: bool) -> CommandResult<CommandOutput> {
    let Some(selector) = args.item("item") else {
        return Err(CommandError::Usage("/equip <item>".into()));
    };
    let characters = &ctx.registry.services.character;
    let mut character = characters.lock(user_id).await?;

    let name = character.set_equipped(selector, equipped, &ctx.registry.catalog)?;
    characters.publish_inventory(&character);
    Ok(if equipped {
        success!(format!("You equip the {name}."))
    } else {
        success!(format!("You put away the {name}."))
    })
}
