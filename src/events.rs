//! Builders for every outbound envelope type. Handlers never spell out a `type` string themselves.

use crate::models::character::{Character, CharacterSummary, Stats};
use crate::models::cooldown::Cooldown;
use crate::models::item::{ItemCatalog, ItemInstance};
use crate::models::npc::NpcSummary;
use crate::models::shop::Shop;
use crate::models::structure::StructureSummary;
use crate::models::types::{Location, UserId};
use crate::net::output::Envelope;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

/// Everything a client needs to draw one grid cell.
#[derive(Debug, Clone, Serialize)]
pub struct GridView {
    pub location: Location,
    pub room: String,
    pub description: String,
    pub players: Vec<CharacterSummary>,
    pub npcs: Vec<NpcSummary>,
    pub items: Vec<ItemInstance>,
    pub structures: Vec<StructureSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InventorySlot {
    pub slot: usize,
    pub name: String,
    #[serde(flatten)]
    pub item: ItemInstance,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatLine {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ChatLine {
    pub fn new(from: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: None,
            message: message.into(),
            at: Utc::now(),
        }
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }
}

pub fn auth_ok(user_id: UserId, name: &str) -> Envelope {
    Envelope::new("auth:ok", json!({ "user_id": user_id, "name": name }))
}

pub fn auth_taken(name: &str) -> Envelope {
    Envelope::new("auth:taken", json!({ "name": name }))
}

pub fn auth_logout() -> Envelope {
    Envelope::new("auth:logout", json!({}))
}

pub fn character_init(c: &Character, catalog: &ItemCatalog, max_slots: usize) -> Envelope {
    Envelope::new(
        "character:init",
        json!({
            "user_id": c.user_id,
            "name": c.name,
            "stats": c.stats,
            "location": c.location,
            "inventory": inventory_slots(c, catalog),
            "max_slots": max_slots,
            "skills": c.skills,
            "hidden": c.hidden,
        }),
    )
}

pub fn character_stats(stats: &Stats) -> Envelope {
    Envelope::new("character:stats", stats)
}

pub fn character_inventory(c: &Character, catalog: &ItemCatalog, max_slots: usize) -> Envelope {
    Envelope::new(
        "character:inventory",
        json!({ "slots": inventory_slots(c, catalog), "max_slots": max_slots }),
    )
}

fn inventory_slots(c: &Character, catalog: &ItemCatalog) -> Vec<InventorySlot> {
    c.inventory
        .iter()
        .enumerate()
        .map(|(slot, item)| InventorySlot {
            slot,
            name: catalog.display_name(item),
            item: item.clone(),
        })
        .collect()
}

pub fn character_location(loc: &Location) -> Envelope {
    Envelope::new(
        "character:location",
        json!({ "world": loc.world, "x": loc.x, "y": loc.y, "room": loc.room_key() }),
    )
}

pub fn character_cooldown(action: &str, ticks: u32, tick_ms: u64) -> Envelope {
    Envelope::new(
        "character:cooldown",
        json!({ "action": action, "ticks": ticks, "ms": u64::from(ticks) * tick_ms }),
    )
}

pub fn character_cooldowns(list: &[Cooldown]) -> Envelope {
    Envelope::new("character:cooldown", json!({ "cooldowns": list }))
}

pub fn grid_join(view: &GridView) -> Envelope {
    Envelope::new("grid:join", view)
}

pub fn grid_player_join(summary: &CharacterSummary) -> Envelope {
    Envelope::new("grid:player-join", summary)
}

pub fn grid_player_leave(user_id: UserId) -> Envelope {
    Envelope::new("grid:player-leave", json!({ "user_id": user_id }))
}

pub fn grid_player_update(summary: &CharacterSummary) -> Envelope {
    Envelope::new("grid:player-update", summary)
}

pub fn grid_items(loc: &Location, items: &[ItemInstance]) -> Envelope {
    Envelope::new("grid:items", json!({ "room": loc.room_key(), "items": items }))
}

pub fn shop_open(shop: &Shop) -> Envelope {
    Envelope::new("shop:open", shop)
}

pub fn shop_sell_list(shop: &Shop) -> Envelope {
    Envelope::new("shop:sell-list", json!({ "shop": shop.id, "sell": shop.get_sell_list() }))
}

pub fn chat_global(line: &ChatLine) -> Envelope {
    Envelope::new("chat:global", line)
}

pub fn chat_say(line: &ChatLine) -> Envelope {
    Envelope::new("chat:say", line)
}

pub fn chat_whisper(line: &ChatLine) -> Envelope {
    Envelope::new("chat:whisper", line)
}

pub fn system(text: impl Into<String>) -> Envelope {
    Envelope::new("system", json!({ "message": text.into() }))
}

pub fn error(text: impl Into<String>) -> Envelope {
    Envelope::new("error", json!({ "message": text.into() }))
}
