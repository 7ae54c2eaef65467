mod character;
mod item;
mod npc;
mod shop;
mod skills;
mod structure;

pub use character::{CharacterDeps, CharacterGuard, CharacterHandle, CharacterService};
pub use item::ItemService;
pub use npc::NpcService;
pub use shop::{Receipt, ShopService};
pub use skills::{SkillOutcome, SkillService};
pub use structure::StructureService;
