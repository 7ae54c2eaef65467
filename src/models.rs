pub mod character;
pub mod cooldown;
pub mod item;
pub mod npc;
pub mod shop;
pub mod skill;
pub mod structure;
pub mod types;
pub mod world;
