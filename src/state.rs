pub mod cooldowns;
pub mod registry;
pub mod session;
pub mod spatial;
pub mod targets;
