use crate::models::types::{Location, NpcId};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Npc {
    pub id: NpcId,
    /// Spawn template key from the world file
    pub key: String,
    pub name: String,
    pub description: String,
    pub location: Location,
    pub health: i64,
    pub health_max: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcSummary {
    pub id: NpcId,
    pub name: String,
    pub health: i64,
    pub health_max: i64,
}

impl From<&Npc> for NpcSummary {
    fn from(n: &Npc) -> Self {
        Self {
            id: n.id,
            name: n.name.clone(),
            health: n.health,
            health_max: n.health_max,
        }
    }
}
