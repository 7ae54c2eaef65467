use crate::error::{AppResult, DomainError};
use crate::models::npc::{Npc, NpcSummary};
use crate::models::types::{Location, NpcId};
use crate::state::spatial::{EntityRef, SpatialIndex};
use dashmap::DashMap;
use std::sync::Arc;

pub struct NpcService {
    npcs: DashMap<NpcId, Npc>,
    spatial: Arc<SpatialIndex>,
}

impl NpcService {
    pub fn new(spatial: Arc<SpatialIndex>) -> Self {
        Self {
            npcs: DashMap::new(),
            spatial,
        }
    }

    /// Register the NPC and place it on its cell.
    pub fn add(&self, npc: Npc) -> NpcId {
        let id = npc.id;
        self.spatial.join(EntityRef::Npc(id), &npc.location);
        self.npcs.insert(id, npc);
        id
    }

    pub fn get(&self, id: NpcId) -> AppResult<Npc> {
        self.npcs
            .get(&id)
            .map(|n| n.value().clone())
            .ok_or_else(|| DomainError::NotFound(format!("NPC {id}")))
    }

    pub fn remove(&self, id: NpcId) -> AppResult<Npc> {
        let (_, npc) = self
            .npcs
            .remove(&id)
            .ok_or_else(|| DomainError::NotFound(format!("NPC {id}")))?;
        self.spatial.leave(EntityRef::Npc(id), &npc.location);
        Ok(npc)
    }

    /// First NPC on the cell whose name starts with `prefix`, ignoring case.
    pub fn get_by_name(&self, loc: &Location, prefix: &str) -> AppResult<Npc> {
        let needle = prefix.to_lowercase();
        self.spatial
            .npcs_at(loc)
            .into_iter()
            .filter_map(|id| self.npcs.get(&id).map(|n| n.value().clone()))
            .find(|n| n.name.to_lowercase().starts_with(&needle) || n.key == prefix)
            .ok_or_else(|| DomainError::NotFound(format!("'{prefix}'")))
    }

    /// NPCs on the cell, in arrival order.
    pub fn get_location_list(&self, loc: &Location) -> Vec<NpcSummary> {
        self.spatial
            .npcs_at(loc)
            .into_iter()
            .filter_map(|id| self.npcs.get(&id).map(|n| NpcSummary::from(n.value())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }
}
