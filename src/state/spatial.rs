//! Location index: which players and NPCs stand on which grid cell.
//!
//! Backed by `world -> y -> x -> cell`, created lazily and pruned when a cell empties. A reverse map
//! from entity to location guarantees that an entity is a member of at most one cell; every
//! mutation happens under one write lock, so `move_entity` is never observable half-done.

use crate::models::types::{Location, NpcId, UserId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Player(UserId),
    Npc(NpcId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Player,
    Npc,
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Player(_) => EntityKind::Player,
            EntityRef::Npc(_) => EntityKind::Npc,
        }
    }
}

/// Members in join order.
#[derive(Debug, Default)]
struct Cell {
    members: Vec<EntityRef>,
}

impl Cell {
    fn insert(&mut self, entity: EntityRef) {
        if !self.members.contains(&entity) {
            self.members.push(entity);
        }
    }

    fn remove(&mut self, entity: &EntityRef) -> bool {
        let before = self.members.len();
        self.members.retain(|e| e != entity);
        before != self.members.len()
    }
}

#[derive(Debug, Default)]
struct Inner {
    worlds: HashMap<String, BTreeMap<i32, BTreeMap<i32, Cell>>>,
    positions: HashMap<EntityRef, Location>,
}

impl Inner {
    fn cell_mut(&mut self, loc: &Location) -> &mut Cell {
        self.worlds
            .entry(loc.world.clone())
            .or_default()
            .entry(loc.y)
            .or_default()
            .entry(loc.x)
            .or_default()
    }

    fn cell(&self, loc: &Location) -> Option<&Cell> {
        self.worlds.get(&loc.world)?.get(&loc.y)?.get(&loc.x)
    }

    fn remove_from_cell(&mut self, entity: &EntityRef, loc: &Location) -> bool {
        let Some(rows) = self.worlds.get_mut(&loc.world) else {
            return false;
        };
        let Some(row) = rows.get_mut(&loc.y) else {
            return false;
        };
        let Some(cell) = row.get_mut(&loc.x) else {
            return false;
        };
        let removed = cell.remove(entity);

        if cell.members.is_empty() {
            row.remove(&loc.x);
            if row.is_empty() {
                rows.remove(&loc.y);
            }
            if rows.is_empty() {
                self.worlds.remove(&loc.world);
            }
        }
        removed
    }

    fn place(&mut self, entity: EntityRef, loc: &Location) {
        if let Some(prev) = self.positions.get(&entity).cloned() {
            if &prev == loc {
                return;
            }
            self.remove_from_cell(&entity, &prev);
        }
        self.cell_mut(loc).insert(entity);
        self.positions.insert(entity, loc.clone());
    }
}

#[derive(Debug, Default)]
pub struct SpatialIndex {
    inner: RwLock<Inner>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entity` to the cell. An entity that is already indexed elsewhere is moved instead, so a
    /// stray double join never leaves it in two cells.
    pub fn join(&self, entity: EntityRef, loc: &Location) {
        let mut inner = self.inner.write();
        if let Some(prev) = inner.positions.get(&entity).filter(|prev| *prev != loc) {
            tracing::warn!(?entity, from = %prev, to = %loc, "join of an entity indexed elsewhere; moving it");
        }
        inner.place(entity, loc);
    }

    /// Remove `entity` from the cell. Returns false when it was not a member there, in which case
    /// nothing changes.
    pub fn leave(&self, entity: EntityRef, loc: &Location) -> bool {
        let mut inner = self.inner.write();
        if inner.positions.get(&entity) != Some(loc) {
            return false;
        }
        inner.positions.remove(&entity);
        inner.remove_from_cell(&entity, loc)
    }

    /// Atomic leave-then-join. Returns false when the entity was not found at `from` (it is still
    /// placed at `to`).
    pub fn move_entity(&self, entity: EntityRef, from: &Location, to: &Location) -> bool {
        let mut inner = self.inner.write();
        let was_at_from = inner.positions.get(&entity) == Some(from);
        if !was_at_from {
            tracing::warn!(?entity, %from, %to, "move from a cell the entity is not in");
        }
        inner.place(entity, to);
        was_at_from
    }

    /// Members of one kind at the cell, in join order. Empty for cells nobody ever touched.
    /// Only players and NPCs are indexed here; ground items and structures live in their own
    /// managers and are merged into a cell view by `CharacterService::grid_view`.
    pub fn list_at(&self, loc: &Location, kind: EntityKind) -> Vec<EntityRef> {
        let inner = self.inner.read();
        inner
            .cell(loc)
            .map(|c| c.members.iter().filter(|e| e.kind() == kind).copied().collect())
            .unwrap_or_default()
    }

    pub fn players_at(&self, loc: &Location) -> Vec<UserId> {
        self.list_at(loc, EntityKind::Player)
            .into_iter()
            .filter_map(|e| match e {
                EntityRef::Player(id) => Some(id),
                EntityRef::Npc(_) => None,
            })
            .collect()
    }

    pub fn npcs_at(&self, loc: &Location) -> Vec<NpcId> {
        self.list_at(loc, EntityKind::Npc)
            .into_iter()
            .filter_map(|e| match e {
                EntityRef::Npc(id) => Some(id),
                EntityRef::Player(_) => None,
            })
            .collect()
    }

    pub fn position_of(&self, entity: &EntityRef) -> Option<Location> {
        self.inner.read().positions.get(entity).cloned()
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.inner.read().positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn loc(x: i32, y: i32) -> Location {
        Location::new("w", x, y)
    }

    #[test]
    fn unpopulated_cell_lists_empty() {
        let idx = SpatialIndex::new();
        assert!(idx.list_at(&loc(5, 5), EntityKind::Player).is_empty());
        assert!(idx.list_at(&Location::new("nowhere", 0, 0), EntityKind::Npc).is_empty());
    }

    #[test]
    fn move_leaves_origin_and_joins_destination() {
        let idx = SpatialIndex::new();
        let a = EntityRef::Player(UserId::new());
        idx.join(a, &loc(0, 0));
        assert!(idx.move_entity(a, &loc(0, 0), &loc(1, 0)));
        assert!(!idx.list_at(&loc(0, 0), EntityKind::Player).contains(&a));
        assert!(idx.list_at(&loc(1, 0), EntityKind::Player).contains(&a));
        assert_eq!(idx.position_of(&a), Some(loc(1, 0)));
    }

    #[test]
    fn double_join_elsewhere_does_not_duplicate() {
        let idx = SpatialIndex::new();
        let a = EntityRef::Player(UserId::new());
        idx.join(a, &loc(0, 0));
        idx.join(a, &loc(0, 0));
        idx.join(a, &loc(2, 2));
        assert!(idx.players_at(&loc(0, 0)).is_empty());
        assert_eq!(idx.players_at(&loc(2, 2)).len(), 1);
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn leave_from_wrong_cell_is_ignored() {
        let idx = SpatialIndex::new();
        let a = EntityRef::Npc(NpcId::new());
        idx.join(a, &loc(1, 1));
        assert!(!idx.leave(a, &loc(0, 0)));
        assert_eq!(idx.npcs_at(&loc(1, 1)).len(), 1);
        assert!(idx.leave(a, &loc(1, 1)));
        assert!(idx.is_empty());
    }

    #[test]
    fn kinds_are_listed_separately_in_join_order() {
        let idx = SpatialIndex::new();
        let p1 = UserId::new();
        let p2 = UserId::new();
        let n = NpcId::new();
        idx.join(EntityRef::Player(p1), &loc(0, 0));
        idx.join(EntityRef::Npc(n), &loc(0, 0));
        idx.join(EntityRef::Player(p2), &loc(0, 0));
        assert_eq!(idx.players_at(&loc(0, 0)), vec![p1, p2]);
        assert_eq!(idx.npcs_at(&loc(0, 0)), vec![n]);
    }

    #[test]
    fn concurrent_moves_never_double_book() {
        let idx = Arc::new(SpatialIndex::new());
        let players: Vec<_> = (0..8).map(|_| EntityRef::Player(UserId::new())).collect();
        for p in &players {
            idx.join(*p, &loc(0, 0));
        }

        let handles: Vec<_> = players
            .iter()
            .copied()
            .map(|p| {
                let idx = idx.clone();
                std::thread::spawn(move || {
                    let mut at = loc(0, 0);
                    for step in 1..200 {
                        let next = loc(step % 3, 0);
                        idx.move_entity(p, &at, &next);
                        at = next;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let total: usize = (0..3).map(|x| idx.players_at(&loc(x, 0)).len()).sum();
        assert_eq!(total, players.len());
    }
}
