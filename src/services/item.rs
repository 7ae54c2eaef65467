use crate::error::{AppResult, DomainError};
use crate::models::item::{ItemCatalog, ItemInstance, ItemTemplate};
use crate::models::types::Location;
use dashmap::DashMap;
use std::sync::Arc;

/// Item catalog plus everything lying on the ground, per cell.
pub struct ItemService {
    catalog: Arc<ItemCatalog>,
    ground: DashMap<Location, Vec<ItemInstance>>,
}

impl ItemService {
    pub fn new(catalog: Arc<ItemCatalog>) -> Self {
        Self {
            catalog,
            ground: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<ItemCatalog> {
        &self.catalog
    }

    pub fn template(&self, id: &str) -> AppResult<Arc<ItemTemplate>> {
        self.catalog
            .get(id)
            .ok_or_else(|| DomainError::NotFound(format!("Item '{id}'")))
    }

    /// Put a detached instance on the ground. A stackable instance merges into the newest stack when
    /// that stack holds the same template; everything else gets its own entry. Returns the cell's
    /// items after the drop.
    pub fn add(&self, loc: &Location, item: ItemInstance) -> Vec<ItemInstance> {
        let stackable = self.catalog.is_stackable(&item.id);
        let mut cell = self.ground.entry(loc.clone()).or_default();
        let merge = stackable && cell.last().is_some_and(|top| top.id == item.id && !top.equipped);
        if let Some(top) = cell.last_mut().filter(|_| merge) {
            top.durability = top.durability.saturating_add(item.durability);
        } else {
            cell.push(ItemInstance { equipped: false, ..item });
        }
        cell.clone()
    }

    /// Items on the cell, oldest first.
    pub fn get(&self, loc: &Location) -> Vec<ItemInstance> {
        self.ground.get(loc).map(|c| c.value().clone()).unwrap_or_default()
    }

    /// Take an item from the ground. `name` picks the newest entry whose name starts with it
    /// (without it, the newest entry); `amount` defaults to the whole stack and may not exceed it.
    /// `accept` runs under the cell lock before anything is removed, so a refusal (e.g. a full
    /// inventory) leaves the ground untouched.
    pub fn remove(
        &self,
        loc: &Location,
        name: Option<&str>,
        amount: Option<u32>,
        accept: impl FnOnce(&ItemInstance) -> AppResult<()>,
    ) -> AppResult<(ItemInstance, Vec<ItemInstance>)> {
        let what = || name.map(|n| format!("'{n}' on the ground")).unwrap_or_else(|| "Anything on the ground".into());
        let Some(mut cell) = self.ground.get_mut(loc) else {
            return Err(DomainError::NotFound(what()));
        };
        let idx = cell
            .iter()
            .rposition(|i| name.is_none_or(|n| self.catalog.name_matches(i, n)))
            .ok_or_else(|| DomainError::NotFound(what()))?;

        let stackable = self.catalog.is_stackable(&cell[idx].id);
        let taken = if stackable {
            let held = cell[idx].durability;
            let want = amount.unwrap_or(held);
            if want == 0 || want > held {
                return Err(DomainError::NotFound(format!(
                    "{want} x {}",
                    self.catalog.display_name(&cell[idx])
                )));
            }
            ItemInstance::new(cell[idx].id.clone(), want)
        } else {
            cell[idx].clone()
        };

        accept(&taken)?;

        if stackable && taken.durability < cell[idx].durability {
            cell[idx].durability -= taken.durability;
        } else {
            cell.remove(idx);
        }
        let left = cell.clone();
        let now_empty = cell.is_empty();
        drop(cell);
        if now_empty {
            self.ground.remove_if(loc, |_, items| items.is_empty());
        }
        Ok((taken, left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::tests::catalog;

    fn svc() -> ItemService {
        ItemService::new(Arc::new(catalog()))
    }

    #[test]
    fn stackables_merge_into_newest_matching_stack() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        s.add(&here, ItemInstance::new("apple", 2));
        s.add(&here, ItemInstance::new("apple", 3));
        let items = s.add(&here, ItemInstance::new("arrow", 1));
        assert_eq!(items, vec![ItemInstance::new("apple", 5), ItemInstance::new("arrow", 1)]);

        // The newest stack is arrows now, so more apples start a new entry.
        let items = s.add(&here, ItemInstance::new("apple", 1));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn ground_stack_saturates() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        s.add(&here, ItemInstance::new("apple", u32::MAX));
        let items = s.add(&here, ItemInstance::new("apple", 3));
        assert_eq!(items, vec![ItemInstance::new("apple", u32::MAX)]);
    }

    #[test]
    fn non_stackables_stay_distinct() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        let sword = ItemInstance::from_template(&catalog().get("sword").unwrap(), 1);
        s.add(&here, sword.clone());
        s.add(&here, sword);
        assert_eq!(s.get(&here).len(), 2);
    }

    #[test]
    fn partial_take_splits_the_stack() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        s.add(&here, ItemInstance::new("arrow", 10));
        let (taken, left) = s.remove(&here, Some("arr"), Some(4), |_| Ok(())).unwrap();
        assert_eq!(taken, ItemInstance::new("arrow", 4));
        assert_eq!(left, vec![ItemInstance::new("arrow", 6)]);
    }

    #[test]
    fn take_more_than_lies_there_is_refused() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        s.add(&here, ItemInstance::new("arrow", 2));
        assert!(s.remove(&here, None, Some(3), |_| Ok(())).is_err());
        assert_eq!(s.get(&here), vec![ItemInstance::new("arrow", 2)]);
    }

    #[test]
    fn refusal_leaves_the_ground_untouched() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        s.add(&here, ItemInstance::new("apple", 2));
        let err = s
            .remove(&here, None, None, |_| Err(DomainError::InsufficientCapacity { slots: 20 }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientCapacity { .. }));
        assert_eq!(s.get(&here), vec![ItemInstance::new("apple", 2)]);
    }

    #[test]
    fn taking_the_last_item_empties_the_cell() {
        let s = svc();
        let here = Location::new("w", 0, 0);
        s.add(&here, ItemInstance::new("apple", 2));
        let (taken, left) = s.remove(&here, None, None, |_| Ok(())).unwrap();
        assert_eq!(taken.durability, 2);
        assert!(left.is_empty());
        assert!(s.get(&here).is_empty());
        assert!(s.remove(&here, None, None, |_| Ok(())).is_err());
    }
}
