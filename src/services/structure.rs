use crate::error::{AppResult, DomainError};
use crate::models::structure::{Structure, StructureSummary};
use crate::models::types::Location;
use dashmap::DashMap;
use std::sync::Arc;

/// Static map furniture, indexed by id. Structures never move after world load.
#[derive(Default)]
pub struct StructureService {
    structures: DashMap<String, Arc<Structure>>,
}

impl StructureService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, structure: Structure) -> AppResult<()> {
        if self.structures.contains_key(&structure.id) {
            return Err(DomainError::InvalidData(format!("duplicate structure '{}'", structure.id)));
        }
        self.structures.insert(structure.id.clone(), Arc::new(structure));
        Ok(())
    }

    pub fn get(&self, id: &str) -> AppResult<Arc<Structure>> {
        self.structures
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| DomainError::NotFound(format!("Structure '{id}'")))
    }

    pub fn remove(&self, id: &str) -> AppResult<Arc<Structure>> {
        self.structures
            .remove(id)
            .map(|(_, s)| s)
            .ok_or_else(|| DomainError::NotFound(format!("Structure '{id}'")))
    }

    /// Structures on the cell, ordered by id.
    pub fn get_location_list(&self, loc: &Location) -> Vec<Arc<Structure>> {
        let mut list: Vec<_> = self
            .structures
            .iter()
            .filter(|s| &s.value().location == loc)
            .map(|s| s.value().clone())
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn summaries_at(&self, loc: &Location) -> Vec<StructureSummary> {
        self.get_location_list(loc).iter().map(|s| StructureSummary::from(s.as_ref())).collect()
    }

    /// The structure on the cell offering `command`. With `name`, only structures whose name starts
    /// with it are considered.
    pub fn get_with_command(&self, loc: &Location, command: &str, name: Option<&str>) -> AppResult<Arc<Structure>> {
        self.get_location_list(loc)
            .into_iter()
            .filter(|s| s.offers(command))
            .find(|s| name.is_none_or(|n| s.name_matches(n)))
            .ok_or_else(|| match name {
                Some(n) => DomainError::NotFound(format!("'{n}' offering {command} here")),
                None => DomainError::NotFound(format!("Anything offering {command} here")),
            })
    }

    /// The structure on the cell that owns shop `shop_id`.
    pub fn get_with_shop(&self, loc: &Location, shop_id: &str) -> AppResult<Arc<Structure>> {
        self.get_location_list(loc)
            .into_iter()
            .find(|s| s.shops.iter().any(|id| id == shop_id))
            .ok_or_else(|| DomainError::NotFound("Shop".to_string()))
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(id: &str, name: &str, commands: &[&str], shops: &[&str]) -> Structure {
        Structure {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            location: Location::new("earth", 1, 1),
            commands: commands.iter().map(|c| c.to_string()).collect(),
            heal: None,
            destinations: vec![],
            shops: shops.iter().map(|s| s.to_string()).collect(),
            travel_cooldown_seconds: 0.0,
        }
    }

    #[test]
    fn command_lookup_respects_name_filter() {
        let svc = StructureService::new();
        svc.add(structure("clinic", "Clinic", &["/heal"], &[])).unwrap();
        svc.add(structure("hospital", "Hospital", &["/heal"], &[])).unwrap();
        let here = Location::new("earth", 1, 1);

        assert_eq!(svc.get_with_command(&here, "/heal", None).unwrap().id, "clinic");
        assert_eq!(svc.get_with_command(&here, "/heal", Some("hosp")).unwrap().id, "hospital");
        assert!(svc.get_with_command(&here, "/travel", None).is_err());
        assert!(svc.get_with_command(&Location::new("earth", 0, 0), "/heal", None).is_err());
    }

    #[test]
    fn shop_owner_lookup() {
        let svc = StructureService::new();
        svc.add(structure("market", "Market", &["/shop"], &["grocer"])).unwrap();
        let here = Location::new("earth", 1, 1);
        assert_eq!(svc.get_with_shop(&here, "grocer").unwrap().id, "market");
        assert!(svc.get_with_shop(&here, "butcher").is_err());
        assert!(svc.add(structure("market", "Again", &[], &[])).is_err());
    }
}
