use crate::models::types::Location;
use std::collections::HashMap;

/// Static description of one world (map) and its bounds.
#[derive(Debug, Clone)]
pub struct World {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub description: String,
    pub cells: HashMap<(i32, i32), String>,
    pub spawn: Location,
}

impl World {
    pub fn contains(&self, loc: &Location) -> bool {
        loc.world == self.name && (0..self.width).contains(&loc.x) && (0..self.height).contains(&loc.y)
    }

    pub fn describe(&self, x: i32, y: i32) -> &str {
        self.cells.get(&(x, y)).map(String::as_str).unwrap_or(&self.description)
    }
}

/// All worlds by name.
#[derive(Debug, Default)]
pub struct WorldMap {
    worlds: HashMap<String, World>,
    /// Where brand-new characters appear
    default_spawn: Option<Location>,
}

impl WorldMap {
    pub fn new(worlds: impl IntoIterator<Item = World>) -> Self {
        let worlds: Vec<World> = worlds.into_iter().collect();
        let default_spawn = worlds.first().map(|w| w.spawn.clone());
        Self {
            worlds: worlds.into_iter().map(|w| (w.name.clone(), w)).collect(),
            default_spawn,
        }
    }

    pub fn get(&self, name: &str) -> Option<&World> {
        self.worlds.get(name)
    }

    pub fn contains(&self, loc: &Location) -> bool {
        self.get(&loc.world).is_some_and(|w| w.contains(loc))
    }

    pub fn describe(&self, loc: &Location) -> String {
        self.get(&loc.world)
            .map(|w| w.describe(loc.x, loc.y).to_string())
            .unwrap_or_default()
    }

    pub fn default_spawn(&self) -> Option<&Location> {
        self.default_spawn.as_ref()
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earth() -> World {
        World {
            name: "earth".into(),
            width: 3,
            height: 2,
            description: "Grass.".into(),
            cells: HashMap::from([((1, 1), "A well.".to_string())]),
            spawn: Location::new("earth", 0, 0),
        }
    }

    #[test]
    fn bounds_are_half_open() {
        let map = WorldMap::new([earth()]);
        assert!(map.contains(&Location::new("earth", 2, 1)));
        assert!(!map.contains(&Location::new("earth", 3, 1)));
        assert!(!map.contains(&Location::new("earth", 0, -1)));
        assert!(!map.contains(&Location::new("mars", 0, 0)));
    }

    #[test]
    fn cells_fall_back_to_world_description() {
        let map = WorldMap::new([earth()]);
        assert_eq!(map.describe(&Location::new("earth", 1, 1)), "A well.");
        assert_eq!(map.describe(&Location::new("earth", 0, 1)), "Grass.");
        assert_eq!(map.default_spawn(), Some(&Location::new("earth", 0, 0)));
    }
}
