//! Loads the static world definition (YAML) and checks its cross references.

use crate::error::{AppResult, ConfigErrorKind, DomainError, InfraError};
use crate::models::item::{ItemCatalog, ItemInstance, ItemTemplate};
use crate::models::npc::Npc;
use crate::models::shop::{Shop, ShopListing, Stock};
use crate::models::structure::{Destination, HealOffer, Structure};
use crate::models::types::{Location, NpcId};
use crate::models::world::World;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct WorldFileYaml {
    #[serde(default)]
    items: Vec<ItemTemplate>,
    worlds: Vec<WorldYaml>,
    #[serde(default)]
    npcs: Vec<NpcYaml>,
    #[serde(default)]
    structures: Vec<StructureYaml>,
    #[serde(default)]
    shops: Vec<ShopYaml>,
    #[serde(default)]
    ground: Vec<GroundYaml>,
}

#[derive(Debug, Deserialize)]
struct WorldYaml {
    name: String,
    width: i32,
    height: i32,
    #[serde(default)]
    description: String,
    spawn: PointYaml,
    #[serde(default)]
    cells: Vec<CellYaml>,
}

#[derive(Debug, Deserialize)]
struct PointYaml {
    x: i32,
    y: i32,
}

#[derive(Debug, Deserialize)]
struct CellYaml {
    x: i32,
    y: i32,
    description: String,
}

#[derive(Debug, Deserialize)]
struct NpcYaml {
    key: String,
    name: String,
    #[serde(default)]
    description: String,
    world: String,
    x: i32,
    y: i32,
    #[serde(default = "default_health")]
    health: i64,
}

fn default_health() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
struct StructureYaml {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    world: String,
    x: i32,
    y: i32,
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default)]
    heal: Option<HealOffer>,
    #[serde(default)]
    destinations: Vec<Destination>,
    #[serde(default)]
    shops: Vec<String>,
    #[serde(default)]
    travel_cooldown_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct ShopYaml {
    id: String,
    name: String,
    #[serde(default)]
    sell: Vec<ListingYaml>,
    #[serde(default)]
    buy: Vec<String>,
    #[serde(default = "default_percent")]
    sell_price_percent: f64,
    #[serde(default = "default_buy_percent")]
    buy_price_percent: f64,
}

fn default_percent() -> f64 {
    1.0
}

fn default_buy_percent() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
struct ListingYaml {
    item: String,
    /// 999 = unlimited
    quantity: u32,
    /// Units per purchase for stackable items
    #[serde(default = "default_amount")]
    amount: u32,
}

fn default_amount() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct GroundYaml {
    world: String,
    x: i32,
    y: i32,
    item: String,
    #[serde(default = "default_amount")]
    amount: u32,
}

/// Everything the engine is seeded with at startup.
#[derive(Debug, Default)]
pub struct WorldDefinition {
    pub catalog: ItemCatalog,
    pub worlds: Vec<World>,
    pub npcs: Vec<Npc>,
    pub structures: Vec<Structure>,
    pub shops: Vec<Shop>,
    pub ground: Vec<(Location, ItemInstance)>,
}

pub fn load_world_file(path: &Path) -> AppResult<WorldDefinition> {
    let data = std::fs::read_to_string(path).map_err(|e| InfraError::Config {
        path: path.to_path_buf(),
        source: ConfigErrorKind::Read(e),
    })?;
    let def = parse_world(&data).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "world file rejected");
        e
    })?;
    tracing::info!(
        path = %path.display(),
        worlds = def.worlds.len(),
        items = def.catalog.len(),
        npcs = def.npcs.len(),
        structures = def.structures.len(),
        shops = def.shops.len(),
        "world definition loaded"
    );
    Ok(def)
}

pub fn parse_world(yaml: &str) -> AppResult<WorldDefinition> {
    let file: WorldFileYaml = serde_yaml::from_str(yaml).map_err(|e| InfraError::Env(ConfigErrorKind::ParseYaml(e)))?;

    let mut item_ids = HashSet::new();
    for item in &file.items {
        if !item_ids.insert(item.id.clone()) {
            return Err(invalid(format!("duplicate item id '{}'", item.id)));
        }
    }
    let catalog = ItemCatalog::new(file.items);

    let mut worlds: HashMap<String, World> = HashMap::new();
    for w in file.worlds {
        if w.width < 1 || w.height < 1 {
            return Err(invalid(format!("world '{}' has no cells", w.name)));
        }
        let cells = w.cells.into_iter().map(|c| ((c.x, c.y), c.description)).collect();
        let world = World {
            spawn: Location::new(w.name.clone(), w.spawn.x, w.spawn.y),
            name: w.name.clone(),
            width: w.width,
            height: w.height,
            description: w.description,
            cells,
        };
        if !world.contains(&world.spawn) {
            return Err(invalid(format!("spawn of world '{}' is out of bounds", world.name)));
        }
        if worlds.insert(w.name.clone(), world).is_some() {
            return Err(invalid(format!("duplicate world '{}'", w.name)));
        }
    }
    if worlds.is_empty() {
        return Err(invalid("no worlds defined".to_string()));
    }

    let in_bounds = |loc: &Location| worlds.get(&loc.world).is_some_and(|w| w.contains(loc));

    let mut shops = Vec::with_capacity(file.shops.len());
    for s in file.shops {
        let mut sell = Vec::with_capacity(s.sell.len());
        for l in s.sell {
            let template = catalog
                .get(&l.item)
                .ok_or_else(|| invalid(format!("shop '{}' sells unknown item '{}'", s.id, l.item)))?;
            if l.amount == 0 {
                return Err(invalid(format!("shop '{}' sells zero units of '{}'", s.id, l.item)));
            }
            let mut item = ItemInstance::from_template(&template, l.amount);
            item.instance_id = None;
            sell.push(ShopListing {
                item,
                stock: Stock::from(l.quantity),
            });
        }
        if let Some(unknown) = s.buy.iter().find(|id| !catalog.contains(id)) {
            return Err(invalid(format!("shop '{}' buys unknown item '{unknown}'", s.id)));
        }
        if shops.iter().any(|other: &Shop| other.id == s.id) {
            return Err(invalid(format!("duplicate shop '{}'", s.id)));
        }
        shops.push(Shop {
            id: s.id,
            name: s.name,
            sell,
            buy: s.buy,
            sell_price_percent: s.sell_price_percent,
            buy_price_percent: s.buy_price_percent,
        });
    }

    let mut structures = Vec::with_capacity(file.structures.len());
    for s in file.structures {
        let location = Location::new(s.world, s.x, s.y);
        if !in_bounds(&location) {
            return Err(invalid(format!("structure '{}' is outside its world", s.id)));
        }
        if let Some(unknown) = s.shops.iter().find(|id| !shops.iter().any(|shop| &shop.id == *id)) {
            return Err(invalid(format!("structure '{}' owns unknown shop '{unknown}'", s.id)));
        }
        if let Some(bad) = s.destinations.iter().find(|d| !in_bounds(&d.location())) {
            return Err(invalid(format!("structure '{}' travels to unknown place '{}'", s.id, bad.name)));
        }
        let mut commands = s.commands;
        if !s.shops.is_empty() && !commands.iter().any(|c| c == "/shop") {
            commands.push("/shop".to_string());
        }
        if commands.iter().any(|c| c == "/heal") && s.heal.is_none() {
            return Err(invalid(format!("structure '{}' offers /heal without heal parameters", s.id)));
        }
        if commands.iter().any(|c| c == "/travel") && s.destinations.is_empty() {
            return Err(invalid(format!("structure '{}' offers /travel without destinations", s.id)));
        }
        if structures.iter().any(|other: &Structure| other.id == s.id) {
            return Err(invalid(format!("duplicate structure '{}'", s.id)));
        }
        structures.push(Structure {
            id: s.id,
            name: s.name,
            description: s.description,
            location,
            commands,
            heal: s.heal,
            destinations: s.destinations,
            shops: s.shops,
            travel_cooldown_seconds: s.travel_cooldown_seconds,
        });
    }

    let mut npcs = Vec::with_capacity(file.npcs.len());
    for n in file.npcs {
        let location = Location::new(n.world, n.x, n.y);
        if !in_bounds(&location) {
            return Err(invalid(format!("npc '{}' is outside its world", n.key)));
        }
        npcs.push(Npc {
            id: NpcId::new(),
            key: n.key,
            name: n.name,
            description: n.description,
            location,
            health: n.health,
            health_max: n.health,
        });
    }

    let mut ground = Vec::with_capacity(file.ground.len());
    for g in file.ground {
        let location = Location::new(g.world, g.x, g.y);
        if !in_bounds(&location) {
            return Err(invalid(format!("ground item '{}' is outside its world", g.item)));
        }
        let template = catalog
            .get(&g.item)
            .ok_or_else(|| invalid(format!("unknown ground item '{}'", g.item)))?;
        if template.stackable {
            ground.push((location, ItemInstance::from_template(&template, g.amount)));
        } else {
            for _ in 0..g.amount {
                ground.push((location.clone(), ItemInstance::from_template(&template, 1)));
            }
        }
    }

    let mut worlds: Vec<World> = worlds.into_values().collect();
    worlds.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(WorldDefinition {
        catalog,
        worlds,
        npcs,
        structures,
        shops,
        ground,
    })
}

fn invalid(msg: String) -> DomainError {
    DomainError::InvalidData(msg)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"
items:
  - { id: apple, name: Apple, stackable: true, price: 10 }
  - { id: sword, name: Short Sword, price: 250, durability: 100, equipable: true }
worlds:
  - name: earth
    width: 5
    height: 5
    description: Open fields.
    spawn: { x: 0, y: 0 }
    cells:
      - { x: 1, y: 1, description: The market square. }
npcs:
  - { key: rat, name: Rat, world: earth, x: 2, y: 2, health: 10 }
structures:
  - id: market
    name: Market
    world: earth
    x: 1
    y: 1
    shops: [grocer]
  - id: hospital
    name: Hospital
    world: earth
    x: 0
    y: 0
    commands: [/heal]
    heal: { hp_per_tick: 10, price_per_tick: 2 }
shops:
  - id: grocer
    name: Grocer
    sell:
      - { item: apple, quantity: 999, amount: 3 }
      - { item: sword, quantity: 1 }
    buy: [apple]
"#;

    #[test]
    fn sample_loads() {
        let def = parse_world(SAMPLE).unwrap();
        assert_eq!(def.worlds.len(), 1);
        assert_eq!(def.catalog.len(), 2);
        assert_eq!(def.npcs[0].health_max, 10);
        let market = def.structures.iter().find(|s| s.id == "market").unwrap();
        assert!(market.offers("/shop"));
        let grocer = &def.shops[0];
        assert_eq!(grocer.sell[0].stock, Stock::Unlimited);
        assert_eq!(grocer.sell[0].item.durability, 3);
        assert_eq!(grocer.sell[1].stock, Stock::Finite(1));
        assert!(grocer.sell[1].item.instance_id.is_none());
        assert_eq!(def.worlds[0].describe(1, 1), "The market square.");
        assert_eq!(def.worlds[0].describe(3, 3), "Open fields.");
    }

    #[test]
    fn unknown_item_in_shop_is_rejected() {
        let yaml = SAMPLE.replace("buy: [apple]", "buy: [pear]");
        assert!(matches!(parse_world(&yaml), Err(DomainError::InvalidData(_))));
    }

    #[test]
    fn structure_out_of_bounds_is_rejected() {
        let yaml = SAMPLE.replace("    x: 1\n    y: 1\n    shops", "    x: 9\n    y: 1\n    shops");
        assert!(matches!(parse_world(&yaml), Err(DomainError::InvalidData(_))));
    }

    #[test]
    fn unknown_shop_reference_is_rejected() {
        let yaml = SAMPLE.replace("shops: [grocer]", "shops: [butcher]");
        assert!(matches!(parse_world(&yaml), Err(DomainError::InvalidData(_))));
    }

    #[test]
    fn heal_needs_parameters() {
        let yaml = SAMPLE.replace("    heal: { hp_per_tick: 10, price_per_tick: 2 }\n", "");
        assert!(matches!(parse_world(&yaml), Err(DomainError::InvalidData(_))));
    }
}
