use crate::config::Config;
use crate::db::repo::CharacterRepo;
use crate::error::AppResult;
use crate::import::WorldDefinition;
use crate::models::item::ItemCatalog;
use crate::models::world::WorldMap;
use crate::net::output::Broadcaster;
use crate::services::{
    CharacterDeps, CharacterService, ItemService, NpcService, ShopService, SkillService, StructureService,
};
use crate::state::cooldowns::CooldownRegistry;
use crate::state::spatial::SpatialIndex;
use std::sync::Arc;

pub struct Services {
    pub character: Arc<CharacterService>,
    pub npc: Arc<NpcService>,
    pub item: Arc<ItemService>,
    pub structure: Arc<StructureService>,
    pub shop: Arc<ShopService>,
    pub skills: Arc<SkillService>,
}

pub struct Registry {
    pub config: Arc<Config>,
    pub worlds: Arc<WorldMap>,
    pub catalog: Arc<ItemCatalog>,
    pub spatial: Arc<SpatialIndex>,
    pub cooldowns: Arc<CooldownRegistry>,
    pub broadcaster: Arc<Broadcaster>,
    pub repo: Arc<dyn CharacterRepo>,
    pub services: Arc<Services>,
}

impl Registry {
    /// Wire every manager together and seed them from the world definition.
    pub fn new(config: Arc<Config>, def: WorldDefinition, repo: Arc<dyn CharacterRepo>) -> AppResult<Self> {
        let worlds = Arc::new(WorldMap::new(def.worlds));
        let catalog = Arc::new(def.catalog);
        let spatial = Arc::new(SpatialIndex::new());
        let cooldowns = Arc::new(CooldownRegistry::new(config.tick_ms));
        let broadcaster = Arc::new(Broadcaster::new(spatial.clone()));

        let npc = Arc::new(NpcService::new(spatial.clone()));
        let item = Arc::new(ItemService::new(catalog.clone()));
        let structure = Arc::new(StructureService::new());
        let character = Arc::new(CharacterService::new(CharacterDeps {
            repo: repo.clone(),
            spatial: spatial.clone(),
            broadcaster: broadcaster.clone(),
            cooldowns: cooldowns.clone(),
            worlds: worlds.clone(),
            npcs: npc.clone(),
            items: item.clone(),
            structures: structure.clone(),
            max_slots: config.max_inventory_slots,
        }));
        let shop = Arc::new(ShopService::new(
            character.clone(),
            structure.clone(),
            item.clone(),
            broadcaster.clone(),
        ));
        let skills = Arc::new(SkillService::new(character.clone(), cooldowns.clone(), broadcaster.clone()));

        for n in def.npcs {
            npc.add(n);
        }
        for s in def.structures {
            structure.add(s)?;
        }
        for s in def.shops {
            shop.add(s)?;
        }
        for (loc, it) in def.ground {
            item.add(&loc, it);
        }

        let services = Arc::new(Services {
            character,
            npc,
            item,
            structure,
            shop,
            skills,
        });

        Ok(Self {
            config,
            worlds,
            catalog,
            spatial,
            cooldowns,
            broadcaster,
            repo,
            services,
        })
    }

    pub fn who(&self) -> Vec<String> {
        self.services.character.who()
    }
}
