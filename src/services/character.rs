use crate::db::error::DbError;
use crate::db::repo::CharacterRepo;
use crate::error::{AppResult, DomainError};
use crate::events::{self, GridView};
use crate::models::character::{Character, CharacterDocument, CharacterSummary};
use crate::models::types::{ConnectionId, Location, UserId};
use crate::models::world::WorldMap;
use crate::net::output::{Broadcaster, Scope};
use crate::services::{ItemService, NpcService, StructureService};
use crate::state::cooldowns::CooldownRegistry;
use crate::state::spatial::{EntityRef, SpatialIndex};
use crate::state::targets::TargetTable;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub type CharacterHandle = Arc<Mutex<Character>>;
pub type CharacterGuard = OwnedMutexGuard<Character>;

/// What other sessions may read about an online character without taking its lock.
#[derive(Debug, Clone)]
struct Presence {
    summary: CharacterSummary,
    hidden: bool,
}

/// Owns every online character. Each one sits behind its own mutex; a caller never holds two
/// character locks at the same time.
pub struct CharacterService {
    repo: Arc<dyn CharacterRepo>,
    spatial: Arc<SpatialIndex>,
    broadcaster: Arc<Broadcaster>,
    cooldowns: Arc<CooldownRegistry>,
    worlds: Arc<WorldMap>,
    npcs: Arc<NpcService>,
    items: Arc<ItemService>,
    structures: Arc<StructureService>,
    max_slots: usize,
    online: DashMap<UserId, CharacterHandle>,
    /// lowercased name -> user
    names: DashMap<String, UserId>,
    presence: DashMap<UserId, Presence>,
    aims: TargetTable,
    /// Serializes login and logout of the same user
    gates: DashMap<UserId, Arc<Mutex<()>>>,
}

pub struct CharacterDeps {
    pub repo: Arc<dyn CharacterRepo>,
    pub spatial: Arc<SpatialIndex>,
    pub broadcaster: Arc<Broadcaster>,
    pub cooldowns: Arc<CooldownRegistry>,
    pub worlds: Arc<WorldMap>,
    pub npcs: Arc<NpcService>,
    pub items: Arc<ItemService>,
    pub structures: Arc<StructureService>,
    pub max_slots: usize,
}

impl CharacterService {
    pub fn new(deps: CharacterDeps) -> Self {
        Self {
            repo: deps.repo,
            spatial: deps.spatial,
            broadcaster: deps.broadcaster,
            cooldowns: deps.cooldowns,
            worlds: deps.worlds,
            npcs: deps.npcs,
            items: deps.items,
            structures: deps.structures,
            max_slots: deps.max_slots,
            online: DashMap::new(),
            names: DashMap::new(),
            presence: DashMap::new(),
            aims: TargetTable::new(),
            gates: DashMap::new(),
        }
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    // ========================================================================
    // IN-MEMORY CRUD
    // ========================================================================

    /// Bring a character online: claim its name, index it on its cell and start ticking its
    /// cooldowns. No events are sent.
    pub fn add(&self, character: Character) -> AppResult<CharacterHandle> {
        let user_id = character.user_id;
        match self.names.entry(character.name.to_lowercase()) {
            Entry::Occupied(e) if *e.get() != user_id => {
                return Err(DomainError::AlreadyTaken(character.name.clone()));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(e) => {
                e.insert(user_id);
            }
        }
        if self.online.contains_key(&user_id) {
            return Err(DomainError::PreconditionFailed(format!("{} is already online.", character.name)));
        }

        self.cooldowns.register(&character);
        self.spatial.join(EntityRef::Player(user_id), &character.location);
        self.refresh_presence(&character);
        let handle = Arc::new(Mutex::new(character));
        self.online.insert(user_id, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, user_id: UserId) -> AppResult<CharacterHandle> {
        self.online
            .get(&user_id)
            .map(|h| h.value().clone())
            .ok_or(DomainError::NotLoggedIn)
    }

    /// Exact, case-insensitive name lookup among online characters.
    pub fn get_by_name(&self, name: &str) -> AppResult<CharacterHandle> {
        let user_id = self
            .names
            .get(&name.to_lowercase())
            .map(|u| *u.value())
            .ok_or_else(|| DomainError::NotFound(format!("Player '{name}'")))?;
        self.get(user_id)
            .map_err(|_| DomainError::NotFound(format!("Player '{name}'")))
    }

    /// Lock the character for a critical section. Fails when the character went offline while the
    /// caller was waiting for the lock.
    pub async fn lock(&self, user_id: UserId) -> AppResult<CharacterGuard> {
        let handle = self.get(user_id)?;
        let guard = handle.clone().lock_owned().await;
        let still_online = self
            .online
            .get(&user_id)
            .is_some_and(|h| Arc::ptr_eq(h.value(), &handle));
        if !still_online {
            return Err(DomainError::NotLoggedIn);
        }
        Ok(guard)
    }

    /// Take the character out of memory. The caller holds its lock.
    pub fn remove(&self, character: &Character) -> AppResult<()> {
        let user_id = character.user_id;
        if self.online.remove(&user_id).is_none() {
            return Err(DomainError::NotLoggedIn);
        }
        self.names.remove_if(&character.name.to_lowercase(), |_, owner| *owner == user_id);
        self.presence.remove(&user_id);
        self.cooldowns.unregister(user_id);
        self.spatial.leave(EntityRef::Player(user_id), &character.location);
        self.clear_aims(user_id);
        Ok(())
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.online.contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.online.len()
    }

    /// Online character names, sorted.
    pub fn who(&self) -> Vec<String> {
        let mut names: Vec<String> = self.presence.iter().map(|p| p.value().summary.name.clone()).collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    // ========================================================================
    // LOCATION QUERIES
    // ========================================================================

    /// Players on the cell in arrival order. Hidden players are only listed to themselves.
    pub fn get_location_list(&self, loc: &Location, viewer: Option<UserId>) -> Vec<CharacterSummary> {
        self.spatial
            .players_at(loc)
            .into_iter()
            .filter_map(|uid| {
                let p = self.presence.get(&uid)?;
                (!p.hidden || Some(uid) == viewer).then(|| p.summary.clone())
            })
            .collect()
    }

    /// First player on the cell (other than `viewer`) whose name starts with `prefix`. `hidden`
    /// selects whether visible or hidden players are searched.
    pub fn find_in_cell(&self, loc: &Location, prefix: &str, viewer: UserId, hidden: bool) -> Option<UserId> {
        let needle = prefix.to_lowercase();
        self.spatial.players_at(loc).into_iter().find(|uid| {
            *uid != viewer
                && self
                    .presence
                    .get(uid)
                    .is_some_and(|p| p.hidden == hidden && p.summary.name.to_lowercase().starts_with(&needle))
        })
    }

    pub fn grid_view(&self, loc: &Location, viewer: Option<UserId>) -> GridView {
        GridView {
            location: loc.clone(),
            room: loc.room_key(),
            description: self.worlds.describe(loc),
            players: self.get_location_list(loc, viewer),
            npcs: self.npcs.get_location_list(loc),
            items: self.items.get(loc),
            structures: self.structures.summaries_at(loc),
        }
    }

    // ========================================================================
    // PRESENCE AND EVENTS
    // ========================================================================

    fn refresh_presence(&self, character: &Character) {
        self.presence.insert(
            character.user_id,
            Presence {
                summary: character.summary(),
                hidden: character.hidden,
            },
        );
    }

    /// Publish changed stats: the owner gets `character:stats`, the room a `grid:player-update`.
    pub fn publish_stats(&self, character: &Character) {
        self.refresh_presence(character);
        self.broadcaster
            .dispatch(Scope::User(character.user_id), events::character_stats(&character.stats));
        if !character.hidden {
            self.broadcaster.dispatch(
                Scope::RoomExcept {
                    room: character.location.clone(),
                    except: character.user_id,
                },
                events::grid_player_update(&character.summary()),
            );
        }
    }

    pub fn publish_inventory(&self, character: &Character) {
        self.broadcaster.dispatch(
            Scope::User(character.user_id),
            events::character_inventory(character, self.items.catalog(), self.max_slots),
        );
    }

    /// Flip visibility and tell the room. Hiding also drops every aim involving the character.
    pub fn set_hidden(&self, character: &mut Character, hidden: bool) {
        if character.hidden == hidden {
            return;
        }
        character.hidden = hidden;
        self.refresh_presence(character);
        let room = character.location.clone();
        if hidden {
            self.clear_aims(character.user_id);
            self.broadcaster.dispatch(
                Scope::RoomExcept {
                    room,
                    except: character.user_id,
                },
                events::grid_player_leave(character.user_id),
            );
        } else {
            self.broadcaster.dispatch(
                Scope::RoomExcept {
                    room,
                    except: character.user_id,
                },
                events::grid_player_join(&character.summary()),
            );
        }
    }

    /// Register a cooldown and tell the owner about it.
    pub fn start_cooldown(&self, character: &Character, action: &str, seconds: f64) {
        if seconds <= 0.0 {
            return;
        }
        self.cooldowns.add(character, action, seconds, true);
        let ticks = self.cooldowns.ticks_left(character, action);
        self.broadcaster.dispatch(
            Scope::User(character.user_id),
            events::character_cooldown(action, ticks, self.cooldowns.tick_ms()),
        );
    }

    // ========================================================================
    // LOCATION TRANSITION
    // ========================================================================

    /// Move the character to `to`. The index is updated first, then the character, then the old
    /// and new rooms are told, and only then does the mover get its own location and grid.
    pub fn change_location(&self, character: &mut Character, to: Location) -> AppResult<()> {
        if !self.worlds.contains(&to) {
            return Err(DomainError::PreconditionFailed("You cannot go there.".into()));
        }
        let from = character.location.clone();
        if from == to {
            return Ok(());
        }
        let user_id = character.user_id;

        self.spatial.move_entity(EntityRef::Player(user_id), &from, &to);
        character.location = to.clone();
        self.refresh_presence(character);
        self.clear_aims(user_id);

        if !character.hidden {
            self.broadcaster
                .dispatch(Scope::Room(from.clone()), events::grid_player_leave(user_id));
            self.broadcaster.dispatch(
                Scope::RoomExcept {
                    room: to.clone(),
                    except: user_id,
                },
                events::grid_player_join(&character.summary()),
            );
        }

        self.broadcaster
            .dispatch(Scope::User(user_id), events::character_location(&to));
        self.broadcaster
            .dispatch(Scope::User(user_id), events::grid_join(&self.grid_view(&to, Some(user_id))));
        tracing::debug!(%user_id, %from, %to, "character moved");
        Ok(())
    }

    // ========================================================================
    // TARGETING
    // ========================================================================

    /// Aim at a visible player on the same cell, or release the aim with `None`. Returns the name
    /// of the new target.
    pub fn aim(&self, character: &Character, name: Option<&str>) -> AppResult<Option<String>> {
        let Some(name) = name else {
            self.aims.release(character.user_id);
            return Ok(None);
        };
        let target = self
            .find_in_cell(&character.location, name, character.user_id, false)
            .ok_or_else(|| DomainError::NotFound(format!("'{name}' here")))?;
        let target_name = self
            .presence
            .get(&target)
            .map(|p| p.summary.name.clone())
            .unwrap_or_default();
        self.aims.aim(character.user_id, target);
        self.broadcaster.dispatch(
            Scope::User(target),
            events::system(format!("{} is aiming at you.", character.name)),
        );
        Ok(Some(target_name))
    }

    pub fn target_of(&self, user_id: UserId) -> Option<UserId> {
        self.aims.target_of(user_id)
    }

    pub fn targeted_by(&self, user_id: UserId) -> Vec<UserId> {
        self.aims.targeted_by(user_id)
    }

    fn clear_aims(&self, user_id: UserId) {
        for aimer in self.aims.clear_involving(user_id) {
            self.broadcaster
                .dispatch(Scope::User(aimer), events::system("Your target is out of sight."));
        }
    }

    // ========================================================================
    // SESSION LIFECYCLE
    // ========================================================================

    fn gate(&self, user_id: UserId) -> Arc<Mutex<()>> {
        self.gates.entry(user_id).or_default().value().clone()
    }

    /// Drop the user's gate once nobody holds or waits on it and the user is offline.
    fn release_gate(&self, user_id: UserId) {
        self.gates
            .remove_if(&user_id, |_, gate| Arc::strong_count(gate) == 1 && !self.online.contains_key(&user_id));
    }

    /// Bind `conn_id` to the user and bring their character online, loading or creating it. A user
    /// that is already online is simply moved to the new connection.
    pub async fn login(&self, conn_id: ConnectionId, user_id: UserId, name: &str) -> AppResult<CharacterHandle> {
        let gate = self.gate(user_id);
        let result = {
            let _gate = gate.lock().await;
            self.login_gated(conn_id, user_id, name).await
        };
        drop(gate);
        if result.is_err() {
            self.release_gate(user_id);
        }
        result
    }

    async fn login_gated(&self, conn_id: ConnectionId, user_id: UserId, name: &str) -> AppResult<CharacterHandle> {
        if let Ok(handle) = self.get(user_id) {
            if let Some(prev) = self.broadcaster.bind_user(user_id, conn_id) {
                self.broadcaster.dispatch(
                    Scope::Connection(prev),
                    events::system("You have logged in from another connection."),
                );
            }
            let character = handle.lock().await;
            tracing::info!(%user_id, %conn_id, name = %character.name, "session moved to new connection");
            self.send_welcome(&character);
            drop(character);
            return Ok(handle);
        }

        let mut character = match self.repo.find_by_user(user_id).await? {
            Some(doc) => Character::from(doc),
            None => self.create(user_id, name).await?,
        };

        if !self.worlds.contains(&character.location) {
            let spawn = self.spawn()?;
            tracing::warn!(%user_id, stored = %character.location, %spawn, "stored location no longer exists");
            character.location = spawn;
        }

        let handle = self.add(character)?;
        self.broadcaster.bind_user(user_id, conn_id);

        let character = handle.lock().await;
        if !character.hidden {
            self.broadcaster.dispatch(
                Scope::RoomExcept {
                    room: character.location.clone(),
                    except: user_id,
                },
                events::grid_player_join(&character.summary()),
            );
        }
        self.send_welcome(&character);
        tracing::info!(%user_id, %conn_id, name = %character.name, room = %character.location, "character logged in");
        drop(character);
        Ok(handle)
    }

    async fn create(&self, user_id: UserId, name: &str) -> AppResult<Character> {
        Character::validate_name(name)?;
        if self.names.get(&name.to_lowercase()).is_some_and(|owner| *owner != user_id) {
            return Err(DomainError::AlreadyTaken(name.to_string()));
        }
        let character = Character::new(user_id, name, self.spawn()?);
        match self.repo.create(&CharacterDocument::from(&character)).await {
            Ok(()) => {
                tracing::info!(%user_id, %name, "character created");
                Ok(character)
            }
            Err(DbError::UniqueViolation(_)) => Err(DomainError::AlreadyTaken(name.to_string())),
            Err(e) => {
                tracing::error!(%user_id, error = %e, "failed to create character");
                Err(e.into())
            }
        }
    }

    fn spawn(&self) -> AppResult<Location> {
        self.worlds
            .default_spawn()
            .cloned()
            .ok_or_else(|| DomainError::InvalidData("no world to spawn in".into()))
    }

    fn send_welcome(&self, character: &Character) {
        let scope = || Scope::User(character.user_id);
        self.broadcaster
            .dispatch(scope(), events::auth_ok(character.user_id, &character.name));
        self.broadcaster.dispatch(
            scope(),
            events::character_init(character, self.items.catalog(), self.max_slots),
        );
        self.broadcaster.dispatch(
            scope(),
            events::grid_join(&self.grid_view(&character.location, Some(character.user_id))),
        );
    }

    /// Take the user offline. Waits for any in-flight command on the character, tells the room,
    /// then saves. The result is the save result; the character leaves memory either way.
    pub async fn logout(&self, user_id: UserId) -> AppResult<()> {
        let gate = self.gate(user_id);
        let result = {
            let _gate = gate.lock().await;
            self.logout_gated(user_id).await
        };
        drop(gate);
        self.release_gate(user_id);
        result
    }

    async fn logout_gated(&self, user_id: UserId) -> AppResult<()> {
        let character = self.lock(user_id).await?;
        self.remove(&character)?;
        if !character.hidden {
            self.broadcaster
                .dispatch(Scope::Room(character.location.clone()), events::grid_player_leave(user_id));
        }

        let saved = self.save(&character).await;
        drop(character);
        match &saved {
            Ok(()) => tracing::info!(%user_id, "character logged out"),
            Err(e) => tracing::error!(%user_id, error = %e, "character logged out without a successful save"),
        }
        saved
    }

    pub async fn save(&self, character: &Character) -> AppResult<()> {
        self.repo
            .save(&CharacterDocument::from(character))
            .await
            .map_err(DomainError::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::db::repo::MemoryCharacterRepo;
    use crate::import::parse_world;
    use crate::models::types::{ConnectionId, UserId};
    use crate::state::registry::Registry;
    use std::sync::Arc;

    const WORLD: &str = r#"
worlds:
  - name: earth
    width: 3
    height: 3
    spawn: { x: 0, y: 0 }
"#;

    fn registry() -> Registry {
        let def = parse_world(WORLD).unwrap();
        Registry::new(Arc::new(Config::default()), def, Arc::new(MemoryCharacterRepo::new())).unwrap()
    }

    #[tokio::test]
    async fn failed_logins_leave_no_gates_behind() {
        let registry = registry();
        let characters = &registry.services.character;
        for _ in 0..100 {
            assert!(characters.login(ConnectionId::new(), UserId::new(), "x").await.is_err());
        }
        assert_eq!(characters.online_count(), 0);
        assert_eq!(characters.gates.len(), 0);
    }

    #[tokio::test]
    async fn gate_lives_only_while_online() {
        let registry = registry();
        let characters = &registry.services.character;
        let user_id = UserId::new();

        characters.login(ConnectionId::new(), user_id, "Alice").await.unwrap();
        assert_eq!(characters.gates.len(), 1);

        characters.logout(user_id).await.unwrap();
        assert_eq!(characters.gates.len(), 0);

        // Logging out twice fails without leaking a gate either.
        assert!(characters.logout(user_id).await.is_err());
        assert_eq!(characters.gates.len(), 0);
    }
}
