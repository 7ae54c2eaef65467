use gridmud::Registry;
use gridmud::commands::{CmdCtx, CommandError};
use gridmud::config::Config;
use gridmud::db::repo::{CharacterRepo, MemoryCharacterRepo};
use gridmud::error::{DomainError, ErrorKind};
use gridmud::import::parse_world;
use gridmud::models::types::{ConnectionId, Location, UserId};
use gridmud::net::connection;
use gridmud::net::output::{Envelope, OutEvent, OutputHandle};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

const WORLD: &str = r#"
items:
  - { id: apple, name: Apple, stackable: true, price: 10 }
  - { id: sword, name: Short Sword, price: 50, durability: 100, equipable: true }
worlds:
  - name: earth
    width: 5
    height: 5
    description: Open fields.
    spawn: { x: 0, y: 0 }
  - name: moon
    width: 2
    height: 2
    spawn: { x: 0, y: 0 }
structures:
  - id: market
    name: Market
    world: earth
    x: 0
    y: 0
    shops: [grocer, smith]
  - id: hospital
    name: Hospital
    world: earth
    x: 0
    y: 0
    commands: [/heal]
    heal: { hp_per_tick: 5, price_per_tick: 3 }
  - id: airfield
    name: Airfield
    world: earth
    x: 0
    y: 0
    commands: [/travel]
    destinations:
      - { name: moon, world: moon, x: 1, y: 1, price: 50 }
      - { name: nowhere, world: earth, x: 0, y: 0, price: 5 }
shops:
  - id: grocer
    name: Grocer
    sell:
      - { item: apple, quantity: 999, amount: 3 }
    buy: [apple]
  - id: smith
    name: Smithy
    sell:
      - { item: sword, quantity: 1 }
    buy: [sword]
ground:
  - { world: earth, x: 1, y: 0, item: sword }
"#;

fn registry_with(cfg: Config) -> (Arc<Registry>, Arc<MemoryCharacterRepo>) {
    let repo = Arc::new(MemoryCharacterRepo::new());
    let def = parse_world(WORLD).expect("world parses");
    let registry = Registry::new(Arc::new(cfg), def, repo.clone()).expect("registry builds");
    (Arc::new(registry), repo)
}

fn registry() -> (Arc<Registry>, Arc<MemoryCharacterRepo>) {
    registry_with(Config::default())
}

struct Client {
    ctx: Arc<CmdCtx>,
    rx: mpsc::Receiver<OutEvent>,
    user_id: UserId,
}

impl Client {
    async fn login(registry: &Arc<Registry>, name: &str) -> Client {
        let (handle, rx) = OutputHandle::channel(ConnectionId::new());
        let ctx = connection::attach(registry.clone(), handle);
        let mut client = Client {
            ctx,
            rx,
            user_id: UserId::new(),
        };
        client
            .send(json!({ "type": "auth", "payload": { "user_id": client.user_id, "name": name } }))
            .await;
        let kinds: Vec<String> = client.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec!["auth:ok", "character:init", "grid:join"], "{name} logs in");
        client
    }

    async fn send(&self, msg: serde_json::Value) {
        connection::handle_message(&self.ctx, &msg.to_string()).await;
    }

    async fn command(&self, raw: &str) {
        self.send(json!({ "type": "command", "payload": raw })).await;
    }

    fn drain(&mut self) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            if let OutEvent::Frame(env, _) = ev {
                out.push(env);
            }
        }
        out
    }

    fn kinds(&mut self) -> Vec<String> {
        self.drain().into_iter().map(|e| e.kind).collect()
    }

    /// Text of the last `system` or `error` frame.
    fn last_text(&mut self, kind: &str) -> Option<String> {
        self.drain()
            .into_iter()
            .filter(|e| e.kind == kind)
            .last()
            .and_then(|e| e.payload["message"].as_str().map(str::to_string))
    }
}

fn earth(x: i32, y: i32) -> Location {
    Location::new("earth", x, y)
}

#[tokio::test]
async fn login_announces_and_move_updates_both_rooms() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    let mut bob = Client::login(&registry, "Bob").await;
    assert_eq!(alice.kinds(), vec!["grid:player-join"]);

    alice.command("/move east").await;

    let spatial = &registry.spatial;
    assert!(!spatial.players_at(&earth(0, 0)).contains(&alice.user_id));
    assert!(spatial.players_at(&earth(1, 0)).contains(&alice.user_id));
    assert_eq!(bob.kinds(), vec!["grid:player-leave"]);

    let frames = alice.drain();
    let kinds: Vec<&str> = frames.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, vec!["character:location", "grid:join", "character:cooldown", "system"]);
    assert_eq!(frames[1].payload["room"], "earth_0_1");
    assert_eq!(frames[1].payload["items"][0]["id"], "sword");
}

#[tokio::test]
async fn moving_is_rate_limited_and_bounded() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;

    alice.command("/move west").await;
    assert_eq!(alice.last_text("error").as_deref(), Some("You cannot go there."));

    alice.command("/move south").await;
    alice.drain();
    alice.command("/move south").await;
    let text = alice.last_text("error").unwrap_or_default();
    assert!(text.starts_with("You must wait"), "got {text}");
    assert!(registry.spatial.players_at(&earth(0, 1)).contains(&alice.user_id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_buyers_race_for_the_last_unit() {
    let (registry, _) = registry();
    let alice = Client::login(&registry, "Alice").await;
    let bob = Client::login(&registry, "Bob").await;
    let shops = registry.services.shop.clone();

    let (a, b) = tokio::join!(
        {
            let shops = shops.clone();
            let uid = alice.user_id;
            async move { shops.buy(uid, "smith", 0, "sword").await }
        },
        {
            let shops = shops.clone();
            let uid = bob.user_id;
            async move { shops.buy(uid, "smith", 0, "sword").await }
        }
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(matches!(loser.kind(), ErrorKind::NotFound | ErrorKind::Invariant));
    assert!(shops.get_sell_list("smith").await.unwrap().is_empty());

    let mut money = Vec::new();
    for uid in [alice.user_id, bob.user_id] {
        money.push(registry.services.character.lock(uid).await.unwrap().stats.money);
    }
    money.sort();
    assert_eq!(money, vec![50, 100]);
}

#[tokio::test]
async fn buy_reads_the_list_get_sell_list_exposes() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    let list = registry.services.shop.get_sell_list("grocer").await.unwrap();
    let idx = list.iter().position(|l| l.item.id == "apple").unwrap();

    alice
        .send(json!({ "type": "shop:buy", "payload": { "shop": "grocer", "index": idx, "item": "apple" } }))
        .await;
    assert_eq!(alice.last_text("system").as_deref(), Some("You buy 3 x Apple for $30."));

    alice
        .send(json!({ "type": "shop:buy", "payload": { "shop": "grocer", "index": idx, "item": "sword" } }))
        .await;
    assert!(alice.last_text("error").is_some());

    let me = registry.services.character.lock(alice.user_id).await.unwrap();
    assert_eq!(me.stats.money, 70);
    assert_eq!(me.inventory.len(), 1);
    assert_eq!(me.inventory[0].durability, 3);
    drop(me);
    // Unlimited stock never shrinks
    assert_eq!(registry.services.shop.get_sell_list("grocer").await.unwrap(), list);
}

#[tokio::test]
async fn selling_credits_at_the_buy_percentage() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    registry.services.shop.buy(alice.user_id, "grocer", 0, "apple").await.unwrap();
    alice.drain();

    alice
        .send(json!({ "type": "shop:sell", "payload": { "shop": "grocer", "slot": 0, "amount": 2 } }))
        .await;
    assert_eq!(alice.last_text("system").as_deref(), Some("You sell 2 x Apple for $10."));

    let err = registry.services.shop.sell(alice.user_id, "grocer", 0, 5).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientQuantity { have: 1, need: 5 }));
    assert_eq!(registry.services.character.lock(alice.user_id).await.unwrap().stats.money, 80);
}

#[tokio::test]
async fn travel_is_atomic_and_paid() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    let mut bob = Client::login(&registry, "Bob").await;
    alice.drain();

    alice.command("/travel moon").await;

    let moon = Location::new("moon", 1, 1);
    assert!(registry.spatial.players_at(&moon).contains(&alice.user_id));
    assert!(!registry.spatial.players_at(&earth(0, 0)).contains(&alice.user_id));
    assert_eq!(bob.kinds(), vec!["grid:player-leave"]);

    let kinds = alice.kinds();
    let loc = kinds.iter().position(|k| k == "character:location").unwrap();
    let grid = kinds.iter().position(|k| k == "grid:join").unwrap();
    assert!(loc < grid);
    assert_eq!(registry.services.character.lock(alice.user_id).await.unwrap().stats.money, 50);
}

#[tokio::test]
async fn travel_without_funds_changes_nothing() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    registry.services.character.lock(alice.user_id).await.unwrap().stats.money = 10;

    alice.command("/travel moon").await;
    let text = alice.last_text("error").unwrap_or_default();
    assert!(text.starts_with("You cannot afford that"), "got {text}");
    assert!(registry.spatial.players_at(&earth(0, 0)).contains(&alice.user_id));
    assert_eq!(registry.services.character.lock(alice.user_id).await.unwrap().stats.money, 10);
}

#[tokio::test]
async fn heal_is_capped_and_repriced() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;

    alice.command("/heal 3").await;
    assert_eq!(alice.last_text("error").as_deref(), Some("You are already at full health."));

    registry.services.character.lock(alice.user_id).await.unwrap().stats.health = 90;
    alice.command("/heal 10").await;
    let me = registry.services.character.lock(alice.user_id).await.unwrap();
    assert_eq!(me.stats.health, 100);
    // 10 missing at 5 per tick is 2 ticks at 3 each
    assert_eq!(me.stats.money, 94);
    drop(me);

    // 12 missing is 2.4 ticks worth, paid as 7 and not as 3 whole ticks
    registry.services.character.lock(alice.user_id).await.unwrap().stats.health = 88;
    alice.command("/heal 10").await;
    let me = registry.services.character.lock(alice.user_id).await.unwrap();
    assert_eq!(me.stats.health, 100);
    assert_eq!(me.stats.money, 87);
    drop(me);

    alice.command("/heal 0").await;
    assert!(alice.last_text("error").is_some());
}

#[tokio::test]
async fn pickup_checks_capacity_before_touching_the_ground() {
    let (registry, _) = registry_with(Config {
        max_inventory_slots: 1,
        move_cooldown_ms: 0,
        ..Config::default()
    });
    let mut alice = Client::login(&registry, "Alice").await;
    registry.services.shop.buy(alice.user_id, "grocer", 0, "apple").await.unwrap();
    alice.command("/move east").await;
    alice.drain();

    alice.command("/pickup sword").await;
    assert_eq!(alice.last_text("error").as_deref(), Some("Your inventory is full."));
    assert_eq!(registry.services.item.get(&earth(1, 0)).len(), 1);

    alice.command("/drop apple").await;
    alice.command("/pickup sword").await;
    assert_eq!(alice.last_text("system").as_deref(), Some("You pick up 1 x Short Sword."));
    let ground = registry.services.item.get(&earth(1, 0));
    assert_eq!(ground.len(), 1);
    assert_eq!(ground[0].id, "apple");
}

#[tokio::test]
async fn whisper_reaches_only_the_target() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    let mut bob = Client::login(&registry, "Bob").await;
    let mut carol = Client::login(&registry, "Carol").await;
    alice.drain();
    bob.drain();

    alice.command("/w bob meet me at the well").await;
    let got = bob.drain();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].kind, "chat:whisper");
    assert_eq!(got[0].payload["message"], "meet me at the well");
    assert_eq!(got[0].payload["from"], "Alice");
    assert_eq!(alice.kinds(), vec!["chat:whisper"]);
    assert!(carol.drain().is_empty());

    alice.command("/w dave hello").await;
    assert_eq!(alice.last_text("error").as_deref(), Some("Player 'dave' not found."));
}

#[tokio::test]
async fn hidden_players_are_found_by_search() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    let mut bob = Client::login(&registry, "Bob").await;
    alice.drain();

    bob.command("/hide").await;
    assert_eq!(alice.kinds(), vec!["grid:player-leave"]);
    let visible = registry.services.character.get_location_list(&earth(0, 0), Some(alice.user_id));
    assert!(visible.iter().all(|p| p.user_id != bob.user_id));
    bob.drain();

    alice.command("/search bo").await;
    assert_eq!(alice.last_text("system").as_deref(), Some("You found Bob!"));
    assert!(!registry.services.character.lock(bob.user_id).await.unwrap().hidden);
}

#[tokio::test]
async fn logout_saves_before_acknowledging() {
    let (registry, repo) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    let mut bob = Client::login(&registry, "Bob").await;
    alice.drain();

    bob.send(json!({ "type": "logout", "payload": {} })).await;
    assert_eq!(bob.kinds(), vec!["auth:logout"]);
    assert_eq!(alice.kinds(), vec!["grid:player-leave"]);
    assert!(!registry.services.character.is_online(bob.user_id));
    assert!(repo.find_by_user(bob.user_id).await.unwrap().is_some());

    bob.command("/look").await;
    assert_eq!(bob.last_text("error").as_deref(), Some("You are not logged in."));
}

#[tokio::test]
async fn disconnect_logs_out_only_the_bound_session() {
    let (registry, _) = registry();
    let first = Client::login(&registry, "Alice").await;
    let (handle, _rx) = OutputHandle::channel(ConnectionId::new());
    let second = connection::attach(registry.clone(), handle);
    send_auth(&second, first.user_id, "Alice").await;

    // The old connection goes away; the user lives on through the new one.
    connection::cleanup(&first.ctx).await;
    assert!(registry.services.character.is_online(first.user_id));

    connection::cleanup(&second).await;
    assert!(!registry.services.character.is_online(first.user_id));
    assert_eq!(registry.broadcaster.connection_count(), 0);
}

async fn send_auth(ctx: &Arc<CmdCtx>, user_id: UserId, name: &str) {
    let msg = json!({ "type": "auth", "payload": { "user_id": user_id, "name": name } });
    connection::handle_message(ctx, &msg.to_string()).await;
}

#[tokio::test]
async fn envelopes_missing_a_field_are_ignored() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;
    alice.send(json!({ "type": "command" })).await;
    alice.send(json!({ "payload": "/who" })).await;
    assert!(alice.drain().is_empty());

    alice.command("/who").await;
    assert_eq!(alice.last_text("system").as_deref(), Some("Online (1): Alice"));
}

#[tokio::test]
async fn duplicate_names_are_rejected_with_auth_taken() {
    let (registry, _) = registry();
    let _alice = Client::login(&registry, "Alice").await;
    let (handle, mut rx) = OutputHandle::channel(ConnectionId::new());
    let ctx = connection::attach(registry.clone(), handle);
    send_auth(&ctx, UserId::new(), "Alice").await;

    let mut kinds = Vec::new();
    while let Ok(OutEvent::Frame(env, _)) = rx.try_recv() {
        kinds.push(env.kind);
    }
    assert_eq!(kinds, vec!["auth:taken"]);
    assert_eq!(registry.services.character.online_count(), 1);
}

#[tokio::test]
async fn moving_or_hiding_drops_every_aim_involved() {
    let (registry, _) = registry();
    let characters = registry.services.character.clone();
    let alice = Client::login(&registry, "Alice").await;
    let bob = Client::login(&registry, "Bob").await;

    alice.command("/aim bob").await;
    bob.command("/aim alice").await;
    assert_eq!(characters.target_of(alice.user_id), Some(bob.user_id));
    assert_eq!(characters.targeted_by(alice.user_id), vec![bob.user_id]);

    // Bob walks off: his own aim and the aim at him are both gone.
    bob.command("/move east").await;
    assert_eq!(characters.target_of(alice.user_id), None);
    assert_eq!(characters.target_of(bob.user_id), None);
    assert!(characters.targeted_by(alice.user_id).is_empty());
    assert!(characters.targeted_by(bob.user_id).is_empty());

    alice.command("/move east").await;
    alice.command("/aim bob").await;
    assert_eq!(characters.target_of(alice.user_id), Some(bob.user_id));

    bob.command("/hide").await;
    assert_eq!(characters.target_of(alice.user_id), None);
    assert!(characters.targeted_by(bob.user_id).is_empty());
}

#[tokio::test]
async fn privileged_commands_need_dev_mode() {
    let (registry, _) = registry();
    let mut alice = Client::login(&registry, "Alice").await;

    let refused = gridmud::process_command("/giveitem sword", alice.ctx.clone()).await;
    assert!(matches!(refused, Err(CommandError::PermissionDenied)));
    alice.command("/giveitem sword 2").await;
    assert_eq!(alice.last_text("error").as_deref(), Some("You are not allowed to do that."));
    assert!(registry.services.character.lock(alice.user_id).await.unwrap().inventory.is_empty());
}

#[tokio::test]
async fn equipped_items_cannot_be_sold() {
    let (registry, _) = registry_with(Config {
        dev_mode: true,
        ..Config::default()
    });
    let mut alice = Client::login(&registry, "Alice").await;
    alice.command("/giveitem sword").await;
    alice.command("/equip sword").await;
    alice.drain();

    alice
        .send(json!({ "type": "shop:sell", "payload": { "shop": "smith", "slot": 0 } }))
        .await;
    assert_eq!(alice.last_text("error").as_deref(), Some("Unequip Short Sword before selling it."));
    let me = registry.services.character.lock(alice.user_id).await.unwrap();
    assert_eq!(me.inventory.len(), 1);
    assert_eq!(me.stats.money, 100);
    drop(me);

    alice.command("/unequip sword").await;
    alice
        .send(json!({ "type": "shop:sell", "payload": { "shop": "smith", "slot": 0 } }))
        .await;
    let me = registry.services.character.lock(alice.user_id).await.unwrap();
    assert!(me.inventory.is_empty());
    assert!(me.stats.money > 100);
}
