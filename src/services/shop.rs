use crate::error::{AppResult, DomainError};
use crate::events;
use crate::models::item::ItemSelector;
use crate::models::shop::{Shop, ShopListing};
use crate::models::types::UserId;
use crate::net::output::{Broadcaster, Scope};
use crate::services::{CharacterService, ItemService, StructureService};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of a purchase, as seen by the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub item: String,
    pub quantity: u32,
    pub price: i64,
}

/// Owns the shops. Every transaction locks the shop first and the character second, and holds both
/// until the inventory, the funds and the stock agree again.
pub struct ShopService {
    shops: DashMap<String, Arc<Mutex<Shop>>>,
    characters: Arc<CharacterService>,
    structures: Arc<StructureService>,
    items: Arc<ItemService>,
    broadcaster: Arc<Broadcaster>,
}

impl ShopService {
    pub fn new(
        characters: Arc<CharacterService>,
        structures: Arc<StructureService>,
        items: Arc<ItemService>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            shops: DashMap::new(),
            characters,
            structures,
            items,
            broadcaster,
        }
    }

    pub fn add(&self, shop: Shop) -> AppResult<()> {
        if self.shops.contains_key(&shop.id) {
            return Err(DomainError::InvalidData(format!("duplicate shop '{}'", shop.id)));
        }
        self.shops.insert(shop.id.clone(), Arc::new(Mutex::new(shop)));
        Ok(())
    }

    pub fn get(&self, id: &str) -> AppResult<Arc<Mutex<Shop>>> {
        self.shops
            .get(id)
            .map(|s| s.value().clone())
            .ok_or_else(|| DomainError::NotFound("Shop".to_string()))
    }

    pub fn remove(&self, id: &str) -> AppResult<()> {
        self.shops
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::NotFound("Shop".to_string()))
    }

    pub async fn get_sell_list(&self, id: &str) -> AppResult<Vec<ShopListing>> {
        let shop = self.get(id)?;
        let shop = shop.lock().await;
        Ok(shop.get_sell_list().to_vec())
    }

    /// Snapshot of the shop standing on the user's cell. With `name`, the first shop whose name
    /// starts with it; otherwise the first shop there.
    pub async fn open(&self, user_id: UserId, name: Option<&str>) -> AppResult<Shop> {
        let location = {
            let character = self.characters.lock(user_id).await?;
            character.location.clone()
        };
        let shop_ids: Vec<String> = self
            .structures
            .get_location_list(&location)
            .iter()
            .flat_map(|s| s.shops.iter().cloned())
            .collect();

        for id in shop_ids {
            let Ok(shop) = self.get(&id) else {
                tracing::warn!(shop = %id, "structure references a shop that is not loaded");
                continue;
            };
            let shop = shop.lock().await;
            if name.is_none_or(|n| shop.name_matches(n)) {
                let snapshot = shop.clone();
                self.broadcaster
                    .dispatch(Scope::User(user_id), events::shop_open(&snapshot));
                return Ok(snapshot);
            }
        }
        Err(match name {
            Some(n) => DomainError::NotFound(format!("Shop '{n}'")),
            None => DomainError::NotFound("Shop".to_string()),
        })
    }

    /// Buy the listing at `index`, which must still hold `item_id`.
    pub async fn buy(&self, user_id: UserId, shop_id: &str, index: usize, item_id: &str) -> AppResult<Receipt> {
        let shop_handle = self.get(shop_id)?;
        let mut shop = shop_handle.lock().await;
        let mut buyer = self.characters.lock(user_id).await?;
        let max_slots = self.characters.max_slots();

        let structure = self.structures.get_with_shop(&buyer.location, &shop.id)?;
        if !shop.is_selling() {
            return Err(DomainError::PreconditionFailed(format!("{} is not selling anything.", shop.name)));
        }
        let listing = shop
            .get_sell_list()
            .get(index)
            .filter(|l| l.item.id == item_id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("'{item_id}' at that position")))?;
        let template = self.items.template(&listing.item.id)?;

        let quantity = if template.stackable { listing.item.durability } else { 1 };
        let price = (template.price as f64 * shop.sell_price_percent * f64::from(quantity)).round() as i64;

        if buyer.stats.money < price {
            return Err(DomainError::InsufficientFunds {
                have: buyer.stats.money,
                need: price,
            });
        }
        if !listing.stock.available() {
            return Err(DomainError::OutOfStock(template.name.clone()));
        }
        if !buyer.has_room_for(&template, quantity, max_slots) {
            return Err(DomainError::InsufficientCapacity {
                slots: buyer.inventory.len(),
            });
        }

        buyer.debit(price)?;
        let finite = shop.take_stock(index);
        if let Err(e) = buyer.give_item(&template, quantity, max_slots) {
            buyer.credit(price);
            if finite {
                shop.return_stock(index, listing);
            }
            return Err(e);
        }

        tracing::info!(%user_id, shop = %shop.id, item = %template.id, quantity, price, "item bought");
        self.characters.publish_stats(&buyer);
        self.characters.publish_inventory(&buyer);
        if finite {
            self.broadcaster
                .dispatch(Scope::Room(structure.location.clone()), events::shop_sell_list(&shop));
        }

        Ok(Receipt {
            item: template.name.clone(),
            quantity,
            price,
        })
    }

    /// Sell `amount` units from inventory `slot` to the shop.
    pub async fn sell(&self, user_id: UserId, shop_id: &str, slot: usize, amount: u32) -> AppResult<Receipt> {
        let shop_handle = self.get(shop_id)?;
        let shop = shop_handle.lock().await;
        let mut seller = self.characters.lock(user_id).await?;

        self.structures.get_with_shop(&seller.location, &shop.id)?;
        let item = seller
            .inventory
            .get(slot)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(format!("Item in slot {slot}")))?;
        let template = self.items.template(&item.id)?;
        if item.equipped {
            return Err(DomainError::PreconditionFailed(format!(
                "Unequip {} before selling it.",
                template.name
            )));
        }
        if !shop.buys(&item.id) {
            return Err(DomainError::PreconditionFailed(format!(
                "{} does not buy {}.",
                shop.name, template.name
            )));
        }

        let quantity = if template.stackable {
            if amount == 0 {
                return Err(DomainError::Validation {
                    field: "amount",
                    message: "Amount must be at least 1.".into(),
                });
            }
            if amount > item.durability {
                return Err(DomainError::InsufficientQuantity {
                    have: item.durability,
                    need: amount,
                });
            }
            amount
        } else {
            1
        };
        let price = (template.price as f64 * shop.buy_price_percent * f64::from(quantity)).floor() as i64;

        let catalog = self.items.catalog().clone();
        seller.drop_item(&ItemSelector::Slot(slot), quantity, &catalog)?;
        seller.credit(price);

        tracing::info!(%user_id, shop = %shop.id, item = %template.id, quantity, price, "item sold");
        self.characters.publish_stats(&seller);
        self.characters.publish_inventory(&seller);

        Ok(Receipt {
            item: template.name.clone(),
            quantity,
            price,
        })
    }
}
