use crate::error::{AppResult, DomainError};
use crate::models::cooldown::CooldownList;
use crate::models::item::{ItemCatalog, ItemInstance, ItemSelector, ItemTemplate};
use crate::models::skill::{SkillInstance, SkillKind};
use crate::models::types::{Location, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]{2,15}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub health: i64,
    pub health_max: i64,
    pub money: i64,
    pub bank: i64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            health: 100,
            health_max: 100,
            money: 100,
            bank: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Character {
    pub user_id: UserId,
    pub name: String,
    pub stats: Stats,
    pub location: Location,
    /// Ordered slots; the slot index is the position in this list.
    pub inventory: Vec<ItemInstance>,
    pub skills: Vec<SkillInstance>,
    pub cooldowns: CooldownList,
    pub hidden: bool,
}

impl Character {
    pub fn new(user_id: UserId, name: impl Into<String>, location: Location) -> Self {
        Self {
            user_id,
            name: name.into(),
            stats: Stats::default(),
            location,
            inventory: Vec::new(),
            skills: SkillInstance::starting_set(),
            cooldowns: CooldownList::new(),
            hidden: false,
        }
    }

    pub fn validate_name(name: &str) -> AppResult<()> {
        if NAME_RE.is_match(name) {
            Ok(())
        } else {
            Err(DomainError::Validation {
                field: "name",
                message: "Names are 3-16 characters, start with a letter and use letters, digits or _.".into(),
            })
        }
    }

    pub fn skill(&self, kind: SkillKind) -> Option<&SkillInstance> {
        self.skills.iter().find(|s| s.kind == kind)
    }

    pub fn skill_mut(&mut self, kind: SkillKind) -> Option<&mut SkillInstance> {
        self.skills.iter_mut().find(|s| s.kind == kind)
    }

    pub fn free_slots(&self, max_slots: usize) -> usize {
        max_slots.saturating_sub(self.inventory.len())
    }

    /// True if `amount` units of `template` fit without touching anything.
    pub fn has_room_for(&self, template: &ItemTemplate, amount: u32, max_slots: usize) -> bool {
        if template.stackable {
            self.stack_slot(&template.id).is_some() || self.free_slots(max_slots) >= 1
        } else {
            self.free_slots(max_slots) >= amount as usize
        }
    }

    fn stack_slot(&self, id: &str) -> Option<usize> {
        self.inventory.iter().position(|i| i.id == id && !i.equipped)
    }

    /// Add `amount` units of `template`. Capacity is checked first; nothing changes on failure.
    pub fn give_item(&mut self, template: &ItemTemplate, amount: u32, max_slots: usize) -> AppResult<()> {
        if amount == 0 {
            return Err(DomainError::Validation {
                field: "amount",
                message: "Amount must be at least 1.".into(),
            });
        }
        if !self.has_room_for(template, amount, max_slots) {
            return Err(DomainError::InsufficientCapacity {
                slots: self.inventory.len(),
            });
        }

        if template.stackable {
            match self.stack_slot(&template.id) {
                Some(idx) => self.inventory[idx].durability = self.inventory[idx].durability.saturating_add(amount),
                None => self.inventory.push(ItemInstance::from_template(template, amount)),
            }
        } else {
            for _ in 0..amount {
                self.inventory.push(ItemInstance::from_template(template, 1));
            }
        }
        Ok(())
    }

    /// Put back an instance that was previously detached (e.g. from the ground). Stackable
    /// instances merge, others keep their identity.
    pub fn give_instance(&mut self, item: ItemInstance, catalog: &ItemCatalog, max_slots: usize) -> AppResult<()> {
        let stackable = catalog.is_stackable(&item.id);
        let fits = if stackable {
            self.stack_slot(&item.id).is_some() || self.free_slots(max_slots) >= 1
        } else {
            self.free_slots(max_slots) >= 1
        };
        if !fits {
            return Err(DomainError::InsufficientCapacity {
                slots: self.inventory.len(),
            });
        }

        match (stackable, self.stack_slot(&item.id)) {
            (true, Some(idx)) => {
                self.inventory[idx].durability = self.inventory[idx].durability.saturating_add(item.durability)
            }
            _ => self.inventory.push(ItemInstance { equipped: false, ..item }),
        }
        Ok(())
    }

    /// Resolve a selector to an unequipped slot index.
    pub fn find_slot(&self, selector: &ItemSelector, catalog: &ItemCatalog) -> Option<usize> {
        match selector {
            ItemSelector::Slot(idx) => self.inventory.get(*idx).filter(|i| !i.equipped).map(|_| *idx),
            ItemSelector::Name(name) => self
                .inventory
                .iter()
                .position(|i| !i.equipped && catalog.name_matches(i, name)),
        }
    }

    /// Resolve a selector to any slot, equipped or not.
    pub fn find_any_slot(&self, selector: &ItemSelector, catalog: &ItemCatalog) -> Option<usize> {
        match selector {
            ItemSelector::Slot(idx) => (*idx < self.inventory.len()).then_some(*idx),
            ItemSelector::Name(name) => self.inventory.iter().position(|i| catalog.name_matches(i, name)),
        }
    }

    /// Remove `amount` units (stackable) or exactly one unit (non-stackable) and hand them back as a
    /// detached instance. No partial drop: asking for more than is held is a not-found outcome.
    pub fn drop_item(&mut self, selector: &ItemSelector, amount: u32, catalog: &ItemCatalog) -> AppResult<ItemInstance> {
        let Some(idx) = self.find_slot(selector, catalog) else {
            return Err(DomainError::NotFound(format!("Item '{selector}'")));
        };

        if !catalog.is_stackable(&self.inventory[idx].id) {
            return Ok(self.inventory.remove(idx));
        }

        if amount == 0 || self.inventory[idx].durability < amount {
            let name = catalog.display_name(&self.inventory[idx]);
            return Err(DomainError::NotFound(format!("{amount} x {name}")));
        }

        let slot = &mut self.inventory[idx];
        slot.durability -= amount;
        let dropped = ItemInstance::new(slot.id.clone(), amount);
        if slot.durability == 0 {
            self.inventory.remove(idx);
        }
        Ok(dropped)
    }

    pub fn set_equipped(&mut self, selector: &ItemSelector, equipped: bool, catalog: &ItemCatalog) -> AppResult<String> {
        let Some(idx) = self.find_any_slot(selector, catalog) else {
            return Err(DomainError::NotFound(format!("Item '{selector}'")));
        };
        let item = &self.inventory[idx];
        let Some(template) = catalog.get(&item.id) else {
            return Err(DomainError::NotFound(format!("Item template '{}'", item.id)));
        };
        if !template.equipable || template.stackable {
            return Err(DomainError::PreconditionFailed(format!("You cannot equip {}.", template.name)));
        }
        if item.equipped == equipped {
            let state = if equipped { "already" } else { "not" };
            return Err(DomainError::PreconditionFailed(format!("{} is {state} equipped.", template.name)));
        }
        self.inventory[idx].equipped = equipped;
        Ok(template.name.clone())
    }

    pub fn debit(&mut self, amount: i64) -> AppResult<()> {
        if self.stats.money < amount {
            return Err(DomainError::InsufficientFunds {
                have: self.stats.money,
                need: amount,
            });
        }
        self.stats.money -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: i64) {
        self.stats.money = self.stats.money.saturating_add(amount);
    }

    pub fn missing_health(&self) -> i64 {
        (self.stats.health_max - self.stats.health).max(0)
    }

    pub fn summary(&self) -> CharacterSummary {
        CharacterSummary {
            user_id: self.user_id,
            name: self.name.clone(),
            health: self.stats.health,
            health_max: self.stats.health_max,
        }
    }
}

/// What other players see of a character in a grid listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterSummary {
    pub user_id: UserId,
    pub name: String,
    pub health: i64,
    pub health_max: i64,
}

/// Projection stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDocument {
    pub user_id: UserId,
    pub name: String,
    pub stats: Stats,
    pub location: Location,
    #[serde(default)]
    pub inventory: Vec<ItemInstance>,
    #[serde(default)]
    pub skills: Vec<SkillInstance>,
    #[serde(default)]
    pub saved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&Character> for CharacterDocument {
    fn from(c: &Character) -> Self {
        Self {
            user_id: c.user_id,
            name: c.name.clone(),
            stats: c.stats.clone(),
            location: c.location.clone(),
            inventory: c.inventory.clone(),
            skills: c.skills.clone(),
            saved_at: Some(chrono::Utc::now()),
        }
    }
}

impl From<CharacterDocument> for Character {
    fn from(doc: CharacterDocument) -> Self {
        let mut c = Character::new(doc.user_id, doc.name, doc.location);
        c.stats = doc.stats;
        c.inventory = doc.inventory;
        if !doc.skills.is_empty() {
            c.skills = doc.skills;
        }
        c
    }
}
