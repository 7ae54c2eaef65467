use crate::models::types::InstanceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable catalog entry for an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Unique key within the catalog (e.g., "apple")
    pub id: String,

    /// Display name (e.g., "Apple")
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Whether multiple units merge into one slot
    #[serde(default)]
    pub stackable: bool,

    /// Base price in money units
    #[serde(default)]
    pub price: i64,

    /// Initial durability of a fresh non-stackable unit
    #[serde(default = "default_durability")]
    pub durability: u32,

    #[serde(default)]
    pub equipable: bool,
}

fn default_durability() -> u32 {
    1
}

/// A concrete item value. For stackable templates `durability` is the unit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInstance {
    /// Template key
    pub id: String,

    /// Remaining durability, or quantity for stackable items
    pub durability: u32,

    /// Only set on non-stackable units
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "instanceId")]
    pub instance_id: Option<InstanceId>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub equipped: bool,
}

impl ItemInstance {
    pub fn new(id: impl Into<String>, durability: u32) -> Self {
        Self {
            id: id.into(),
            durability,
            instance_id: None,
            equipped: false,
        }
    }

    /// Fresh unit of the given template, with a unique instance id when it cannot stack.
    pub fn from_template(template: &ItemTemplate, amount: u32) -> Self {
        if template.stackable {
            Self::new(template.id.clone(), amount)
        } else {
            Self {
                id: template.id.clone(),
                durability: template.durability,
                instance_id: Some(InstanceId::new()),
                equipped: false,
            }
        }
    }
}

/// How a player refers to an item: by inventory slot or by (prefix of) its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSelector {
    Slot(usize),
    Name(String),
}

impl ItemSelector {
    pub fn parse(s: &str) -> Self {
        match s.parse::<usize>() {
            Ok(idx) => ItemSelector::Slot(idx),
            Err(_) => ItemSelector::Name(s.to_string()),
        }
    }
}

impl core::fmt::Display for ItemSelector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ItemSelector::Slot(idx) => write!(f, "slot {idx}"),
            ItemSelector::Name(name) => f.write_str(name),
        }
    }
}

/// The item catalog, loaded once from the world definition.
#[derive(Debug, Default, Clone)]
pub struct ItemCatalog {
    templates: HashMap<String, Arc<ItemTemplate>>,
}

impl ItemCatalog {
    pub fn new(templates: impl IntoIterator<Item = ItemTemplate>) -> Self {
        Self {
            templates: templates.into_iter().map(|t| (t.id.clone(), Arc::new(t))).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ItemTemplate>> {
        self.templates.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    /// Exact id match first, then case-insensitive prefix over display names.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<ItemTemplate>> {
        if let Some(t) = self.templates.get(name) {
            return Some(t.clone());
        }
        let needle = name.to_lowercase();
        let mut matches: Vec<_> = self
            .templates
            .values()
            .filter(|t| t.name.to_lowercase().starts_with(&needle) || t.id.starts_with(&needle))
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches.first().map(|t| (*t).clone())
    }

    /// True when the instance's display name starts with `prefix`, ignoring case.
    pub fn name_matches(&self, item: &ItemInstance, prefix: &str) -> bool {
        let needle = prefix.to_lowercase();
        match self.templates.get(&item.id) {
            Some(t) => t.name.to_lowercase().starts_with(&needle) || t.id.starts_with(&needle),
            None => item.id.starts_with(&needle),
        }
    }

    pub fn display_name(&self, item: &ItemInstance) -> String {
        self.templates
            .get(&item.id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| item.id.clone())
    }

    pub fn is_stackable(&self, id: &str) -> bool {
        self.templates.get(id).is_some_and(|t| t.stackable)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
