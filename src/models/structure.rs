use crate::models::types::Location;
use serde::{Deserialize, Serialize};

/// Parameters of a structure offering `/heal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealOffer {
    #[serde(default = "one")]
    pub hp_per_tick: i64,
    pub price_per_tick: i64,
    #[serde(default)]
    pub cooldown_seconds: f64,
}

fn one() -> i64 {
    1
}

/// What a heal of a given length costs and restores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealQuote {
    pub ticks: i64,
    pub amount: i64,
    pub price: i64,
}

impl HealOffer {
    /// Quote `ticks` of healing for a character missing `missing` health. A heal that would
    /// overshoot is cut down to the ticks actually needed, and only the health restored is paid
    /// for, rounded down.
    pub fn quote(&self, ticks: i64, missing: i64) -> Option<HealQuote> {
        if ticks < 1 || missing < 1 || self.hp_per_tick < 1 {
            return None;
        }
        let full = ticks.saturating_mul(self.hp_per_tick);
        if full <= missing {
            return Some(HealQuote {
                ticks,
                amount: full,
                price: ticks.saturating_mul(self.price_per_tick),
            });
        }
        Some(HealQuote {
            ticks: (missing + self.hp_per_tick - 1) / self.hp_per_tick,
            amount: missing,
            price: missing.saturating_mul(self.price_per_tick) / self.hp_per_tick,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub name: String,
    pub world: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub price: i64,
}

impl Destination {
    pub fn location(&self) -> Location {
        Location::new(self.world.clone(), self.x, self.y)
    }
}

/// Static map furniture. Built once at world load and never moved.
#[derive(Debug, Clone, Serialize)]
pub struct Structure {
    pub id: String,
    pub name: String,
    pub description: String,
    pub location: Location,
    /// Commands offered here, e.g. "/heal", "/travel", "/shop", "/bank"
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heal: Option<HealOffer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,
    /// Shop ids owned by this structure
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shops: Vec<String>,
    /// Cooldown applied after a `/travel` from here
    pub travel_cooldown_seconds: f64,
}

impl Structure {
    pub fn offers(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    pub fn name_matches(&self, prefix: &str) -> bool {
        self.name.to_lowercase().starts_with(&prefix.to_lowercase()) || self.id == prefix
    }

    pub fn destination(&self, name: &str) -> Option<&Destination> {
        let needle = name.to_lowercase();
        self.destinations
            .iter()
            .find(|d| d.name.to_lowercase() == needle)
            .or_else(|| self.destinations.iter().find(|d| d.name.to_lowercase().starts_with(&needle)))
    }
}

/// What a grid listing shows of a structure.
#[derive(Debug, Clone, Serialize)]
pub struct StructureSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
}

impl From<&Structure> for StructureSummary {
    fn from(s: &Structure) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            description: s.description.clone(),
            commands: s.commands.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer() -> HealOffer {
        HealOffer {
            hp_per_tick: 10,
            price_per_tick: 3,
            cooldown_seconds: 0.0,
        }
    }

    #[test]
    fn uncapped_heal_charges_every_tick() {
        let q = offer().quote(2, 50).unwrap();
        assert_eq!(q, HealQuote { ticks: 2, amount: 20, price: 6 });
    }

    #[test]
    fn capped_heal_is_repriced() {
        // 25 missing at 10 per tick needs 3 ticks, not the 10 asked for.
        let q = offer().quote(10, 25).unwrap();
        assert_eq!(q, HealQuote { ticks: 3, amount: 25, price: 7 });
    }

    #[test]
    fn capped_heal_charges_only_for_health_restored() {
        let offer = HealOffer {
            hp_per_tick: 5,
            price_per_tick: 3,
            cooldown_seconds: 0.0,
        };
        // 12 hp is 2.4 ticks worth, 7.2 rounded down
        let q = offer.quote(10, 12).unwrap();
        assert_eq!(q, HealQuote { ticks: 3, amount: 12, price: 7 });
        assert!(q.price * offer.hp_per_tick <= q.amount * offer.price_per_tick);
    }

    #[test]
    fn nothing_to_quote() {
        assert!(offer().quote(0, 25).is_none());
        assert!(offer().quote(3, 0).is_none());
    }

    #[test]
    fn destination_prefers_exact_name() {
        let s = Structure {
            id: "airport".into(),
            name: "Airport".into(),
            description: String::new(),
            location: Location::new("earth", 0, 0),
            commands: vec!["/travel".into()],
            heal: None,
            destinations: vec![
                Destination { name: "Moonbase".into(), world: "moon".into(), x: 0, y: 0, price: 50 },
                Destination { name: "Moon".into(), world: "moon".into(), x: 1, y: 1, price: 40 },
            ],
            shops: vec![],
            travel_cooldown_seconds: 0.0,
        };
        assert_eq!(s.destination("moon").unwrap().price, 40);
        assert_eq!(s.destination("moonb").unwrap().price, 50);
        assert!(s.destination("mars").is_none());
    }
}
