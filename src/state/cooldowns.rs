//! Per-character action cooldowns, advanced by one fixed-interval ticker.
//!
//! The registry keeps a clone of every online character's [`CooldownList`] handle. The ticker only
//! ever touches those handles, so a character busy in a long command never stalls the tick.

use crate::error::{AppResult, DomainError};
use crate::models::character::Character;
use crate::models::cooldown::{Cooldown, CooldownList};
use crate::models::types::UserId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct CooldownRegistry {
    lists: DashMap<UserId, CooldownList>,
    tick_ms: u64,
}

impl CooldownRegistry {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            lists: DashMap::new(),
            tick_ms: tick_ms.max(1),
        }
    }

    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    pub fn register(&self, character: &Character) {
        self.lists.insert(character.user_id, character.cooldowns.clone());
    }

    pub fn unregister(&self, user_id: UserId) {
        self.lists.remove(&user_id);
    }

    /// Number of ticks a duration lasts, rounded up so a cooldown never ends early.
    pub fn ticks_for(&self, seconds: f64) -> u32 {
        let ms = (seconds * 1000.0).max(0.0);
        (ms / self.tick_ms as f64).ceil() as u32
    }

    /// Register a cooldown on `action`. Durations are validated by the caller.
    pub fn add(&self, character: &Character, action: &str, seconds: f64, autostart: bool) {
        let ticks = self.ticks_for(seconds);
        character.cooldowns.push(Cooldown::new(action, ticks, autostart));
        tracing::trace!(user_id = %character.user_id, action, ticks, autostart, "cooldown added");
    }

    pub fn start(&self, character: &Character, action: &str) -> bool {
        character.cooldowns.start(action)
    }

    /// Remaining ticks for `action`; 0 means it is not on cooldown.
    pub fn ticks_left(&self, character: &Character, action: &str) -> u32 {
        character.cooldowns.ticks_left(action)
    }

    /// Fails with `OnCooldown` while `action` still has ticks left.
    pub fn ensure_ready(&self, character: &Character, action: &str) -> AppResult<()> {
        match self.ticks_left(character, action) {
            0 => Ok(()),
            ticks => Err(DomainError::OnCooldown {
                action: action.to_string(),
                remaining_ms: u64::from(ticks) * self.tick_ms,
            }),
        }
    }

    /// Drop expired entries from the character's list.
    pub fn cleanup(&self, character: &Character) -> usize {
        character.cooldowns.cleanup()
    }

    /// Same as [`Self::cleanup`], through the registered handle. Does not need the character lock.
    pub fn cleanup_user(&self, user_id: UserId) -> usize {
        self.lists.get(&user_id).map(|l| l.value().cleanup()).unwrap_or(0)
    }

    /// Advance every registered list by one tick. Returns how many cooldowns expired.
    pub fn tick(&self) -> usize {
        self.lists.iter().map(|entry| entry.value().tick()).sum()
    }

    /// Spawn the ticker task. It runs until the runtime shuts down.
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(registry.tick_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let expired = registry.tick();
                if expired > 0 {
                    tracing::trace!(expired, "cooldowns expired");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::Location;

    fn hero() -> Character {
        Character::new(UserId::new(), "Hero", Location::new("earth", 0, 0))
    }

    #[test]
    fn never_registered_is_zero() {
        let reg = CooldownRegistry::new(100);
        let c = hero();
        assert_eq!(reg.ticks_left(&c, "heal"), 0);
        assert!(reg.ensure_ready(&c, "heal").is_ok());
    }

    #[test]
    fn ticks_round_up() {
        let reg = CooldownRegistry::new(100);
        assert_eq!(reg.ticks_for(0.3), 3);
        assert_eq!(reg.ticks_for(0.25), 3);
        assert_eq!(reg.ticks_for(2.0), 20);
    }

    #[test]
    fn counts_down_monotonically_to_zero() {
        let reg = CooldownRegistry::new(100);
        let c = hero();
        reg.register(&c);
        reg.add(&c, "move", 0.5, true);

        let mut last = reg.ticks_left(&c, "move");
        assert_eq!(last, 5);
        for _ in 0..10 {
            reg.tick();
            let now = reg.ticks_left(&c, "move");
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 0);
        assert_eq!(reg.cleanup(&c), 1);
    }

    #[test]
    fn created_cooldown_waits_for_start() {
        let reg = CooldownRegistry::new(100);
        let c = hero();
        reg.register(&c);
        reg.add(&c, "heal", 0.2, false);
        reg.tick();
        reg.tick();
        assert_eq!(reg.ticks_left(&c, "heal"), 2);
        assert!(reg.start(&c, "heal"));
        reg.tick();
        reg.tick();
        assert_eq!(reg.ticks_left(&c, "heal"), 0);
    }

    #[test]
    fn ensure_ready_reports_remaining_time() {
        let reg = CooldownRegistry::new(100);
        let c = hero();
        reg.add(&c, "travel", 1.0, true);
        match reg.ensure_ready(&c, "travel") {
            Err(DomainError::OnCooldown { remaining_ms, .. }) => assert_eq!(remaining_ms, 1000),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unregistered_lists_stop_ticking() {
        let reg = CooldownRegistry::new(100);
        let c = hero();
        reg.register(&c);
        reg.add(&c, "move", 0.3, true);
        reg.unregister(c.user_id);
        reg.tick();
        assert_eq!(reg.ticks_left(&c, "move"), 3);
    }
}
