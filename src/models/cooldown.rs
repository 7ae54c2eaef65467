use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CooldownState {
    /// Registered but not started; does not tick
    Created,
    Running,
    Expired,
}

/// A timed lock on one action of one character.
#[derive(Debug, Clone, Serialize)]
pub struct Cooldown {
    /// Cleared when the cooldown expires
    pub action: Option<String>,
    #[serde(rename = "ticksRemaining")]
    pub ticks_remaining: u32,
    pub state: CooldownState,
}

impl Cooldown {
    pub fn new(action: impl Into<String>, ticks: u32, autostart: bool) -> Self {
        let mut cd = Self {
            action: Some(action.into()),
            ticks_remaining: ticks,
            state: CooldownState::Created,
        };
        if autostart {
            cd.start();
        }
        cd
    }

    pub fn start(&mut self) {
        if self.state != CooldownState::Created {
            return;
        }
        if self.ticks_remaining == 0 {
            self.expire();
        } else {
            self.state = CooldownState::Running;
        }
    }

    /// One fixed-interval tick. Returns true when this tick expired the cooldown.
    pub fn tick(&mut self) -> bool {
        if self.state != CooldownState::Running {
            return false;
        }
        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
        if self.ticks_remaining == 0 {
            self.expire();
            return true;
        }
        false
    }

    fn expire(&mut self) {
        self.state = CooldownState::Expired;
        self.ticks_remaining = 0;
        self.action = None;
    }

    pub fn is_expired(&self) -> bool {
        self.state == CooldownState::Expired
    }

    pub fn matches(&self, action: &str) -> bool {
        !self.is_expired() && self.action.as_deref() == Some(action)
    }
}

/// The cooldowns owned by one character. The character holds it; the tick loop holds a clone of
/// the handle so it never has to lock the character itself.
#[derive(Debug, Clone, Default)]
pub struct CooldownList(Arc<Mutex<Vec<Cooldown>>>);

impl CooldownList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, cooldown: Cooldown) {
        self.0.lock().push(cooldown);
    }

    /// Start the most recent `Created` cooldown for `action`. Returns false if there is none.
    pub fn start(&self, action: &str) -> bool {
        let mut list = self.0.lock();
        match list
            .iter_mut()
            .rev()
            .find(|c| c.state == CooldownState::Created && c.action.as_deref() == Some(action))
        {
            Some(cd) => {
                cd.start();
                true
            }
            None => false,
        }
    }

    /// Remaining ticks of the most recent non-expired cooldown for `action`, 0 if none.
    pub fn ticks_left(&self, action: &str) -> u32 {
        self.0
            .lock()
            .iter()
            .rev()
            .find(|c| c.matches(action))
            .map(|c| c.ticks_remaining)
            .unwrap_or(0)
    }

    /// Tick every running cooldown. Returns the number that expired on this tick.
    pub fn tick(&self) -> usize {
        self.0.lock().iter_mut().map(|c| c.tick()).filter(|expired| *expired).count()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut list = self.0.lock();
        let before = list.len();
        list.retain(|c| !c.is_expired());
        before - list.len()
    }

    pub fn snapshot(&self) -> Vec<Cooldown> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}
