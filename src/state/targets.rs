//! Who is aiming at whom. Kept outside the characters so that clearing the aims of a mover never
//! needs a second character lock.

use crate::models::types::UserId;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
struct Aims {
    target: HashMap<UserId, UserId>,
    targeted_by: HashMap<UserId, BTreeSet<UserId>>,
}

impl Aims {
    fn release(&mut self, actor: UserId) -> Option<UserId> {
        let prev = self.target.remove(&actor)?;
        if let Some(set) = self.targeted_by.get_mut(&prev) {
            set.remove(&actor);
            if set.is_empty() {
                self.targeted_by.remove(&prev);
            }
        }
        Some(prev)
    }
}

#[derive(Debug, Default)]
pub struct TargetTable {
    inner: Mutex<Aims>,
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aim `actor` at `target`, releasing any previous aim. Returns the previous target.
    pub fn aim(&self, actor: UserId, target: UserId) -> Option<UserId> {
        let mut aims = self.inner.lock();
        let prev = aims.release(actor);
        aims.target.insert(actor, target);
        aims.targeted_by.entry(target).or_default().insert(actor);
        prev
    }

    pub fn release(&self, actor: UserId) -> Option<UserId> {
        self.inner.lock().release(actor)
    }

    pub fn target_of(&self, actor: UserId) -> Option<UserId> {
        self.inner.lock().target.get(&actor).copied()
    }

    pub fn targeted_by(&self, user: UserId) -> Vec<UserId> {
        self.inner
            .lock()
            .targeted_by
            .get(&user)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop the user's own aim and every aim at the user. Returns the aimers that lost their target.
    pub fn clear_involving(&self, user: UserId) -> Vec<UserId> {
        let mut aims = self.inner.lock();
        aims.release(user);
        let aimers: Vec<UserId> = aims
            .targeted_by
            .remove(&user)
            .map(|s| s.into_iter().collect())
            .unwrap_or_default();
        for aimer in &aimers {
            aims.target.remove(aimer);
        }
        aimers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_aim_releases_previous_target() {
        let t = TargetTable::new();
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        assert_eq!(t.aim(a, b), None);
        assert_eq!(t.aim(a, c), Some(b));
        assert!(t.targeted_by(b).is_empty());
        assert_eq!(t.targeted_by(c), vec![a]);
    }

    #[test]
    fn clearing_a_mover_resets_its_aimers() {
        let t = TargetTable::new();
        let (a, b, mover) = (UserId::new(), UserId::new(), UserId::new());
        t.aim(a, mover);
        t.aim(b, mover);
        t.aim(mover, a);

        let mut lost = t.clear_involving(mover);
        lost.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(lost, expected);
        assert_eq!(t.target_of(a), None);
        assert_eq!(t.target_of(mover), None);
        assert!(t.targeted_by(a).is_empty());
    }
}
