use crate::error::{AppResult, DomainError};
use crate::events;
use crate::models::skill::SkillKind;
use crate::models::types::UserId;
use crate::net::output::{Broadcaster, Scope};
use crate::services::CharacterService;
use crate::state::cooldowns::CooldownRegistry;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillOutcome {
    /// Hide toggled; carries the new state
    Hidden(bool),
    /// Search revealed this character
    Found(String),
    /// Search came up empty
    NothingFound,
}

pub struct SkillService {
    characters: Arc<CharacterService>,
    cooldowns: Arc<CooldownRegistry>,
    broadcaster: Arc<Broadcaster>,
}

impl SkillService {
    pub fn new(characters: Arc<CharacterService>, cooldowns: Arc<CooldownRegistry>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            characters,
            cooldowns,
            broadcaster,
        }
    }

    /// The one entry point for every skill. The caller must not hold the actor's lock.
    pub async fn apply(&self, kind: SkillKind, actor: UserId, target: Option<&str>) -> AppResult<SkillOutcome> {
        let data = kind.data();
        let target = target.map(str::trim).filter(|t| !t.is_empty());
        if data.needs_target && target.is_none() {
            return Err(DomainError::Validation {
                field: "target",
                message: format!("Who do you want to {}?", data.name),
            });
        }

        let mut character = self.characters.lock(actor).await?;
        self.cooldowns.ensure_ready(&character, kind.as_str())?;
        if let Some(skill) = character.skill_mut(kind) {
            skill.uses += 1;
        }
        self.characters.start_cooldown(&character, kind.as_str(), data.cooldown_seconds);

        match (kind, target) {
            (SkillKind::Hide, _) => {
                let hidden = !character.hidden;
                self.characters.set_hidden(&mut character, hidden);
                Ok(SkillOutcome::Hidden(hidden))
            }
            (SkillKind::Search, Some(name)) => {
                let location = character.location.clone();
                let searcher = character.name.clone();
                drop(character);

                let Some(found_id) = self.characters.find_in_cell(&location, name, actor, true) else {
                    return Ok(SkillOutcome::NothingFound);
                };
                let mut found = self.characters.lock(found_id).await?;
                if found.location != location || !found.hidden {
                    return Ok(SkillOutcome::NothingFound);
                }
                self.characters.set_hidden(&mut found, false);
                self.broadcaster.dispatch(
                    Scope::User(found_id),
                    events::system(format!("{searcher} found your hiding place!")),
                );
                tracing::debug!(%actor, found = %found.name, "search revealed a hidden player");
                Ok(SkillOutcome::Found(found.name.clone()))
            }
            (SkillKind::Search, None) => Err(DomainError::Validation {
                field: "target",
                message: "Who do you want to search for?".into(),
            }),
        }
    }
}
