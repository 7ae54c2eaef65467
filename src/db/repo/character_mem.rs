use crate::db::DbResult;
use crate::db::error::DbError;
use crate::db::repo::CharacterRepo;
use crate::models::character::CharacterDocument;
use crate::models::types::UserId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Keeps documents for the lifetime of the process. Used when no data directory is configured and
/// by the tests.
#[derive(Default)]
pub struct MemoryCharacterRepo {
    docs: DashMap<UserId, CharacterDocument>,
    /// lowercased name -> owner
    names: DashMap<String, UserId>,
}

impl MemoryCharacterRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[async_trait::async_trait]
impl CharacterRepo for MemoryCharacterRepo {
    async fn find_by_user(&self, user_id: UserId) -> DbResult<Option<CharacterDocument>> {
        Ok(self.docs.get(&user_id).map(|d| d.value().clone()))
    }

    async fn create(&self, doc: &CharacterDocument) -> DbResult<()> {
        match self.names.entry(doc.name.to_lowercase()) {
            Entry::Occupied(e) if *e.get() != doc.user_id => {
                return Err(DbError::UniqueViolation(doc.name.clone()));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(e) => {
                e.insert(doc.user_id);
            }
        }
        if self.docs.contains_key(&doc.user_id) {
            return Err(DbError::UniqueViolation(doc.user_id.to_string()));
        }
        self.docs.insert(doc.user_id, doc.clone());
        Ok(())
    }

    async fn save(&self, doc: &CharacterDocument) -> DbResult<()> {
        self.names.insert(doc.name.to_lowercase(), doc.user_id);
        self.docs.insert(doc.user_id, doc.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::character::Character;
    use crate::models::types::Location;

    fn doc(name: &str) -> CharacterDocument {
        CharacterDocument::from(&Character::new(UserId::new(), name, Location::new("earth", 0, 0)))
    }

    #[tokio::test]
    async fn duplicate_name_is_a_unique_violation() {
        let repo = MemoryCharacterRepo::new();
        repo.create(&doc("Hero")).await.unwrap();
        let err = repo.create(&doc("hero")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn save_then_find() {
        let repo = MemoryCharacterRepo::new();
        let mut d = doc("Hero");
        repo.create(&d).await.unwrap();
        d.stats.money = 42;
        repo.save(&d).await.unwrap();
        let found = repo.find_by_user(d.user_id).await.unwrap().unwrap();
        assert_eq!(found.stats.money, 42);
        assert!(repo.find_by_user(UserId::new()).await.unwrap().is_none());
    }
}
