use crate::db::DbResult;
use crate::models::character::CharacterDocument;
use crate::models::types::UserId;

/// Storage of character documents. The engine only ever reads a character at login and writes it
/// back at logout or on an explicit save.
#[async_trait::async_trait]
pub trait CharacterRepo: Send + Sync {
    /// Fetch the stored projection for a user, if any
    async fn find_by_user(&self, user_id: UserId) -> DbResult<Option<CharacterDocument>>;

    /// Store a brand-new character. A name held by another user is a `UniqueViolation`.
    async fn create(&self, doc: &CharacterDocument) -> DbResult<()>;

    /// Upsert
    async fn save(&self, doc: &CharacterDocument) -> DbResult<()>;
}
