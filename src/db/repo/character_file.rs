use crate::db::DbResult;
use crate::db::error::DbError;
use crate::db::repo::CharacterRepo;
use crate::models::character::CharacterDocument;
use crate::models::types::UserId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One JSON document per user, `<dir>/<user_id>.json`. Creation is serialized so the name check
/// and the write cannot interleave.
pub struct FileCharacterRepo {
    dir: PathBuf,
    create_lock: Mutex<()>,
}

impl FileCharacterRepo {
    pub async fn open(dir: impl AsRef<Path>) -> DbResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            create_lock: Mutex::new(()),
        })
    }

    fn path_for(&self, user_id: UserId) -> PathBuf {
        self.dir.join(format!("{user_id}.json"))
    }

    async fn read(&self, path: &Path) -> DbResult<Option<CharacterDocument>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &CharacterDocument) -> DbResult<()> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let path = self.path_for(doc.user_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn name_owner(&self, name: &str) -> DbResult<Option<UserId>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path).await {
                Ok(Some(doc)) if doc.name.eq_ignore_ascii_case(name) => return Ok(Some(doc.user_id)),
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable character file"),
            }
        }
        Ok(None)
    }
}

#[async_trait::async_trait]
impl CharacterRepo for FileCharacterRepo {
    async fn find_by_user(&self, user_id: UserId) -> DbResult<Option<CharacterDocument>> {
        let doc = self.read(&self.path_for(user_id)).await?;
        match doc {
            Some(d) if d.user_id != user_id => Err(DbError::Decode(format!(
                "document for {user_id} belongs to {}",
                d.user_id
            ))),
            other => Ok(other),
        }
    }

    async fn create(&self, doc: &CharacterDocument) -> DbResult<()> {
        let _guard = self.create_lock.lock().await;
        if tokio::fs::try_exists(self.path_for(doc.user_id)).await? {
            return Err(DbError::UniqueViolation(doc.user_id.to_string()));
        }
        if self.name_owner(&doc.name).await?.is_some_and(|owner| owner != doc.user_id) {
            return Err(DbError::UniqueViolation(doc.name.clone()));
        }
        self.write(doc).await
    }

    async fn save(&self, doc: &CharacterDocument) -> DbResult<()> {
        self.write(doc).await
    }
}
