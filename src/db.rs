pub mod error;
pub mod repo;

use crate::db::error::DbError;

pub type DbResult<T> = Result<T, DbError>;
