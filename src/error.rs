use crate::db::error::DbError;
use thiserror::Error;

pub type AppResult<T> = Result<T, DomainError>;

/// Coarse classification of a failure, used to decide what the player gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input
    Validation,
    /// Entity, item, shop or destination is absent
    NotFound,
    /// Funds, capacity, stock, cooldown and similar game rules
    Invariant,
    /// Persistence or other collaborator failed
    External,
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// Not enough money on hand
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: i64 },

    /// Inventory is full
    #[error("inventory full: {slots} slots in use")]
    InsufficientCapacity { slots: usize },

    /// Insufficient quantity to perform action
    #[error("insufficient quantity: have {have}, need {need}")]
    InsufficientQuantity { have: u32, need: u32 },

    #[error("out of stock: {0}")]
    OutOfStock(String),

    #[error("{action} is on cooldown for {remaining_ms}ms")]
    OnCooldown { action: String, remaining_ms: u64 },

    /// Some precondition failed
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("name already taken: {0}")]
    AlreadyTaken(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Infra(#[from] InfraError),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation { .. } => ErrorKind::Validation,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::InsufficientFunds { .. }
            | DomainError::InsufficientCapacity { .. }
            | DomainError::InsufficientQuantity { .. }
            | DomainError::OutOfStock(_)
            | DomainError::OnCooldown { .. }
            | DomainError::PreconditionFailed(_)
            | DomainError::PermissionDenied
            | DomainError::NotLoggedIn
            | DomainError::AlreadyTaken(_) => ErrorKind::Invariant,
            DomainError::InvalidData(_) | DomainError::Db(_) | DomainError::Infra(_) => ErrorKind::External,
        }
    }

    /// Text shown to the player. External failures never leak their internals.
    pub fn player_message(&self) -> String {
        match self {
            DomainError::Validation { message, .. } => message.clone(),
            DomainError::NotFound(what) => format!("{what} not found."),
            DomainError::InsufficientFunds { have, need } => {
                format!("You cannot afford that (you have ${have}, you need ${need}).")
            }
            DomainError::InsufficientCapacity { .. } => "Your inventory is full.".to_string(),
            DomainError::InsufficientQuantity { have, need } => {
                format!("You only have {have}, not {need}.")
            }
            DomainError::OutOfStock(item) => format!("The shop is out of {item}."),
            DomainError::OnCooldown { action, remaining_ms } => {
                format!("You must wait {:.1}s before you can {action} again.", *remaining_ms as f64 / 1000.0)
            }
            DomainError::PreconditionFailed(msg) => msg.clone(),
            DomainError::PermissionDenied => "You are not allowed to do that.".to_string(),
            DomainError::NotLoggedIn => "You are not logged in.".to_string(),
            DomainError::AlreadyTaken(name) => format!("The name '{name}' is already taken."),
            DomainError::InvalidData(_) | DomainError::Db(_) | DomainError::Infra(_) => {
                "Internal error, please try again later.".to_string()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigErrorKind {
    #[error("failed to read file: {0}")]
    Read(std::io::Error),

    #[error("failed to parse file: {0}")]
    Parse(toml::de::Error),

    #[error("failed to parse world file: {0}")]
    ParseYaml(serde_yaml::Error),

    #[error("invalid environment variable {0}: {1}")]
    InvalidEnv(String, String),
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: std::path::PathBuf,
        #[source]
        source: ConfigErrorKind,
    },

    #[error("invalid environment: {0}")]
    Env(#[source] ConfigErrorKind),

    #[error("network issue: {0}")]
    Net(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_onto_kinds() {
        let v = DomainError::Validation {
            field: "ticks",
            message: "too small".into(),
        };
        assert_eq!(v.kind(), ErrorKind::Validation);
        assert_eq!(DomainError::NotFound("Shop".into()).kind(), ErrorKind::NotFound);
        assert_eq!(DomainError::OutOfStock("apple".into()).kind(), ErrorKind::Invariant);
        assert_eq!(DomainError::InsufficientCapacity { slots: 20 }.kind(), ErrorKind::Invariant);
        assert_eq!(DomainError::Db(DbError::NotFound).kind(), ErrorKind::External);
    }

    #[test]
    fn external_failures_do_not_leak() {
        let e = DomainError::Db(DbError::Decode("column xyz".into()));
        assert!(!e.player_message().contains("xyz"));
    }

    #[test]
    fn cooldown_message_in_seconds() {
        let e = DomainError::OnCooldown {
            action: "heal".into(),
            remaining_ms: 2500,
        };
        assert_eq!(e.player_message(), "You must wait 2.5s before you can heal again.");
    }
}
