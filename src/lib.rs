pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod import;
pub mod input;
pub mod models;
pub mod net;
pub mod services;
pub mod state;

// Convenient re-exports (so call sites can do `gridmud::Registry`, etc.)
pub use commands::process_command;
pub use state::{
    registry::Registry,
    session::{ConnState, Session},
};
