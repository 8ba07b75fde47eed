pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod reveal;
pub mod search;
pub mod storage;
pub mod streams;

pub use app::Board;
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{BoardError, StoreError};
pub use storage::{MemoryStore, RecordStore, SqliteStore};
