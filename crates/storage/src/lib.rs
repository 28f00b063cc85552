//! SQLite persistence for the correction log and the pattern snapshot.
//!
//! The corrections table is the durable source of truth. The pattern tables
//! are a write-back cache of the in-memory store; [`rebuild_store`] can
//! regenerate them from the log at any time.

pub mod db;

use thiserror::Error;

pub use db::{
    append_correction, create_db, load_corrections, load_store, rebuild_store, save_store, DbPool,
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}
