//! learnscreen-store: Game summary persistence.
//!
//! Implements the `GameStore` trait with an in-memory store and a JSON file
//! store, and loads the `learnscreen.toml` configuration that selects
//! between them.

pub mod config;
pub mod json_file;
pub mod memory;
pub mod mock;

pub use config::{create_store, load_config, load_config_from, ScreeningConfig, StoreConfig};
pub use json_file::JsonFileStore;
pub use learnscreen_core::error::StoreError;
pub use memory::MemoryStore;
pub use mock::MockStore;

use learnscreen_core::error::EngineError;
use learnscreen_core::model::{check_level, Domain, LevelResult};

/// Reject an upsert whose key disagrees with the result it carries.
pub(crate) fn check_upsert(domain: Domain, level: u8, result: &LevelResult) -> Result<(), StoreError> {
    if result.domain != domain {
        return Err(EngineError::DomainMismatch {
            expected: domain,
            actual: result.domain,
        }
        .into());
    }
    check_level(level)?;
    if result.level != level {
        return Err(EngineError::InvalidLevel(result.level).into());
    }
    Ok(())
}
