//! JSON file game store.
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/<user_id>/order.json            domains in first-persisted order
//! <root>/<user_id>/<domain>.json         one GameSummary per game
//! ```
//!
//! Writes go to a `.tmp` sibling and are renamed into place, so readers see
//! either the old document or the new one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::fs;
use tokio::sync::Mutex;

use learnscreen_core::aggregate::GameSummary;
use learnscreen_core::error::StoreError;
use learnscreen_core::model::{Domain, LevelResult};
use learnscreen_core::traits::GameStore;

use crate::check_upsert;

const ORDER_FILE: &str = "order.json";

/// File-backed store, one directory per user.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_dir(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !user_id.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.root.join(user_id))
    }

    fn game_path(dir: &Path, domain: Domain) -> PathBuf {
        dir.join(format!("{domain}.json"))
    }

    async fn read_order(dir: &Path) -> Vec<Domain> {
        let path = dir.join(ORDER_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!("failed to read {}: {}", path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!("ignoring corrupt {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    /// Load one game document. `Ok(None)` when it does not exist yet.
    async fn read_game(path: &Path) -> Result<Option<GameSummary>, StoreError> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut summary: GameSummary =
            serde_json::from_str(&content).map_err(|e| StoreError::CorruptDocument {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        // Derived stats are rebuilt from the responses.
        summary.rebuild();
        Ok(Some(summary))
    }

    async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Domains with a document on disk, in first-persisted order. Documents
    /// missing from the order file come last, in dashboard order.
    async fn domains(dir: &Path) -> Vec<Domain> {
        let mut order = Self::read_order(dir).await;
        for domain in Domain::ALL {
            if order.contains(&domain) {
                continue;
            }
            if fs::try_exists(Self::game_path(dir, domain))
                .await
                .unwrap_or(false)
            {
                order.push(domain);
            }
        }
        let mut seen = HashSet::new();
        order.retain(|d| seen.insert(*d));
        order
    }
}

#[async_trait]
impl GameStore for JsonFileStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn upsert_level(
        &self,
        user_id: &str,
        domain: Domain,
        level: u8,
        result: &LevelResult,
    ) -> Result<GameSummary, StoreError> {
        check_upsert(domain, level, result)?;
        let dir = self.user_dir(user_id)?;

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&dir).await?;

        let path = Self::game_path(&dir, domain);
        let mut summary = Self::read_game(&path)
            .await?
            .unwrap_or_else(|| GameSummary::new(user_id, domain));
        summary.merge_level(result.clone())?;
        Self::write_json(&path, &summary).await?;

        let mut order = Self::read_order(&dir).await;
        if !order.contains(&domain) {
            order.push(domain);
            Self::write_json(&dir.join(ORDER_FILE), &order).await?;
        }

        tracing::debug!(
            "stored {} level {} for {} at {}",
            domain,
            level,
            user_id,
            path.display()
        );
        Ok(summary)
    }

    async fn read_game_summaries(&self, user_id: &str) -> Result<Vec<GameSummary>, StoreError> {
        let dir = self.user_dir(user_id)?;
        if !fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let domains = Self::domains(&dir).await;
        let paths: Vec<PathBuf> = domains.iter().map(|&d| Self::game_path(&dir, d)).collect();
        let loaded = join_all(paths.iter().map(|p| Self::read_game(p))).await;

        let mut games = Vec::with_capacity(loaded.len());
        for (path, result) in paths.iter().zip(loaded) {
            match result {
                Ok(Some(summary)) => games.push(summary),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(games)
    }
}
