//! Durable `player -> authorizer` record.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use mcbridge_core::write_text_atomic;
use serde::{Deserialize, Serialize};

use crate::canonical_player_key;

const ADMIN_SENTINEL: &str = "ADMIN";
const LEGACY_ADMIN_ID: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StoredAuthorizer", into = "StoredAuthorizer")]
/// Identity that authorized an allowlist entry.
pub enum Authorizer {
    /// Added directly on the server, or discovered there without a local record.
    Admin,
    /// Chat-platform user id of the requester.
    User(u64),
}

impl Authorizer {
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredAuthorizer {
    Id(u64),
    Text(String),
}

impl TryFrom<StoredAuthorizer> for Authorizer {
    type Error = String;

    fn try_from(value: StoredAuthorizer) -> std::result::Result<Self, Self::Error> {
        let id = match value {
            StoredAuthorizer::Id(id) => id,
            StoredAuthorizer::Text(text) if text == ADMIN_SENTINEL => return Ok(Self::Admin),
            StoredAuthorizer::Text(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("unrecognized authorizer '{text}'"))?,
        };
        Ok(Self::from_stored_id(id))
    }
}

impl Authorizer {
    /// Numeric ids and numeric strings share one mapping; legacy `0` means admin.
    fn from_stored_id(id: u64) -> Self {
        if id == LEGACY_ADMIN_ID {
            Self::Admin
        } else {
            Self::User(id)
        }
    }
}

impl From<Authorizer> for StoredAuthorizer {
    fn from(value: Authorizer) -> Self {
        match value {
            Authorizer::Admin => Self::Text(ADMIN_SENTINEL.to_string()),
            Authorizer::User(id) => Self::Id(id),
        }
    }
}

/// Provenance entries keyed by canonical (lowercase) player name.
///
/// Every accessor canonicalizes its argument, so two keys that differ only
/// by case can never coexist.
#[derive(Debug, Clone)]
pub struct ProvenanceStore {
    path: PathBuf,
    entries: BTreeMap<String, Authorizer>,
}

impl ProvenanceStore {
    /// Loads the store at `path`; a missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = read_entries(&path)?;
        Ok(Self { path, entries })
    }

    /// Replaces in-memory entries with the current on-disk document.
    pub fn reload(&mut self) -> Result<()> {
        self.entries = read_entries(&self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, player: &str) -> Option<Authorizer> {
        self.entries.get(&canonical_player_key(player)).copied()
    }

    pub fn contains(&self, player: &str) -> bool {
        self.entries.contains_key(&canonical_player_key(player))
    }

    /// Records `authorizer` for `player`. Returns true when the entry changed.
    pub fn record(&mut self, player: &str, authorizer: Authorizer) -> bool {
        let key = canonical_player_key(player);
        self.entries.insert(key, authorizer) != Some(authorizer)
    }

    pub fn forget(&mut self, player: &str) -> Option<Authorizer> {
        self.entries.remove(&canonical_player_key(player))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Authorizer)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn save(&self) -> Result<()> {
        let mut payload = serde_json::to_string_pretty(&self.entries)
            .context("failed to serialize provenance store")?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write provenance store {}", self.path.display()))
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, Authorizer>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read provenance store {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let stored = serde_json::from_str::<BTreeMap<String, Authorizer>>(&raw)
        .with_context(|| format!("failed to parse provenance store {}", path.display()))?;

    let mut entries = BTreeMap::new();
    for (player, authorizer) in stored {
        let key = canonical_player_key(&player);
        if key.is_empty() {
            bail!("provenance store {} contains an empty player key", path.display());
        }
        if let Some(previous) = entries.insert(key.clone(), authorizer) {
            tracing::warn!(
                player = %key,
                ?previous,
                ?authorizer,
                "provenance store held case-variant duplicates; keeping the later entry"
            );
        }
    }
    Ok(entries)
}
