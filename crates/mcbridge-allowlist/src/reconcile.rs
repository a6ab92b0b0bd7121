//! Reconciliation of local provenance against the server's authoritative allowlist.

use std::collections::HashSet;

use mcbridge_core::truncate_for_log;
use mcbridge_rcon::{RconError, RemoteCommand};
use thiserror::Error;

use crate::{canonical_player_key, AllowlistPatterns, Authorizer, ProvenanceStore};

pub const ALLOWLIST_QUERY_COMMAND: &str = "whitelist list";

/// Player names reported by the server at query time.
///
/// Names keep the server's casing; duplicates that differ only by case are
/// collapsed to the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowlistSnapshot {
    names: Vec<String>,
    keys: HashSet<String>,
}

impl AllowlistSnapshot {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut snapshot = Self::default();
        for name in names {
            let name = name.into();
            let key = canonical_player_key(&name);
            if key.is_empty() || !snapshot.keys.insert(key) {
                continue;
            }
            snapshot.names.push(name.trim().to_string());
        }
        snapshot
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, player: &str) -> bool {
        self.keys.contains(&canonical_player_key(player))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// What one reconciliation pass changed.
pub struct ReconcileReport {
    /// Snapshot names that had no provenance and were attributed to `Admin`.
    pub unlogged_added: Vec<String>,
    /// Provenance keys that no longer appear on the server.
    pub stale_pruned: Vec<String>,
    /// Whether the store was written to disk.
    pub persisted: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.unlogged_added.is_empty() || !self.stale_pruned.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("allowlist query failed: {0}")]
    Transport(#[from] RconError),
    #[error("unrecognized allowlist response: {raw}")]
    UnexpectedResponse { raw: String },
    #[error("failed to persist reconciled provenance: {0:#}")]
    Persist(anyhow::Error),
}

/// Brings `store` in line with `snapshot` in memory without persisting.
///
/// Unlogged snapshot names are attributed to [`Authorizer::Admin`]; store
/// keys absent from the snapshot are pruned.
pub fn apply_snapshot(store: &mut ProvenanceStore, snapshot: &AllowlistSnapshot) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for name in snapshot.names() {
        if !store.contains(name) {
            store.record(name, Authorizer::Admin);
            tracing::info!(player = %name, "allowlist entry without provenance attributed to admin");
            report.unlogged_added.push(canonical_player_key(name));
        }
    }

    let stale = store
        .keys()
        .filter(|key| !snapshot.contains(key))
        .map(str::to_string)
        .collect::<Vec<_>>();
    for key in stale {
        store.forget(&key);
        tracing::info!(player = %key, "pruned provenance for player no longer on the allowlist");
        report.stale_pruned.push(key);
    }

    report
}

/// Fetches the authoritative allowlist and reconciles `store` against it.
///
/// On any failure before persistence the store is left untouched. The
/// fetched snapshot is returned so callers can reuse it within the same
/// logical operation.
pub async fn reconcile(
    store: &mut ProvenanceStore,
    remote: &dyn RemoteCommand,
    patterns: &AllowlistPatterns,
) -> Result<(ReconcileReport, AllowlistSnapshot), ReconcileError> {
    tracing::debug!("allowlist reconciliation started");
    let response = remote.execute(ALLOWLIST_QUERY_COMMAND).await?;
    let Some(snapshot) = patterns.parse_allowlist(&response) else {
        tracing::error!(
            response = %truncate_for_log(&response, 400),
            "unrecognized allowlist response; provenance left unchanged"
        );
        return Err(ReconcileError::UnexpectedResponse { raw: response });
    };

    let mut report = apply_snapshot(store, &snapshot);
    if report.changed() {
        store.save().map_err(ReconcileError::Persist)?;
        report.persisted = true;
    }
    tracing::debug!(
        added = report.unlogged_added.len(),
        pruned = report.stale_pruned.len(),
        persisted = report.persisted,
        "allowlist reconciliation finished"
    );
    Ok((report, snapshot))
}
