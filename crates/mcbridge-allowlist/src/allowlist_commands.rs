//! Add, remove, list, and online handlers layered on reconciliation.
//!
//! Each handler holds the store lock for its whole read-modify-write
//! sequence: reload from disk, reconcile, talk to the server, persist.
//! Provenance is only mutated after the server confirms the change.

use std::sync::Arc;

use mcbridge_config::AdminRemovalPolicy;
use mcbridge_core::truncate_for_log;
use mcbridge_rcon::{RconError, RemoteCommand};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    is_valid_player_name, reconcile, sort_players_for_display, AddResponse, AllowlistPatterns,
    Authorizer, ProvenanceStore, ReconcileError, RemoveResponse,
};

pub const ONLINE_QUERY_COMMAND: &str = "list";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Chat-platform identity issuing a command.
pub struct Requester {
    pub user_id: u64,
    pub display_name: String,
    pub role_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added { player: String },
    AlreadyListed { player: String, authorizer: Authorizer },
    NoSuchPlayer { player: String },
    InvalidName { player: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { player: String },
    /// Refused locally; the server was not contacted.
    Denied { player: String, authorizer: Authorizer },
    NotListed { player: String },
    NoSuchPlayer { player: String },
    InvalidName { player: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One player in a listing with the identity that authorized them.
pub struct PlayerProvenance {
    pub player: String,
    pub authorizer: Authorizer,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("remote command failed: {0}")]
    Transport(#[from] RconError),
    #[error("unexpected server response: {raw}")]
    UnexpectedResponse { raw: String },
    #[error("provenance store error: {0:#}")]
    Store(anyhow::Error),
}

impl From<ReconcileError> for CommandError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::Transport(error) => Self::Transport(error),
            ReconcileError::UnexpectedResponse { raw } => Self::UnexpectedResponse { raw },
            ReconcileError::Persist(error) => Self::Store(error),
        }
    }
}

/// Allowlist command handlers sharing one provenance store.
#[derive(Clone)]
pub struct AllowlistCommands {
    store: Arc<Mutex<ProvenanceStore>>,
    remote: Arc<dyn RemoteCommand>,
    patterns: Arc<AllowlistPatterns>,
    admin_removal: AdminRemovalPolicy,
}

impl AllowlistCommands {
    pub fn new(
        store: Arc<Mutex<ProvenanceStore>>,
        remote: Arc<dyn RemoteCommand>,
        patterns: Arc<AllowlistPatterns>,
        admin_removal: AdminRemovalPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            patterns,
            admin_removal,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<ProvenanceStore>> {
        &self.store
    }

    pub async fn add(
        &self,
        requester: &Requester,
        player: &str,
    ) -> Result<AddOutcome, CommandError> {
        let player = player.trim();
        if !is_valid_player_name(player) {
            return Ok(AddOutcome::InvalidName {
                player: player.to_string(),
            });
        }

        let mut store = self.store.lock().await;
        store.reload().map_err(CommandError::Store)?;
        reconcile(&mut store, self.remote.as_ref(), &self.patterns).await?;

        let response = self
            .run_remote(&format!("whitelist add {player}"), requester)
            .await?;
        match self.patterns.classify_add(&response) {
            AddResponse::Added { canonical_name } => {
                store.record(&canonical_name, Authorizer::User(requester.user_id));
                store.save().map_err(CommandError::Store)?;
                tracing::info!(
                    player = %canonical_name,
                    requester = requester.user_id,
                    "allowlist entry added"
                );
                Ok(AddOutcome::Added {
                    player: canonical_name,
                })
            }
            AddResponse::AlreadyListed => Ok(AddOutcome::AlreadyListed {
                player: player.to_string(),
                authorizer: store.get(player).unwrap_or(Authorizer::Admin),
            }),
            AddResponse::NoSuchPlayer => Ok(AddOutcome::NoSuchPlayer {
                player: player.to_string(),
            }),
            AddResponse::Unrecognized => Err(unexpected_response(response)),
        }
    }

    pub async fn remove(
        &self,
        requester: &Requester,
        player: &str,
    ) -> Result<RemoveOutcome, CommandError> {
        let player = player.trim();
        if !is_valid_player_name(player) {
            return Ok(RemoveOutcome::InvalidName {
                player: player.to_string(),
            });
        }

        let mut store = self.store.lock().await;
        store.reload().map_err(CommandError::Store)?;
        reconcile(&mut store, self.remote.as_ref(), &self.patterns).await?;

        if let Some(authorizer) = store.get(player) {
            if !self.may_remove(requester, authorizer) {
                tracing::info!(
                    player,
                    requester = requester.user_id,
                    ?authorizer,
                    "allowlist removal denied"
                );
                return Ok(RemoveOutcome::Denied {
                    player: player.to_string(),
                    authorizer,
                });
            }
        }

        let response = self
            .run_remote(&format!("whitelist remove {player}"), requester)
            .await?;
        match self.patterns.classify_remove(&response) {
            RemoveResponse::Removed { canonical_name } => {
                if store.forget(&canonical_name).is_some() {
                    store.save().map_err(CommandError::Store)?;
                }
                tracing::info!(
                    player = %canonical_name,
                    requester = requester.user_id,
                    "allowlist entry removed"
                );
                Ok(RemoveOutcome::Removed {
                    player: canonical_name,
                })
            }
            RemoveResponse::NotListed => {
                if store.forget(player).is_some() {
                    store.save().map_err(CommandError::Store)?;
                }
                Ok(RemoveOutcome::NotListed {
                    player: player.to_string(),
                })
            }
            RemoveResponse::NoSuchPlayer => Ok(RemoveOutcome::NoSuchPlayer {
                player: player.to_string(),
            }),
            RemoveResponse::Unrecognized => Err(unexpected_response(response)),
        }
    }

    /// Reconciles, then returns every allowlisted player sorted case-insensitively.
    pub async fn list(&self) -> Result<Vec<PlayerProvenance>, CommandError> {
        let mut store = self.store.lock().await;
        store.reload().map_err(CommandError::Store)?;
        let (_, snapshot) = reconcile(&mut store, self.remote.as_ref(), &self.patterns).await?;
        Ok(attach_provenance(&store, snapshot.names().to_vec()))
    }

    /// Returns online players with their recorded authorizers; does not reconcile.
    pub async fn online(&self) -> Result<Vec<PlayerProvenance>, CommandError> {
        let mut store = self.store.lock().await;
        store.reload().map_err(CommandError::Store)?;
        let response = self.remote.execute(ONLINE_QUERY_COMMAND).await?;
        let players = self
            .patterns
            .parse_online(&response)
            .ok_or_else(|| unexpected_response(response))?;
        Ok(attach_provenance(&store, players))
    }

    /// A user-owned entry is removable only by its owner; admin entries follow policy.
    pub fn may_remove(&self, requester: &Requester, authorizer: Authorizer) -> bool {
        match authorizer {
            Authorizer::User(owner) => owner == requester.user_id,
            Authorizer::Admin => match self.admin_removal {
                AdminRemovalPolicy::Anyone => true,
                AdminRemovalPolicy::Nobody => false,
                AdminRemovalPolicy::Role(role_id) => requester.role_ids.contains(&role_id),
            },
        }
    }

    async fn run_remote(&self, command: &str, requester: &Requester) -> Result<String, RconError> {
        tracing::info!(command, executor = %requester.display_name, "sending rcon command");
        let response = self.remote.execute(command).await?;
        tracing::info!(command, response = %truncate_for_log(&response, 400), "server response");
        Ok(response)
    }
}

fn attach_provenance(store: &ProvenanceStore, mut players: Vec<String>) -> Vec<PlayerProvenance> {
    sort_players_for_display(&mut players);
    players
        .into_iter()
        .map(|player| PlayerProvenance {
            authorizer: store.get(&player).unwrap_or(Authorizer::Admin),
            player,
        })
        .collect()
}

fn unexpected_response(raw: String) -> CommandError {
    tracing::error!(response = %truncate_for_log(&raw, 400), "unexpected rcon response");
    CommandError::UnexpectedResponse { raw }
}
