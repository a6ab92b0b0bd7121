//! Rendering of allowlist command outcomes into chat replies.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use mcbridge_allowlist::{
    resolve_authorizer, AddOutcome, Authorizer, AuthorizerDisplay, CommandError, MemberDirectory,
    PlayerProvenance, RemoveOutcome,
};
use mcbridge_config::{TemplateKey, TemplateSet};
use minijinja::context;

/// Discord rejects embeds with more fields than this.
pub const EMBED_FIELD_LIMIT: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReply {
    /// Plain message content sent alongside the embed.
    pub header: String,
    pub description: String,
    /// `(player, authorizer label)` pairs rendered as inline fields.
    pub fields: Vec<(String, String)>,
    pub footer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeReply {
    Text(String),
    Embed(EmbedReply),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Allowlist,
    Online,
}

impl ListingKind {
    fn keys(self) -> ListingKeys {
        match self {
            Self::Allowlist => ListingKeys {
                header: TemplateKey::WhitelistListHeader,
                title: TemplateKey::ListTitle,
                empty: TemplateKey::ListNoPlayers,
                footer: TemplateKey::FooterWhitelist,
                fetch_failed: TemplateKey::ErrorWhitelistFetchFailed,
            },
            Self::Online => ListingKeys {
                header: TemplateKey::OnlineListHeader,
                title: TemplateKey::OnlineTitle,
                empty: TemplateKey::OnlineNoPlayers,
                footer: TemplateKey::FooterOnlinePlayers,
                fetch_failed: TemplateKey::ErrorOnlineListFetchFailed,
            },
        }
    }
}

struct ListingKeys {
    header: TemplateKey,
    title: TemplateKey,
    empty: TemplateKey,
    footer: TemplateKey,
    fetch_failed: TemplateKey,
}

#[derive(Clone)]
pub struct ReplyRenderer {
    templates: Arc<TemplateSet>,
}

impl ReplyRenderer {
    pub fn new(templates: Arc<TemplateSet>) -> Self {
        Self { templates }
    }

    pub async fn render_add(
        &self,
        result: &Result<AddOutcome, CommandError>,
        directory: &dyn MemberDirectory,
    ) -> Result<BridgeReply> {
        let text = match result {
            Ok(AddOutcome::Added { player }) => self.player_message(TemplateKey::AddSuccess, player)?,
            Ok(AddOutcome::AlreadyListed { player, authorizer }) => {
                let adder_name = self.adder_label(directory, *authorizer).await?;
                self.templates.render(
                    TemplateKey::AddAlreadyExists,
                    context! { player_name => player, adder_name => adder_name },
                )?
            }
            Ok(AddOutcome::NoSuchPlayer { player }) => {
                self.player_message(TemplateKey::NoSuchPlayer, player)?
            }
            Ok(AddOutcome::InvalidName { player }) => {
                self.player_message(TemplateKey::InvalidPlayerName, player)?
            }
            Err(error) => self.command_failure(error, TemplateKey::ErrorGeneric)?,
        };
        Ok(BridgeReply::Text(text))
    }

    pub async fn render_remove(
        &self,
        result: &Result<RemoveOutcome, CommandError>,
        directory: &dyn MemberDirectory,
    ) -> Result<BridgeReply> {
        let text = match result {
            Ok(RemoveOutcome::Removed { player }) => {
                self.player_message(TemplateKey::RemoveSuccess, player)?
            }
            Ok(RemoveOutcome::Denied { player, authorizer }) => {
                let adder_name = self.adder_label(directory, *authorizer).await?;
                self.templates.render(
                    TemplateKey::RemovePermissionDenied,
                    context! { player_name => player, adder_name => adder_name },
                )?
            }
            Ok(RemoveOutcome::NotListed { player }) => {
                self.player_message(TemplateKey::RemoveNotOnList, player)?
            }
            Ok(RemoveOutcome::NoSuchPlayer { player }) => {
                self.player_message(TemplateKey::NoSuchPlayer, player)?
            }
            Ok(RemoveOutcome::InvalidName { player }) => {
                self.player_message(TemplateKey::InvalidPlayerName, player)?
            }
            Err(error) => self.command_failure(error, TemplateKey::ErrorGeneric)?,
        };
        Ok(BridgeReply::Text(text))
    }

    /// Renders the allowlist or online roster as an embed.
    ///
    /// Sentinel authorizers (admin or departed members) share the
    /// "not available" label so only real members are named.
    pub async fn render_listing(
        &self,
        kind: ListingKind,
        result: &Result<Vec<PlayerProvenance>, CommandError>,
        directory: &dyn MemberDirectory,
    ) -> Result<BridgeReply> {
        let keys = kind.keys();
        let players = match result {
            Ok(players) => players,
            Err(error @ CommandError::Transport(_)) => {
                return Ok(BridgeReply::Text(self.command_failure(error, keys.fetch_failed)?));
            }
            Err(error) => {
                return Ok(BridgeReply::Text(
                    self.command_failure(error, TemplateKey::ErrorGeneric)?,
                ));
            }
        };

        let description = if players.is_empty() {
            self.templates.label(keys.empty)?
        } else {
            self.templates
                .render(keys.title, context! { count => players.len() })?
        };

        let not_available = self.templates.label(TemplateKey::ListAdderNa)?;
        let mut resolved = HashMap::<Authorizer, AuthorizerDisplay>::new();
        let mut fields = Vec::with_capacity(players.len().min(EMBED_FIELD_LIMIT));
        for entry in players.iter().take(EMBED_FIELD_LIMIT) {
            let display = match resolved.get(&entry.authorizer) {
                Some(display) => display.clone(),
                None => {
                    let display = resolve_authorizer(directory, entry.authorizer).await;
                    resolved.insert(entry.authorizer, display.clone());
                    display
                }
            };
            let label = match display {
                AuthorizerDisplay::Member(name) => name,
                AuthorizerDisplay::Admin | AuthorizerDisplay::Unknown => not_available.clone(),
            };
            fields.push((entry.player.clone(), label));
        }
        if players.len() > EMBED_FIELD_LIMIT {
            tracing::warn!(
                players = players.len(),
                shown = EMBED_FIELD_LIMIT,
                "roster exceeds embed field limit; extra players omitted"
            );
        }

        Ok(BridgeReply::Embed(EmbedReply {
            header: self.templates.label(keys.header)?,
            description,
            fields,
            footer: self.templates.label(keys.footer)?,
        }))
    }

    async fn adder_label(
        &self,
        directory: &dyn MemberDirectory,
        authorizer: Authorizer,
    ) -> Result<String> {
        match resolve_authorizer(directory, authorizer).await {
            AuthorizerDisplay::Admin => self.templates.label(TemplateKey::AdderAdmin),
            AuthorizerDisplay::Unknown => self.templates.label(TemplateKey::AdderUnknown),
            AuthorizerDisplay::Member(name) => Ok(name),
        }
    }

    fn player_message(&self, key: TemplateKey, player: &str) -> Result<String> {
        self.templates
            .render(key, context! { player_name => player })
    }

    fn command_failure(&self, error: &CommandError, key: TemplateKey) -> Result<String> {
        match error {
            CommandError::Transport(error) => {
                tracing::warn!(error = %error, "allowlist command failed to reach the server");
            }
            // Logged with the raw response where it was classified.
            CommandError::UnexpectedResponse { .. } => {}
            CommandError::Store(error) => {
                tracing::error!(error = %format!("{error:#}"), "provenance store failure");
            }
        }
        self.templates.label(key)
    }
}
