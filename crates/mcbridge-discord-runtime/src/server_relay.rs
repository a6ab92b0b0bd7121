//! Relays channel messages from Discord into server chat.

use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result};
use mcbridge_config::{TemplateKey, TemplateSet};
use mcbridge_rcon::RemoteCommand;
use minijinja::context;
use regex::{Captures, Regex};

const TARGET_SELECTORS: [char; 4] = ['a', 'e', 'r', 's'];

/// Neutralizes entity target selectors (`@a`, `@e`, `@r`, `@s`) so `say`
/// prints them literally instead of expanding them.
pub fn escape_target_selectors(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        escaped.push(ch);
        if ch == '@' && chars.peek().is_some_and(|next| TARGET_SELECTORS.contains(next)) {
            escaped.push('.');
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKind {
    User,
    Role,
    Channel,
}

/// Resolved names for the raw mention tokens of one message, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MentionNames {
    pub users: HashMap<u64, String>,
    pub roles: HashMap<u64, String>,
    pub channels: HashMap<u64, String>,
}

fn mention_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"<(@!?|@&|#)(\d+)>").ok())
        .as_ref()
}

fn mention_token(captures: &Captures<'_>) -> Option<(MentionKind, u64)> {
    let kind = match captures.get(1)?.as_str() {
        "@&" => MentionKind::Role,
        "#" => MentionKind::Channel,
        _ => MentionKind::User,
    };
    let id = captures.get(2)?.as_str().parse().ok()?;
    Some((kind, id))
}

/// Lists the `<@id>`, `<@!id>`, `<@&id>` and `<#id>` tokens in `content`, in order.
pub fn find_mentions(content: &str) -> Vec<(MentionKind, u64)> {
    let Some(pattern) = mention_pattern() else {
        return Vec::new();
    };
    pattern
        .captures_iter(content)
        .filter_map(|captures| mention_token(&captures))
        .collect()
}

/// Rewrites raw mention markup into readable `@user`, `@role` and `#channel`
/// text. Unresolved ids render the way Discord clients show them.
pub fn replace_mentions(content: &str, names: &MentionNames) -> String {
    let Some(pattern) = mention_pattern() else {
        return content.to_string();
    };
    pattern
        .replace_all(content, |captures: &Captures<'_>| match mention_token(captures) {
            Some((MentionKind::User, id)) => names
                .users
                .get(&id)
                .map_or_else(|| "@invalid-user".to_string(), |name| format!("@{name}")),
            Some((MentionKind::Role, id)) => names
                .roles
                .get(&id)
                .map_or_else(|| "@deleted-role".to_string(), |name| format!("@{name}")),
            Some((MentionKind::Channel, id)) => names
                .channels
                .get(&id)
                .map_or_else(|| "#deleted-channel".to_string(), |name| format!("#{name}")),
            None => captures[0].to_string(),
        })
        .into_owned()
}

/// Returns true for messages that should be forwarded to the server.
pub fn should_relay(author_is_bot: bool, channel_id: u64, bridge_channel_id: u64, content: &str) -> bool {
    !author_is_bot
        && channel_id == bridge_channel_id
        && !content.trim().is_empty()
        && !content.starts_with('/')
}

pub struct ServerRelay {
    remote: Arc<dyn RemoteCommand>,
    templates: Arc<TemplateSet>,
}

impl ServerRelay {
    pub fn new(remote: Arc<dyn RemoteCommand>, templates: Arc<TemplateSet>) -> Self {
        Self { remote, templates }
    }

    /// Builds the `say` command for one Discord message. Line breaks are
    /// folded into spaces because the command must stay on one line.
    pub fn render_say_command(&self, nickname: &str, content: &str) -> Result<String> {
        let content = escape_target_selectors(&content.replace(['\r', '\n'], " "));
        let message = self
            .templates
            .render(
                TemplateKey::ServerChat,
                context! { nickname => nickname, content => content },
            )
            .context("failed to render server chat message")?;
        Ok(format!("say {message}"))
    }

    pub async fn relay(&self, nickname: &str, content: &str) -> Result<()> {
        let command = self.render_say_command(nickname, content)?;
        tracing::info!(command = %command, executor = %nickname, "sending rcon command");
        self.remote
            .execute(&command)
            .await
            .context("failed to relay message to the server")?;
        Ok(())
    }
}
