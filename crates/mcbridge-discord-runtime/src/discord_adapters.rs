//! serenity-backed implementations of the bridge collaborator traits.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mcbridge_allowlist::MemberDirectory;
use mcbridge_core::truncate_for_log;
use mcbridge_logtail::ChatSink;
use serenity::{
    all::{ChannelId, GuildId, Http, UserId},
    http::HttpError,
};

/// Discord rejects message content longer than this many characters.
pub const DISCORD_SAFE_MAX_CHARS: usize = 2000;

/// Posts bridge messages to the configured text channel.
pub struct DiscordChatSink {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl DiscordChatSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl ChatSink for DiscordChatSink {
    async fn send_message(&self, content: &str) -> Result<()> {
        let content = fit_message_content(content);
        self.channel_id
            .say(&self.http, content)
            .await
            .with_context(|| format!("failed to post message to channel {}", self.channel_id))?;
        Ok(())
    }
}

/// Truncates content to the platform limit, keeping a trailing ellipsis.
pub fn fit_message_content(content: &str) -> String {
    if content.chars().count() <= DISCORD_SAFE_MAX_CHARS {
        return content.to_string();
    }
    truncate_for_log(content, DISCORD_SAFE_MAX_CHARS - 3)
}

/// Looks up guild member display names over the REST API.
pub struct GuildMemberDirectory {
    http: Arc<Http>,
    guild_id: Option<GuildId>,
}

impl GuildMemberDirectory {
    /// Without a guild (direct-message invocations) every lookup reports a departed member.
    pub fn new(http: Arc<Http>, guild_id: Option<GuildId>) -> Self {
        Self { http, guild_id }
    }
}

#[async_trait]
impl MemberDirectory for GuildMemberDirectory {
    async fn display_name(&self, user_id: u64) -> Result<Option<String>> {
        let Some(guild_id) = self.guild_id else {
            return Ok(None);
        };
        if user_id == 0 {
            return Ok(None);
        }
        match guild_id.member(&self.http, UserId::new(user_id)).await {
            Ok(member) => Ok(Some(member.display_name().to_string())),
            Err(error) if is_not_found(&error) => Ok(None),
            Err(error) => Err(error)
                .with_context(|| format!("failed to fetch member {user_id} of guild {guild_id}")),
        }
    }
}

fn is_not_found(error: &serenity::Error) -> bool {
    let serenity::Error::Http(http_error) = error else {
        return false;
    };
    let http_error: &HttpError = http_error;
    matches!(
        http_error,
        HttpError::UnsuccessfulRequest(response) if response.status_code.as_u16() == 404
    )
}
