//! Message templates compiled once at startup.

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

use crate::BridgeSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Every template the runtime renders.
pub enum TemplateKey {
    ChatNormal,
    ChatRomajiConverted,
    ServerLag,
    PlayerJoined,
    PlayerLeft,
    AddSuccess,
    AddAlreadyExists,
    NoSuchPlayer,
    InvalidPlayerName,
    RemovePermissionDenied,
    RemoveSuccess,
    RemoveNotOnList,
    ErrorGeneric,
    ErrorWhitelistFetchFailed,
    ErrorOnlineListFetchFailed,
    ListTitle,
    ListNoPlayers,
    WhitelistListHeader,
    OnlineTitle,
    OnlineNoPlayers,
    OnlineListHeader,
    AdderAdmin,
    AdderUnknown,
    ListAdderNa,
    FooterWhitelist,
    FooterOnlinePlayers,
    ServerChat,
    ServerRelayConvertedChat,
}

impl TemplateKey {
    pub const ALL: [TemplateKey; 28] = [
        Self::ChatNormal,
        Self::ChatRomajiConverted,
        Self::ServerLag,
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::AddSuccess,
        Self::AddAlreadyExists,
        Self::NoSuchPlayer,
        Self::InvalidPlayerName,
        Self::RemovePermissionDenied,
        Self::RemoveSuccess,
        Self::RemoveNotOnList,
        Self::ErrorGeneric,
        Self::ErrorWhitelistFetchFailed,
        Self::ErrorOnlineListFetchFailed,
        Self::ListTitle,
        Self::ListNoPlayers,
        Self::WhitelistListHeader,
        Self::OnlineTitle,
        Self::OnlineNoPlayers,
        Self::OnlineListHeader,
        Self::AdderAdmin,
        Self::AdderUnknown,
        Self::ListAdderNa,
        Self::FooterWhitelist,
        Self::FooterOnlinePlayers,
        Self::ServerChat,
        Self::ServerRelayConvertedChat,
    ];

    /// Dotted settings path of the template source.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatNormal => "discord.chat_normal",
            Self::ChatRomajiConverted => "discord.chat_romaji_converted",
            Self::ServerLag => "discord.server_lag",
            Self::PlayerJoined => "discord.player_joined",
            Self::PlayerLeft => "discord.player_left",
            Self::AddSuccess => "discord.add_success",
            Self::AddAlreadyExists => "discord.add_already_exists",
            Self::NoSuchPlayer => "discord.no_such_player",
            Self::InvalidPlayerName => "discord.invalid_player_name",
            Self::RemovePermissionDenied => "discord.remove_permission_denied",
            Self::RemoveSuccess => "discord.remove_success",
            Self::RemoveNotOnList => "discord.remove_not_on_list",
            Self::ErrorGeneric => "discord.error_generic",
            Self::ErrorWhitelistFetchFailed => "discord.error_white_list_fetch_failed",
            Self::ErrorOnlineListFetchFailed => "discord.error_online_list_fetch_failed",
            Self::ListTitle => "discord.list_title",
            Self::ListNoPlayers => "discord.list_no_players",
            Self::WhitelistListHeader => "discord.whitelist_list_header",
            Self::OnlineTitle => "discord.online_title",
            Self::OnlineNoPlayers => "discord.online_no_players",
            Self::OnlineListHeader => "discord.online_list_header",
            Self::AdderAdmin => "discord.adders.adder_admin",
            Self::AdderUnknown => "discord.adders.adder_unknown",
            Self::ListAdderNa => "discord.adders.list_adder_na",
            Self::FooterWhitelist => "discord.embed_footers.whitelist",
            Self::FooterOnlinePlayers => "discord.embed_footers.online_players",
            Self::ServerChat => "server.to_server_chat_format",
            Self::ServerRelayConvertedChat => "server.relay_converted_chat.format",
        }
    }

    fn source(self, settings: &BridgeSettings) -> &str {
        let discord = &settings.discord;
        match self {
            Self::ChatNormal => &discord.chat_normal,
            Self::ChatRomajiConverted => &discord.chat_romaji_converted,
            Self::ServerLag => &discord.server_lag,
            Self::PlayerJoined => &discord.player_joined,
            Self::PlayerLeft => &discord.player_left,
            Self::AddSuccess => &discord.add_success,
            Self::AddAlreadyExists => &discord.add_already_exists,
            Self::NoSuchPlayer => &discord.no_such_player,
            Self::InvalidPlayerName => &discord.invalid_player_name,
            Self::RemovePermissionDenied => &discord.remove_permission_denied,
            Self::RemoveSuccess => &discord.remove_success,
            Self::RemoveNotOnList => &discord.remove_not_on_list,
            Self::ErrorGeneric => &discord.error_generic,
            Self::ErrorWhitelistFetchFailed => &discord.error_white_list_fetch_failed,
            Self::ErrorOnlineListFetchFailed => &discord.error_online_list_fetch_failed,
            Self::ListTitle => &discord.list_title,
            Self::ListNoPlayers => &discord.list_no_players,
            Self::WhitelistListHeader => &discord.whitelist_list_header,
            Self::OnlineTitle => &discord.online_title,
            Self::OnlineNoPlayers => &discord.online_no_players,
            Self::OnlineListHeader => &discord.online_list_header,
            Self::AdderAdmin => &discord.adders.adder_admin,
            Self::AdderUnknown => &discord.adders.adder_unknown,
            Self::ListAdderNa => &discord.adders.list_adder_na,
            Self::FooterWhitelist => &discord.embed_footers.whitelist,
            Self::FooterOnlinePlayers => &discord.embed_footers.online_players,
            Self::ServerChat => &settings.server.to_server_chat_format,
            Self::ServerRelayConvertedChat => &settings.server.relay_converted_chat.format,
        }
    }
}

/// Compiled message templates.
///
/// Undefined variables are render errors rather than empty strings.
pub struct TemplateSet {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet").finish_non_exhaustive()
    }
}

impl TemplateSet {
    pub fn from_settings(settings: &BridgeSettings) -> Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        for key in TemplateKey::ALL {
            env.add_template_owned(key.as_str(), key.source(settings).to_string())
                .with_context(|| format!("template {} failed to compile", key.as_str()))?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, key: TemplateKey, context: S) -> Result<String> {
        let template = self
            .env
            .get_template(key.as_str())
            .with_context(|| format!("template {} is not registered", key.as_str()))?;
        template
            .render(context)
            .with_context(|| format!("failed to render template {}", key.as_str()))
    }

    /// Renders a template that takes no variables, such as a label or footer.
    pub fn label(&self, key: TemplateKey) -> Result<String> {
        self.render(key, minijinja::context! {})
    }
}
