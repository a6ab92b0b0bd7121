use std::{path::Path, str::FromStr};

use anyhow::{bail, Context, Result};
use mcbridge_core::write_text_atomic;
use serde::Deserialize;

/// Built-in settings document merged beneath every operator file.
pub const DEFAULT_SETTINGS_TOML: &str = include_str!("../default_settings.toml");

#[derive(Debug, Clone, Deserialize)]
/// Root of the merged settings document.
pub struct BridgeSettings {
    pub patterns: PatternSettings,
    pub responses: ResponseMarkers,
    pub discord: DiscordMessages,
    pub server: ServerSettings,
    pub commands: CommandSettings,
    pub allowlist: AllowlistSettings,
}

#[derive(Debug, Clone, Deserialize)]
/// Regular expressions applied to log lines and RCON responses.
pub struct PatternSettings {
    pub chat: String,
    pub lag: String,
    pub join: String,
    pub leave: String,
    pub whitelist_list: String,
    pub online_list: String,
    pub add_success: String,
    pub remove_success: String,
    pub native_script: String,
}

#[derive(Debug, Clone, Deserialize)]
/// Literal substrings recognised in RCON responses.
pub struct ResponseMarkers {
    pub already_whitelisted: String,
    pub player_not_exist: String,
    pub not_whitelisted: String,
    pub no_whitelisted_players: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordMessages {
    pub chat_normal: String,
    pub chat_romaji_converted: String,
    pub server_lag: String,
    pub player_joined: String,
    pub player_left: String,
    pub add_success: String,
    pub add_already_exists: String,
    pub no_such_player: String,
    pub invalid_player_name: String,
    pub remove_permission_denied: String,
    pub remove_success: String,
    pub remove_not_on_list: String,
    pub error_generic: String,
    pub error_white_list_fetch_failed: String,
    pub error_online_list_fetch_failed: String,
    pub list_title: String,
    pub list_no_players: String,
    pub whitelist_list_header: String,
    pub online_title: String,
    pub online_no_players: String,
    pub online_list_header: String,
    pub adders: AdderLabels,
    pub embed_footers: EmbedFooters,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdderLabels {
    pub adder_admin: String,
    pub adder_unknown: String,
    pub list_adder_na: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedFooters {
    pub whitelist: String,
    pub online_players: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub to_server_chat_format: String,
    pub relay_converted_chat: RelayConvertedChat,
}

#[derive(Debug, Clone, Deserialize)]
/// Controls whether transliterated chat is echoed back into the game.
pub struct RelayConvertedChat {
    pub enable: bool,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandSettings {
    pub ws: WhitelistCommandGroup,
    pub ls: CommandLabel,
    pub options: CommandOptionLabels,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistCommandGroup {
    pub name: String,
    pub description: String,
    pub add: CommandLabel,
    pub rem: CommandLabel,
    pub list: CommandLabel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandLabel {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOptionLabels {
    pub player_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllowlistSettings {
    pub admin_entry_removal: AdminRemovalPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
/// Who may remove allowlist entries attributed to direct server administration.
pub enum AdminRemovalPolicy {
    Anyone,
    Nobody,
    Role(u64),
}

impl FromStr for AdminRemovalPolicy {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let value = raw.trim();
        match value.to_ascii_lowercase().as_str() {
            "anyone" => return Ok(Self::Anyone),
            "nobody" => return Ok(Self::Nobody),
            _ => {}
        }
        if let Some(role_id) = value.strip_prefix("role:") {
            let role_id = role_id
                .trim()
                .parse::<u64>()
                .map_err(|error| format!("invalid role id in '{value}': {error}"))?;
            return Ok(Self::Role(role_id));
        }
        Err(format!(
            "unsupported admin_entry_removal '{value}' (expected anyone, nobody, or role:<id>)"
        ))
    }
}

impl TryFrom<String> for AdminRemovalPolicy {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Recursively fills keys missing from `user` with values from `defaults`.
///
/// Tables merge key by key; any non-table value present in `user` wins.
pub fn deep_merge(defaults: toml::Value, user: toml::Value) -> toml::Value {
    match (defaults, user) {
        (toml::Value::Table(defaults), toml::Value::Table(mut user)) => {
            for (key, default_value) in defaults {
                let merged = match user.remove(&key) {
                    Some(user_value) => deep_merge(default_value, user_value),
                    None => default_value,
                };
                user.insert(key, merged);
            }
            toml::Value::Table(user)
        }
        (_, user) => user,
    }
}

/// Parses an operator settings document and merges it over the built-in defaults.
pub fn parse_settings_with_defaults(user_raw: &str) -> Result<BridgeSettings> {
    let defaults = toml::from_str::<toml::Value>(DEFAULT_SETTINGS_TOML)
        .context("failed to parse built-in default settings")?;
    let user = toml::from_str::<toml::Value>(user_raw).context("failed to parse settings")?;
    let merged = deep_merge(defaults, user);
    let settings = merged
        .try_into::<BridgeSettings>()
        .context("settings are missing required keys or hold invalid values")?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Copies the built-in defaults to `path` when no operator file exists yet.
///
/// Returns `true` when a new file was written.
pub fn ensure_user_settings_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_text_atomic(path, DEFAULT_SETTINGS_TOML)
        .with_context(|| format!("failed to seed settings file {}", path.display()))?;
    tracing::info!(path = %path.display(), "settings file not found; seeded from defaults");
    Ok(true)
}

/// Loads `path` (seeding it from defaults when missing) and merges it over the defaults.
pub fn load_settings(path: &Path) -> Result<BridgeSettings> {
    ensure_user_settings_file(path)?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings = parse_settings_with_defaults(&raw)
        .with_context(|| format!("invalid settings file {}", path.display()))?;
    tracing::info!(path = %path.display(), "settings loaded and merged with defaults");
    Ok(settings)
}

fn validate_settings(settings: &BridgeSettings) -> Result<()> {
    let required_patterns = [
        ("chat", settings.patterns.chat.as_str()),
        ("lag", settings.patterns.lag.as_str()),
        ("join", settings.patterns.join.as_str()),
        ("leave", settings.patterns.leave.as_str()),
        ("whitelist_list", settings.patterns.whitelist_list.as_str()),
        ("online_list", settings.patterns.online_list.as_str()),
        ("add_success", settings.patterns.add_success.as_str()),
        ("remove_success", settings.patterns.remove_success.as_str()),
        ("native_script", settings.patterns.native_script.as_str()),
    ];
    for (key, value) in required_patterns {
        if value.trim().is_empty() {
            bail!("patterns.{key} must not be empty");
        }
    }

    let required_markers = [
        ("already_whitelisted", settings.responses.already_whitelisted.as_str()),
        ("player_not_exist", settings.responses.player_not_exist.as_str()),
        ("not_whitelisted", settings.responses.not_whitelisted.as_str()),
        (
            "no_whitelisted_players",
            settings.responses.no_whitelisted_players.as_str(),
        ),
    ];
    for (key, value) in required_markers {
        if value.trim().is_empty() {
            bail!("responses.{key} must not be empty");
        }
    }

    let command_names = [
        &settings.commands.ws.name,
        &settings.commands.ws.add.name,
        &settings.commands.ws.rem.name,
        &settings.commands.ws.list.name,
        &settings.commands.ls.name,
    ];
    for name in command_names {
        let valid = !name.is_empty()
            && name.chars().count() <= 32
            && name
                .chars()
                .all(|ch| ch.is_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_');
        if !valid {
            bail!("command name '{name}' must be 1-32 lowercase characters, digits, '-' or '_'");
        }
    }
    Ok(())
}
