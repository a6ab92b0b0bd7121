use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const DEFAULT_RCON_PORT: u16 = 25575;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_non_empty(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("value must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Parser)]
#[command(
    name = "mcbridge",
    about = "Minecraft server log and allowlist bridge for Discord",
    version
)]
pub struct Cli {
    #[arg(
        long = "discord-bot-token",
        env = "DISCORD_BOT_TOKEN",
        hide_env_values = true,
        value_parser = parse_non_empty,
        help = "Discord bot token."
    )]
    pub discord_bot_token: Option<String>,

    #[arg(
        long = "channel-id",
        env = "CHANNEL_ID",
        value_parser = parse_positive_u64,
        help = "Discord channel that receives server events and relays chat back."
    )]
    pub channel_id: Option<u64>,

    #[arg(
        long = "guild-id",
        env = "GUILD_ID",
        value_parser = parse_positive_u64,
        help = "Guild for slash command registration. Commands register globally when omitted."
    )]
    pub guild_id: Option<u64>,

    #[arg(long = "rcon-host", env = "RCON_HOST", default_value = "127.0.0.1")]
    pub rcon_host: String,

    #[arg(long = "rcon-port", env = "RCON_PORT", default_value_t = DEFAULT_RCON_PORT)]
    pub rcon_port: u16,

    #[arg(
        long = "rcon-password",
        env = "RCON_PASSWORD",
        hide_env_values = true,
        value_parser = parse_non_empty
    )]
    pub rcon_password: Option<String>,

    #[arg(
        long = "rcon-timeout-ms",
        env = "RCON_TIMEOUT_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Deadline covering connect, authentication, and command execution."
    )]
    pub rcon_timeout_ms: u64,

    #[arg(
        long = "yahoo-appid",
        env = "YAHOO_APPID",
        hide_env_values = true,
        help = "Yahoo developer app id. Chat transliteration is disabled when omitted."
    )]
    pub yahoo_appid: Option<String>,

    #[arg(
        long = "translit-api-url",
        env = "TRANSLIT_API_URL",
        help = "Override for the transliteration service endpoint."
    )]
    pub translit_api_url: Option<String>,

    #[arg(
        long = "translit-timeout-ms",
        env = "TRANSLIT_TIMEOUT_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64
    )]
    pub translit_timeout_ms: u64,

    #[arg(
        long = "log-file-path",
        env = "LOG_FILE_PATH",
        default_value = "logs/latest.log",
        help = "Server log file to tail."
    )]
    pub log_file_path: PathBuf,

    #[arg(
        long = "settings",
        env = "MCBRIDGE_SETTINGS",
        default_value = "settings.toml",
        help = "Settings file with patterns, templates, and command names. Created from defaults when missing."
    )]
    pub settings: PathBuf,

    #[arg(
        long = "state-path",
        env = "MCBRIDGE_STATE_PATH",
        default_value = "whitelist_log.json",
        help = "Allowlist provenance file."
    )]
    pub state_path: PathBuf,

    #[arg(
        long = "tail-poll-ms",
        env = "MCBRIDGE_TAIL_POLL_MS",
        default_value_t = 1_000,
        value_parser = parse_positive_u64,
        help = "Fallback poll interval for the log tail."
    )]
    pub tail_poll_ms: u64,

    #[arg(
        long = "check-config",
        action = ArgAction::SetTrue,
        help = "Validate settings, patterns, and templates, then exit."
    )]
    pub check_config: bool,
}
