use anyhow::{bail, Result};

use crate::Cli;

/// Connection settings required to run the bridge, resolved from [`Cli`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeCredentials {
    pub discord_bot_token: String,
    pub channel_id: u64,
    pub rcon_password: String,
}

/// Fails with every missing required setting listed at once.
pub fn require_runtime_credentials(cli: &Cli) -> Result<RuntimeCredentials> {
    let mut missing = Vec::new();
    if cli.discord_bot_token.is_none() {
        missing.push("DISCORD_BOT_TOKEN (--discord-bot-token)");
    }
    if cli.channel_id.is_none() {
        missing.push("CHANNEL_ID (--channel-id)");
    }
    if cli.rcon_password.is_none() {
        missing.push("RCON_PASSWORD (--rcon-password)");
    }
    match (&cli.discord_bot_token, cli.channel_id, &cli.rcon_password) {
        (Some(token), Some(channel_id), Some(password)) => Ok(RuntimeCredentials {
            discord_bot_token: token.clone(),
            channel_id,
            rcon_password: password.clone(),
        }),
        _ => bail!("missing required configuration: {}", missing.join(", ")),
    }
}
