//! Discord side of the bridge: gateway client, slash commands, channel sink,
//! and message relay to the game server.

mod bridge_handler;
mod command_registry;
mod discord_adapters;
mod reply_render;
mod server_relay;

pub use bridge_handler::*;
pub use command_registry::*;
pub use discord_adapters::*;
pub use reply_render::*;
pub use server_relay::*;

use anyhow::{Context, Result};
use serenity::{all::GatewayIntents, Client};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordRuntimeConfig {
    pub bot_token: String,
    pub channel_id: u64,
    /// Commands register to this guild when set, otherwise globally.
    pub guild_id: Option<u64>,
}

pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
}

/// Builds the gateway client. The client is not started.
pub async fn build_client(config: &DiscordRuntimeConfig, handler: BridgeHandler) -> Result<Client> {
    Client::builder(&config.bot_token, gateway_intents())
        .event_handler(handler)
        .await
        .context("failed to build discord client")
}
