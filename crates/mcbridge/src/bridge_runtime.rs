use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use mcbridge_allowlist::{AllowlistCommands, ProvenanceStore};
use mcbridge_cli::{require_runtime_credentials, Cli};
use mcbridge_discord_runtime::{
    build_client, BridgeHandler, DiscordChatSink, DiscordRuntimeConfig, ReplyRenderer,
    ServerRelay,
};
use mcbridge_logtail::{
    ChatPipeline, ChatSink, LogEventDispatcher, LogTailer, TailService, TailServiceConfig,
};
use mcbridge_rcon::{RconClient, RconClientConfig, RemoteCommand};
use mcbridge_translit::{
    Transliterator, YahooTransliterator, YahooTransliteratorConfig, YAHOO_JLP_CONVERSION_URL,
};
use serenity::all::{ChannelId, GuildId};
use tokio::sync::Mutex;

use crate::startup_config::CompiledSettings;

/// Wires every collaborator, runs the gateway client and the log tail until
/// ctrl-c or a client failure, then shuts both down.
pub(crate) async fn run_bridge(cli: &Cli, compiled: CompiledSettings) -> Result<()> {
    let credentials = require_runtime_credentials(cli)?;
    let CompiledSettings {
        settings,
        templates,
        allowlist_patterns,
        classifier,
    } = compiled;

    let remote: Arc<dyn RemoteCommand> = Arc::new(RconClient::new(RconClientConfig {
        host: cli.rcon_host.clone(),
        port: cli.rcon_port,
        password: credentials.rcon_password.clone(),
        timeout_ms: cli.rcon_timeout_ms,
    }));
    if cli.yahoo_appid.is_none() {
        tracing::info!("YAHOO_APPID not set; chat lines are relayed without transliteration");
    }
    let transliterator: Arc<dyn Transliterator> =
        Arc::new(YahooTransliterator::new(YahooTransliteratorConfig {
            app_id: cli.yahoo_appid.clone(),
            api_url: cli
                .translit_api_url
                .clone()
                .unwrap_or_else(|| YAHOO_JLP_CONVERSION_URL.to_string()),
            request_timeout_ms: cli.translit_timeout_ms,
        })?);

    let store = ProvenanceStore::load(&cli.state_path)?;
    tracing::info!(
        path = %cli.state_path.display(),
        entries = store.len(),
        "provenance store loaded"
    );
    let commands = AllowlistCommands::new(
        Arc::new(Mutex::new(store)),
        remote.clone(),
        allowlist_patterns,
        settings.allowlist.admin_entry_removal,
    );

    let channel_id = ChannelId::new(credentials.channel_id);
    let handler = BridgeHandler::new(
        commands,
        ReplyRenderer::new(templates.clone()),
        ServerRelay::new(remote.clone(), templates.clone()),
        settings.commands.clone(),
        channel_id,
        cli.guild_id.map(GuildId::new),
    );
    let mut client = build_client(
        &DiscordRuntimeConfig {
            bot_token: credentials.discord_bot_token.clone(),
            channel_id: credentials.channel_id,
            guild_id: cli.guild_id,
        },
        handler,
    )
    .await?;

    let sink: Arc<dyn ChatSink> = Arc::new(DiscordChatSink::new(client.http.clone(), channel_id));
    let relay = settings
        .server
        .relay_converted_chat
        .enable
        .then(|| remote.clone());
    let pipeline = ChatPipeline::new(
        &settings.patterns.native_script,
        templates.clone(),
        transliterator,
        sink.clone(),
        relay,
    )?;
    let dispatcher = Arc::new(LogEventDispatcher::new(classifier, pipeline, templates, sink));
    let tail = TailService::spawn(
        LogTailer::open_at_end(&cli.log_file_path),
        dispatcher,
        TailServiceConfig {
            poll_interval: Duration::from_millis(cli.tail_poll_ms),
        },
    );

    let shard_manager = client.shard_manager.clone();
    let outcome = tokio::select! {
        result = client.start() => result.context("discord client stopped"),
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            signal.context("failed to listen for ctrl-c")
        }
    };

    shard_manager.shutdown_all().await;
    let tailer = tail.shutdown().await?;
    tracing::info!(offset = tailer.cursor(), "bridge stopped");
    outcome
}
