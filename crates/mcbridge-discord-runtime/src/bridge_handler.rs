use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcbridge_allowlist::{AllowlistCommands, MemberDirectory, Requester};
use mcbridge_config::CommandSettings;
use serenity::all::{
    Channel, ChannelId, CommandInteraction, Context, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponseFollowup, EventHandler, GuildId, Interaction, Message, Ready,
    Timestamp,
};
use tokio::sync::RwLock;

use crate::{
    find_mentions, parse_interaction, register_commands, replace_mentions, should_relay,
    BridgeCommand, BridgeReply, GuildMemberDirectory, ListingKind, MentionKind, MentionNames,
    ReplyRenderer, ServerRelay,
};

pub const EMBED_COLOUR: u32 = 0x784dbe;

/// Gateway event handler for slash commands and channel relay.
pub struct BridgeHandler {
    commands: AllowlistCommands,
    renderer: ReplyRenderer,
    relay: ServerRelay,
    command_settings: CommandSettings,
    channel_id: ChannelId,
    guild_id: Option<GuildId>,
    bot_avatar_url: RwLock<Option<String>>,
}

impl BridgeHandler {
    pub fn new(
        commands: AllowlistCommands,
        renderer: ReplyRenderer,
        relay: ServerRelay,
        command_settings: CommandSettings,
        channel_id: ChannelId,
        guild_id: Option<GuildId>,
    ) -> Self {
        Self {
            commands,
            renderer,
            relay,
            command_settings,
            channel_id,
            guild_id,
            bot_avatar_url: RwLock::new(None),
        }
    }

    /// Runs a parsed command and renders its reply.
    pub async fn execute(
        &self,
        command: BridgeCommand,
        requester: &Requester,
        directory: &dyn MemberDirectory,
    ) -> Result<BridgeReply> {
        match command {
            BridgeCommand::Add { player } => {
                let result = self.commands.add(requester, &player).await;
                self.renderer.render_add(&result, directory).await
            }
            BridgeCommand::Remove { player } => {
                let result = self.commands.remove(requester, &player).await;
                self.renderer.render_remove(&result, directory).await
            }
            BridgeCommand::List => {
                let result = self.commands.list().await;
                self.renderer
                    .render_listing(ListingKind::Allowlist, &result, directory)
                    .await
            }
            BridgeCommand::Online => {
                let result = self.commands.online().await;
                self.renderer
                    .render_listing(ListingKind::Online, &result, directory)
                    .await
            }
        }
    }

    async fn handle_command(&self, ctx: &Context, interaction: &CommandInteraction) {
        let Some(command) = parse_interaction(&self.command_settings, interaction) else {
            tracing::debug!(command = %interaction.data.name, "ignoring unknown command");
            return;
        };
        if let Err(error) = interaction.defer(&ctx.http).await {
            tracing::warn!(error = %error, "failed to defer interaction");
            return;
        }

        let requester = requester_from_interaction(interaction);
        tracing::info!(
            ?command,
            requester = requester.user_id,
            executor = %requester.display_name,
            "slash command received"
        );
        let directory = GuildMemberDirectory::new(ctx.http.clone(), interaction.guild_id);
        let reply = match self.execute(command, &requester, &directory).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "failed to render command reply");
                return;
            }
        };

        let avatar_url = self.bot_avatar_url.read().await.clone();
        let followup = build_followup(reply, avatar_url);
        if let Err(error) = interaction.create_followup(&ctx.http, followup).await {
            tracing::warn!(error = %error, "failed to send command reply");
        }
    }
}

#[async_trait]
impl EventHandler for BridgeHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(user = %ready.user.name, "discord session ready");
        *self.bot_avatar_url.write().await = ready.user.avatar_url();

        match register_commands(&ctx.http, self.guild_id, &self.command_settings).await {
            Ok(count) => tracing::info!(
                count,
                guild = ?self.guild_id.map(|guild| guild.get()),
                "slash commands registered"
            ),
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "slash command registration failed")
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.handle_command(&ctx, &command).await;
        }
    }

    async fn message(&self, ctx: Context, message: Message) {
        if !should_relay(
            message.author.bot,
            message.channel_id.get(),
            self.channel_id.get(),
            &message.content,
        ) {
            return;
        }
        let nickname = message
            .member
            .as_ref()
            .and_then(|member| member.nick.clone())
            .or_else(|| message.author.global_name.clone())
            .unwrap_or_else(|| message.author.name.clone());
        let names = resolve_mention_names(&ctx, &message).await;
        let content = replace_mentions(&message.content, &names);

        if let Err(error) = self.relay.relay(&nickname, &content).await {
            tracing::warn!(error = %format!("{error:#}"), "failed to relay discord message");
        }
    }
}

/// Looks up display names for every mention in `message`. Without a cache,
/// roles and channels are fetched over REST; failed lookups stay unresolved.
async fn resolve_mention_names(ctx: &Context, message: &Message) -> MentionNames {
    let mut names = MentionNames::default();
    for user in &message.mentions {
        let name = user.global_name.clone().unwrap_or_else(|| user.name.clone());
        names.users.insert(user.id.get(), name);
    }

    if let (Some(guild_id), false) = (message.guild_id, message.mention_roles.is_empty()) {
        match guild_id.roles(&ctx.http).await {
            Ok(roles) => {
                for role_id in &message.mention_roles {
                    if let Some(role) = roles.get(role_id) {
                        names.roles.insert(role_id.get(), role.name.clone());
                    }
                }
            }
            Err(error) => tracing::warn!(error = %error, "failed to fetch guild roles for mentions"),
        }
    }

    for (kind, id) in find_mentions(&message.content) {
        if kind != MentionKind::Channel || names.channels.contains_key(&id) || id == 0 {
            continue;
        }
        match ChannelId::new(id).to_channel(&ctx.http).await {
            Ok(Channel::Guild(channel)) => {
                names.channels.insert(id, channel.name);
            }
            Ok(_) => {}
            Err(error) => {
                tracing::debug!(channel = id, error = %error, "failed to resolve channel mention")
            }
        }
    }
    names
}

fn requester_from_interaction(interaction: &CommandInteraction) -> Requester {
    let user = &interaction.user;
    let member = interaction.member.as_deref();
    Requester {
        user_id: user.id.get(),
        display_name: member
            .and_then(|member| member.nick.clone())
            .or_else(|| user.global_name.clone())
            .unwrap_or_else(|| user.name.clone()),
        role_ids: member
            .map(|member| member.roles.iter().map(|role| role.get()).collect())
            .unwrap_or_default(),
    }
}

fn build_followup(
    reply: BridgeReply,
    avatar_url: Option<String>,
) -> CreateInteractionResponseFollowup {
    match reply {
        BridgeReply::Text(content) => CreateInteractionResponseFollowup::new().content(content),
        BridgeReply::Embed(embed) => {
            let mut footer = CreateEmbedFooter::new(embed.footer);
            if let Some(url) = avatar_url {
                footer = footer.icon_url(url);
            }
            let fields = embed
                .fields
                .into_iter()
                .map(|(player, adder)| (player, adder, true));
            CreateInteractionResponseFollowup::new()
                .content(embed.header)
                .embed(
                    CreateEmbed::new()
                        .colour(EMBED_COLOUR)
                        .timestamp(Timestamp::now())
                        .description(embed.description)
                        .fields(fields)
                        .footer(footer),
                )
        }
    }
}
