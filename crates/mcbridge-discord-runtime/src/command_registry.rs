//! Slash command definitions and invocation parsing.

use anyhow::{Context, Result};
use mcbridge_config::CommandSettings;
use serenity::all::{
    Command, CommandInteraction, CommandOptionType, CreateCommand, CreateCommandOption, GuildId,
    Http, ResolvedValue,
};

pub const PLAYER_OPTION_NAME: &str = "player_name";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Add { player: String },
    Remove { player: String },
    List,
    Online,
}

/// Builds the `/ws add|rem|list` group and the `/ls` command.
pub fn build_commands(settings: &CommandSettings) -> Vec<CreateCommand> {
    let player_option = || {
        CreateCommandOption::new(
            CommandOptionType::String,
            PLAYER_OPTION_NAME,
            &settings.options.player_name,
        )
        .required(true)
    };
    let ws = &settings.ws;
    vec![
        CreateCommand::new(&ws.name)
            .description(&ws.description)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    &ws.add.name,
                    &ws.add.description,
                )
                .add_sub_option(player_option()),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::SubCommand,
                    &ws.rem.name,
                    &ws.rem.description,
                )
                .add_sub_option(player_option()),
            )
            .add_option(CreateCommandOption::new(
                CommandOptionType::SubCommand,
                &ws.list.name,
                &ws.list.description,
            )),
        CreateCommand::new(&settings.ls.name).description(&settings.ls.description),
    ]
}

/// Registers commands for one guild, or globally when no guild is configured.
pub async fn register_commands(
    http: &Http,
    guild_id: Option<GuildId>,
    settings: &CommandSettings,
) -> Result<usize> {
    let commands = build_commands(settings);
    let registered = match guild_id {
        Some(guild_id) => guild_id
            .set_commands(http, commands)
            .await
            .with_context(|| format!("failed to register commands for guild {guild_id}"))?,
        None => Command::set_global_commands(http, commands)
            .await
            .context("failed to register global commands")?,
    };
    Ok(registered.len())
}

/// Maps a command name, optional subcommand, and player argument onto a
/// bridge command. Returns `None` for anything this bridge did not register.
pub fn parse_invocation(
    settings: &CommandSettings,
    command_name: &str,
    subcommand: Option<&str>,
    player: Option<&str>,
) -> Option<BridgeCommand> {
    if command_name == settings.ls.name {
        return Some(BridgeCommand::Online);
    }
    if command_name != settings.ws.name {
        return None;
    }
    let subcommand = subcommand?;
    if subcommand == settings.ws.list.name {
        return Some(BridgeCommand::List);
    }
    let player = player?.trim().to_string();
    if subcommand == settings.ws.add.name {
        Some(BridgeCommand::Add { player })
    } else if subcommand == settings.ws.rem.name {
        Some(BridgeCommand::Remove { player })
    } else {
        None
    }
}

pub fn parse_interaction(
    settings: &CommandSettings,
    interaction: &CommandInteraction,
) -> Option<BridgeCommand> {
    let options = interaction.data.options();
    let mut subcommand = None;
    let mut player = None;
    if let Some(option) = options.first() {
        if let ResolvedValue::SubCommand(inner) = &option.value {
            subcommand = Some(option.name);
            player = inner.iter().find_map(|sub_option| match sub_option.value {
                ResolvedValue::String(value) if sub_option.name == PLAYER_OPTION_NAME => {
                    Some(value)
                }
                _ => None,
            });
        }
    }
    parse_invocation(settings, &interaction.data.name, subcommand, player)
}
