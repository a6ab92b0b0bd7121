//! Parsing of the server's allowlist-related RCON responses.

use anyhow::{bail, Context, Result};
use mcbridge_config::{PatternSettings, ResponseMarkers};
use regex::{Regex, RegexBuilder};

use crate::AllowlistSnapshot;

const PLAYERS_GROUP: &str = "players";
const PLAYER_GROUP: &str = "player";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Classified response to `whitelist add <name>`.
pub enum AddResponse {
    Added { canonical_name: String },
    AlreadyListed,
    NoSuchPlayer,
    Unrecognized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Classified response to `whitelist remove <name>`.
pub enum RemoveResponse {
    Removed { canonical_name: String },
    NotListed,
    NoSuchPlayer,
    Unrecognized,
}

/// Compiled response patterns, validated once at startup.
#[derive(Debug, Clone)]
pub struct AllowlistPatterns {
    whitelist_list: Regex,
    online_list: Regex,
    add_success: Regex,
    remove_success: Regex,
    already_whitelisted: String,
    player_not_exist: String,
    not_whitelisted: String,
    no_whitelisted_players: String,
}

impl AllowlistPatterns {
    pub fn compile(patterns: &PatternSettings, markers: &ResponseMarkers) -> Result<Self> {
        Ok(Self {
            whitelist_list: compile_with_group(
                "whitelist_list",
                &patterns.whitelist_list,
                PLAYERS_GROUP,
                false,
            )?,
            online_list: compile_with_group(
                "online_list",
                &patterns.online_list,
                PLAYERS_GROUP,
                false,
            )?,
            add_success: compile_with_group(
                "add_success",
                &patterns.add_success,
                PLAYER_GROUP,
                true,
            )?,
            remove_success: compile_with_group(
                "remove_success",
                &patterns.remove_success,
                PLAYER_GROUP,
                true,
            )?,
            already_whitelisted: markers.already_whitelisted.clone(),
            player_not_exist: markers.player_not_exist.clone(),
            not_whitelisted: markers.not_whitelisted.clone(),
            no_whitelisted_players: markers.no_whitelisted_players.clone(),
        })
    }

    /// Parses a `whitelist list` response. `None` means the response was not recognized.
    pub fn parse_allowlist(&self, response: &str) -> Option<AllowlistSnapshot> {
        if let Some(captures) = self.whitelist_list.captures(response) {
            let players = captures
                .name(PLAYERS_GROUP)
                .map(|group| split_player_names(group.as_str()))
                .unwrap_or_default();
            return Some(AllowlistSnapshot::from_names(players));
        }
        if response.contains(&self.no_whitelisted_players) {
            return Some(AllowlistSnapshot::default());
        }
        None
    }

    /// Parses a `list` response into online player names, in server order.
    pub fn parse_online(&self, response: &str) -> Option<Vec<String>> {
        let captures = self.online_list.captures(response)?;
        Some(
            captures
                .name(PLAYERS_GROUP)
                .map(|group| split_player_names(group.as_str()))
                .unwrap_or_default(),
        )
    }

    pub fn classify_add(&self, response: &str) -> AddResponse {
        if let Some(name) = capture_player(&self.add_success, response) {
            return AddResponse::Added {
                canonical_name: name,
            };
        }
        if response.contains(&self.already_whitelisted) {
            return AddResponse::AlreadyListed;
        }
        if response.contains(&self.player_not_exist) {
            return AddResponse::NoSuchPlayer;
        }
        AddResponse::Unrecognized
    }

    pub fn classify_remove(&self, response: &str) -> RemoveResponse {
        if let Some(name) = capture_player(&self.remove_success, response) {
            return RemoveResponse::Removed {
                canonical_name: name,
            };
        }
        if response.contains(&self.not_whitelisted) {
            return RemoveResponse::NotListed;
        }
        if response.contains(&self.player_not_exist) {
            return RemoveResponse::NoSuchPlayer;
        }
        RemoveResponse::Unrecognized
    }
}

/// Splits a comma-separated player list, dropping blanks.
pub fn split_player_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn capture_player(pattern: &Regex, response: &str) -> Option<String> {
    pattern
        .captures(response)
        .and_then(|captures| captures.name(PLAYER_GROUP))
        .map(|group| group.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

fn compile_with_group(
    key: &str,
    source: &str,
    group: &str,
    case_insensitive: bool,
) -> Result<Regex> {
    let regex = RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
        .with_context(|| format!("patterns.{key} is not a valid regular expression"))?;
    if !regex.capture_names().flatten().any(|name| name == group) {
        bail!("patterns.{key} must define the named capture group '{group}'");
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use mcbridge_config::parse_settings_with_defaults;

    use super::{split_player_names, AddResponse, AllowlistPatterns, RemoveResponse};

    fn default_patterns() -> AllowlistPatterns {
        let settings = parse_settings_with_defaults("").expect("settings");
        AllowlistPatterns::compile(&settings.patterns, &settings.responses).expect("compile")
    }

    #[test]
    fn unit_parse_allowlist_handles_listing_and_empty_marker() {
        let patterns = default_patterns();
        let snapshot = patterns
            .parse_allowlist("There are 2 whitelisted player(s): Steve, Alex")
            .expect("listing");
        assert_eq!(snapshot.names(), &["Steve".to_string(), "Alex".to_string()]);

        let modern = patterns
            .parse_allowlist("There are 1 whitelisted players: jeb_")
            .expect("modern listing");
        assert_eq!(modern.names(), &["jeb_".to_string()]);

        let empty = patterns
            .parse_allowlist("There are no whitelisted players")
            .expect("empty marker");
        assert!(empty.is_empty());
    }

    #[test]
    fn regression_parse_allowlist_rejects_unrecognized_response() {
        let patterns = default_patterns();
        assert!(patterns.parse_allowlist("Unknown command").is_none());
        assert!(patterns.parse_allowlist("").is_none());
    }

    #[test]
    fn unit_parse_online_accepts_empty_roster() {
        let patterns = default_patterns();
        assert_eq!(
            patterns.parse_online("There are 0 of a max of 20 players online: "),
            Some(Vec::new())
        );
        assert_eq!(
            patterns.parse_online("There are 2 of a max of 20 players online: zed, Alex"),
            Some(vec!["zed".to_string(), "Alex".to_string()])
        );
        assert_eq!(patterns.parse_online("nope"), None);
    }

    #[test]
    fn unit_classify_add_extracts_server_canonical_name() {
        let patterns = default_patterns();
        assert_eq!(
            patterns.classify_add("Added Steve to the whitelist"),
            AddResponse::Added {
                canonical_name: "Steve".to_string()
            }
        );
        assert_eq!(
            patterns.classify_add("added STEVE TO THE WHITELIST"),
            AddResponse::Added {
                canonical_name: "STEVE".to_string()
            }
        );
        assert_eq!(
            patterns.classify_add("Player is already whitelisted"),
            AddResponse::AlreadyListed
        );
        assert_eq!(
            patterns.classify_add("That player does not exist"),
            AddResponse::NoSuchPlayer
        );
        assert_eq!(patterns.classify_add("???"), AddResponse::Unrecognized);
    }

    #[test]
    fn unit_classify_remove_branches() {
        let patterns = default_patterns();
        assert_eq!(
            patterns.classify_remove("Removed Alex from the whitelist"),
            RemoveResponse::Removed {
                canonical_name: "Alex".to_string()
            }
        );
        assert_eq!(
            patterns.classify_remove("Player is not whitelisted"),
            RemoveResponse::NotListed
        );
        assert_eq!(
            patterns.classify_remove("That player does not exist"),
            RemoveResponse::NoSuchPlayer
        );
        assert_eq!(
            patterns.classify_remove("Internal error"),
            RemoveResponse::Unrecognized
        );
    }

    #[test]
    fn regression_pattern_without_required_group_is_fatal() {
        let settings = parse_settings_with_defaults(
            r#"
            [patterns]
            add_success = 'Added (\w+) to the whitelist'
            "#,
        )
        .expect("settings");
        let error = AllowlistPatterns::compile(&settings.patterns, &settings.responses)
            .expect_err("missing group");
        assert!(error.to_string().contains("patterns.add_success"));
        assert!(error.to_string().contains("'player'"));
    }

    #[test]
    fn unit_split_player_names_drops_blanks() {
        assert_eq!(
            split_player_names(" a, ,b ,"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
