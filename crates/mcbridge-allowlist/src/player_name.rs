/// The single canonicalization applied to every provenance key.
pub fn canonical_player_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Returns true when `name` is a syntactically valid Minecraft player name.
///
/// Names reach the server as RCON command arguments, so anything outside
/// `[A-Za-z0-9_]{1,16}` is refused before a command is built.
pub fn is_valid_player_name(name: &str) -> bool {
    (1..=16).contains(&name.len())
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Sorts names case-insensitively, falling back to byte order for stable ties.
pub fn sort_players_for_display(players: &mut [String]) {
    players.sort_by(|left, right| {
        left.to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right))
    });
}
