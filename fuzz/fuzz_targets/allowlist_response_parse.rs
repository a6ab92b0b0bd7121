#![no_main]

use libfuzzer_sys::fuzz_target;
use mcbridge_allowlist::{canonical_player_key, split_player_names, AllowlistPatterns};
use mcbridge_config::parse_settings_with_defaults;

fuzz_target!(|data: &[u8]| {
    let Ok(settings) = parse_settings_with_defaults("") else {
        return;
    };
    let Ok(patterns) = AllowlistPatterns::compile(&settings.patterns, &settings.responses) else {
        return;
    };
    let response = String::from_utf8_lossy(data);

    for name in split_player_names(&response) {
        assert!(!name.is_empty());
        assert_eq!(name, name.trim());
    }
    if let Some(snapshot) = patterns.parse_allowlist(&response) {
        let mut keys = snapshot
            .names()
            .iter()
            .map(|name| canonical_player_key(name))
            .collect::<Vec<_>>();
        let listed = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), listed);
    }
    let _ = patterns.parse_online(&response);
    let _ = patterns.classify_add(&response);
    let _ = patterns.classify_remove(&response);
});
