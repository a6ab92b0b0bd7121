#![no_main]

use libfuzzer_sys::fuzz_target;
use mcbridge_config::parse_settings_with_defaults;
use mcbridge_logtail::{ClassifiedEvent, EventClassifier};

fuzz_target!(|data: &[u8]| {
    let Ok(settings) = parse_settings_with_defaults("") else {
        return;
    };
    let Ok(classifier) = EventClassifier::from_patterns(&settings.patterns) else {
        return;
    };
    let line = String::from_utf8_lossy(data);
    match classifier.classify(&line) {
        ClassifiedEvent::Chat { player, .. }
        | ClassifiedEvent::Join { player }
        | ClassifiedEvent::Leave { player } => assert!(!player.is_empty()),
        ClassifiedEvent::LagWarning { .. } | ClassifiedEvent::Unmatched => {}
    }
});
