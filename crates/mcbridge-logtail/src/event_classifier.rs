//! Ordered regex classification of server log lines.

use anyhow::{bail, Context, Result};
use mcbridge_config::PatternSettings;
use regex::{Captures, Regex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    Chat { player: String, text: String },
    LagWarning { ms: String, ticks: String },
    Join { player: String },
    Leave { player: String },
    Unmatched,
}

type EventConstructor = fn(&Captures<'_>) -> ClassifiedEvent;

struct EventRule {
    name: &'static str,
    pattern: Regex,
    build: EventConstructor,
}

/// Classifies log lines against chat, lag, join, and leave patterns.
///
/// Rules are tried in that order and the first match wins.
pub struct EventClassifier {
    rules: Vec<EventRule>,
}

impl std::fmt::Debug for EventClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| rule.name))
            .finish()
    }
}

impl EventClassifier {
    pub fn from_patterns(patterns: &PatternSettings) -> Result<Self> {
        let rules = vec![
            rule("chat", &patterns.chat, &["player", "message"], build_chat)?,
            rule("lag", &patterns.lag, &["ms", "ticks"], build_lag)?,
            rule("join", &patterns.join, &["player"], build_join)?,
            rule("leave", &patterns.leave, &["player"], build_leave)?,
        ];
        Ok(Self { rules })
    }

    pub fn classify(&self, line: &str) -> ClassifiedEvent {
        self.rules
            .iter()
            .find_map(|rule| {
                rule.pattern
                    .captures(line)
                    .map(|captures| (rule.build)(&captures))
            })
            .unwrap_or(ClassifiedEvent::Unmatched)
    }
}

fn rule(
    name: &'static str,
    source: &str,
    groups: &[&str],
    build: EventConstructor,
) -> Result<EventRule> {
    if source.trim().is_empty() {
        bail!("patterns.{name} must not be empty");
    }
    let pattern =
        Regex::new(source).with_context(|| format!("patterns.{name} failed to compile"))?;
    for group in groups {
        if !pattern.capture_names().flatten().any(|candidate| candidate == *group) {
            bail!("patterns.{name} must define the named capture group '{group}'");
        }
    }
    Ok(EventRule {
        name,
        pattern,
        build,
    })
}

fn group(captures: &Captures<'_>, name: &str) -> String {
    captures
        .name(name)
        .map(|value| value.as_str().to_string())
        .unwrap_or_default()
}

fn build_chat(captures: &Captures<'_>) -> ClassifiedEvent {
    ClassifiedEvent::Chat {
        player: group(captures, "player"),
        text: group(captures, "message"),
    }
}

fn build_lag(captures: &Captures<'_>) -> ClassifiedEvent {
    ClassifiedEvent::LagWarning {
        ms: group(captures, "ms"),
        ticks: group(captures, "ticks"),
    }
}

fn build_join(captures: &Captures<'_>) -> ClassifiedEvent {
    ClassifiedEvent::Join {
        player: group(captures, "player"),
    }
}

fn build_leave(captures: &Captures<'_>) -> ClassifiedEvent {
    ClassifiedEvent::Leave {
        player: group(captures, "player"),
    }
}
