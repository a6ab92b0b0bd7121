//! Per-line chat transliteration and delivery.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mcbridge_config::{TemplateKey, TemplateSet};
use mcbridge_rcon::RemoteCommand;
use mcbridge_translit::Transliterator;
use minijinja::context;
use regex::Regex;
use tokio::task::JoinHandle;

#[async_trait]
/// Destination channel for rendered bridge messages.
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, content: &str) -> Result<()>;
}

pub fn compile_native_script(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).context("patterns.native_script failed to compile")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which rendering a chat line ended up with.
pub enum ChatDelivery {
    Normal,
    Converted,
    /// Rendering or sending failed; the failure was logged.
    Dropped,
}

/// Routes chat lines either straight to the sink or through the transliterator.
#[derive(Clone)]
pub struct ChatPipeline {
    native_script: Regex,
    templates: Arc<TemplateSet>,
    transliterator: Arc<dyn Transliterator>,
    sink: Arc<dyn ChatSink>,
    relay: Option<Arc<dyn RemoteCommand>>,
}

impl ChatPipeline {
    /// `relay` receives a `say` command for every converted line when set.
    pub fn new(
        native_script_pattern: &str,
        templates: Arc<TemplateSet>,
        transliterator: Arc<dyn Transliterator>,
        sink: Arc<dyn ChatSink>,
        relay: Option<Arc<dyn RemoteCommand>>,
    ) -> Result<Self> {
        let native_script = compile_native_script(native_script_pattern)?;
        Ok(Self {
            native_script,
            templates,
            transliterator,
            sink,
            relay,
        })
    }

    pub fn contains_native_script(&self, text: &str) -> bool {
        self.native_script.is_match(text)
    }

    /// Delivers one chat line.
    ///
    /// Lines already written in native script are delivered inline. Other
    /// lines are transliterated on a detached task whose handle is returned;
    /// sibling lines may therefore arrive out of order.
    pub async fn submit(&self, player: String, text: String) -> Option<JoinHandle<ChatDelivery>> {
        if self.contains_native_script(&text) {
            self.deliver_normal(&player, &text).await;
            return None;
        }
        let pipeline = self.clone();
        Some(tokio::spawn(async move {
            pipeline.transliterate_and_deliver(&player, &text).await
        }))
    }

    pub async fn transliterate_and_deliver(&self, player: &str, text: &str) -> ChatDelivery {
        let converted = self.transliterator.convert(text).await;
        if converted == text {
            return self.deliver_normal(player, text).await;
        }

        let rendered = self.templates.render(
            TemplateKey::ChatRomajiConverted,
            context! {
                player_name => player,
                converted_text => &converted,
                original_message => text,
            },
        );
        let delivery = self.send_rendered(rendered, ChatDelivery::Converted).await;
        if let Some(relay) = &self.relay {
            self.relay_converted(relay.as_ref(), player, &converted)
                .await;
        }
        delivery
    }

    async fn deliver_normal(&self, player: &str, text: &str) -> ChatDelivery {
        let rendered = self.templates.render(
            TemplateKey::ChatNormal,
            context! { player_name => player, message => text },
        );
        self.send_rendered(rendered, ChatDelivery::Normal).await
    }

    async fn send_rendered(&self, rendered: Result<String>, success: ChatDelivery) -> ChatDelivery {
        let content = match rendered {
            Ok(content) => content,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "chat template rendering failed");
                return ChatDelivery::Dropped;
            }
        };
        match self.sink.send_message(&content).await {
            Ok(()) => success,
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "failed to deliver chat message");
                ChatDelivery::Dropped
            }
        }
    }

    async fn relay_converted(&self, relay: &dyn RemoteCommand, player: &str, converted: &str) {
        let message = match self.templates.render(
            TemplateKey::ServerRelayConvertedChat,
            context! { player_name => player, converted_text => converted },
        ) {
            Ok(message) => message,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "relay template rendering failed");
                return;
            }
        };
        let command = format!("say {message}");
        tracing::info!(command = %command, executor = "chat-relay", "sending rcon command");
        if let Err(error) = relay.execute(&command).await {
            tracing::warn!(error = %error, "failed to relay converted chat to the server");
        }
    }
}
