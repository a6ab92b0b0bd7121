use std::sync::Arc;

use mcbridge_config::{TemplateKey, TemplateSet};
use minijinja::context;
use tokio::task::JoinHandle;

use crate::{ChatDelivery, ChatPipeline, ChatSink, ClassifiedEvent, EventClassifier};

/// Turns tailed lines into chat messages.
pub struct LogEventDispatcher {
    classifier: EventClassifier,
    pipeline: ChatPipeline,
    templates: Arc<TemplateSet>,
    sink: Arc<dyn ChatSink>,
}

impl LogEventDispatcher {
    pub fn new(
        classifier: EventClassifier,
        pipeline: ChatPipeline,
        templates: Arc<TemplateSet>,
        sink: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            classifier,
            pipeline,
            templates,
            sink,
        }
    }

    /// Dispatches one line. Returns the transliteration task when the line
    /// was chat routed through the transliterator.
    pub async fn dispatch_line(&self, line: &str) -> Option<JoinHandle<ChatDelivery>> {
        let (key, context) = match self.classifier.classify(line) {
            ClassifiedEvent::Chat { player, text } => {
                return self.pipeline.submit(player, text).await;
            }
            ClassifiedEvent::LagWarning { ms, ticks } => {
                (TemplateKey::ServerLag, context! { ms => ms, ticks => ticks })
            }
            ClassifiedEvent::Join { player } => {
                (TemplateKey::PlayerJoined, context! { player_name => player })
            }
            ClassifiedEvent::Leave { player } => {
                (TemplateKey::PlayerLeft, context! { player_name => player })
            }
            ClassifiedEvent::Unmatched => return None,
        };

        let content = match self.templates.render(key, context) {
            Ok(content) => content,
            Err(error) => {
                tracing::error!(
                    template = key.as_str(),
                    error = %format!("{error:#}"),
                    "log event template rendering failed"
                );
                return None;
            }
        };
        if let Err(error) = self.sink.send_message(&content).await {
            tracing::warn!(
                template = key.as_str(),
                error = %format!("{error:#}"),
                "failed to deliver log event"
            );
        }
        None
    }
}
