use std::{
    fs::OpenOptions,
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use httpmock::prelude::*;
use mcbridge_config::{parse_settings_with_defaults, TemplateSet};
use mcbridge_logtail::{
    ChatPipeline, ChatSink, EventClassifier, LogEventDispatcher, LogTailer, TailService,
    TailServiceConfig,
};
use mcbridge_rcon::{RconError, RemoteCommand};
use mcbridge_translit::{YahooTransliterator, YahooTransliteratorConfig};
use serde_json::json;
use tempfile::tempdir;

#[derive(Default)]
struct ChannelRecorder {
    messages: Mutex<Vec<String>>,
}

impl ChannelRecorder {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages").clone()
    }
}

#[async_trait]
impl ChatSink for ChannelRecorder {
    async fn send_message(&self, content: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .expect("messages")
            .push(content.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct ConsoleRecorder {
    commands: Mutex<Vec<String>>,
}

impl ConsoleRecorder {
    async fn wait_for_commands(&self, count: usize) -> Vec<String> {
        for _ in 0..300 {
            let commands = self.commands.lock().expect("commands").clone();
            if commands.len() >= count {
                return commands;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.commands.lock().expect("commands").clone()
    }
}

#[async_trait]
impl RemoteCommand for ConsoleRecorder {
    async fn execute(&self, command: &str) -> Result<String, RconError> {
        self.commands
            .lock()
            .expect("commands")
            .push(command.to_string());
        Ok(String::new())
    }
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open log");
    file.write_all(text.as_bytes()).expect("append");
}

async fn wait_for_messages(channel: &ChannelRecorder, count: usize) -> Vec<String> {
    for _ in 0..300 {
        let messages = channel.messages();
        if messages.len() >= count {
            return messages;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    channel.messages()
}

#[tokio::test]
async fn integration_tailed_log_lines_reach_channel_with_transliteration() {
    let yahoo = MockServer::start_async().await;
    let conversion = yahoo.mock(|when, then| {
        when.method(POST)
            .path("/conversion")
            .json_body_includes(json!({ "params": { "q": "arigatou" } }).to_string());
        then.status(200).json_body(json!({
            "id": "mcbridge-1",
            "jsonrpc": "2.0",
            "result": { "segment": [ { "candidate": ["ありがとう"] } ] }
        }));
    });

    let settings = parse_settings_with_defaults("").expect("settings");
    let templates = Arc::new(TemplateSet::from_settings(&settings).expect("templates"));
    let channel = Arc::new(ChannelRecorder::default());
    let console = Arc::new(ConsoleRecorder::default());
    let transliterator = YahooTransliterator::new(YahooTransliteratorConfig {
        app_id: Some("app-123".to_string()),
        api_url: yahoo.url("/conversion"),
        request_timeout_ms: 2_000,
    })
    .expect("transliterator");
    let pipeline = ChatPipeline::new(
        &settings.patterns.native_script,
        templates.clone(),
        Arc::new(transliterator),
        channel.clone(),
        Some(console.clone()),
    )
    .expect("pipeline");
    let dispatcher = LogEventDispatcher::new(
        EventClassifier::from_patterns(&settings.patterns).expect("classifier"),
        pipeline,
        templates,
        channel.clone(),
    );

    let temp = tempdir().expect("tempdir");
    let log_path = temp.path().join("latest.log");
    append(&log_path, "[09:00:00] [Server thread/INFO]: Starting minecraft server\n");
    let service = TailService::spawn(
        LogTailer::open_at_end(&log_path),
        Arc::new(dispatcher),
        TailServiceConfig {
            poll_interval: Duration::from_millis(25),
        },
    );

    append(&log_path, "[10:00:00] [Server thread/INFO]: Steve joined the game\n");
    assert_eq!(wait_for_messages(&channel, 1).await.len(), 1);
    append(&log_path, "[10:00:01] [Server thread/INFO]: <Steve> arigatou\n");
    assert_eq!(wait_for_messages(&channel, 2).await.len(), 2);
    append(&log_path, "[10:00:02] [Server thread/INFO]: <Steve> またね\n");
    let messages = wait_for_messages(&channel, 3).await;
    let commands = console.wait_for_commands(1).await;

    service.shutdown().await.expect("shutdown");
    conversion.assert();
    assert_eq!(
        messages,
        vec![
            ":green_circle: **Steve** joined the server".to_string(),
            "**Steve**: ありがとう (arigatou)".to_string(),
            "**Steve**: またね".to_string(),
        ]
    );
    assert_eq!(commands, vec!["say <Steve> ありがとう".to_string()]);
}

#[tokio::test]
async fn regression_rotated_log_is_tailed_from_the_start() {
    let settings = parse_settings_with_defaults("").expect("settings");
    let templates = Arc::new(TemplateSet::from_settings(&settings).expect("templates"));
    let channel = Arc::new(ChannelRecorder::default());
    let pipeline = ChatPipeline::new(
        &settings.patterns.native_script,
        templates.clone(),
        Arc::new(mcbridge_translit::IdentityTransliterator),
        channel.clone(),
        None,
    )
    .expect("pipeline");
    let dispatcher = LogEventDispatcher::new(
        EventClassifier::from_patterns(&settings.patterns).expect("classifier"),
        pipeline,
        templates,
        channel.clone(),
    );

    let temp = tempdir().expect("tempdir");
    let log_path = temp.path().join("latest.log");
    append(
        &log_path,
        "[08:00:00] [Server thread/INFO]: a long line from yesterday's session that will be rotated away\n",
    );
    let service = TailService::spawn(
        LogTailer::open_at_end(&log_path),
        Arc::new(dispatcher),
        TailServiceConfig {
            poll_interval: Duration::from_millis(25),
        },
    );

    std::fs::write(&log_path, "[00:00:01] [Server thread/INFO]: Alex joined the game\n")
        .expect("rotate");
    let messages = wait_for_messages(&channel, 1).await;
    let tailer = service.shutdown().await.expect("shutdown");

    assert_eq!(
        messages,
        vec![":green_circle: **Alex** joined the server".to_string()]
    );
    assert_eq!(
        tailer.cursor(),
        std::fs::metadata(&log_path).expect("meta").len()
    );
}
