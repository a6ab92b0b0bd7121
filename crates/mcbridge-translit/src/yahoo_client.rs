//! Yahoo! JLP kana-kanji conversion client (JIMService V2, JSON-RPC).

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use mcbridge_core::truncate_for_log;
use serde::Deserialize;
use serde_json::json;

use crate::Transliterator;

pub const YAHOO_JLP_CONVERSION_URL: &str = "https://jlp.yahooapis.jp/JIMService/V2/conversion";
const REQUEST_ID: &str = "mcbridge-1";

#[derive(Debug, Clone)]
pub struct YahooTransliteratorConfig {
    pub app_id: Option<String>,
    pub api_url: String,
    pub request_timeout_ms: u64,
}

impl Default for YahooTransliteratorConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            api_url: YAHOO_JLP_CONVERSION_URL.to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConversionResponse {
    result: Option<ConversionResult>,
}

#[derive(Debug, Deserialize)]
struct ConversionResult {
    segment: Vec<ConversionSegment>,
}

#[derive(Debug, Deserialize)]
struct ConversionSegment {
    #[serde(default)]
    candidate: Vec<String>,
}

pub struct YahooTransliterator {
    http: reqwest::Client,
    config: YahooTransliteratorConfig,
}

impl YahooTransliterator {
    pub fn new(config: YahooTransliteratorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create transliteration http client")?;
        Ok(Self { http, config })
    }

    async fn request_conversion(&self, app_id: &str, text: &str) -> Result<String> {
        let payload = json!({
            "id": REQUEST_ID,
            "jsonrpc": "2.0",
            "method": "jlp.jimservice.conversion",
            "params": {
                "q": text,
                "format": "roman",
                "mode": "kanakanji",
                "results": 1,
            },
        });
        let response = self
            .http
            .post(&self.config.api_url)
            .header(reqwest::header::USER_AGENT, format!("Yahoo AppID: {app_id}"))
            .json(&payload)
            .send()
            .await
            .context("conversion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!(
                "conversion failed with status {}: {}",
                status.as_u16(),
                truncate_for_log(&body, 240)
            );
        }

        let parsed = response
            .json::<ConversionResponse>()
            .await
            .context("failed to decode conversion response")?;
        join_first_candidates(parsed)
    }
}

fn join_first_candidates(response: ConversionResponse) -> Result<String> {
    let result = response
        .result
        .ok_or_else(|| anyhow!("conversion response missing result"))?;
    result
        .segment
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            segment
                .candidate
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("segment {index} has no candidates"))
        })
        .collect()
}

#[async_trait]
impl Transliterator for YahooTransliterator {
    async fn convert(&self, text: &str) -> String {
        let Some(app_id) = self
            .config
            .app_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            tracing::warn!("YAHOO_APPID is not set; chat transliteration disabled");
            return text.to_string();
        };

        match self.request_conversion(app_id, text).await {
            Ok(converted) => converted,
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "transliteration failed; using original text");
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::{YahooTransliterator, YahooTransliteratorConfig};
    use crate::Transliterator;

    fn transliterator(url: String, app_id: Option<&str>) -> YahooTransliterator {
        YahooTransliterator::new(YahooTransliteratorConfig {
            app_id: app_id.map(str::to_string),
            api_url: url,
            request_timeout_ms: 2_000,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn integration_convert_joins_first_candidate_of_each_segment() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/conversion")
                .header("user-agent", "Yahoo AppID: app-123")
                .json_body_includes(
                    json!({ "params": { "q": "konnichiwa", "format": "roman" } }).to_string(),
                );
            then.status(200).json_body(json!({
                "id": "mcbridge-1",
                "jsonrpc": "2.0",
                "result": {
                    "segment": [
                        { "candidate": ["こんにちは", "今日は"] },
                        { "candidate": ["！"] }
                    ]
                }
            }));
        });

        let converted = transliterator(server.url("/conversion"), Some("app-123"))
            .convert("konnichiwa")
            .await;
        mock.assert();
        assert_eq!(converted, "こんにちは！");
    }

    #[tokio::test]
    async fn regression_convert_falls_back_on_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/conversion");
            then.status(503).body("unavailable");
        });
        let converted = transliterator(server.url("/conversion"), Some("app-123"))
            .convert("arigatou")
            .await;
        assert_eq!(converted, "arigatou");
    }

    #[tokio::test]
    async fn regression_convert_falls_back_on_malformed_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/conversion");
            then.status(200)
                .json_body(json!({ "result": { "segment": [ { "candidate": [] } ] } }));
        });
        let converted = transliterator(server.url("/conversion"), Some("app-123"))
            .convert("sayounara")
            .await;
        assert_eq!(converted, "sayounara");
    }

    #[tokio::test]
    async fn regression_convert_skips_request_without_app_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/conversion");
            then.status(200).json_body(json!({}));
        });
        let converted = transliterator(server.url("/conversion"), None)
            .convert("ohayou")
            .await;
        assert_eq!(converted, "ohayou");
        mock.assert_calls(0);
    }

    #[tokio::test]
    async fn regression_convert_falls_back_when_service_unreachable() {
        let converted = transliterator("http://127.0.0.1:9/conversion".to_string(), Some("app"))
            .convert("oyasumi")
            .await;
        assert_eq!(converted, "oyasumi");
    }
}
