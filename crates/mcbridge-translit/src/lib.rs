//! Transliteration collaborator that turns romanized chat into native script.
//!
//! [`Transliterator::convert`] never fails: every error path degrades to the
//! identity function so chat relay keeps flowing when the lookup service is
//! slow, misconfigured, or down.

use async_trait::async_trait;

mod yahoo_client;

pub use yahoo_client::{YahooTransliterator, YahooTransliteratorConfig, YAHOO_JLP_CONVERSION_URL};

#[async_trait]
/// Trait contract for `Transliterator` behavior.
pub trait Transliterator: Send + Sync {
    /// Returns the converted text, or `text` unchanged when conversion is unavailable.
    async fn convert(&self, text: &str) -> String;
}

/// Transliterator that always returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransliterator;

#[async_trait]
impl Transliterator for IdentityTransliterator {
    async fn convert(&self, text: &str) -> String {
        text.to_string()
    }
}
