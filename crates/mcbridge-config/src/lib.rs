//! Settings, pattern strings, and message templates for the mcbridge runtime.
//!
//! Settings are TOML. Built-in defaults are deep-merged under the operator's
//! `settings.toml`, deserialized into typed structs, and every template is
//! compiled once at startup so configuration mistakes fail before any event
//! is processed.

pub mod settings;
pub mod templates;

pub use settings::*;
pub use templates::{TemplateKey, TemplateSet};
