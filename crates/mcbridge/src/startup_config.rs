use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use mcbridge_allowlist::AllowlistPatterns;
use mcbridge_config::{load_settings, BridgeSettings, TemplateKey, TemplateSet};
use mcbridge_logtail::{compile_native_script, EventClassifier};

/// Settings with every pattern and template compiled.
pub(crate) struct CompiledSettings {
    pub(crate) settings: BridgeSettings,
    pub(crate) templates: Arc<TemplateSet>,
    pub(crate) allowlist_patterns: Arc<AllowlistPatterns>,
    pub(crate) classifier: EventClassifier,
}

/// Loads the settings file and compiles everything derived from it. Any
/// failure here is a fatal configuration error.
pub(crate) fn compile_settings(path: &Path) -> Result<CompiledSettings> {
    let settings = load_settings(path)?;
    let templates = TemplateSet::from_settings(&settings).context("invalid message templates")?;
    let allowlist_patterns = AllowlistPatterns::compile(&settings.patterns, &settings.responses)
        .context("invalid allowlist patterns")?;
    let classifier =
        EventClassifier::from_patterns(&settings.patterns).context("invalid log patterns")?;
    compile_native_script(&settings.patterns.native_script)?;
    Ok(CompiledSettings {
        settings,
        templates: Arc::new(templates),
        allowlist_patterns: Arc::new(allowlist_patterns),
        classifier,
    })
}

pub(crate) fn render_check_config_report(path: &Path, compiled: &CompiledSettings) -> String {
    format!(
        "configuration ok: settings={} templates={} commands=/{} /{} admin_entry_removal={:?}",
        path.display(),
        TemplateKey::ALL.len(),
        compiled.settings.commands.ws.name,
        compiled.settings.commands.ls.name,
        compiled.settings.allowlist.admin_entry_removal,
    )
}
