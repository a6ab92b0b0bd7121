use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or unparsable. The gateway and HTTP stacks
/// are chatty at info.
const DEFAULT_LOG_DIRECTIVES: &str = "info,serenity=warn,reqwest=warn,hyper=warn";

pub(crate) fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(default_env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES))
}
