use crate::{errors::Error, Result};

/// Initialize tracing for the notifier.
///
/// Default: info for our crates, warn for everything else (teloxide/reqwest
/// are chatty at info). Can be overridden with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,ytb=info,ytb_core=info,ytb_feed=info,ytb_ytdlp=info,ytb_telegram=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to initialize logging: {e}")))
}
