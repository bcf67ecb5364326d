use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use studyhall::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cfg = Config::from_env()?;

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "studyhall starting: RUST_LOG='{}', http_port={}, model={}, store={}",
        rust_log,
        cfg.http_port,
        cfg.openai_model,
        cfg.store_backend().label()
    );

    studyhall::server::run(cfg).await
}
