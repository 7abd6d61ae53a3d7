use anyhow::Context;

use minna_hiraizumi::app::serve;
use minna_hiraizumi::config::AppConfig;
use minna_hiraizumi::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🏯 みんなの平泉 v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}/api", config.listen_addr());
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Chat poll interval: {}s", config.chat_poll_interval_secs);
    if let Some(dir) = &config.log_dir {
        eprintln!("   Logs: {}", dir.display());
    }

    let db_path = config.db_path.clone();
    serve(config)
        .await
        .with_context(|| format!("server failed (database: {})", db_path.display()))
}
