use std::sync::Arc;

use gk_core::config::Config;
use gk_openai::ChatCompletionsClient;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), gk_core::Error> {
    gk_core::logging::init("gk")?;

    let cfg = Arc::new(Config::load()?);

    let generator = Arc::new(ChatCompletionsClient::from_config(&cfg)?);
    info!(
        model = generator.model(),
        persona = %cfg.default_persona,
        "reply generator ready"
    );

    gk_telegram::router::run_polling(cfg, generator)
        .await
        .map_err(|e| gk_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
