use anyhow::Context;
use trendpost::{create_router, ApiState, App};
use trendpost_core::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trendpost=info,background_service=info,database=info,notifier=info,\
                 llm_interface=info,content_engine=info"
                    .into()
            }),
        )
        .init();

    tracing::info!("Starting Trendpost content automation");

    let config = AppConfig::load().context("loading configuration")?;
    let app = App::build(&config).await.context("assembling services")?;

    if app.service.start() {
        tracing::info!("Scheduler running");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    tracing::info!("Listening on {}", config.server.bind_addr);

    let router = create_router(ApiState::new(app.service.clone(), app.authenticator.clone()));
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("serving HTTP")?;

    app.service.stop().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
