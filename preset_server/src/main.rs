use clap::Parser;
use preset_server::{PresetServer, ServerArgs};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // brain_core logs the full generation prompt at debug level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,brain_core=debug")),
        )
        .init();

    let args = ServerArgs::parse();
    let service = args.build_service()?;
    tracing::info!(
        pedals = ?service.catalog().names(),
        model = %args.gemini_model,
        response_format = %args.response_format,
        "preset service ready"
    );

    let server = PresetServer::bind(args.bind, service).await?;
    tracing::info!(addr = %server.listen_addr(), "listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown().await?;
    Ok(())
}
