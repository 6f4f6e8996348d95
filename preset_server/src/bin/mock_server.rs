use async_trait::async_trait;
use brain_core::adapter::PresetAdapter;
use brain_core::catalog::DeviceCatalog;
use brain_core::extract::ResponseFormat;
use brain_core::gemini::{GenerationError, TextGenerator};
use brain_core::handler::PresetService;
use clap::Parser;
use preset_protocol::{DeviceDescriptor, EffectBlock, PresetEnvelope, SettingValue};
use preset_server::PresetServer;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_ADDR: &str = "127.0.0.1:0";

/// Preset server wired to an offline generator, for frontend work without an API key.
#[derive(Parser, Debug)]
#[command(name = "mock_server")]
struct Args {
    #[arg(long, default_value = DEFAULT_ADDR)]
    bind: SocketAddr,

    #[arg(long, default_value_t = ResponseFormat::RawJson)]
    response_format: ResponseFormat,

    #[arg(long, value_name = "DIR")]
    pedal_dir: Option<PathBuf>,
}

/// Answers every prompt with the first listed model of each block.
struct OfflineGenerator {
    format: ResponseFormat,
}

#[async_trait]
impl TextGenerator for OfflineGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        // The constraints are embedded as one compact JSON line.
        let descriptor = prompt
            .lines()
            .find_map(|line| serde_json::from_str::<DeviceDescriptor>(line.trim()).ok())
            .ok_or_else(|| GenerationError::Upstream("no device descriptor in prompt".to_string()))?;

        let preset = descriptor
            .effect_chain
            .iter()
            .filter_map(|block| {
                let model = descriptor.models_for(block)?.first()?;
                let mut settings = BTreeMap::new();
                settings.insert("Level".to_string(), SettingValue::from(5));
                Some(EffectBlock {
                    block_name: block.clone(),
                    effect_name: model.model_name.clone(),
                    enabled: true,
                    settings,
                })
            })
            .collect();

        let body = serde_json::to_string_pretty(&PresetEnvelope { preset })
            .map_err(|e| GenerationError::Upstream(e.to_string()))?;
        Ok(match self.format {
            ResponseFormat::RawJson => body,
            ResponseFormat::FencedJson => format!("Offline preset:\n```json\n{body}\n```\n"),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,brain_core=debug")),
        )
        .init();

    let args = Args::parse();

    let mut catalog = DeviceCatalog::builtin()?;
    if let Some(dir) = args.pedal_dir.as_deref() {
        catalog.extend(DeviceCatalog::load_dir(dir)?)?;
    }

    let generator = OfflineGenerator {
        format: args.response_format,
    };
    let adapter = PresetAdapter::new(Arc::new(generator), args.response_format);
    let service = PresetService::new(Arc::new(catalog), adapter);

    let server = PresetServer::bind(args.bind, service).await?;
    println!("mock preset server listening on http://{}", server.listen_addr());

    tokio::signal::ctrl_c().await?;
    server.shutdown().await?;
    Ok(())
}
