use brain_core::adapter::PresetAdapter;
use brain_core::catalog::DeviceCatalog;
use brain_core::extract::ResponseFormat;
use brain_core::gemini::{
    clamp_timeout_secs, load_api_key, GeminiClient, GeminiConfig, DEFAULT_HTTP_TIMEOUT_SECS,
    DEFAULT_MODEL,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "brain_cli")]
struct Args {
    /// Pedal to target, e.g. "Mooer GE150 Pro".
    #[arg(long, required_unless_present = "list_pedals")]
    pedal: Option<String>,

    #[arg(long, required_unless_present_any = ["tone_file", "list_pedals"])]
    tone: Option<String>,

    /// Read the tone description from a file.
    #[arg(long, value_name = "PATH", conflicts_with = "tone")]
    tone_file: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    gemini_model: String,

    #[arg(long, default_value_t = ResponseFormat::RawJson)]
    response_format: ResponseFormat,

    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,

    #[arg(long)]
    api_key_file: Option<PathBuf>,

    /// Extra descriptor documents to load next to the built-in ones.
    #[arg(long, value_name = "DIR")]
    pedal_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    list_pedals: bool,

    /// Print the generation prompt and exit without calling the service.
    #[arg(long, default_value_t = false)]
    print_prompt: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut catalog = DeviceCatalog::builtin()?;
    if let Some(dir) = args.pedal_dir.as_deref() {
        catalog.extend(DeviceCatalog::load_dir(dir)?)?;
    }

    if args.list_pedals {
        for name in catalog.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let pedal = args
        .pedal
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("missing --pedal"))?;
    let descriptor = catalog.find(pedal).map_err(|e| {
        anyhow::anyhow!("{e} (known pedals: {})", catalog.names().join(", "))
    })?;

    let tone = if let Some(t) = args.tone.clone() {
        t
    } else {
        let path = args
            .tone_file
            .clone()
            .ok_or_else(|| anyhow::anyhow!("missing --tone or --tone-file"))?;
        std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read tone file {}: {e}", path.display()))?
    };

    if args.print_prompt {
        let prompt = brain_core::system_prompt::build_prompt(descriptor, &tone, args.response_format)?;
        println!("{prompt}");
        return Ok(());
    }

    let api_key = load_api_key(args.api_key_file.as_deref())?;

    let client = GeminiClient::new(GeminiConfig {
        model: args.gemini_model.clone(),
        timeout: clamp_timeout_secs(args.http_timeout_secs),
        json_mode: args.response_format == ResponseFormat::RawJson,
        ..GeminiConfig::new(api_key)
    })?;

    eprintln!(
        "generating: pedal={:?} model={} format={}",
        descriptor.device_id,
        client.model(),
        args.response_format
    );

    let adapter = PresetAdapter::new(Arc::new(client), args.response_format);
    let preset = match adapter.generate(descriptor, &tone).await {
        Ok(p) => p,
        Err(e) => {
            if let Some(raw) = e.raw_response() {
                eprintln!("raw response:\n{raw}");
            }
            return Err(e.into());
        }
    };

    for issue in brain_core::adapter::audit_preset(descriptor, &preset) {
        eprintln!("warning: {issue}");
    }

    println!("{}", serde_json::to_string_pretty(&preset)?);
    Ok(())
}
